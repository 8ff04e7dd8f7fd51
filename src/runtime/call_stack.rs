use std::rc::Rc;

use crate::runtime::{
    container::Container,
    error::StoryError,
    frame::{Frame, PushPopType},
    pointer::Pointer,
    value::Value,
};

/// An independent call-stack history. Extra threads exist while choices
/// are being generated and as dormant copies held by the choices.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub callstack: Vec<Frame>,
    pub thread_index: usize,
    pub previous_pointer: Pointer,
}

impl Thread {
    pub fn new(root_frame: Frame) -> Self {
        Self {
            callstack: vec![root_frame],
            thread_index: 0,
            previous_pointer: Pointer::null(),
        }
    }
}

/// Stack of threads, each a stack of frames. Neither stack is ever empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStack {
    threads: Vec<Thread>,
    thread_counter: usize,
    start_of_root: Pointer,
}

impl CallStack {
    pub fn new(root: &Rc<Container>) -> Self {
        let start_of_root = Pointer::start_of(root.clone());
        Self {
            threads: vec![Self::root_thread(&start_of_root)],
            thread_counter: 0,
            start_of_root,
        }
    }

    fn root_thread(start_of_root: &Pointer) -> Thread {
        Thread::new(Frame::new(PushPopType::Tunnel, start_of_root.clone(), false))
    }

    /// Rebuilds a call stack from saved threads.
    pub fn from_threads(
        root: &Rc<Container>,
        threads: Vec<Thread>,
        thread_counter: usize,
    ) -> Result<Self, StoryError> {
        if threads.is_empty() || threads.iter().any(|t| t.callstack.is_empty()) {
            return Err(StoryError::format("saved call stack has an empty thread"));
        }
        Ok(Self {
            threads,
            thread_counter,
            start_of_root: Pointer::start_of(root.clone()),
        })
    }

    pub fn reset(&mut self) {
        self.threads = vec![Self::root_thread(&self.start_of_root)];
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread_counter(&self) -> usize {
        self.thread_counter
    }

    pub fn current_thread(&self) -> &Thread {
        &self.threads[self.threads.len() - 1]
    }

    pub fn current_thread_mut(&mut self) -> &mut Thread {
        let last = self.threads.len() - 1;
        &mut self.threads[last]
    }

    /// Replaces the only thread, used when a choice restores the thread it
    /// was generated on.
    pub fn set_current_thread(&mut self, thread: Thread) -> Result<(), StoryError> {
        if self.threads.len() != 1 {
            return Err(StoryError::stack(
                "shouldn't be directly setting the current thread when there is a stack of them",
            ));
        }
        self.threads[0] = thread;
        Ok(())
    }

    pub fn elements(&self) -> &[Frame] {
        &self.current_thread().callstack
    }

    pub fn depth(&self) -> usize {
        self.elements().len()
    }

    pub fn current_element(&self) -> &Frame {
        let callstack = &self.current_thread().callstack;
        &callstack[callstack.len() - 1]
    }

    pub fn current_element_mut(&mut self) -> &mut Frame {
        let callstack = &mut self.current_thread_mut().callstack;
        let last = callstack.len() - 1;
        &mut callstack[last]
    }

    pub fn current_element_index(&self) -> usize {
        self.elements().len() - 1
    }

    pub fn can_pop(&self) -> bool {
        self.elements().len() > 1
    }

    pub fn can_pop_type(&self, push_type: PushPopType) -> bool {
        self.can_pop() && self.current_element().push_type == push_type
    }

    pub fn element_is_evaluate_from_game(&self) -> bool {
        self.current_element().push_type == PushPopType::FunctionEvaluationFromGame
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    pub fn push(
        &mut self,
        push_type: PushPopType,
        evaluation_stack_height: usize,
        output_stream_length: usize,
    ) {
        let pointer = self.current_element().current_pointer.clone();
        let mut frame = Frame::new(push_type, pointer, false);
        frame.evaluation_stack_height_when_pushed = evaluation_stack_height;
        frame.function_start_in_output_stream = output_stream_length as i32;
        self.current_thread_mut().callstack.push(frame);
    }

    /// Pops the current frame, which must be of `push_type` when given.
    pub fn pop(&mut self, push_type: Option<PushPopType>) -> Result<Frame, StoryError> {
        let allowed = match push_type {
            Some(push_type) => self.can_pop_type(push_type),
            None => self.can_pop(),
        };
        if !allowed {
            return Err(StoryError::stack(format!(
                "mismatched push/pop in call stack (expected {:?}, found {:?} at depth {})",
                push_type,
                self.current_element().push_type,
                self.depth()
            )));
        }
        self.current_thread_mut()
            .callstack
            .pop()
            .ok_or_else(|| StoryError::stack("call stack is empty"))
    }

    pub fn push_thread(&mut self) {
        let thread = self.fork_thread();
        self.threads.push(thread);
    }

    /// Copy of the current thread under a fresh index.
    pub fn fork_thread(&mut self) -> Thread {
        let mut thread = self.current_thread().clone();
        self.thread_counter += 1;
        thread.thread_index = self.thread_counter;
        thread
    }

    pub fn pop_thread(&mut self) -> Result<(), StoryError> {
        if !self.can_pop_thread() {
            return Err(StoryError::stack("can't pop thread"));
        }
        self.threads.pop();
        Ok(())
    }

    pub fn thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_index == index)
    }

    /// Reads a temporary. `context_index` is 1-based; `-1` means the current
    /// frame.
    pub fn temporary_variable(&self, name: &str, context_index: i32) -> Option<&Value> {
        let frame = self.context_frame(context_index)?;
        frame.temporary_variables.get(name)
    }

    pub fn set_temporary_variable(
        &mut self,
        name: &str,
        mut value: Value,
        declare_new: bool,
        context_index: i32,
    ) -> Result<(), StoryError> {
        let index = self.resolve_context_index(context_index);
        let frame = index
            .checked_sub(1)
            .and_then(|i| self.current_thread_mut().callstack.get_mut(i))
            .ok_or_else(|| {
                StoryError::stack(format!("no call-stack element for context {context_index}"))
            })?;

        let old = frame.temporary_variables.get(name);
        if !declare_new && old.is_none() {
            return Err(StoryError::runtime(format!(
                "could not find temporary variable to set: {name}"
            )));
        }
        if let Some(old) = old {
            retain_list_origins(old, &mut value);
        }
        frame.temporary_variables.insert(name.into(), value);
        Ok(())
    }

    /// Context index a name should be read from: the current frame when it
    /// holds a temporary of that name, otherwise the globals (0).
    pub fn context_for_variable_named(&self, name: &str) -> i32 {
        if self.current_element().temporary_variables.contains_key(name) {
            self.current_element_index() as i32 + 1
        } else {
            0
        }
    }

    fn resolve_context_index(&self, context_index: i32) -> usize {
        if context_index == -1 {
            self.current_element_index() + 1
        } else {
            context_index.max(0) as usize
        }
    }

    fn context_frame(&self, context_index: i32) -> Option<&Frame> {
        let index = self.resolve_context_index(context_index);
        self.elements().get(index.checked_sub(1)?)
    }

    /// Human-readable listing of every thread's frames.
    pub fn call_stack_trace(&self) -> String {
        let mut trace = String::new();
        for (t, thread) in self.threads.iter().enumerate() {
            let is_current = t == self.threads.len() - 1;
            trace.push_str(&format!(
                "=== THREAD {}/{} {}===\n",
                t + 1,
                self.threads.len(),
                if is_current { "(current) " } else { "" }
            ));
            for frame in &thread.callstack {
                let kind = match frame.push_type {
                    PushPopType::Function => "  [FUNCTION] ",
                    _ => "  [TUNNEL] ",
                };
                trace.push_str(kind);
                match frame.current_pointer.path() {
                    Some(path) => trace.push_str(&format!("<SOMEWHERE IN {path}>\n")),
                    None => trace.push_str("<null>\n"),
                }
            }
        }
        trace
    }
}

/// An empty list assigned over a list keeps the old list's origins.
pub(crate) fn retain_list_origins(old: &Value, new: &mut Value) {
    if let (Value::List(old), Value::List(new)) = (old, new) {
        if new.is_empty() {
            new.set_initial_origin_names(old.origin_names());
        }
    }
}
