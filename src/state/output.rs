//! Output stream handling: glue, whitespace trimming around function calls
//! and extraction of the current line's text and tags.
use crate::{
    runtime::{
        control_command::ControlCommand, error::StoryError, frame::PushPopType,
        object::OutputItem, value::Value,
    },
    state::StoryState,
};

pub(crate) fn is_newline(text: &str) -> bool {
    text == "\n"
}

pub(crate) fn is_inline_whitespace(text: &str) -> bool {
    text.chars().all(|c| c == ' ' || c == '\t')
}

pub(crate) fn is_non_whitespace(text: &str) -> bool {
    !is_newline(text) && !is_inline_whitespace(text)
}

/// Collapses runs of spaces and tabs to one space and strips them at the
/// start and end of every line.
pub fn clean_output_whitespace(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut whitespace_start: Option<usize> = None;
    let mut start_of_line = 0;

    for (i, c) in text.char_indices() {
        let inline_whitespace = c == ' ' || c == '\t';
        if inline_whitespace && whitespace_start.is_none() {
            whitespace_start = Some(i);
        }
        if !inline_whitespace {
            if let Some(start) = whitespace_start {
                if c != '\n' && start > 0 && start != start_of_line {
                    cleaned.push(' ');
                }
            }
            whitespace_start = None;
        }
        if c == '\n' {
            start_of_line = i + 1;
        }
        if !inline_whitespace {
            cleaned.push(c);
        }
    }
    cleaned
}

/// Text of an output stream, excluding dynamic tag content.
pub fn text_of(stream: &[OutputItem]) -> String {
    let mut text = String::new();
    let mut in_tag = false;
    for item in stream {
        match item {
            OutputItem::Value(Value::String(s)) if !in_tag => text.push_str(s),
            OutputItem::Command(ControlCommand::BeginTag) => in_tag = true,
            OutputItem::Command(ControlCommand::EndTag) => in_tag = false,
            _ => {}
        }
    }
    clean_output_whitespace(&text)
}

/// Tags of an output stream, static and dynamic.
pub fn tags_of(stream: &[OutputItem]) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_tag = false;
    let mut buffer = String::new();

    for item in stream {
        match item {
            OutputItem::Command(ControlCommand::BeginTag) => {
                if in_tag && !buffer.is_empty() {
                    tags.push(clean_output_whitespace(&buffer));
                    buffer.clear();
                }
                in_tag = true;
            }
            OutputItem::Command(ControlCommand::EndTag) => {
                if !buffer.is_empty() {
                    tags.push(clean_output_whitespace(&buffer));
                    buffer.clear();
                }
                in_tag = false;
            }
            OutputItem::Value(Value::String(s)) if in_tag => buffer.push_str(s),
            OutputItem::Tag(text) if !in_tag && !text.is_empty() => tags.push(text.to_string()),
            _ => {}
        }
    }
    if !buffer.is_empty() {
        tags.push(clean_output_whitespace(&buffer));
    }
    tags
}

/// Splits leading and trailing newline runs off a string so each newline
/// goes through the glue/trim rules on its own.
fn split_head_tail_whitespace(text: &str) -> Option<Vec<String>> {
    let bytes = text.as_bytes();
    let mut head_first_newline = None;
    let mut head_last_newline = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => {
                head_first_newline.get_or_insert(i);
                head_last_newline = Some(i);
            }
            b' ' | b'\t' => continue,
            _ => break,
        }
    }

    let mut tail_last_newline = None;
    let mut tail_first_newline = None;
    for (i, &b) in bytes.iter().enumerate().rev() {
        match b {
            b'\n' => {
                tail_last_newline.get_or_insert(i);
                tail_first_newline = Some(i);
            }
            b' ' | b'\t' => continue,
            _ => break,
        }
    }

    if head_first_newline.is_none() && tail_last_newline.is_none() {
        return None;
    }

    let mut parts = Vec::new();
    let mut inner_start = 0;
    let mut inner_end = text.len();

    if let (Some(first), Some(last)) = (head_first_newline, head_last_newline) {
        if first > 0 {
            parts.push(text[..first].to_string());
        }
        parts.push("\n".to_string());
        inner_start = last + 1;
    }
    if let Some(first) = tail_first_newline {
        inner_end = first;
    }
    if inner_end > inner_start {
        parts.push(text[inner_start..inner_end].to_string());
    }
    if let (Some(tail_first), Some(tail_last)) = (tail_first_newline, tail_last_newline) {
        let after_head = head_last_newline.is_none_or(|head_last| tail_first > head_last);
        if after_head {
            parts.push("\n".to_string());
            if tail_last < text.len() - 1 {
                parts.push(text[tail_last + 1..].to_string());
            }
        }
    }
    Some(parts)
}

impl StoryState {
    pub fn output_stream(&self) -> &[OutputItem] {
        &self.flow.output_stream
    }

    pub fn current_text(&self) -> String {
        text_of(&self.flow.output_stream)
    }

    pub fn current_tags(&self) -> Vec<String> {
        tags_of(&self.flow.output_stream)
    }

    pub(crate) fn reset_output(&mut self) {
        self.flow.output_stream.clear();
    }

    pub(crate) fn push_to_output_stream(&mut self, item: OutputItem) {
        if let OutputItem::Value(Value::String(text)) = &item {
            if let Some(parts) = split_head_tail_whitespace(text) {
                for part in parts {
                    self.push_to_output_stream_individual(OutputItem::text(&part));
                }
                return;
            }
        }
        self.push_to_output_stream_individual(item);
    }

    fn push_to_output_stream_individual(&mut self, item: OutputItem) {
        let mut include = true;

        match &item {
            OutputItem::Glue => self.trim_newlines_from_output_stream(),
            OutputItem::Value(Value::String(text)) => {
                let mut function_trim_index: Option<usize> = None;
                let current = self.flow.call_stack.current_element();
                if current.push_type == PushPopType::Function
                    && current.function_start_in_output_stream >= 0
                {
                    function_trim_index = Some(current.function_start_in_output_stream as usize);
                }

                let mut glue_trim_index: Option<usize> = None;
                for (i, existing) in self.flow.output_stream.iter().enumerate().rev() {
                    match existing {
                        OutputItem::Glue => {
                            glue_trim_index = Some(i);
                            break;
                        }
                        OutputItem::Command(ControlCommand::BeginString) => {
                            if function_trim_index.is_some_and(|f| i >= f) {
                                function_trim_index = None;
                            }
                            break;
                        }
                        _ => {}
                    }
                }

                let trimming = glue_trim_index.is_some() || function_trim_index.is_some();
                if trimming {
                    if is_newline(text) {
                        include = false;
                    } else if is_non_whitespace(text) {
                        if glue_trim_index.is_some() {
                            self.remove_existing_glue();
                        }
                        if function_trim_index.is_some() {
                            let frames = &mut self.flow.call_stack.current_thread_mut().callstack;
                            for frame in frames.iter_mut().rev() {
                                if frame.push_type != PushPopType::Function {
                                    break;
                                }
                                frame.function_start_in_output_stream = -1;
                            }
                        }
                    }
                } else if is_newline(text)
                    && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content())
                {
                    include = false;
                }
            }
            _ => {}
        }

        if include {
            self.flow.output_stream.push(item);
        }
    }

    fn trim_newlines_from_output_stream(&mut self) {
        let stream = &mut self.flow.output_stream;
        let mut remove_from = None;
        for (i, item) in stream.iter().enumerate().rev() {
            match item {
                OutputItem::Command(_) => break,
                OutputItem::Value(Value::String(s)) if is_non_whitespace(s) => break,
                OutputItem::Value(Value::String(s)) if is_newline(s) => remove_from = Some(i),
                _ => {}
            }
        }
        if let Some(from) = remove_from {
            let mut i = from;
            while i < stream.len() {
                if matches!(stream[i], OutputItem::Value(Value::String(_))) {
                    stream.remove(i);
                } else {
                    i += 1;
                }
            }
        }
    }

    fn remove_existing_glue(&mut self) {
        let stream = &mut self.flow.output_stream;
        let mut i = stream.len();
        while i > 0 {
            i -= 1;
            match stream[i] {
                OutputItem::Glue => {
                    stream.remove(i);
                }
                OutputItem::Command(_) => break,
                _ => {}
            }
        }
    }

    pub(crate) fn output_stream_ends_in_newline(&self) -> bool {
        for item in self.flow.output_stream.iter().rev() {
            match item {
                OutputItem::Command(_) => break,
                OutputItem::Value(Value::String(s)) if is_newline(s) => return true,
                OutputItem::Value(Value::String(s)) if is_non_whitespace(s) => break,
                _ => {}
            }
        }
        false
    }

    pub(crate) fn output_stream_contains_content(&self) -> bool {
        self.flow
            .output_stream
            .iter()
            .any(|item| matches!(item, OutputItem::Value(Value::String(_))))
    }

    pub(crate) fn in_string_evaluation(&self) -> bool {
        self.flow
            .output_stream
            .iter()
            .rev()
            .any(|item| matches!(item, OutputItem::Command(ControlCommand::BeginString)))
    }

    /// Drops trailing whitespace a function produced, back to where it
    /// started writing (or the whole stream once it wrote real text).
    pub(crate) fn trim_whitespace_from_function_end(&mut self) {
        let start = self
            .flow
            .call_stack
            .current_element()
            .function_start_in_output_stream
            .max(0) as usize;
        let stream = &mut self.flow.output_stream;
        let mut i = stream.len();
        while i > start {
            i -= 1;
            let OutputItem::Value(Value::String(text)) = &stream[i] else {
                continue;
            };
            if is_newline(text) || is_inline_whitespace(text) {
                stream.remove(i);
            } else {
                break;
            }
        }
    }

    /// Pops a frame, trimming function whitespace first.
    pub(crate) fn pop_call_stack(&mut self, push_type: Option<PushPopType>) -> Result<(), StoryError> {
        if self.flow.call_stack.current_element().push_type == PushPopType::Function {
            self.trim_whitespace_from_function_end();
        }
        self.flow.call_stack.pop(push_type).map(|_| ())
    }
}
