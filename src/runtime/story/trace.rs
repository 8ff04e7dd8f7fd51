use tracing::trace;

use crate::runtime::{
    container::ContentRef, debug_metadata::DebugMetadata, error::StoryError, object::Content,
    pointer::Pointer,
};

use super::Story;

/// Nearest source location recorded on the pointer's container or one of
/// its ancestors.
fn pointer_metadata(pointer: &Pointer) -> Option<DebugMetadata> {
    let mut container = pointer.container.clone();
    while let Some(current) = container {
        if let Some(metadata) = current.debug_metadata() {
            return Some(metadata.clone());
        }
        container = current.parent();
    }
    None
}

impl Story {
    pub(super) fn trace_step(&self, current: &ContentRef) {
        trace!(
            path = %current.path(),
            kind = current.content().map_or("container", Content::kind),
            depth = self.state.call_stack().depth(),
            "step"
        );
    }

    /// Source location of the content being executed, falling back to the
    /// callers on the stack.
    pub fn current_debug_metadata(&self) -> Option<DebugMetadata> {
        pointer_metadata(&self.state.current_pointer()).or_else(|| {
            self.state
                .call_stack()
                .elements()
                .iter()
                .rev()
                .find_map(|frame| pointer_metadata(&frame.current_pointer))
        })
    }

    fn current_location(&self) -> String {
        if let Some(metadata) = self.current_debug_metadata() {
            return metadata.to_string();
        }
        let pointer = self.state.current_pointer();
        let pointer = if pointer.is_null() {
            self.state.previous_pointer()
        } else {
            pointer
        };
        match pointer.path() {
            Some(path) => format!("({path})"),
            None => String::from("<unknown location>"),
        }
    }

    /// Tags an error with where execution was when it happened.
    pub(super) fn locate(&self, err: StoryError) -> StoryError {
        if matches!(err, StoryError::Located { .. }) {
            return err;
        }
        StoryError::Located {
            location: self.current_location(),
            error: Box::new(err),
        }
    }
}
