pub mod runtime;
pub mod serialization;
pub mod state;

pub use runtime::{
    choice::Choice,
    error::StoryError,
    story::{FunctionResult, Story},
    value::Value,
};
