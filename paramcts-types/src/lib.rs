//! Interned parameters and plain assignments shared by the tree, config and
//! checkpoint crates.

mod assignment;
mod parameter;

pub use assignment::Assignment;
pub use parameter::{
    all, clear, count, get, global, intern, replace, Condition, Parameter, ParameterSnapshot, ParameterStore,
};
