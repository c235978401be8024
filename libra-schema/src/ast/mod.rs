//! Parsed forms of type specifications and column defaults.
//!
//! These are plain immutable values: once a spec string has been parsed into a
//! [`TypeDescriptor`] it is never mutated, only cloned into resolved columns.

mod default;
mod descriptor;
mod value;

pub use default::*;
pub use descriptor::*;
pub use value::*;
