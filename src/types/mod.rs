//! Type system module for Quill.

pub mod checker;
pub mod type_repr;

pub use type_repr::Type;
