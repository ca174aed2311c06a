//! Parser module for Quill.

mod core;
mod declarations;
mod expressions;
mod precedence;
mod statements;
mod types;


pub use self::core::Parser;
