pub mod context;
pub mod error;
pub mod models;
pub mod output;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use context::StackContext;
pub use error::{Result, StackError};
