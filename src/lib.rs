//! Extract `///` documentation comments from C and C++ sources, pair each
//! with the declaration it documents, and keep a queryable index of them up
//! to date as files change.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
