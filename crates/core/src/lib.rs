pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod index;
pub mod logging;
pub mod model;
pub mod parser;
pub mod project;
pub mod runtime;
pub mod util;

pub use error::{Result, SmaliscopeError};
