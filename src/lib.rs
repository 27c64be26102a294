pub mod chat;
pub mod config;
pub mod error;
pub mod hub;
pub mod llm;
pub mod logging;
pub mod models;

pub use error::{ConfabError, Result};
