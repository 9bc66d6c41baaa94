pub mod config;
pub mod entity;
pub mod error;
pub mod hub;
pub mod io;
pub mod store;
pub mod workflow;

pub use error::{Result, SprintError};
