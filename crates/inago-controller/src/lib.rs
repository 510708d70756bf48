//! Group operations on top of the fleet scheduler.

pub mod config;
pub mod controller;
pub mod error;
pub mod fs;
pub mod request;
pub mod update;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use fs::*;
pub use request::*;
pub use update::*;
