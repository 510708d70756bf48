pub mod error;
pub mod memory;
pub mod model;
pub mod service;
pub mod traits;

pub use error::*;
pub use memory::*;
pub use model::*;
pub use service::*;
pub use traits::*;
