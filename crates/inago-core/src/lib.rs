pub mod error;
pub mod model;
pub mod naming;
pub mod request;
pub mod status;
pub mod unitfile;

pub use error::*;
pub use model::*;
pub use naming::*;
pub use request::*;
pub use status::*;
pub use unitfile::*;
