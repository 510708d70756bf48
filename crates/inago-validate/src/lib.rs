pub mod rule;
pub mod types;
pub mod validate;

pub use rule::*;
pub use types::*;
pub use validate::*;
