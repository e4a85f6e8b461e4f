// Shared primitives, note model and error types
pub mod primitives;
pub mod error;
pub mod note;

pub use primitives::*;
pub use error::*;
pub use note::*;
