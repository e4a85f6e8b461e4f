// Bridge between the pool and the remote domain
pub mod adapter;
pub mod messages;

pub use adapter::*;
pub use messages::*;
