// Shielded pool: accumulator, nullifier set, settlement and the serial processor
pub mod config;
pub mod custodian;
pub mod merkle_tree;
pub mod nullifier_set;
pub mod processor;
pub mod service;
pub mod transaction;

pub use config::*;
pub use custodian::*;
pub use merkle_tree::*;
pub use nullifier_set::*;
pub use processor::*;
pub use service::*;
pub use transaction::*;
