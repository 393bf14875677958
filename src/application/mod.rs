// Application layer - use cases and orchestration over a record store

pub mod error;
mod ledger;
mod locks;

pub use error::*;
pub use ledger::*;
pub use locks::*;
