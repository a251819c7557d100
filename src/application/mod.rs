// Application layer: validation and orchestration of ledger operations.
// Every client (CLI, exporters, tests) goes through `LedgerService`.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
