//! Domain layer: types and contracts shared by the store, the task
//! graph, and the orchestrator. Contains no I/O.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{DomainError, DomainResult};
