pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::adapters::{HttpRemoteClient, HttpRemoteSettings, InMemoryRemote};
pub use crate::core::dispatcher::{DispatchSettings, FailurePolicy};
pub use crate::core::orchestrator::{Orchestrator, TransferSettings};
pub use crate::domain::model::{RunOutcome, TransferRequest};
pub use crate::domain::ports::{RemoteClient, RemoteError};
pub use crate::utils::error::{Result, TransferError};
