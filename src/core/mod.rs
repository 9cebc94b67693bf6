pub mod dispatcher;
pub mod orchestrator;
pub mod resolver;
pub mod slot_manager;
pub mod tracker;

pub use crate::domain::model::{DispatchPlan, RunOutcome, TransferRequest};
pub use crate::domain::ports::RemoteClient;
pub use crate::utils::error::Result;
