use crate::domain::model::RunOutcome;
use crate::domain::ports::RemoteError;
use std::fmt;
use thiserror::Error;

/// Which slot mutation was in progress when the remote service refused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Prepare,
    Resize,
}

impl fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotPhase::Prepare => write!(f, "prepare"),
            SlotPhase::Resize => write!(f, "resize"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid quantity: total {total_count} must be at least count per batch {count_per_batch}, which must be at least 1")]
    InvalidQuantity {
        count_per_batch: u32,
        total_count: u32,
    },

    #[error("Unable to resolve reference '{reference}': {source}")]
    ReferenceInvalid {
        reference: String,
        #[source]
        source: RemoteError,
    },

    #[error("Unable to {phase} slot: {source}")]
    SlotPrepare {
        phase: SlotPhase,
        #[source]
        source: RemoteError,
    },

    #[error("{} unit transfer(s) still failed after retry", .outcome.failed_units_after_retry)]
    UnitsFailed { outcome: RunOutcome },

    #[error("Balance query failed: {0}")]
    BalanceUnavailable(#[source] RemoteError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration validation error in field '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Remote,
    Transfer,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TransferError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransferError::InvalidQuantity { .. } => ErrorCategory::Input,
            TransferError::ReferenceInvalid { .. }
            | TransferError::SlotPrepare { .. }
            | TransferError::BalanceUnavailable(_) => ErrorCategory::Remote,
            TransferError::UnitsFailed { .. } => ErrorCategory::Transfer,
            TransferError::ConfigValidationError { .. }
            | TransferError::InvalidConfigValueError { .. }
            | TransferError::MissingConfigError { .. } => ErrorCategory::Configuration,
            TransferError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // The transfer itself completed; only the refresh failed.
            TransferError::BalanceUnavailable(_) => ErrorSeverity::Low,
            TransferError::ReferenceInvalid { .. } | TransferError::UnitsFailed { .. } => {
                ErrorSeverity::Medium
            }
            TransferError::InvalidQuantity { .. }
            | TransferError::SlotPrepare { .. }
            | TransferError::ConfigValidationError { .. }
            | TransferError::InvalidConfigValueError { .. }
            | TransferError::MissingConfigError { .. } => ErrorSeverity::High,
            TransferError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// True when the remote community may have been left with a slot layout
    /// the run did not intend.
    pub fn may_leave_partial_state(&self) -> bool {
        matches!(self, TransferError::SlotPrepare { .. })
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TransferError::InvalidQuantity { .. } => {
                "Use a total count greater than or equal to the count per batch"
            }
            TransferError::ReferenceInvalid { .. } => {
                "Check the shared link and your network connection, then try again"
            }
            TransferError::SlotPrepare {
                phase: SlotPhase::Prepare,
                ..
            } => "Check the slot list of the community; an existing slot may have been removed",
            TransferError::SlotPrepare {
                phase: SlotPhase::Resize,
                ..
            } => "The remainder was not transferred; rerun with the remaining count",
            TransferError::UnitsFailed { .. } => {
                "Rerun with the number of failed units or disable strict mode"
            }
            TransferError::BalanceUnavailable(_) => "Query the balance again later",
            TransferError::IoError(_) => "Check file permissions and paths",
            TransferError::ConfigValidationError { .. }
            | TransferError::InvalidConfigValueError { .. }
            | TransferError::MissingConfigError { .. } => {
                "Fix the configuration file or command line flags"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TransferError::InvalidQuantity { .. } => "Incorrect values".to_string(),
            TransferError::ReferenceInvalid { .. } => {
                "Unable to get the user id from the link".to_string()
            }
            TransferError::SlotPrepare { source, .. } => {
                format!("Unable to prepare slots: {}", source.message)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
