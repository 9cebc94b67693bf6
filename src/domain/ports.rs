use crate::domain::model::{Community, CommunityId, LinkInfo, TargetIdentity};
use async_trait::async_trait;
use thiserror::Error;

/// Classified failure of a single remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote error {code}: {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
}

impl RemoteError {
    /// Code used when the request never produced a service response.
    pub const TRANSPORT: i64 = -1;
    /// Code used when a unit attempt exceeded its deadline.
    pub const TIMEOUT: i64 = -2;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(Self::TRANSPORT, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(Self::TIMEOUT, message)
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Calls the transfer core makes against the remote service. Every call is a
/// network round-trip scoped by an already-authenticated session.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn resolve_reference(&self, reference: &str) -> RemoteResult<LinkInfo>;

    async fn get_community_info(&self, community: CommunityId) -> RemoteResult<Community>;

    async fn create_slot(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
        size: u32,
    ) -> RemoteResult<()>;

    async fn delete_slot(&self, community: CommunityId, target: &TargetIdentity)
        -> RemoteResult<()>;

    /// One indivisible transfer quantum (join then leave).
    async fn perform_unit_transfer(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
    ) -> RemoteResult<()>;

    async fn get_balance(&self) -> RemoteResult<i64>;
}
