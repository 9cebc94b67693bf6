use crate::domain::model::{Community, TargetIdentity};
use crate::domain::ports::{RemoteClient, RemoteError};
use crate::utils::error::{Result, TransferError};
use std::sync::Arc;

/// Turns a shareable reference into the target it names and the community
/// that owns it.
pub struct Resolver<C: RemoteClient> {
    client: Arc<C>,
}

impl<C: RemoteClient> Resolver<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, reference: &str) -> Result<(TargetIdentity, Community)> {
        let invalid = |source: RemoteError| TransferError::ReferenceInvalid {
            reference: reference.to_string(),
            source,
        };

        let link = self
            .client
            .resolve_reference(reference)
            .await
            .map_err(invalid)?;

        let target = link
            .object_id
            .filter(|id| !id.trim().is_empty())
            .map(TargetIdentity::new)
            .ok_or_else(|| invalid(RemoteError::new(0, "link does not point at a user")))?;
        let community_id = link
            .community_id
            .ok_or_else(|| invalid(RemoteError::new(0, "link is not bound to a community")))?;

        let community = self
            .client
            .get_community_info(community_id)
            .await
            .map_err(invalid)?;

        tracing::debug!(
            "Resolved {} to target {} in community {} ({} slots)",
            reference,
            target,
            community.id,
            community.slots.len()
        );
        Ok((target, community))
    }
}
