use crate::domain::model::{Community, CommunityId, TargetIdentity};
use crate::domain::ports::{RemoteClient, RemoteError};
use crate::utils::error::{Result, SlotPhase, TransferError};
use std::sync::Arc;

pub const DEFAULT_SLOT_CAPACITY: usize = 3;

/// Ordinal of the slot evicted when the community is at capacity.
const EVICTION_ORDINAL: usize = 1;

/// Keeps exactly one slot of the requested size for a target on a community
/// whose slot list is capped. None of the multi-step mutations are
/// transactional: a failure leaves whatever the completed steps produced.
pub struct SlotManager<C: RemoteClient> {
    client: Arc<C>,
    capacity: usize,
}

impl<C: RemoteClient> SlotManager<C> {
    pub fn new(client: Arc<C>, capacity: usize) -> Self {
        Self { client, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn prepare(
        &self,
        community: &Community,
        target: &TargetIdentity,
        size: u32,
    ) -> Result<()> {
        let prepare_err = |source: RemoteError| TransferError::SlotPrepare {
            phase: SlotPhase::Prepare,
            source,
        };

        let mut evicted = None;
        if community.slots.len() >= self.capacity {
            if let Some(victim) = community.slots.get(EVICTION_ORDINAL) {
                tracing::info!("Evicting slot of {} to make room", victim.owner);
                self.client
                    .delete_slot(community.id, &victim.owner)
                    .await
                    .map_err(prepare_err)?;
                evicted = Some(&victim.owner);
            }
        }

        if community.slot_of(target).is_some() && evicted != Some(target) {
            tracing::debug!("Removing existing slot of {}", target);
            self.client
                .delete_slot(community.id, target)
                .await
                .map_err(prepare_err)?;
        }

        self.client
            .create_slot(community.id, target, size)
            .await
            .map_err(prepare_err)?;
        tracing::info!("Prepared slot of size {} for {}", size, target);
        Ok(())
    }

    pub async fn resize(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
        new_size: u32,
    ) -> Result<()> {
        let resize_err = |source: RemoteError| TransferError::SlotPrepare {
            phase: SlotPhase::Resize,
            source,
        };

        self.client
            .delete_slot(community, target)
            .await
            .map_err(resize_err)?;
        self.client
            .create_slot(community, target, new_size)
            .await
            .map_err(resize_err)?;
        tracing::debug!("Resized slot of {} to {}", target, new_size);
        Ok(())
    }

    /// Best-effort removal; a slot that is already gone is not an error.
    pub async fn release(&self, community: CommunityId, target: &TargetIdentity) {
        match self.client.delete_slot(community, target).await {
            Ok(()) => tracing::debug!("Released slot of {}", target),
            Err(e) => tracing::warn!("Slot of {} not released: {}", target, e),
        }
    }
}
