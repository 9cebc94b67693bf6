use crate::core::slot_manager::SlotManager;
use crate::core::tracker::RunTracker;
use crate::domain::model::{CommunityId, DispatchPlan, RunOutcome, RunState, TargetIdentity, UnitStatus};
use crate::domain::ports::{RemoteClient, RemoteError, RemoteResult};
use crate::utils::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// What a run reports when units still fail after the retry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Residual failures are counted in the outcome only.
    #[default]
    Tolerate,
    /// Residual failures turn the run into `UnitsFailed` after cleanup.
    Strict,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_concurrency: usize,
    pub unit_timeout: Option<Duration>,
    pub failure_policy: FailurePolicy,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            unit_timeout: None,
            failure_policy: FailurePolicy::Tolerate,
        }
    }
}

/// Runs the full batches concurrently, retries failures once, transfers the
/// remainder through a resized slot and always releases the slot at the end.
pub struct BatchDispatcher<C: RemoteClient> {
    client: Arc<C>,
    slots: Arc<SlotManager<C>>,
    settings: DispatchSettings,
}

async fn attempt<F, Fut>(unit_op: &F, unit_timeout: Option<Duration>) -> RemoteResult<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = RemoteResult<()>>,
{
    match unit_timeout {
        Some(limit) => tokio::time::timeout(limit, unit_op())
            .await
            .unwrap_or_else(|_| Err(RemoteError::timeout(format!("no answer within {:?}", limit)))),
        None => unit_op().await,
    }
}

/// A unit whose task panicked or was aborted counts as failed.
fn unit_failed(joined: std::result::Result<UnitStatus, JoinError>) -> bool {
    match joined {
        Ok(status) => status == UnitStatus::Failed,
        Err(e) => {
            tracing::warn!("Unit task aborted: {}", e);
            true
        }
    }
}

impl<C: RemoteClient> BatchDispatcher<C> {
    pub fn new(client: Arc<C>, slots: Arc<SlotManager<C>>, settings: DispatchSettings) -> Self {
        Self {
            client,
            slots,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub async fn run<F, Fut>(
        &self,
        plan: &DispatchPlan,
        community: CommunityId,
        target: &TargetIdentity,
        unit_op: F,
        tracker: &mut RunTracker,
    ) -> Result<RunOutcome>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let unit_op = Arc::new(unit_op);

        tracker.advance(RunState::Dispatching);
        let failed_first = self.dispatch_batch(plan.batch_count, &unit_op).await;
        tracing::info!(
            "Batch finished: {} of {} units succeeded",
            plan.batch_count - failed_first,
            plan.batch_count
        );

        let mut failed = self.retry_failed(failed_first, unit_op.as_ref()).await;

        if plan.has_remainder() {
            tracker.advance(RunState::Reconciling);
            match self.reconcile(plan.remainder, community, target, unit_op.as_ref()).await {
                Ok(UnitStatus::Succeeded) => {}
                Ok(UnitStatus::Failed) => failed += 1,
                Err(e) => {
                    tracker.fail(&e);
                    self.slots.release(community, target).await;
                    return Err(e);
                }
            }
        }

        tracker.advance(RunState::Releasing);
        self.slots.release(community, target).await;
        let balance = self.client.get_balance().await;
        // Once the slot is released the run is over, whatever gets reported.
        tracker.advance(RunState::Done);

        let outcome = RunOutcome {
            final_balance: balance.map_err(TransferError::BalanceUnavailable)?,
            failed_units_after_retry: failed,
        };
        if failed > 0 && self.settings.failure_policy == FailurePolicy::Strict {
            return Err(TransferError::UnitsFailed { outcome });
        }
        Ok(outcome)
    }

    /// Runs `count` unit attempts with at most `max_concurrency` of them alive
    /// at once and returns how many failed. A failing unit never cancels its
    /// siblings.
    async fn dispatch_batch<F, Fut>(&self, count: u32, unit_op: &Arc<F>) -> u32
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();
        let mut failed = 0;

        for ordinal in 0..count {
            // Permit first, spawn second: no task exists before it may run.
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                failed += count - ordinal;
                break;
            };
            while let Some(joined) = join_set.try_join_next() {
                failed += u32::from(unit_failed(joined));
            }

            let unit_op = unit_op.clone();
            let unit_timeout = self.settings.unit_timeout;
            join_set.spawn(async move {
                let _permit = permit;
                match attempt(unit_op.as_ref(), unit_timeout).await {
                    Ok(()) => UnitStatus::Succeeded,
                    Err(e) => {
                        tracing::debug!("Unit {} failed: {}", ordinal, e);
                        UnitStatus::Failed
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            failed += u32::from(unit_failed(joined));
        }
        failed
    }

    /// One sequential extra attempt per failed unit. Returns how many still
    /// failed.
    async fn retry_failed<F, Fut>(&self, failed: u32, unit_op: &F) -> u32
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RemoteResult<()>>,
    {
        let mut still_failed = 0;
        for _ in 0..failed {
            if let Err(e) = attempt(unit_op, self.settings.unit_timeout).await {
                tracing::debug!("Retry failed: {}", e);
                still_failed += 1;
            }
        }
        if failed > 0 {
            tracing::info!("Retried {} units, {} still failed", failed, still_failed);
        }
        still_failed
    }

    async fn reconcile<F, Fut>(
        &self,
        remainder: u32,
        community: CommunityId,
        target: &TargetIdentity,
        unit_op: &F,
    ) -> Result<UnitStatus>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = RemoteResult<()>>,
    {
        self.slots.resize(community, target, remainder).await?;
        Ok(match attempt(unit_op, self.settings.unit_timeout).await {
            Ok(()) => UnitStatus::Succeeded,
            Err(e) => {
                tracing::warn!("Remainder transfer of {} failed: {}", remainder, e);
                UnitStatus::Failed
            }
        })
    }
}
