use crate::core::dispatcher::{BatchDispatcher, DispatchSettings};
use crate::core::resolver::Resolver;
use crate::core::slot_manager::SlotManager;
use crate::core::tracker::RunTracker;
use crate::domain::model::{DispatchPlan, RunOutcome, RunState, TransferRequest};
use crate::domain::ports::RemoteClient;
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::Validate;
use std::sync::Arc;
use tracing::Instrument;

/// Everything a run needs besides the request itself.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub slot_capacity: usize,
    pub dispatch: DispatchSettings,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            slot_capacity: crate::core::slot_manager::DEFAULT_SLOT_CAPACITY,
            dispatch: DispatchSettings::default(),
        }
    }
}

/// Sequences resolve, prepare, dispatch and release for one request. Holds no
/// state between runs.
pub struct Orchestrator<C: RemoteClient + 'static> {
    client: Arc<C>,
    resolver: Resolver<C>,
    slots: Arc<SlotManager<C>>,
    dispatcher: BatchDispatcher<C>,
}

impl<C: RemoteClient + 'static> Orchestrator<C> {
    pub fn new(client: Arc<C>, settings: TransferSettings) -> Self {
        let slots = Arc::new(SlotManager::new(client.clone(), settings.slot_capacity));
        Self {
            resolver: Resolver::new(client.clone()),
            dispatcher: BatchDispatcher::new(client.clone(), slots.clone(), settings.dispatch),
            slots,
            client,
        }
    }

    pub async fn execute(&self, request: &TransferRequest) -> Result<RunOutcome> {
        let mut tracker = RunTracker::timestamped();
        self.execute_tracked(request, &mut tracker).await
    }

    pub async fn execute_tracked(
        &self,
        request: &TransferRequest,
        tracker: &mut RunTracker,
    ) -> Result<RunOutcome> {
        let span = tracing::info_span!("transfer", run_id = %tracker.run_id());
        async {
            let result = self.run_phases(request, tracker).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    "Transfer finished, balance {}, {} unit(s) lost",
                    outcome.final_balance,
                    outcome.failed_units_after_retry
                ),
                Err(e) if !tracker.state().is_terminal() => tracker.fail(e),
                Err(e) => tracing::warn!("Transfer finished with an error: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_phases(
        &self,
        request: &TransferRequest,
        tracker: &mut RunTracker,
    ) -> Result<RunOutcome> {
        request.validate()?;
        let plan = DispatchPlan::new(request.total_count, request.count_per_batch).ok_or(
            TransferError::InvalidQuantity {
                count_per_batch: request.count_per_batch,
                total_count: request.total_count,
            },
        )?;
        tracing::info!(
            "Transferring {} as {} x {} + {}",
            plan.total,
            plan.batch_count,
            plan.batch_size,
            plan.remainder
        );

        tracker.advance(RunState::Resolving);
        let (target, community) = self.resolver.resolve(&request.reference).await?;

        tracker.advance(RunState::Preparing);
        self.slots
            .prepare(&community, &target, plan.batch_size)
            .await?;

        let client = self.client.clone();
        let community_id = community.id;
        let unit_target = target.clone();
        let unit_op = move || {
            let client = client.clone();
            let target = unit_target.clone();
            async move { client.perform_unit_transfer(community_id, &target).await }
        };

        self.dispatcher
            .run(&plan, community.id, &target, unit_op, tracker)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryRemote, RemoteCall, RemoteOp};
    use crate::domain::model::CommunityId;
    use crate::utils::error::SlotPhase;

    const C: CommunityId = CommunityId(11);

    fn remote() -> Arc<InMemoryRemote> {
        Arc::new(
            InMemoryRemote::new(3, 500)
                .with_link("link", "u1", C)
                .with_slots(C, &[("a", 1), ("b", 1), ("c", 1)]),
        )
    }

    #[tokio::test]
    async fn test_state_machine_for_remainder_run() {
        let remote = remote();
        let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());
        let mut tracker = RunTracker::new("test");

        let outcome = orchestrator
            .execute_tracked(&TransferRequest::new("link", 3, 10), &mut tracker)
            .await
            .unwrap();

        assert_eq!(outcome.final_balance, 490);
        assert_eq!(
            tracker.history(),
            &[
                RunState::Idle,
                RunState::Resolving,
                RunState::Preparing,
                RunState::Dispatching,
                RunState::Reconciling,
                RunState::Releasing,
                RunState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_prepare_failure_skips_dispatch_and_release() {
        let remote = remote();
        remote.fail(RemoteOp::CreateSlot);
        let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());
        let mut tracker = RunTracker::new("test");

        let err = orchestrator
            .execute_tracked(&TransferRequest::new("link", 5, 5), &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::SlotPrepare {
                phase: SlotPhase::Prepare,
                ..
            }
        ));
        assert_eq!(
            remote.count_calls(|c| matches!(c, RemoteCall::UnitTransfer { .. })),
            0
        );
        // Only the eviction delete ran; no release was attempted.
        assert_eq!(
            remote.count_calls(|c| matches!(c, RemoteCall::DeleteSlot { .. })),
            1
        );
        assert_eq!(tracker.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_balance_failure_is_reported_after_release() {
        let remote = remote();
        remote.fail(RemoteOp::GetBalance);
        let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

        let mut tracker = RunTracker::new("run_balance");

        let err = orchestrator
            .execute_tracked(&TransferRequest::new("link", 2, 4), &mut tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::BalanceUnavailable(_)));
        assert!(remote.slots(C).iter().all(|slot| slot.owner.as_str() != "u1"));
        assert_eq!(tracker.state(), RunState::Done);
    }
}
