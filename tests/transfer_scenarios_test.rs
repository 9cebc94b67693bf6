use slot_transfer::adapters::memory::{RemoteCall, RemoteOp};
use slot_transfer::domain::model::{CommunityId, TargetIdentity};
use slot_transfer::{
    DispatchSettings, InMemoryRemote, Orchestrator, TransferError, TransferRequest,
    TransferSettings,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const COMMUNITY: CommunityId = CommunityId(42);
const LINK: &str = "http://aminoapps.com/p/target";

fn community_remote(balance: i64) -> Arc<InMemoryRemote> {
    Arc::new(
        InMemoryRemote::new(3, balance)
            .with_link(LINK, "target", COMMUNITY)
            .with_slots(COMMUNITY, &[("first", 5), ("second", 5)]),
    )
}

fn unit_transfers(remote: &InMemoryRemote) -> usize {
    remote.count_calls(|c| matches!(c, RemoteCall::UnitTransfer { .. }))
}

fn target() -> TargetIdentity {
    TargetIdentity::new("target")
}

#[tokio::test]
async fn test_scenario_a_even_split() {
    let remote = community_remote(1_000);
    let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

    let outcome = assert_ok!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 20, 100))
            .await
    );

    assert_eq!(unit_transfers(&remote), 5);
    assert_eq!(outcome.final_balance, 900);
    assert_eq!(outcome.failed_units_after_retry, 0);
    assert_eq!(
        remote.count_calls(|c| matches!(c, RemoteCall::CreateSlot { .. })),
        1
    );
    assert_eq!(
        remote.count_calls(|c| *c
            == RemoteCall::DeleteSlot {
                community: COMMUNITY,
                target: target(),
            }),
        1
    );
    assert_eq!(remote.count_calls(|c| *c == RemoteCall::GetBalance), 1);
    // The slot never outlives the run; the other slots are untouched.
    assert_eq!(remote.slots(COMMUNITY).len(), 2);
}

#[tokio::test]
async fn test_scenario_b_remainder_is_reconciled() {
    let remote = community_remote(1_000);
    let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

    let outcome = assert_ok!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 3, 10))
            .await
    );

    assert_eq!(unit_transfers(&remote), 4);
    assert_eq!(outcome.final_balance, 990);

    let slot_calls: Vec<RemoteCall> = remote
        .calls()
        .into_iter()
        .filter(|c| {
            matches!(
                c,
                RemoteCall::CreateSlot { .. } | RemoteCall::DeleteSlot { .. }
            )
        })
        .collect();
    assert_eq!(
        slot_calls,
        vec![
            RemoteCall::CreateSlot {
                community: COMMUNITY,
                target: target(),
                size: 3,
            },
            RemoteCall::DeleteSlot {
                community: COMMUNITY,
                target: target(),
            },
            RemoteCall::CreateSlot {
                community: COMMUNITY,
                target: target(),
                size: 1,
            },
            RemoteCall::DeleteSlot {
                community: COMMUNITY,
                target: target(),
            },
        ]
    );
    assert_eq!(remote.calls().last(), Some(&RemoteCall::GetBalance));
}

#[tokio::test]
async fn test_scenario_c_invalid_quantity_makes_no_remote_call() {
    let remote = community_remote(1_000);
    let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

    let err = assert_err!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 10, 5))
            .await
    );

    assert!(matches!(err, TransferError::InvalidQuantity { .. }));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_scenario_d_unresolvable_reference() {
    let remote = community_remote(1_000);
    remote.fail(RemoteOp::ResolveReference);
    let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

    let err = assert_err!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 2, 4))
            .await
    );

    assert!(matches!(err, TransferError::ReferenceInvalid { .. }));
    assert_eq!(remote.calls(), vec![RemoteCall::ResolveReference(LINK.to_string())]);
}

#[tokio::test]
async fn test_every_unit_failing_still_succeeds_and_cleans_up() {
    let remote = community_remote(1_000);
    remote.fail(RemoteOp::UnitTransfer);
    let orchestrator = Orchestrator::new(remote.clone(), TransferSettings::default());

    let outcome = assert_ok!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 10, 40))
            .await
    );

    // 4 first attempts plus exactly one retry each.
    assert_eq!(unit_transfers(&remote), 8);
    assert_eq!(outcome.failed_units_after_retry, 4);
    assert_eq!(outcome.final_balance, 1_000);
    assert!(remote
        .slots(COMMUNITY)
        .iter()
        .all(|slot| slot.owner != target()));
}

#[tokio::test]
async fn test_bounded_concurrency_across_large_batch() {
    let remote = Arc::new(
        InMemoryRemote::new(3, 10_000)
            .with_unit_latency(Duration::from_millis(5))
            .with_link(LINK, "target", COMMUNITY),
    );
    let settings = TransferSettings {
        dispatch: DispatchSettings {
            max_concurrency: 4,
            ..DispatchSettings::default()
        },
        ..TransferSettings::default()
    };
    let orchestrator = Orchestrator::new(remote.clone(), settings);

    let outcome = assert_ok!(
        orchestrator
            .execute(&TransferRequest::new(LINK, 1, 40))
            .await
    );

    assert_eq!(unit_transfers(&remote), 40);
    assert_eq!(outcome.final_balance, 9_960);
    assert!(remote.peak_in_flight() <= 4);
}
