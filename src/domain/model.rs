use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote identifier of the transfer beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetIdentity(String);

impl TargetIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(pub i64);

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reservation record on a community, bound to one owner at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSlot {
    pub owner: TargetIdentity,
    pub size: u32,
}

/// A community and its slot list, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub slots: Vec<ResourceSlot>,
}

impl Community {
    pub fn slot_of(&self, target: &TargetIdentity) -> Option<(usize, &ResourceSlot)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, slot)| &slot.owner == target)
    }
}

/// What a shareable reference points at. Either half may be missing when the
/// reference resolves to something that is not a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub object_id: Option<String>,
    pub community_id: Option<CommunityId>,
}

/// Caller-facing input of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub reference: String,
    pub count_per_batch: u32,
    pub total_count: u32,
}

impl TransferRequest {
    pub fn new(reference: impl Into<String>, count_per_batch: u32, total_count: u32) -> Self {
        Self {
            reference: reference.into(),
            count_per_batch,
            total_count,
        }
    }
}

/// Split of a total quantity into full batches plus a remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPlan {
    pub total: u32,
    pub batch_size: u32,
    pub batch_count: u32,
    pub remainder: u32,
}

impl DispatchPlan {
    /// Returns `None` when `batch_size` is zero.
    pub fn new(total: u32, batch_size: u32) -> Option<Self> {
        if batch_size == 0 {
            return None;
        }
        Some(Self {
            total,
            batch_size,
            batch_count: total / batch_size,
            remainder: total % batch_size,
        })
    }

    pub fn has_remainder(&self) -> bool {
        self.remainder != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub final_balance: i64,
    pub failed_units_after_retry: u32,
}

/// Per-run lifecycle. `Releasing` and `Done` are entered unconditionally once
/// a slot exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Resolving,
    Preparing,
    Dispatching,
    Reconciling,
    Releasing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Resolving => "resolving",
            RunState::Preparing => "preparing",
            RunState::Dispatching => "dispatching",
            RunState::Reconciling => "reconciling",
            RunState::Releasing => "releasing",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_plan_arithmetic() {
        for total in 0..=60u32 {
            for batch_size in 1..=13u32 {
                let plan = DispatchPlan::new(total, batch_size).unwrap();
                assert_eq!(plan.batch_count, total / batch_size);
                assert_eq!(plan.remainder, total % batch_size);
                assert_eq!(plan.batch_count * batch_size + plan.remainder, total);
            }
        }
    }

    #[test]
    fn test_dispatch_plan_rejects_zero_batch() {
        assert!(DispatchPlan::new(10, 0).is_none());
    }

    #[test]
    fn test_slot_of_finds_position() {
        let community = Community {
            id: CommunityId(7),
            slots: vec![
                ResourceSlot {
                    owner: TargetIdentity::new("a"),
                    size: 1,
                },
                ResourceSlot {
                    owner: TargetIdentity::new("b"),
                    size: 2,
                },
            ],
        };
        let (idx, slot) = community.slot_of(&TargetIdentity::new("b")).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(slot.size, 2);
        assert!(community.slot_of(&TargetIdentity::new("c")).is_none());
    }

    #[test]
    fn test_only_done_and_failed_are_terminal() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Releasing.is_terminal());
        assert!(!RunState::Idle.is_terminal());
    }
}
