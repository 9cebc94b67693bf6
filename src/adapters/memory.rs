use crate::domain::model::{Community, CommunityId, LinkInfo, ResourceSlot, TargetIdentity};
use crate::domain::ports::{RemoteClient, RemoteError, RemoteResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub const SLOT_NOT_FOUND: i64 = 404;
pub const SLOT_LIMIT_REACHED: i64 = 230;
pub const SLOT_ALREADY_EXISTS: i64 = 231;
pub const INSUFFICIENT_BALANCE: i64 = 2800;

/// One recorded call against [`InMemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ResolveReference(String),
    GetCommunityInfo(CommunityId),
    CreateSlot {
        community: CommunityId,
        target: TargetIdentity,
        size: u32,
    },
    DeleteSlot {
        community: CommunityId,
        target: TargetIdentity,
    },
    UnitTransfer {
        community: CommunityId,
        target: TargetIdentity,
    },
    GetBalance,
}

/// Remote operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    ResolveReference,
    GetCommunityInfo,
    CreateSlot,
    DeleteSlot,
    UnitTransfer,
    GetBalance,
}

#[derive(Debug, Default)]
struct State {
    links: HashMap<String, LinkInfo>,
    communities: HashMap<CommunityId, Vec<ResourceSlot>>,
    balance: i64,
    calls: Vec<RemoteCall>,
    failing_ops: HashSet<RemoteOp>,
    failing_units: u32,
    failing_create_sizes: HashSet<u32>,
}

/// Counts one unit transfer as in flight until dropped, including when the
/// caller cancels the transfer mid-way.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Community service held in memory. Backs dry runs and tests; it enforces
/// slot capacity, rejects deletes of absent slots and charges the slot size
/// for every successful unit transfer.
#[derive(Debug)]
pub struct InMemoryRemote {
    capacity: usize,
    unit_latency: Duration,
    state: Mutex<State>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new(capacity: usize, balance: i64) -> Self {
        Self {
            capacity,
            unit_latency: Duration::ZERO,
            state: Mutex::new(State {
                balance,
                ..State::default()
            }),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_unit_latency(mut self, latency: Duration) -> Self {
        self.unit_latency = latency;
        self
    }

    pub fn with_link(self, reference: &str, target: &str, community: CommunityId) -> Self {
        self.state().links.insert(
            reference.to_string(),
            LinkInfo {
                object_id: Some(target.to_string()),
                community_id: Some(community),
            },
        );
        self.state().communities.entry(community).or_default();
        self
    }

    pub fn with_raw_link(self, reference: &str, info: LinkInfo) -> Self {
        self.state().links.insert(reference.to_string(), info);
        self
    }

    pub fn with_slots(self, community: CommunityId, slots: &[(&str, u32)]) -> Self {
        let slots = slots
            .iter()
            .map(|(owner, size)| ResourceSlot {
                owner: TargetIdentity::new(*owner),
                size: *size,
            })
            .collect();
        self.state().communities.insert(community, slots);
        self
    }

    /// Every call of `op` fails from now on.
    pub fn fail(&self, op: RemoteOp) {
        self.state().failing_ops.insert(op);
    }

    /// The next `count` unit transfers fail, later ones succeed.
    pub fn fail_next_units(&self, count: u32) {
        self.state().failing_units = count;
    }

    /// Slot creation with exactly this size fails.
    pub fn fail_create_with_size(&self, size: u32) {
        self.state().failing_create_sizes.insert(size);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, matches: impl Fn(&RemoteCall) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn slots(&self, community: CommunityId) -> Vec<ResourceSlot> {
        self.state()
            .communities
            .get(&community)
            .cloned()
            .unwrap_or_default()
    }

    pub fn balance(&self) -> i64 {
        self.state().balance
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_peak_in_flight(&self) {
        self.peak_in_flight
            .store(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RemoteCall, op: RemoteOp) -> RemoteResult<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing_ops.contains(&op) {
            return Err(RemoteError::new(500, format!("{:?} rejected", op)));
        }
        Ok(())
    }

    fn slots_mut<'a>(
        state: &'a mut State,
        community: CommunityId,
    ) -> RemoteResult<&'a mut Vec<ResourceSlot>> {
        state
            .communities
            .get_mut(&community)
            .ok_or_else(|| RemoteError::new(SLOT_NOT_FOUND, "community not found"))
    }

    fn charge_unit(&self, community: CommunityId, target: &TargetIdentity) -> RemoteResult<()> {
        let mut state = self.state();
        if state.failing_units > 0 {
            state.failing_units -= 1;
            return Err(RemoteError::new(500, "unit transfer rejected"));
        }
        let size = Self::slots_mut(&mut state, community)?
            .iter()
            .find(|slot| &slot.owner == target)
            .map(|slot| slot.size)
            .ok_or_else(|| RemoteError::new(SLOT_NOT_FOUND, "target has no slot"))?;
        if state.balance < i64::from(size) {
            return Err(RemoteError::new(INSUFFICIENT_BALANCE, "not enough coins"));
        }
        state.balance -= i64::from(size);
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    async fn resolve_reference(&self, reference: &str) -> RemoteResult<LinkInfo> {
        self.record(
            RemoteCall::ResolveReference(reference.to_string()),
            RemoteOp::ResolveReference,
        )?;
        self.state()
            .links
            .get(reference)
            .cloned()
            .ok_or_else(|| RemoteError::new(107, "link not found"))
    }

    async fn get_community_info(&self, community: CommunityId) -> RemoteResult<Community> {
        self.record(
            RemoteCall::GetCommunityInfo(community),
            RemoteOp::GetCommunityInfo,
        )?;
        let slots = Self::slots_mut(&mut self.state(), community)?.clone();
        Ok(Community {
            id: community,
            slots,
        })
    }

    async fn create_slot(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
        size: u32,
    ) -> RemoteResult<()> {
        self.record(
            RemoteCall::CreateSlot {
                community,
                target: target.clone(),
                size,
            },
            RemoteOp::CreateSlot,
        )?;
        let mut state = self.state();
        if state.failing_create_sizes.contains(&size) {
            return Err(RemoteError::new(500, format!("size {} rejected", size)));
        }
        let capacity = self.capacity;
        let slots = Self::slots_mut(&mut state, community)?;
        if slots.iter().any(|slot| &slot.owner == target) {
            return Err(RemoteError::new(SLOT_ALREADY_EXISTS, "slot already exists"));
        }
        if slots.len() >= capacity {
            return Err(RemoteError::new(SLOT_LIMIT_REACHED, "slot limit reached"));
        }
        slots.push(ResourceSlot {
            owner: target.clone(),
            size,
        });
        Ok(())
    }

    async fn delete_slot(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
    ) -> RemoteResult<()> {
        self.record(
            RemoteCall::DeleteSlot {
                community,
                target: target.clone(),
            },
            RemoteOp::DeleteSlot,
        )?;
        let mut state = self.state();
        let slots = Self::slots_mut(&mut state, community)?;
        let position = slots
            .iter()
            .position(|slot| &slot.owner == target)
            .ok_or_else(|| RemoteError::new(SLOT_NOT_FOUND, "slot not found"))?;
        slots.remove(position);
        Ok(())
    }

    async fn perform_unit_transfer(
        &self,
        community: CommunityId,
        target: &TargetIdentity,
    ) -> RemoteResult<()> {
        self.record(
            RemoteCall::UnitTransfer {
                community,
                target: target.clone(),
            },
            RemoteOp::UnitTransfer,
        )?;

        let _in_flight = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        if !self.unit_latency.is_zero() {
            tokio::time::sleep(self.unit_latency).await;
        }
        self.charge_unit(community, target)
    }

    async fn get_balance(&self) -> RemoteResult<i64> {
        self.record(RemoteCall::GetBalance, RemoteOp::GetBalance)?;
        Ok(self.state().balance)
    }
}
