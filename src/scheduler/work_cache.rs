//! Bounded shared slot array of candidate assignments; state-machine per
//! slot under a single mutex (C5).

use std::sync::{Arc, Mutex};

use rand::RngExt;

/// One candidate job assignment, as seen by the scheduler. Immutable while
/// occupying a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnitCandidate {
    pub workunit_id: String,
    pub app_id: String,
    pub result_id: String,
    pub server_state: String,
    pub priority: f64,
    pub report_deadline: f64,
    /// Whether the app is CPU-intensive (non-CPU-intensive apps are rejected
    /// by the fast feasibility check).
    pub cpu_intensive: bool,
    /// Static per-host estimate of the job's duration in seconds, used by
    /// the duration oracle when no real turnaround data is available.
    pub static_duration_estimate: f64,
    /// Wall-clock deadline by which this workunit's result must be returned.
    pub delay_bound: f64,
}

#[derive(Debug, Clone)]
enum SlotState {
    Empty,
    Present(WorkUnitCandidate),
    Claimed(WorkUnitCandidate, u64),
}

/// Bounded array of `N` slots guarded by a single mutex. The feeder fills
/// EMPTY slots with PRESENT; the scheduler transitions PRESENT -> CLAIMED(own
/// pid) -> (EMPTY on success, PRESENT on soft reject).
///
/// Cloning is cheap — clones share the same underlying slots via Arc.
#[derive(Debug, Clone)]
pub struct WorkCache {
    slots: Arc<Mutex<Vec<SlotState>>>,
}

impl WorkCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![SlotState::Empty; capacity])),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().expect("work cache mutex poisoned").len()
    }

    /// Feeder operation: fill an EMPTY slot with PRESENT. Never overwrites a
    /// CLAIMED slot. Returns `true` if the slot was filled.
    pub fn fill(&self, index: usize, candidate: WorkUnitCandidate) -> bool {
        let mut slots = self.slots.lock().expect("work cache mutex poisoned");
        match slots.get(index) {
            Some(SlotState::Empty) => {
                slots[index] = SlotState::Present(candidate);
                true
            }
            _ => false,
        }
    }

    /// Produce the scan order for one request: a random starting offset,
    /// then the remaining indices modulo `N`, covering every slot exactly
    /// once. Concurrent scheduler invocations starting at different offsets
    /// reduces contention on the head of the array.
    pub fn scan_order(&self) -> Vec<usize> {
        let n = self.capacity();
        if n == 0 {
            return Vec::new();
        }
        let offset = rand::rng().random_range(0..n);
        (0..n).map(|i| (offset + i) % n).collect()
    }

    /// Attempt to claim slot `index` for `pid`. Holds the mutex only across
    /// the PRESENT check and the transition to CLAIMED — the caller MUST NOT
    /// hold this across blocking work; the returned guard carries a copy of
    /// the slot contents so the mutex can be released immediately.
    pub fn claim(&self, index: usize, pid: u64) -> Option<ClaimedSlot> {
        let mut slots = self.slots.lock().expect("work cache mutex poisoned");
        match slots.get(index) {
            Some(SlotState::Present(candidate)) => {
                let candidate = candidate.clone();
                slots[index] = SlotState::Claimed(candidate.clone(), pid);
                Some(ClaimedSlot {
                    cache: self.clone(),
                    index,
                    pid,
                    candidate,
                    resolved: false,
                })
            }
            _ => None,
        }
    }

    fn set_empty_if_claimed_by(&self, index: usize, pid: u64) {
        let mut slots = self.slots.lock().expect("work cache mutex poisoned");
        if let Some(SlotState::Claimed(_, held_by)) = slots.get(index) {
            if *held_by == pid {
                slots[index] = SlotState::Empty;
            }
        }
    }

    fn set_present_if_claimed_by(&self, index: usize, pid: u64, candidate: WorkUnitCandidate) {
        let mut slots = self.slots.lock().expect("work cache mutex poisoned");
        if let Some(SlotState::Claimed(_, held_by)) = slots.get(index) {
            if *held_by == pid {
                slots[index] = SlotState::Present(candidate);
            }
        }
    }

    #[cfg(test)]
    fn is_empty_at(&self, index: usize) -> bool {
        matches!(
            self.slots.lock().unwrap().get(index),
            Some(SlotState::Empty)
        )
    }

    #[cfg(test)]
    fn is_present_at(&self, index: usize) -> bool {
        matches!(
            self.slots.lock().unwrap().get(index),
            Some(SlotState::Present(_))
        )
    }

    #[cfg(test)]
    fn is_claimed_by(&self, index: usize, pid: u64) -> bool {
        matches!(
            self.slots.lock().unwrap().get(index),
            Some(SlotState::Claimed(_, held_by)) if *held_by == pid
        )
    }
}

/// RAII guard over a claimed slot. Resolve explicitly with `resolve_empty`
/// (success: drained to reply) or `resolve_present` (soft reject). Dropping
/// without resolving restores the slot to PRESENT, so a panicking or
/// early-returning caller never leaks a CLAIMED slot.
pub struct ClaimedSlot {
    cache: WorkCache,
    index: usize,
    pid: u64,
    candidate: WorkUnitCandidate,
    resolved: bool,
}

impl ClaimedSlot {
    pub fn candidate(&self) -> &WorkUnitCandidate {
        &self.candidate
    }

    /// Success: the slot's contents have been drained into the reply. The
    /// scheduler copies them out (via `candidate()`) before this is called.
    pub fn resolve_empty(mut self) {
        self.cache.set_empty_if_claimed_by(self.index, self.pid);
        self.resolved = true;
    }

    /// Soft reject: this host can't use it, but another host might.
    pub fn resolve_present(mut self) {
        let candidate = self.candidate.clone();
        self.cache
            .set_present_if_claimed_by(self.index, self.pid, candidate);
        self.resolved = true;
    }
}

impl Drop for ClaimedSlot {
    fn drop(&mut self) {
        if !self.resolved {
            let candidate = self.candidate.clone();
            self.cache
                .set_present_if_claimed_by(self.index, self.pid, candidate);
        }
    }
}
