//! Loop guard for proc -> effect -> event -> proc cascades

use arrayvec::ArrayVec;

/// Cycle signatures remembered per top-level dispatch
pub const CYCLE_SLOTS: usize = 32;

/// Depth bound plus the set of cycle signatures seen in one dispatch chain
#[derive(Debug, Clone)]
pub struct LoopGuard {
    max_depth: u8,
    seen: ArrayVec<u64, CYCLE_SLOTS>,
}

impl LoopGuard {
    pub fn new(max_depth: u8) -> Self {
        LoopGuard {
            max_depth,
            seen: ArrayVec::new(),
        }
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Start a new top-level chain
    pub fn begin(&mut self) {
        self.seen.clear();
    }

    /// Whether work at `depth` (1 = top level) may run
    pub fn admits(&self, depth: u8) -> bool {
        depth <= self.max_depth
    }

    /// Record a signature; false if this chain already saw it
    ///
    /// Once the set is full new signatures pass unrecorded.
    pub fn record(&mut self, signature: u64) -> bool {
        if self.seen.contains(&signature) {
            return false;
        }
        if self.seen.try_push(signature).is_err() {
            tracing::debug!(signature, "cycle signature set full");
        }
        true
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}
