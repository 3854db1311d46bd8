#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collector tuning knobs
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GcOption {
    /// Wait until the heap reaches `pause`% of its size after a cycle (LUAI_GCPAUSE)
    pub pause: usize,
    /// Work done per step relative to allocation, in percent (LUAI_GCMUL)
    pub step_mul: usize,
    /// Hard cap on the byte counter
    pub memory_limit: usize,
    /// Threshold for the first automatic step
    pub initial_threshold: usize,
}

impl Default for GcOption {
    fn default() -> Self {
        Self {
            pause: 200,
            step_mul: 200,
            memory_limit: usize::MAX,
            initial_threshold: 64 * 1024,
        }
    }
}
