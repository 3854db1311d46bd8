// Finalizers
//
// Objects with a finalizer live on `finobj` instead of `all_objects`. When the
// atomic phase finds one unreachable it moves to `tobefnz` and is marked, with
// everything it references, so it survives this cycle. The Finalize phase then
// pops each one, sets its FINALIZED bit, links it back into `all_objects` and
// calls the finalizer. If the finalizer stored the object somewhere reachable
// it simply stays alive; otherwise the next cycle frees it. The bit is never
// cleared, so a finalizer runs at most once per object.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::gc::GCFINALIZECOST;
use crate::{GC, GcError, GcId, GcObjectKind, GcResult, GcState};

/// Finalizer callback; gets the collector and the object being finalized
pub type Finalizer = Box<dyn FnOnce(&mut GC, GcId) -> GcResult<()>>;

impl GC {
    /// Register a finalizer for a table or userdata.
    /// Replaces a finalizer that has not run yet; ignored once the object
    /// has been finalized.
    pub fn set_finalizer(&mut self, id: GcId, finalizer: Finalizer) -> GcResult<()> {
        let slot = self.pool.get(id).ok_or(GcError::InvalidObject(id))?;
        let kind = slot.kind();
        if !kind.supports_finalizer() {
            return Err(GcError::TypeMismatch {
                expected: GcObjectKind::UserData,
                found: kind,
            });
        }
        if slot.header.is_finalized() {
            return Ok(());
        }
        if self.finalizers.insert(id, finalizer).is_some() {
            // already on finobj or tobefnz
            return Ok(());
        }
        if let Some(pos) = self.all_objects.iter().rposition(|&o| o == id) {
            self.unlink_object(pos);
            self.finobj.push(id);
        }
        Ok(())
    }

    pub fn has_finalizer(&self, id: GcId) -> bool {
        self.finalizers.contains_key(&id)
    }

    /// Remove `all_objects[pos]` without disturbing a sweep in progress:
    /// the swept prefix must stay contiguous in front of the cursor
    fn unlink_object(&mut self, mut pos: usize) {
        if self.gc_state == GcState::SweepObjects && pos < self.sweep_index {
            let last_swept = self.sweep_index - 1;
            self.all_objects.swap(pos, last_swept);
            self.sweep_index = last_swept;
            pos = last_swept;
        }
        self.all_objects.swap_remove(pos);
    }

    /// Move unreachable, unfinalized objects from finobj to tobefnz
    /// (separatetobefnz). Returns how many were moved.
    pub(crate) fn separate_finalizable(&mut self) -> usize {
        let mut moved = 0;
        let mut i = 0;
        while i < self.finobj.len() {
            let id = self.finobj[i];
            let separate = self
                .pool
                .header(id)
                .is_some_and(|h| h.is_white() && !h.is_finalized());
            if separate {
                self.finobj.swap_remove(i);
                self.tobefnz.push_back(id);
                moved += 1;
            } else {
                i += 1;
            }
        }
        moved
    }

    /// Mark objects waiting for their finalizer (markbeingfnz)
    pub(crate) fn mark_being_finalized(&mut self) {
        for i in 0..self.tobefnz.len() {
            let id = self.tobefnz[i];
            self.mark_object(id);
        }
    }

    /// Call one pending finalizer. Returns false when nothing is left.
    ///
    /// Errors and panics from the finalizer are recorded and reported by
    /// `take_finalizer_errors`; they never stop the collector.
    pub fn run_one(&mut self) -> bool {
        let Some(id) = self.tobefnz.pop_front() else {
            return false;
        };
        let current_white = self.current_white;
        let Some(header) = self.pool.header_mut(id) else {
            return true;
        };
        header.set_finalized();
        header.make_white(current_white);
        self.all_objects.push(id);

        let Some(finalizer) = self.finalizers.remove(&id) else {
            return true;
        };

        let was_in_finalizer = std::mem::replace(&mut self.in_finalizer, true);
        let result = panic::catch_unwind(AssertUnwindSafe(|| finalizer(self, id)));
        self.in_finalizer = was_in_finalizer;
        self.stats.finalizers_run += 1;

        let message = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(message) = message {
            log::warn!("finalizer of {} failed: {}", id, message);
            self.stats.finalizer_errors += 1;
            self.finalizer_errors
                .push(GcError::Finalizer { object: id, message });
        }
        true
    }

    /// Drain the to-be-finalized queue
    pub(crate) fn run_pending_finalizers(&mut self) -> isize {
        let mut count: isize = 0;
        while self.run_one() {
            count += 1;
        }
        if count > 0 {
            log::debug!("gc finalize: {} finalizers called", count);
        }
        (count * GCFINALIZECOST).max(1)
    }

    /// Errors collected from finalizers since the last call
    pub fn take_finalizer_errors(&mut self) -> Vec<GcError> {
        std::mem::take(&mut self.finalizer_errors)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "finalizer panicked".to_string()
    }
}
