// Incremental sweep
//
// Each list is walked with a persistent cursor, GCSWEEPMAX objects per step.
// An object still carrying the old white is freed with swap_remove, which
// pulls an unswept object into the cursor slot; survivors get the current
// white and the cursor moves on.

use crate::gc::{GCSWEEPCOST, GCSWEEPMAX};
use crate::{GC, GcHeader, GcId, GcObject, GcState};

impl GC {
    /// Sweep a chunk of the list that belongs to the current sweep state,
    /// moving on to the next state once the list is exhausted
    pub(crate) fn sweep_step(&mut self) -> isize {
        let state = self.gc_state;
        let mut list = match state {
            GcState::SweepStrings => std::mem::take(&mut self.all_strings),
            GcState::SweepObjects => std::mem::take(&mut self.all_objects),
            GcState::SweepFinObj => std::mem::take(&mut self.finobj),
            _ => return 0,
        };

        let (count, done) = self.sweep_list(&mut list, GCSWEEPMAX, state == GcState::SweepFinObj);

        match state {
            GcState::SweepStrings => self.all_strings = list,
            GcState::SweepObjects => self.all_objects = list,
            _ => self.finobj = list,
        }

        if done {
            self.sweep_index = 0;
            self.gc_state = match state {
                GcState::SweepStrings => GcState::SweepObjects,
                GcState::SweepObjects => GcState::SweepFinObj,
                _ => {
                    // checkSizes: release trailing free slots
                    self.pool.shrink_to_fit();
                    GcState::Finalize
                }
            };
            log::trace!("gc sweep: {:?} -> {:?}", state, self.gc_state);
        }

        count.max(1) as isize * GCSWEEPCOST
    }

    /// Sweep at most `max` objects of `list` starting at the cursor.
    /// Returns the number of objects visited and whether the list is done.
    fn sweep_list(&mut self, list: &mut Vec<GcId>, max: usize, finobj: bool) -> (usize, bool) {
        let current_white = self.current_white;
        let other_white = GcHeader::otherwhite(current_white);
        let mut count = 0;

        while self.sweep_index < list.len() && count < max {
            let i = self.sweep_index;
            let id = list[i];
            count += 1;

            let Some(header) = self.pool.header_mut(id) else {
                list.swap_remove(i);
                continue;
            };

            if !header.is_dead(other_white) {
                header.make_white(current_white);
                self.sweep_index += 1;
                continue;
            }

            // a dead object whose finalizer never ran is queued instead of freed
            if finobj && !header.is_finalized() && self.finalizers.contains_key(&id) {
                header.make_white(current_white);
                list.swap_remove(i);
                self.tobefnz.push_back(id);
                continue;
            }

            list.swap_remove(i);
            self.free_object(id);
        }

        (count, self.sweep_index >= list.len())
    }

    /// Release one object and everything the collector keeps about it
    pub(crate) fn free_object(&mut self, id: GcId) {
        let Some(slot) = self.pool.free(id) else {
            return;
        };
        let size = slot.header.size as usize;
        match &slot.object {
            GcObject::String(s) => self.strings.remove(s.cached_hash(), id),
            GcObject::Table(_) | GcObject::UserData(_) => {
                self.finalizers.remove(&id);
            }
            _ => {}
        }
        self.total_bytes = self.total_bytes.saturating_sub(size);
        self.stats.bytes_freed += size;
        self.stats.objects_collected += 1;
    }
}
