// Test module organization
pub mod test_barrier;
pub mod test_collect;
pub mod test_weak;
