// Tests for full and incremental collection cycles

#[cfg(test)]
mod tests {
    use crate::*;

    fn garbage(gc: &mut GC, n: usize) {
        for i in 0..n {
            let created = match i % 4 {
                0 => gc.create_table(0, 0),
                1 => gc.create_userdata(i),
                2 => gc.create_upvalue(LuaValue::number(i as f64)),
                _ => gc.create_string(&format!("garbage_{}", i)),
            };
            created.unwrap();
        }
    }

    #[test]
    fn test_unreachable_objects_are_freed() {
        let mut gc = GC::new();
        gc.full_collect();
        let baseline = gc.byte_count();
        let objects = gc.object_count();

        garbage(&mut gc, 1000);
        assert!(gc.byte_count() > baseline);

        gc.full_collect();
        assert_eq!(gc.byte_count(), baseline);
        assert_eq!(gc.object_count(), objects);
        assert!(gc.stats().objects_collected >= 1000);
    }

    #[test]
    fn test_reachable_graph_survives() {
        let mut gc = GC::new();
        gc.stop();

        let root = gc.create_table(0, 0).unwrap();
        gc.set_global("root", LuaValue::Object(root)).unwrap();

        let child = gc.create_table(0, 0).unwrap();
        gc.table_set(root, LuaValue::number(1.0), LuaValue::Object(child))
            .unwrap();
        let name = gc.create_string("name").unwrap();
        let ud = gc.create_userdata(42i32).unwrap();
        gc.table_set(child, LuaValue::Object(name), LuaValue::Object(ud))
            .unwrap();

        let cell = gc.create_upvalue(LuaValue::Object(root)).unwrap();
        let proto = gc
            .create_proto(LuaProto {
                constants: vec![LuaValue::Object(name), LuaValue::number(3.0)],
                child_protos: vec![],
                source_name: None,
            })
            .unwrap();
        let closure = gc.create_closure(Some(proto), vec![cell]).unwrap();
        gc.table_set(root, LuaValue::Object(name), LuaValue::Object(closure))
            .unwrap();

        garbage(&mut gc, 200);
        gc.full_collect();

        for id in [root, child, name, ud, cell, proto, closure] {
            assert!(gc.is_alive(id), "{} should survive", id);
        }
        assert_eq!(gc.get_global("root"), LuaValue::Object(root));
        assert_eq!(
            gc.table_get(child, LuaValue::Object(name)).unwrap(),
            LuaValue::Object(ud)
        );
        assert_eq!(gc.userdata_ref::<i32>(ud), Some(&42));
        assert_eq!(gc.get_upvalue(cell).unwrap(), LuaValue::Object(root));
    }

    #[test]
    fn test_cycles_are_collected() {
        let mut gc = GC::new();
        gc.stop();

        let a = gc.create_table(0, 0).unwrap();
        let b = gc.create_table(0, 0).unwrap();
        gc.table_set(a, LuaValue::number(1.0), LuaValue::Object(b))
            .unwrap();
        gc.table_set(b, LuaValue::number(1.0), LuaValue::Object(a))
            .unwrap();
        gc.set_metatable(a, Some(b)).unwrap();

        gc.full_collect();
        assert!(!gc.is_alive(a));
        assert!(!gc.is_alive(b));
    }

    #[test]
    fn test_full_collect_is_idempotent() {
        let mut gc = GC::new();
        let keep = gc.create_table(0, 0).unwrap();
        gc.pin(keep);
        garbage(&mut gc, 300);

        gc.full_collect();
        let bytes = gc.byte_count();
        let freed = gc.stats().bytes_freed;
        let objects = gc.object_count();

        gc.full_collect();
        assert_eq!(gc.byte_count(), bytes);
        assert_eq!(gc.stats().bytes_freed, freed);
        assert_eq!(gc.object_count(), objects);
        assert!(gc.is_alive(keep));
    }

    #[test]
    fn test_full_collect_during_incremental_cycle() {
        let mut gc = GC::new();
        gc.stop();
        let keep = gc.create_table(0, 0).unwrap();
        gc.pin(keep);
        garbage(&mut gc, 100);

        // stop in the middle of marking
        gc.step(1);
        gc.step(1);
        assert_eq!(gc.gc_state(), GcState::Propagate);

        let late = gc.create_table(0, 0).unwrap();
        gc.full_collect();
        assert_eq!(gc.gc_state(), GcState::Pause);
        assert!(gc.is_alive(keep));
        assert!(!gc.is_alive(late));
    }

    #[test]
    fn test_cycle_state_sequence() {
        let mut gc = GC::new();
        gc.stop();
        let keep = gc.create_table(0, 0).unwrap();
        gc.pin(keep);
        garbage(&mut gc, 200);

        let mut states = vec![gc.gc_state()];
        for _ in 0..10_000 {
            gc.step(1);
            let state = gc.gc_state();
            if states.last() != Some(&state) {
                states.push(state);
            }
            if state == GcState::Pause {
                break;
            }
        }

        assert_eq!(
            states,
            vec![
                GcState::Pause,
                GcState::Propagate,
                GcState::SweepStrings,
                GcState::SweepObjects,
                GcState::SweepFinObj,
                GcState::Finalize,
                GcState::Pause,
            ]
        );
        assert_eq!(gc.stats().collection_count, 1);
        assert!(gc.is_alive(keep));
    }

    #[test]
    fn test_step_consumes_budget() {
        let mut gc = GC::new();
        gc.stop();
        garbage(&mut gc, 400);

        let mut steps = 0;
        loop {
            let work = gc.step(20);
            steps += 1;
            if gc.gc_state() == GcState::Pause {
                break;
            }
            assert!(work >= 20);
            assert!(steps < 10_000);
        }
        // 400 objects cannot be handled in a single bounded step
        assert!(steps > 1);
    }

    #[test]
    fn test_stop_and_restart() {
        let mut gc = GC::new();
        gc.stop();
        assert!(!gc.is_running());

        for _ in 0..2000 {
            gc.create_table(0, 0).unwrap();
        }
        assert!(gc.byte_count() > gc.threshold());
        assert_eq!(gc.gc_state(), GcState::Pause);
        assert_eq!(gc.stats().collection_count, 0);

        gc.restart();
        assert!(gc.is_running());
        assert_eq!(gc.threshold(), gc.byte_count());

        gc.create_table(0, 0).unwrap();
        assert_eq!(gc.stats().collection_count, 1);
    }

    #[test]
    fn test_collect_garbage_commands() {
        let mut gc = GC::new();

        assert_eq!(gc.collect_garbage(GcCommand::CountBytes), gc.byte_count());
        assert_eq!(gc.collect_garbage(GcCommand::Count), gc.byte_count() >> 10);

        assert_eq!(gc.collect_garbage(GcCommand::SetPause(150)), 200);
        assert_eq!(gc.collect_garbage(GcCommand::SetPause(200)), 150);
        assert_eq!(gc.collect_garbage(GcCommand::SetStepMul(400)), 200);
        assert_eq!(gc.option().step_mul, 400);

        gc.collect_garbage(GcCommand::Stop);
        assert_eq!(gc.collect_garbage(GcCommand::IsRunning), 0);
        gc.collect_garbage(GcCommand::Restart);
        assert_eq!(gc.collect_garbage(GcCommand::IsRunning), 1);

        let t = gc.create_table(0, 0).unwrap();
        gc.collect_garbage(GcCommand::Collect);
        assert!(!gc.is_alive(t));
        assert_eq!(gc.stats().full_collections, 1);
    }

    #[test]
    fn test_explicit_steps_finish_a_cycle() {
        let mut gc = GC::new();
        garbage(&mut gc, 300);

        let mut finished = false;
        for _ in 0..10_000 {
            if gc.collect_garbage(GcCommand::Step(1)) == 1 {
                finished = true;
                break;
            }
        }
        assert!(finished);
        assert_eq!(gc.gc_state(), GcState::Pause);
        assert!(gc.stats().objects_collected > 0);
    }

    #[test]
    fn test_new_object_charges_requested_size() {
        let mut gc = GC::new();
        gc.stop();
        let before = gc.byte_count();

        let big = gc.new_object(GcObjectKind::UserData, 10_000).unwrap();
        assert_eq!(gc.kind(big), Some(GcObjectKind::UserData));
        assert_eq!(gc.byte_count(), before + 10_000);

        let empty = gc.new_object(GcObjectKind::String, 0).unwrap();
        assert_eq!(gc.get_string(empty), Some(""));

        gc.full_collect();
        assert!(!gc.is_alive(big));
        assert_eq!(gc.byte_count(), before);
    }

    #[test]
    fn test_memory_limit_triggers_emergency_collection() {
        let mut gc = GC::with_option(GcOption {
            memory_limit: 64 * 1024,
            ..GcOption::default()
        });
        gc.stop();

        // garbage alone never exhausts the heap
        for _ in 0..3000 {
            gc.create_table(0, 0).unwrap();
            assert!(gc.byte_count() <= 64 * 1024);
        }
        assert!(gc.stats().emergency_collections >= 1);

        // rooted objects eventually do
        let mut out_of_memory = false;
        for _ in 0..10_000 {
            match gc.create_table(0, 0) {
                Ok(t) => gc.pin(t),
                Err(e) => {
                    assert!(matches!(e, GcError::OutOfMemory { .. }));
                    out_of_memory = true;
                    break;
                }
            }
        }
        assert!(out_of_memory);
        assert!(gc.byte_count() <= 64 * 1024);
    }
}
