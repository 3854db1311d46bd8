// Tests for write barriers and the tri-color invariant

#[cfg(test)]
mod tests {
    use crate::*;

    /// Step until `id` has been blackened by the propagator
    fn step_until_black(gc: &mut GC, id: GcId) {
        for _ in 0..1000 {
            if gc.color(id) == Some(GcColor::Black) {
                return;
            }
            gc.step(1);
            assert_eq!(gc.gc_state(), GcState::Propagate);
        }
        panic!("{} never turned black", id);
    }

    fn step_until_state(gc: &mut GC, state: GcState) {
        for _ in 0..10_000 {
            if gc.gc_state() == state {
                return;
            }
            gc.step(1);
        }
        panic!("never reached {:?}", state);
    }

    #[test]
    fn test_forward_barrier_marks_stored_value() {
        let mut gc = GC::new();
        gc.stop();

        let a = gc.create_upvalue(LuaValue::Nil).unwrap();
        gc.pin(a);
        gc.step(1);
        assert_eq!(gc.gc_state(), GcState::Propagate);
        step_until_black(&mut gc, a);

        let b = gc.create_table(0, 0).unwrap();
        assert_eq!(gc.color(b), Some(GcColor::White));

        gc.set_upvalue(a, LuaValue::Object(b)).unwrap();
        assert_ne!(gc.color(b), Some(GcColor::White));
        assert!(gc.check_invariant().is_ok());

        step_until_state(&mut gc, GcState::Pause);
        assert!(gc.is_alive(b));

        gc.full_collect();
        assert!(gc.is_alive(b));
        assert_eq!(gc.get_upvalue(a).unwrap(), LuaValue::Object(b));
    }

    #[test]
    fn test_missing_barrier_is_detected() {
        let mut gc = GC::new();
        gc.stop();

        let a = gc.create_upvalue(LuaValue::Nil).unwrap();
        gc.pin(a);
        gc.step(1);
        step_until_black(&mut gc, a);

        let b = gc.create_table(0, 0).unwrap();
        // raw store, bypassing the barrier
        if let Some(GcObject::UpValue(uv)) = gc.pool.get_mut(a).map(|s| &mut s.object) {
            uv.value = LuaValue::Object(b);
        }
        match gc.check_invariant() {
            Err(GcError::InvariantViolation { holder, target }) => {
                assert_eq!(holder, a);
                assert_eq!(target, b);
            }
            other => panic!("expected an invariant violation, got {:?}", other),
        }

        gc.barrier_forward(a, b);
        assert!(gc.check_invariant().is_ok());
        step_until_state(&mut gc, GcState::Pause);
        assert!(gc.is_alive(b));
    }

    #[test]
    fn test_backward_barrier_regrays_table() {
        let mut gc = GC::new();
        gc.stop();

        let t = gc.create_table(0, 0).unwrap();
        gc.pin(t);
        gc.step(1);
        step_until_black(&mut gc, t);

        let b = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::number(1.0), LuaValue::Object(b))
            .unwrap();
        assert_eq!(gc.color(t), Some(GcColor::Gray));
        // the value itself is left alone until the atomic phase
        assert_eq!(gc.color(b), Some(GcColor::White));
        assert!(gc.check_invariant().is_ok());

        // further stores into a gray table need no barrier work
        let c = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(c), LuaValue::boolean(true))
            .unwrap();

        step_until_state(&mut gc, GcState::Pause);
        assert!(gc.is_alive(b));
        assert!(gc.is_alive(c));

        gc.full_collect();
        assert_eq!(gc.table_get(t, LuaValue::number(1.0)).unwrap(), LuaValue::Object(b));
        assert!(gc.is_alive(c));
    }

    #[test]
    fn test_forward_barrier_during_sweep_whitens_container() {
        let mut gc = GC::new();
        gc.stop();

        let a = gc.create_upvalue(LuaValue::Nil).unwrap();
        gc.pin(a);
        step_until_state(&mut gc, GcState::SweepStrings);
        // marked in the cycle, not swept yet
        assert_eq!(gc.color(a), Some(GcColor::Black));

        let b = gc.create_table(0, 0).unwrap();
        gc.set_upvalue(a, LuaValue::Object(b)).unwrap();
        assert_eq!(gc.color(a), Some(GcColor::White));
        assert_eq!(gc.color(b), Some(GcColor::White));

        step_until_state(&mut gc, GcState::Pause);
        assert!(gc.is_alive(b));
        gc.full_collect();
        assert!(gc.is_alive(b));
    }

    #[test]
    fn test_barrier_fast_path_outside_marking() {
        let mut gc = GC::new();
        gc.stop();

        let a = gc.create_upvalue(LuaValue::Nil).unwrap();
        let t = gc.create_table(0, 0).unwrap();
        let b = gc.create_table(0, 0).unwrap();
        assert_eq!(gc.gc_state(), GcState::Pause);

        gc.set_upvalue(a, LuaValue::Object(b)).unwrap();
        gc.table_set(t, LuaValue::number(1.0), LuaValue::Object(b))
            .unwrap();
        for id in [a, t, b] {
            assert_eq!(gc.color(id), Some(GcColor::White));
        }
        assert!(gc.grayagain.is_empty());
    }

    #[test]
    fn test_userdata_and_closure_barriers() {
        let mut gc = GC::new();
        gc.stop();

        let ud = gc.create_userdata(String::from("handle")).unwrap();
        let f = gc.create_closure(None, vec![]).unwrap();
        gc.pin(ud);
        gc.pin(f);
        gc.step(1);
        step_until_black(&mut gc, ud);
        step_until_black(&mut gc, f);

        let mt = gc.create_table(0, 0).unwrap();
        let env = gc.create_table(0, 0).unwrap();
        gc.set_metatable(ud, Some(mt)).unwrap();
        gc.set_userdata_env(ud, Some(env)).unwrap();
        gc.set_closure_env(f, Some(env)).unwrap();
        assert_ne!(gc.color(mt), Some(GcColor::White));
        assert_ne!(gc.color(env), Some(GcColor::White));
        assert!(gc.check_invariant().is_ok());

        gc.full_collect();
        assert_eq!(gc.get_metatable(ud), Some(mt));
        assert!(gc.is_alive(env));
        assert_eq!(
            gc.userdata_ref::<String>(ud).map(String::as_str),
            Some("handle")
        );
    }

    #[test]
    fn test_invariant_holds_under_interleaved_mutation() {
        let mut gc = GC::new();
        gc.stop();

        let mut tables = Vec::new();
        let mut cells = Vec::new();
        for _ in 0..8 {
            let t = gc.create_table(0, 0).unwrap();
            gc.pin(t);
            tables.push(t);
            let c = gc.create_upvalue(LuaValue::Nil).unwrap();
            gc.pin(c);
            cells.push(c);
        }

        // small linear congruential generator keeps the schedule deterministic
        let mut seed: u64 = 0x2545_f491;
        let mut next = move |n: usize| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as usize) % n
        };

        for round in 0..2000 {
            let fresh = gc.create_table(0, 0).unwrap();
            match next(3) {
                0 => {
                    let t = tables[next(tables.len())];
                    gc.table_set(t, LuaValue::number(next(4) as f64 + 1.0), LuaValue::Object(fresh))
                        .unwrap();
                }
                1 => {
                    let c = cells[next(cells.len())];
                    gc.set_upvalue(c, LuaValue::Object(fresh)).unwrap();
                }
                _ => gc.push(LuaValue::Object(fresh)).unwrap(),
            }
            if round % 3 == 0 {
                gc.step(5);
            }
            assert!(gc.check_invariant().is_ok(), "round {}", round);
        }

        gc.full_collect();
        for &c in &cells {
            if let Some(id) = gc.get_upvalue(c).unwrap().as_gc_id() {
                assert!(gc.is_alive(id));
            }
        }
        for &t in &tables {
            for (_, v) in gc.table_entries(t).unwrap() {
                assert!(gc.is_alive(v.as_gc_id().unwrap()));
            }
        }
    }
}
