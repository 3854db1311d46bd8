// Tests for weak tables (__mode)

#[cfg(test)]
mod tests {
    use crate::*;

    /// Table rooted as a global, made weak through a metatable's __mode
    fn weak_table(gc: &mut GC, name: &str, mode: &str) -> GcId {
        let t = gc.create_table(0, 0).unwrap();
        gc.set_global(name, LuaValue::Object(t)).unwrap();
        let mt = gc.create_table(0, 0).unwrap();
        gc.pin(mt);
        let key = gc.create_string("__mode").unwrap();
        let mode = gc.create_string(mode).unwrap();
        gc.table_set(mt, LuaValue::Object(key), LuaValue::Object(mode))
            .unwrap();
        gc.set_metatable(t, Some(mt)).unwrap();
        gc.unpin(mt);
        t
    }

    #[test]
    fn test_weak_keys_entry_removed() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "cache", "k");
        assert_eq!(gc.table_weak_mode(t), Some(WeakMode::Keys));

        let k = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(k), LuaValue::boolean(true))
            .unwrap();
        let live = gc.create_table(0, 0).unwrap();
        gc.pin(live);
        gc.table_set(t, LuaValue::Object(live), LuaValue::number(1.0))
            .unwrap();
        let name = gc.create_string("name").unwrap();
        gc.table_set(t, LuaValue::Object(name), LuaValue::number(2.0))
            .unwrap();

        gc.full_collect();

        assert!(!gc.is_alive(k));
        assert_eq!(gc.table_entries(t).unwrap().len(), 2);
        assert_eq!(
            gc.table_get(t, LuaValue::Object(live)).unwrap(),
            LuaValue::number(1.0)
        );
        // strings are values, never weak references
        assert_eq!(
            gc.table_get(t, LuaValue::Object(name)).unwrap(),
            LuaValue::number(2.0)
        );
        assert!(gc.stats().weak_entries_cleared >= 1);
    }

    #[test]
    fn test_weak_keys_do_not_protect_values() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "owners", "k");
        let k = gc.create_userdata(1u8).unwrap();
        let v = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(k), LuaValue::Object(v))
            .unwrap();
        gc.pin(k);

        // values of a weak-key table are strong references
        gc.full_collect();
        assert!(gc.is_alive(v));

        gc.unpin(k);
        gc.full_collect();
        assert!(!gc.is_alive(k));
        assert!(gc.table_entries(t).unwrap().is_empty());
    }

    #[test]
    fn test_weak_values_cleared() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "refs", "v");
        let dead = gc.create_table(0, 0).unwrap();
        let kept = gc.create_table(0, 0).unwrap();
        gc.pin(kept);
        let text = gc.create_string("keep me").unwrap();
        gc.table_set(t, LuaValue::number(1.0), LuaValue::Object(dead))
            .unwrap();
        gc.table_set(t, LuaValue::number(2.0), LuaValue::Object(kept))
            .unwrap();
        gc.table_set(t, LuaValue::number(3.0), LuaValue::Object(text))
            .unwrap();

        let a = gc.create_string("a").unwrap();
        let b = gc.create_string("b").unwrap();
        let gone = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(a), LuaValue::Object(gone))
            .unwrap();
        gc.table_set(t, LuaValue::Object(b), LuaValue::number(7.0))
            .unwrap();

        gc.full_collect();

        assert!(!gc.is_alive(dead));
        assert!(!gc.is_alive(gone));
        assert!(gc.is_alive(text));
        assert_eq!(gc.table_get(t, LuaValue::number(1.0)).unwrap(), LuaValue::Nil);
        assert_eq!(
            gc.table_get(t, LuaValue::number(2.0)).unwrap(),
            LuaValue::Object(kept)
        );
        assert_eq!(
            gc.table_get(t, LuaValue::number(3.0)).unwrap(),
            LuaValue::Object(text)
        );
        assert_eq!(gc.table_get(t, LuaValue::Object(a)).unwrap(), LuaValue::Nil);
        assert_eq!(
            gc.table_get(t, LuaValue::Object(b)).unwrap(),
            LuaValue::number(7.0)
        );
    }

    #[test]
    fn test_dead_keys_pruned_on_next_traversal() {
        let mut gc = GC::new();
        gc.stop();

        let t = gc.create_table(0, 0).unwrap();
        gc.pin(t);
        gc.set_weak_mode(t, Some(WeakMode::Values)).unwrap();

        let a = gc.create_string("slot").unwrap();
        let gone = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(a), LuaValue::Object(gone))
            .unwrap();

        gc.full_collect();
        // the cleared entry lingers as an invisible dead key
        assert_eq!(gc.table_ref(t).unwrap().hash.len(), 1);
        assert!(gc.table_entries(t).unwrap().is_empty());

        gc.full_collect();
        assert!(gc.table_ref(t).unwrap().hash.is_empty());
        assert!(!gc.is_alive(a));
    }

    #[test]
    fn test_weak_kv_clears_both_sides() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "both", "kv");
        assert_eq!(gc.table_weak_mode(t), Some(WeakMode::KeysValues));

        let k1 = gc.create_table(0, 0).unwrap();
        let v1 = gc.create_table(0, 0).unwrap();
        gc.pin(v1);
        gc.table_set(t, LuaValue::Object(k1), LuaValue::Object(v1))
            .unwrap();

        let k2 = gc.create_table(0, 0).unwrap();
        gc.pin(k2);
        let v2 = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::Object(k2), LuaValue::Object(v2))
            .unwrap();

        let k3 = gc.create_string("k3").unwrap();
        let v3 = gc.create_string("v3").unwrap();
        gc.table_set(t, LuaValue::Object(k3), LuaValue::Object(v3))
            .unwrap();

        gc.full_collect();
        assert!(!gc.is_alive(k1));
        assert!(!gc.is_alive(v2));
        assert_eq!(gc.table_entries(t).unwrap(), vec![(
            LuaValue::Object(k3),
            LuaValue::Object(v3)
        )]);
    }

    #[test]
    fn test_weak_value_cleared_before_finalizer_runs() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "registry_of_handles", "v");
        let handle = gc.create_userdata(7u32).unwrap();
        gc.table_set(t, LuaValue::number(1.0), LuaValue::Object(handle))
            .unwrap();
        gc.set_finalizer(handle, Box::new(|gc, id| {
            // the weak entry is already gone when the finalizer sees the object
            let t = gc.get_global("registry_of_handles").as_gc_id().unwrap();
            assert_eq!(gc.table_get(t, LuaValue::number(1.0))?, LuaValue::Nil);
            assert_eq!(gc.userdata_ref::<u32>(id), Some(&7));
            Ok(())
        }))
        .unwrap();

        gc.full_collect();
        assert_eq!(gc.stats().finalizers_run, 1);
        assert!(gc.take_finalizer_errors().is_empty());
        assert!(!gc.is_alive(handle));
    }

    #[test]
    fn test_removing_metatable_makes_table_strong() {
        let mut gc = GC::new();
        gc.stop();

        let t = weak_table(&mut gc, "strong_again", "v");
        gc.set_metatable(t, None).unwrap();
        assert_eq!(gc.table_weak_mode(t), None);

        let v = gc.create_table(0, 0).unwrap();
        gc.table_set(t, LuaValue::number(1.0), LuaValue::Object(v))
            .unwrap();
        gc.full_collect();
        assert!(gc.is_alive(v));
    }
}
