#![expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]

use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Item(u32);

#[derive(Debug, PartialEq)]
struct Other(&'static str);

#[test]
fn create_and_get() {
    let mut arena = Arena::new();
    let a = arena.create(Item(10));
    let b = arena.create(Item(20));

    assert_eq!(arena.get(a), Some(&Item(10)));
    assert_eq!(arena.get(b), Some(&Item(20)));
    assert_eq!(arena.len::<Item>(), 2);
    assert_eq!(arena.live(), 2);
}

#[test]
fn null_handle_never_resolves() {
    let arena = Arena::new();
    assert!(Handle::<Item>::NULL.is_null());
    assert_eq!(arena.get(Handle::<Item>::NULL), None);
    assert_eq!(
        arena.try_get(Handle::<Item>::NULL),
        Err(ArenaError::NotFound { id: 0 })
    );
}

#[test]
fn destroyed_handle_resolves_to_not_found() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));

    assert_eq!(arena.destroy(a), Some(Item(1)));
    assert_eq!(arena.get(a), None);
    assert_eq!(arena.destroy(a), None);
    assert!(!arena.contains(a));
}

#[test]
fn ids_are_never_reused() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    arena.destroy(a);
    let b = arena.create(Item(2));

    assert_ne!(a, b);
    assert!(b.raw() > a.raw());
    assert_eq!(arena.get(a), None);
}

#[test]
fn handles_do_not_resolve_in_another_arena() {
    let mut first = Arena::new();
    let mut second = Arena::new();
    let a = first.create(Item(1));
    let b = second.create(Item(2));

    assert_ne!(a, b);
    assert_eq!(second.get(a), None);
    assert_eq!(first.get(b), None);
    assert_eq!(
        second.try_get(a),
        Err(ArenaError::NotFound { id: a.raw() })
    );
}

#[test]
fn ids_are_shared_across_types() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let o = arena.create(Other("x"));

    assert_ne!(a.raw(), o.raw());
    assert_eq!(arena.len::<Item>(), 1);
    assert_eq!(arena.len::<Other>(), 1);
}

#[test]
fn destroy_middle_compacts_store() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let b = arena.create(Item(2));
    let c = arena.create(Item(3));
    assert_eq!(arena.position(b), Some(1));

    arena.destroy(b);

    assert_eq!(arena.len::<Item>(), 2);
    // The former last element now sits where `b` was.
    assert_eq!(arena.position(c), Some(1));
    assert_eq!(arena.position(a), Some(0));
    assert_eq!(arena.get(c), Some(&Item(3)));
}

#[test]
fn destroy_last_moves_nothing() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let b = arena.create(Item(2));

    arena.destroy(b);

    assert_eq!(arena.position(a), Some(0));
    assert_eq!(arena.len::<Item>(), 1);
}

#[test]
fn destroy_all_skips_dead_handles() {
    let mut arena = Arena::new();
    let handles: Vec<_> = (0..5).map(|i| arena.create(Item(i))).collect();
    arena.destroy(handles[2]);

    let destroyed = arena.destroy_all(handles.iter().copied());

    assert_eq!(destroyed, 4);
    assert!(arena.is_empty::<Item>());
}

#[test]
fn destroy_all_keeps_survivors_intact() {
    let mut arena = Arena::new();
    let handles: Vec<_> = (0..6).map(|i| arena.create(Item(i))).collect();

    arena.destroy_all([handles[0], handles[3]]);

    for (i, handle) in handles.iter().enumerate() {
        let expected = (i != 0 && i != 3).then(|| Item(u32::try_from(i).unwrap()));
        assert_eq!(arena.get(*handle).cloned(), expected);
    }
}

#[test]
fn create_with_sees_own_handle() {
    let mut arena = Arena::new();
    let handle = arena.create_with(|me: Handle<Item>| Item(me.raw()));
    assert_eq!(arena.get(handle), Some(&Item(handle.raw())));
}

#[test]
fn get_mut_updates_in_place() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    arena.get_mut(a).unwrap().0 = 99;
    assert_eq!(arena.get(a), Some(&Item(99)));
}

#[test]
fn try_get_reports_wrong_type() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let wrong: Handle<Other> = a.cast();

    let err = arena.try_get(wrong).unwrap_err();
    assert!(matches!(err, ArenaError::WrongType { id, .. } if id == a.raw()));
}

#[test]
#[should_panic(expected = "is stored as")]
fn get_with_wrong_type_panics() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let _ = arena.get(a.cast::<Other>());
}

#[test]
fn arenas_are_independent() {
    let mut first = Arena::new();
    let mut second = Arena::new();
    let a = first.create(Item(1));
    let _ = second.create(Item(2));

    first.destroy(a);

    assert_eq!(first.len::<Item>(), 0);
    assert_eq!(second.len::<Item>(), 1);
}

#[test]
fn shutdown_reports_live_objects() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    arena.create(Item(2));
    arena.destroy(a);

    assert_eq!(arena.shutdown(), 1);
    assert_eq!(Arena::new().shutdown(), 0);
}

#[test]
fn iter_yields_handles_in_physical_order() {
    let mut arena = Arena::new();
    let a = arena.create(Item(1));
    let b = arena.create(Item(2));
    let c = arena.create(Item(3));
    arena.destroy(a);

    let seen: Vec<_> = arena.iter::<Item>().map(|(h, item)| (h, item.0)).collect();
    assert_eq!(seen, vec![(c, 3), (b, 2)]);
    assert_eq!(arena.handles::<Item>(), vec![c, b]);
    assert_eq!(arena.iter::<Other>().count(), 0);
}

#[test]
fn handle_debug_names_the_type() {
    let handle: Handle<Item> = Handle::from_raw(7);
    assert_eq!(format!("{handle:?}"), "ItemId(7)");
    assert_eq!(format!("{:?}", Handle::<Item>::NULL), "ItemId::NULL");
}

#[derive(Debug, Clone)]
enum Op {
    Create(u32),
    Destroy(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u32>().prop_map(Op::Create),
        any::<usize>().prop_map(Op::Destroy),
    ]
}

proptest! {
    #[test]
    fn live_handles_survive_churn(ops in proptest::collection::vec(op(), 0..200)) {
        let mut arena = Arena::new();
        let mut live: Vec<(Handle<Item>, u32)> = Vec::new();

        for op in ops {
            match op {
                Op::Create(value) => live.push((arena.create(Item(value)), value)),
                Op::Destroy(pick) if !live.is_empty() => {
                    let (handle, value) = live.swap_remove(pick % live.len());
                    prop_assert_eq!(arena.destroy(handle), Some(Item(value)));
                }
                Op::Destroy(_) => {}
            }

            prop_assert_eq!(arena.len::<Item>(), live.len());
            for (handle, value) in &live {
                prop_assert_eq!(arena.get(*handle), Some(&Item(*value)));
                prop_assert!(arena.position(*handle).unwrap() < live.len());
            }
        }
    }
}
