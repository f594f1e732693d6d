//! Property-based tests for the universally-quantified invariants in
//! spec.md §8, driven by randomized sequential operation histories.
//! Concurrent safety is covered separately by `tests/concurrent.rs` and
//! the `loom` suite in `tests/loom_protocol.rs`.

use proptest::prelude::*;
use reflist::{List, Node};

#[derive(Debug, Clone, Copy)]
enum TailOp {
    Insert(u32),
    MarkRemoved(usize),
}

fn tail_op() -> impl Strategy<Value = TailOp> {
    prop_oneof![
        any::<u32>().prop_map(TailOp::Insert),
        any::<usize>().prop_map(TailOp::MarkRemoved),
    ]
}

proptest! {
    /// Property 2: `foreach_live`'s order equals insertion order with any
    /// `removed` entries filtered out, for a pure tail-insertion history.
    #[test]
    fn live_iteration_matches_insertion_order_minus_removed(ops in prop::collection::vec(tail_op(), 0..64)) {
        let list: List<u32> = List::new();
        let mut model: Vec<(u32, bool)> = Vec::new(); // (value, removed)
        let mut nodes: Vec<*mut Node<u32>> = Vec::new();

        for op in ops {
            match op {
                TailOp::Insert(v) => {
                    nodes.push(list.insert_tail(v).unwrap());
                    model.push((v, false));
                }
                TailOp::MarkRemoved(idx) => {
                    if !nodes.is_empty() {
                        let i = idx % nodes.len();
                        unsafe { (*nodes[i]).mark_removed() };
                        model[i].1 = true;
                    }
                }
            }
        }

        let expected: Vec<u32> = model.iter().filter(|(_, removed)| !removed).map(|(v, _)| *v).collect();
        let actual: Vec<u32> = list.foreach_live().map(|n| *n.get()).collect();
        prop_assert_eq!(actual, expected);
    }

    /// Property 1: forward (head→tail via `next`) and backward (tail→head
    /// via `prev`) traversals visit the same set of nodes, in reverse
    /// order, for any mix of head/tail insertions and removals.
    #[test]
    fn head_tail_traversal_is_symmetric(ops in prop::collection::vec(tail_op(), 0..64), insert_at_head in prop::collection::vec(any::<bool>(), 0..64)) {
        let list: List<u32> = List::new();
        let mut nodes: Vec<*mut Node<u32>> = Vec::new();
        let mut next_head_choice = insert_at_head.into_iter().cycle();

        for op in ops {
            match op {
                TailOp::Insert(v) => {
                    let node = if next_head_choice.next().unwrap_or(false) {
                        list.insert_head(v).unwrap()
                    } else {
                        list.insert_tail(v).unwrap()
                    };
                    nodes.push(node);
                }
                TailOp::MarkRemoved(idx) => {
                    if !nodes.is_empty() {
                        let i = idx % nodes.len();
                        unsafe { (*nodes[i]).mark_removed() };
                    }
                }
            }
        }

        let mut forward = Vec::new();
        let mut curr = list.head();
        while !curr.is_null() {
            forward.push(curr as *const Node<u32>);
            curr = unsafe { List::get_next(curr) };
        }

        let mut backward = Vec::new();
        let mut curr = list.tail();
        while !curr.is_null() {
            backward.push(curr as *const Node<u32>);
            curr = unsafe { List::get_prev(curr) };
        }
        backward.reverse();

        prop_assert_eq!(forward, backward);
    }

    /// Property 3: live count plus (removed-but-not-yet-swept) count
    /// equals the total number of nodes ever inserted, as long as no
    /// `sweep` has run to shrink the total.
    #[test]
    fn live_plus_removed_equals_total(ops in prop::collection::vec(tail_op(), 0..64)) {
        let list: List<u32> = List::new();
        let mut total = 0usize;
        let mut nodes: Vec<*mut Node<u32>> = Vec::new();

        for op in ops {
            match op {
                TailOp::Insert(v) => {
                    nodes.push(list.insert_tail(v).unwrap());
                    total += 1;
                }
                TailOp::MarkRemoved(idx) => {
                    if !nodes.is_empty() {
                        let i = idx % nodes.len();
                        unsafe { (*nodes[i]).mark_removed() };
                    }
                }
            }
        }

        let mut removed_total = 0usize;
        let mut curr = list.head();
        while !curr.is_null() {
            if unsafe { (*curr).is_removed() } {
                removed_total += 1;
            }
            curr = unsafe { List::get_next(curr) };
        }

        prop_assert_eq!(list.count_live() + removed_total, total);
    }
}

#[test]
fn sweep_never_frees_a_held_or_live_node() {
    let list: List<&'static str> = List::new();
    let a = list.insert_tail("a").unwrap();
    let b = list.insert_tail("b").unwrap();
    let c = list.insert_tail("c").unwrap();

    unsafe {
        (*a).mark_removed();
        // `a` is removed but held: must survive the sweep.
        (*a).acquire();

        (*b).mark_removed();
        // `b` is removed and unheld: must be freed.

        // `c` is untouched: live, must survive.
        let _ = c;
    }

    list.sweep(None);

    let live: Vec<&str> = list.foreach_live().map(|n| *n.get()).collect();
    assert_eq!(live, vec!["c"]);
    assert_eq!(list.count_pending(), 1);

    unsafe { (*a).release() };
    list.sweep(None);
    assert_eq!(list.count_pending(), 0);
}

#[test]
fn mark_removed_is_idempotent_and_monotone() {
    let list: List<i32> = List::new();
    let node = list.insert_tail(7).unwrap();

    unsafe {
        assert!(!(*node).is_removed());
        (*node).mark_removed();
        assert!((*node).is_removed());
        (*node).mark_removed();
        assert!((*node).is_removed());
    }
}

#[test]
fn clear_empties_head_and_tail() {
    let list: List<i32> = List::new();
    for i in 0..10 {
        list.insert_tail(i).unwrap();
    }
    assert!(!list.head().is_null());

    list.clear();

    assert!(list.head().is_null());
    assert!(list.tail().is_null());
    assert_eq!(list.count_live(), 0);
}
