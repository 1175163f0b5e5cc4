use proptest::prelude::*;
use std::sync::Arc;
use tl_node::{Node, NodeType};

fn any_node_type() -> impl Strategy<Value = NodeType> {
    prop::sample::select(NodeType::ALL.to_vec())
}

proptest! {
    // The node layer never clamps or rounds what it stores.
    #[test]
    fn set_then_get_is_exact(t in any_node_type(), raw in any::<u64>(), pick in any::<usize>()) {
        let n = Node::new(t);
        let idx = pick % n.num_slots();
        let v = f64::from_bits(raw);
        n.set(idx, v);
        prop_assert_eq!(n.get(idx).to_bits(), v.to_bits());
    }

    #[test]
    fn writes_do_not_touch_other_slots(t in any_node_type(), v in -1e9f64..1e9, pick in any::<usize>()) {
        let n = Node::new(t);
        let before = n.snapshot();
        let idx = pick % n.num_slots();
        n.set(idx, v);
        for (i, (b, a)) in before.iter().zip(n.snapshot()).enumerate() {
            if i != idx {
                prop_assert_eq!(b.to_bits(), a.to_bits());
            }
        }
    }

    #[test]
    fn variable_names_resolve_to_their_slot(t in any_node_type()) {
        for (i, d) in t.variables().iter().enumerate() {
            prop_assert_eq!(t.variable_index(d.name).unwrap(), i);
        }
    }
}

#[test]
fn writers_on_different_threads_see_each_other_after_join() {
    let n = Arc::new(Node::new(NodeType::Hydraulic));
    let c_side = {
        let n = n.clone();
        std::thread::spawn(move || {
            n.set(3, 2e6);
            n.set(4, 1e9);
        })
    };
    let q_side = {
        let n = n.clone();
        std::thread::spawn(move || {
            n.set(0, 1.5e6);
            n.set(1, 1e-4);
        })
    };
    c_side.join().unwrap();
    q_side.join().unwrap();
    assert_eq!(n.snapshot()[..5], [1.5e6, 1e-4, 293.0, 2e6, 1e9]);
}
