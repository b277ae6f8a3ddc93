use crate::core::node::{Node, NodeMock};
use crate::core::testutil::fixtures::{
    build_ring_with_hasher, converge, mapped_hasher, span_fixture, stabilize_fully, test_space,
};
use crate::core::{Identifier, RingError, RingResult, StoredEntry};
use crate::ring::node::ChordNode;
use crate::ring::registry::Registry;
use std::sync::Arc;
use unimock::*;

fn id(v: u64) -> Identifier {
    Identifier::new(v)
}

/// Joining through a contact that is not on the ring fails like a timed-out
/// RPC would.
#[test]
fn test_join_via_absent_contact() {
    let registry = Registry::new(test_space(8));
    let node = ChordNode::new(&span_fixture(), id(10), registry.clone());
    registry.register(node.clone()).unwrap();

    let err = node.join(Some(id(99))).unwrap_err();
    assert_eq!(err, RingError::UnreachablePeer { id: id(99) });
}

/// A contact that cannot resolve the joiner's successor fails the join; the
/// joiner does not come up half-connected.
#[test]
fn test_join_propagates_contact_routing_failure() {
    let registry = Registry::new(test_space(8));
    let routing_err: RingResult<Identifier> = Err(RingError::RoutingFailure { target: id(10) });
    let contact = Unimock::new((
        NodeMock::id.each_call(matching!()).returns(id(60)),
        NodeMock::status
            .each_call(matching!())
            .returns(crate::core::NodeStatus::Active),
        NodeMock::find_successor
            .each_call(matching!(_))
            .returns(routing_err),
    ));
    registry.register(Arc::new(contact)).unwrap();

    let node = ChordNode::new(&span_fixture(), id(10), registry.clone());
    registry.register(node.clone()).unwrap();

    let err = node.join(Some(id(60))).unwrap_err();
    assert_eq!(err, RingError::RoutingFailure { target: id(10) });
}

/// An exhausted hop budget stops routing with `RoutingFailure` instead of
/// looping, both at the entry node and after a forward.
#[test]
fn test_hop_budget_exhaustion_reports_routing_failure() {
    let manager = build_ring_with_hasher(8, &[10, 60], mapped_hasher(&[])).unwrap();
    stabilize_fully(&manager);
    let node = manager.node(id(10)).unwrap();

    // budget 0 trips the guard before the first routing decision
    assert_eq!(
        node.find_successor_bounded(id(200), 0).unwrap_err(),
        RingError::RoutingFailure { target: id(200) }
    );
    assert_eq!(
        node.find_successor_traced(id(200), 0).unwrap_err(),
        RingError::RoutingFailure { target: id(200) }
    );

    // budget 1 is spent on the forward to 60, which then has none left
    assert_eq!(
        node.find_successor_bounded(id(5), 1).unwrap_err(),
        RingError::RoutingFailure { target: id(5) }
    );

    // the same lookups succeed under the default budget
    assert_eq!(node.find_successor(id(200)).unwrap(), id(10));
    assert_eq!(node.find_successor(id(5)).unwrap(), id(10));
}

/// A crashed node's neighbors notice on their next direct call, fall back
/// through their finger tables, and close the ring without it. Keys that
/// lived on the crashed node are gone.
#[test]
fn test_ring_heals_after_crash() {
    let hasher = mapped_hasher(&[("k", 50)]);
    let manager = build_ring_with_hasher(8, &[10, 60, 200], hasher).unwrap();
    manager.run_stabilization_rounds(8);

    // key id 50 is owned by node 60
    assert_eq!(manager.put("k", "v").unwrap(), id(60));

    manager.fail_node(id(60)).unwrap();
    assert_eq!(manager.len(), 2);
    converge(&manager);

    let a = manager.node(id(10)).unwrap();
    let b = manager.node(id(200)).unwrap();
    assert_eq!(a.successor(), Some(id(200)));
    assert_eq!(a.predecessor(), Some(id(200)));
    assert_eq!(b.successor(), Some(id(10)));
    assert_eq!(b.predecessor(), Some(id(10)));

    // ownership of id 50 moved to 200, but the value died with 60
    assert_eq!(manager.lookup("k").unwrap(), id(200));
    assert_eq!(
        manager.get("k").unwrap_err(),
        RingError::NotFound {
            key: "k".to_string()
        }
    );
}

/// A node leaves after its predecessor has crashed: the failed neighbor
/// notification is logged and the leave still completes, with the keys
/// physically handed to the successor.
#[test]
fn test_leave_succeeds_with_crashed_predecessor() {
    let hasher = mapped_hasher(&[("k", 50)]);
    let manager = build_ring_with_hasher(8, &[10, 60, 200], hasher).unwrap();
    manager.run_stabilization_rounds(8);
    assert_eq!(manager.put("k", "v").unwrap(), id(60));

    manager.fail_node(id(10)).unwrap();
    manager.leave_node(id(60)).unwrap();

    assert!(manager.node(id(60)).is_none());
    assert_eq!(manager.len(), 1);
    let survivor = manager.node(id(200)).unwrap();
    assert_eq!(
        survivor.fetch(id(50)).unwrap(),
        Some(StoredEntry::new("k", "v"))
    );

    // the survivor's pointers still name the departed neighbors;
    // stabilization collapses it to a single-node ring and the key stays
    // reachable
    converge(&manager);
    assert_eq!(survivor.successor(), Some(id(200)));
    assert_eq!(manager.get("k").unwrap(), "v");
}

/// When the only other node crashes, the survivor collapses back to a
/// single-node ring and keeps serving; keys that lived on the crashed node
/// are gone, and new nodes can join through the survivor again.
#[test]
fn test_survivor_collapses_after_sole_peer_crash() {
    let hasher = mapped_hasher(&[("k", 50)]);
    let manager = build_ring_with_hasher(8, &[10, 60], hasher).unwrap();
    manager.run_stabilization_rounds(8);
    assert_eq!(manager.put("k", "v").unwrap(), id(60));

    manager.fail_node(id(60)).unwrap();
    manager.run_stabilization_rounds(2);

    let survivor = manager.node(id(10)).unwrap();
    assert_eq!(survivor.successor(), Some(id(10)));
    assert_eq!(survivor.predecessor(), Some(id(10)));
    assert_eq!(manager.lookup("k").unwrap(), id(10));
    assert_eq!(
        manager.get("k").unwrap_err(),
        RingError::NotFound {
            key: "k".to_string()
        }
    );

    // the collapsed ring accepts joins again
    manager.join_node(Some(id(200))).unwrap();
    converge(&manager);
    let joined = manager.node(id(200)).unwrap();
    assert_eq!(survivor.successor(), Some(id(200)));
    assert_eq!(joined.successor(), Some(id(10)));
}

/// Losing the successor while other members are still registered is a
/// partition, not a collapse: the node stays isolated and reports it.
#[test]
fn test_unreachable_successor_with_other_members_isolates() {
    let registry = Registry::new(test_space(8));
    let node = ChordNode::new(&span_fixture(), id(10), registry.clone());
    registry.register(node.clone()).unwrap();
    node.join(None).unwrap();

    // another live member this node has no finger to
    let other = Unimock::new(NodeMock::id.each_call(matching!()).returns(id(200)));
    registry.register(Arc::new(other)).unwrap();

    // successor pointer goes to a node that is already gone
    node.adopt_successor(id(99)).unwrap();
    node.stabilize().unwrap();

    assert_eq!(node.successor(), None);
    assert_eq!(
        node.find_successor(id(5)).unwrap_err(),
        RingError::RingPartitioned
    );
}

/// Failing a node that does not exist reports the peer as unreachable.
#[test]
fn test_fail_unknown_node() {
    let manager = build_ring_with_hasher(8, &[10], mapped_hasher(&[])).unwrap();
    let err = manager.fail_node(id(99)).unwrap_err();
    assert_eq!(err, RingError::UnreachablePeer { id: id(99) });
}
