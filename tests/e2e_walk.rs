//! End-to-end tests for walking: splicing, reversal, indexing and slicing.

use neo4j_data::{walk, Entity, Error, Node, Relationship, Walk, Walkable};
use pretty_assertions::assert_eq;

// ============================================================================
// Helper: a -X-> b -Y-> c -Z-> d
// ============================================================================

fn chain() -> (Vec<Node>, Vec<Relationship>) {
    let nodes: Vec<Node> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| Node::empty().with_property("name", *name))
        .collect();
    let rels = vec![
        Relationship::typed(nodes[0].clone(), "X", nodes[1].clone()),
        Relationship::typed(nodes[1].clone(), "Y", nodes[2].clone()),
        Relationship::typed(nodes[2].clone(), "Z", nodes[3].clone()),
    ];
    (nodes, rels)
}

fn full_walk(rels: &[Relationship]) -> Walkable {
    Walkable::from_walk(&[&rels[0], &rels[1], &rels[2]]).unwrap()
}

// ============================================================================
// 1. walk()
// ============================================================================

#[test]
fn test_walk_skips_junction_nodes() {
    let (nodes, rels) = chain();
    let sequence = walk(&[&rels[0], &rels[1]]).unwrap();
    assert_eq!(
        sequence,
        vec![
            Entity::from(nodes[0].clone()),
            Entity::from(rels[0].clone()),
            Entity::from(nodes[1].clone()),
            Entity::from(rels[1].clone()),
            Entity::from(nodes[2].clone()),
        ]
    );
}

#[test]
fn test_walk_reverses_backwards_pieces() {
    let (nodes, rels) = chain();
    // c <-Y- b, then b <-X- a: both appended in reverse
    let sequence = walk(&[&nodes[2], &rels[1], &rels[0]]).unwrap();
    let w = Walkable::new(sequence).unwrap();
    assert_eq!(w.nodes(), vec![nodes[2].clone(), nodes[1].clone(), nodes[0].clone()]);
    assert_eq!(w.relationships(), vec![rels[1].clone(), rels[0].clone()]);
}

#[test]
fn test_walk_of_nothing_is_empty() {
    assert!(walk(&[]).unwrap().is_empty());
}

#[test]
fn test_walk_disconnected() {
    let (_, rels) = chain();
    let err = walk(&[&rels[0], &rels[2]]).unwrap_err();
    assert!(matches!(err, Error::DisconnectedWalk { .. }));
}

#[test]
fn test_walk_node_onto_itself() {
    let (nodes, _) = chain();
    let sequence = walk(&[&nodes[0], &nodes[0]]).unwrap();
    assert_eq!(sequence, vec![Entity::from(nodes[0].clone())]);
}

// ============================================================================
// 2. Walkable
// ============================================================================

#[test]
fn test_walkable_endpoints_and_length() {
    let (nodes, rels) = chain();
    let w = full_walk(&rels);
    assert_eq!(w.len(), 3);
    assert_eq!(w.start_node(), nodes[0]);
    assert_eq!(w.end_node(), nodes[3]);
    assert_eq!(w.as_subgraph().order(), 4);
}

#[test]
fn test_walkable_rejects_malformed_sequences() {
    let (nodes, rels) = chain();
    let even = Walkable::new([Entity::from(nodes[0].clone()), Entity::from(rels[0].clone())]);
    assert!(matches!(even, Err(Error::InvalidArgument(_))));

    let misplaced = Walkable::new([
        Entity::from(rels[0].clone()),
        Entity::from(nodes[1].clone()),
        Entity::from(rels[1].clone()),
    ]);
    assert!(matches!(misplaced, Err(Error::InvalidArgument(_))));

    let unconnected = Walkable::new([
        Entity::from(nodes[0].clone()),
        Entity::from(rels[2].clone()),
        Entity::from(nodes[1].clone()),
    ]);
    assert!(matches!(unconnected, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_indexing() {
    let (_, rels) = chain();
    let w = full_walk(&rels);
    assert_eq!(w.get(0), Some(rels[0].clone()));
    assert_eq!(w.get(2), Some(rels[2].clone()));
    assert_eq!(w.get(3), None);
    assert_eq!(w.get(-1), Some(rels[2].clone()));
    assert_eq!(w.get(-3), Some(rels[0].clone()));
    assert_eq!(w.get(-4), None);
}

#[test]
fn test_slicing() {
    let (nodes, rels) = chain();
    let w = full_walk(&rels);

    let middle = w.slice(Some(1), Some(2)).unwrap();
    assert_eq!(middle.relationships(), vec![rels[1].clone()]);
    assert_eq!(middle.start_node(), nodes[1]);
    assert_eq!(middle.end_node(), nodes[2]);

    let tail = w.slice(Some(-2), None).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail.start_node(), nodes[1]);

    assert_eq!(w.slice(None, None).unwrap(), w);
    // an empty relationship range still keeps the node in between
    assert_eq!(w.slice(Some(2), Some(2)).unwrap().nodes(), vec![nodes[2].clone()]);
    assert!(matches!(w.slice(Some(3), Some(1)), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_concat() {
    let (_, rels) = chain();
    let head = Walkable::from(rels[0].clone());
    let tail = Walkable::from_walk(&[&rels[1], &rels[2]]).unwrap();
    assert_eq!((&head + &tail).unwrap(), full_walk(&rels));
    assert_eq!(head.concat(None).unwrap(), head);
    assert!(matches!(&head + &Walkable::from(rels[2].clone()), Err(Error::DisconnectedWalk { .. })));
}

#[test]
fn test_order_matters_for_equality() {
    let (nodes, rels) = chain();
    let forward = Walkable::from_walk(&[&rels[0], &rels[1]]).unwrap();
    let backward = Walkable::from_walk(&[&nodes[2], &rels[1], &rels[0]]).unwrap();
    assert_eq!(forward.as_subgraph(), backward.as_subgraph());
    assert_ne!(forward, backward);
}

#[test]
fn test_rebuilding_from_walk_is_identity() {
    let (_, rels) = chain();
    let w = full_walk(&rels);
    assert_eq!(Walkable::new(walk(&[&w]).unwrap()).unwrap(), w);
    assert_eq!(w.sequence().len(), 7);
}
