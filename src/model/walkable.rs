//! Walkable: a subgraph with an explicit traversal order, and `walk()`,
//! which splices several walkables into one continuous traversal.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Add;

use tracing::trace;

use super::identity::hash_one;
use super::{Entity, Node, Relationship, Subgraph};
use crate::{Error, Result};

/// Anything that can be traversed from a start node to an end node.
pub trait Walk: fmt::Debug {
    /// The traversal: node, relationship, node, ..., node.
    fn sequence(&self) -> Vec<Entity>;

    fn start_node(&self) -> Node;

    fn end_node(&self) -> Node;

    /// Number of relationships traversed.
    fn len(&self) -> usize {
        self.sequence().len().saturating_sub(1) / 2
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concatenate walkables into one traversal sequence.
///
/// The first walkable is taken as is. Each following one must share an
/// endpoint with the running end node: it is appended forwards if its start
/// node matches, reversed if its end node matches, and fails with
/// `DisconnectedWalk` otherwise. The shared junction node is not repeated.
pub fn walk(walkables: &[&dyn Walk]) -> Result<Vec<Entity>> {
    let Some((first, rest)) = walkables.split_first() else {
        return Ok(Vec::new());
    };
    let mut sequence = first.sequence();
    let mut end_node = first.end_node();
    for walkable in rest {
        let next = walkable.sequence();
        if end_node == walkable.start_node() {
            end_node = walkable.end_node();
            sequence.extend(next.into_iter().skip(1));
        } else if end_node == walkable.end_node() {
            trace!(len = walkable.len(), "appending walkable in reverse");
            end_node = walkable.start_node();
            sequence.extend(next.into_iter().rev().skip(1));
        } else {
            return Err(Error::DisconnectedWalk {
                walkable: format!("{walkable:?}"),
                node: format!("{end_node:?}"),
            });
        }
    }
    Ok(sequence)
}

/// A subgraph plus a specific traversal order.
///
/// Unlike `Subgraph`, equality is order-sensitive: two walkables over the
/// same entities in a different order are different.
#[derive(Clone)]
pub struct Walkable {
    sequence: Vec<Entity>,
    subgraph: Subgraph,
}

impl Walkable {
    /// Build from an alternating node/relationship sequence.
    ///
    /// The sequence must have odd length, hold nodes at even positions and
    /// relationships at odd ones, and every relationship must connect its
    /// two neighbours (in either direction).
    pub fn new(sequence: impl IntoIterator<Item = Entity>) -> Result<Self> {
        let sequence: Vec<Entity> = sequence.into_iter().collect();
        if sequence.len() % 2 == 0 {
            return Err(Error::InvalidArgument(format!(
                "walkable sequence must have odd length, got {}",
                sequence.len()
            )));
        }
        let mut nodes = Vec::with_capacity(sequence.len() / 2 + 1);
        let mut relationships = Vec::with_capacity(sequence.len() / 2);
        for (i, entity) in sequence.iter().enumerate() {
            match (i % 2, entity) {
                (0, Entity::Node(node)) => nodes.push(node.clone()),
                (1, Entity::Relationship(rel)) => {
                    let (Some(Entity::Node(prev)), Some(Entity::Node(next))) =
                        (sequence.get(i - 1), sequence.get(i + 1))
                    else {
                        return Err(Error::InvalidArgument(format!(
                            "relationship at position {i} is not between two nodes"
                        )));
                    };
                    let (start, end) = (rel.start_node(), rel.end_node());
                    let forward = start == *prev && end == *next;
                    let backward = start == *next && end == *prev;
                    if !forward && !backward {
                        return Err(Error::InvalidArgument(format!(
                            "relationship at position {i} does not connect its neighbours"
                        )));
                    }
                    relationships.push(rel.clone());
                }
                (_, entity) => {
                    let expected = if i % 2 == 0 { "node" } else { "relationship" };
                    return Err(Error::InvalidArgument(format!(
                        "expected {expected} at position {i}, got {}",
                        if entity.is_node() { "node" } else { "relationship" }
                    )));
                }
            }
        }
        let subgraph = Subgraph::new(nodes, relationships)?;
        Ok(Self { sequence, subgraph })
    }

    /// Walk the arguments in turn and collect the result.
    pub fn from_walk(walkables: &[&dyn Walk]) -> Result<Self> {
        Self::new(walk(walkables)?)
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        (self.sequence.len() - 1) / 2
    }

    /// True when the walkable is a single node.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start_node(&self) -> Node {
        self.node_at(0)
    }

    pub fn end_node(&self) -> Node {
        self.node_at(self.sequence.len() - 1)
    }

    fn node_at(&self, position: usize) -> Node {
        match &self.sequence[position] {
            Entity::Node(node) => node.clone(),
            Entity::Relationship(_) => unreachable!("nodes sit at even positions"),
        }
    }

    pub fn as_sequence(&self) -> &[Entity] {
        &self.sequence
    }

    /// Nodes in traversal order. A node visited twice appears twice.
    pub fn nodes(&self) -> Vec<Node> {
        self.sequence.iter().filter_map(Entity::as_node).cloned().collect()
    }

    /// Relationships in traversal order.
    pub fn relationships(&self) -> Vec<Relationship> {
        self.sequence.iter().filter_map(Entity::as_relationship).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.sequence.iter().filter_map(Entity::as_relationship)
    }

    /// The unordered view of this walkable.
    pub fn as_subgraph(&self) -> &Subgraph {
        &self.subgraph
    }

    /// Relationship by position; negative indices count from the end.
    pub fn get(&self, index: isize) -> Option<Relationship> {
        let len = self.sequence.len() as isize;
        let position = if index < 0 {
            index.checked_mul(2)?.checked_add(len)?
        } else {
            index.checked_mul(2)?.checked_add(1)?
        };
        if !(0..len).contains(&position) {
            return None;
        }
        self.sequence[position as usize].as_relationship().cloned()
    }

    /// Sub-walk over relationship positions `start..stop`, keeping the nodes
    /// on either side. Negative bounds count from the end; an empty result
    /// fails with `InvalidArgument`.
    pub fn slice(&self, start: Option<isize>, stop: Option<isize>) -> Result<Walkable> {
        let rels = self.len() as isize;
        let seq_len = self.sequence.len() as isize;
        // relationship bound to sequence position, saturating out of range
        let position = |s: isize, offset: isize| -> usize {
            let s = if s < 0 { s.saturating_add(rels) } else { s };
            let i = s.saturating_mul(2).saturating_add(offset);
            let i = if i < 0 { i.saturating_add(seq_len) } else { i };
            i.clamp(0, seq_len) as usize
        };
        let from = start.map_or(0, |s| position(s, 0));
        let to = stop.map_or(seq_len as usize, |s| position(s, 1));
        if from >= to {
            return Err(Error::InvalidArgument("slice of walkable is empty".into()));
        }
        Walkable::new(self.sequence[from..to].iter().cloned())
    }

    /// Splice `other` onto the end of this walkable; `None` is a no-op.
    pub fn concat(&self, other: Option<&dyn Walk>) -> Result<Walkable> {
        match other {
            None => Ok(self.clone()),
            Some(other) => Walkable::from_walk(&[self, other]),
        }
    }
}

impl Walk for Walkable {
    fn sequence(&self) -> Vec<Entity> {
        self.sequence.clone()
    }

    fn start_node(&self) -> Node {
        Walkable::start_node(self)
    }

    fn end_node(&self) -> Node {
        Walkable::end_node(self)
    }

    fn len(&self) -> usize {
        Walkable::len(self)
    }
}

impl Add for &Walkable {
    type Output = Result<Walkable>;

    fn add(self, other: Self) -> Result<Walkable> {
        self.concat(Some(other))
    }
}

impl PartialEq for Walkable {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for Walkable {}

impl Hash for Walkable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.sequence.iter().fold(0, |acc, e| acc ^ hash_one(e)));
    }
}

impl fmt::Debug for Walkable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sequence.iter()).finish()
    }
}

impl From<Node> for Walkable {
    fn from(node: Node) -> Self {
        let subgraph = Subgraph::from(&node);
        Self { sequence: vec![Entity::Node(node)], subgraph }
    }
}

impl From<Relationship> for Walkable {
    fn from(rel: Relationship) -> Self {
        let subgraph = Subgraph::from(&rel);
        Self { sequence: rel.sequence(), subgraph }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain() -> (Vec<Node>, Vec<Relationship>) {
        let nodes: Vec<Node> = (0..4).map(|i| Node::empty().with_property("i", i)).collect();
        let rels = vec![
            Relationship::typed(nodes[0].clone(), "A", nodes[1].clone()),
            Relationship::typed(nodes[1].clone(), "B", nodes[2].clone()),
            Relationship::typed(nodes[2].clone(), "C", nodes[3].clone()),
        ];
        (nodes, rels)
    }

    fn chain_walkable(rels: &[Relationship]) -> Walkable {
        let parts: Vec<&dyn Walk> = rels.iter().map(|r| r as &dyn Walk).collect();
        Walkable::from_walk(&parts).unwrap()
    }

    #[test]
    fn test_walk_skips_junction() {
        let w = chain_walkable(&chain().1);
        assert_eq!(w.len(), 3);
        assert_eq!(w.nodes().len(), 4);
        assert_eq!(w.as_subgraph().order(), 4);
    }

    #[test]
    fn test_walk_reverses_on_end_match() {
        let a = Node::empty();
        let b = Node::empty();
        let c = Node::empty();
        let ab = Relationship::typed(a.clone(), "X", b.clone());
        let cb = Relationship::typed(c.clone(), "Y", b.clone());
        let seq = walk(&[&ab, &cb]).unwrap();
        assert_eq!(
            seq,
            vec![
                Entity::from(a),
                Entity::from(ab),
                Entity::from(b),
                Entity::from(cb),
                Entity::from(c.clone()),
            ]
        );
        let w = Walkable::new(seq).unwrap();
        assert_eq!(w.end_node(), c);
    }

    #[test]
    fn test_walk_disconnected() {
        let ab = Relationship::between(Node::empty(), Node::empty());
        let cd = Relationship::between(Node::empty(), Node::empty());
        let err = walk(&[&ab, &cd]).unwrap_err();
        assert!(matches!(err, Error::DisconnectedWalk { .. }));
    }

    #[test]
    fn test_walk_nothing() {
        assert!(walk(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_malformed_sequences() {
        let a = Node::empty();
        let b = Node::empty();
        let r = Relationship::between(a.clone(), b.clone());
        assert!(Walkable::new(Vec::new()).is_err());
        assert!(Walkable::new(vec![Entity::from(a.clone()), Entity::from(r.clone())]).is_err());
        assert!(Walkable::new(vec![
            Entity::from(r.clone()),
            Entity::from(a.clone()),
            Entity::from(r.clone()),
        ])
        .is_err());
        // relationship does not touch its neighbours
        let c = Node::empty();
        assert!(Walkable::new(vec![
            Entity::from(a.clone()),
            Entity::from(r.clone()),
            Entity::from(c),
        ])
        .is_err());
        // traversed backwards is fine
        assert!(Walkable::new(vec![Entity::from(b), Entity::from(r), Entity::from(a)]).is_ok());
    }

    #[test]
    fn test_indexing() {
        let (_, rels) = chain();
        let w = chain_walkable(&rels);
        assert_eq!(w.get(0), Some(rels[0].clone()));
        assert_eq!(w.get(2), Some(rels[2].clone()));
        assert_eq!(w.get(3), None);
        assert_eq!(w.get(-1), Some(rels[2].clone()));
        assert_eq!(w.get(-3), Some(rels[0].clone()));
        assert_eq!(w.get(-4), None);
    }

    #[test]
    fn test_extreme_bounds() {
        let (_, rels) = chain();
        let w = chain_walkable(&rels);
        assert_eq!(w.get(isize::MAX), None);
        assert_eq!(w.get(isize::MIN), None);
        assert_eq!(w.get(isize::MAX / 2), None);

        assert!(w.slice(Some(isize::MAX / 2 + 1), None).is_err());
        assert!(w.slice(None, Some(isize::MIN)).is_err());
        let all = w.slice(Some(isize::MIN), Some(isize::MAX)).unwrap();
        assert_eq!(all.relationships(), rels.to_vec());
    }

    #[test]
    fn test_slicing() {
        let (nodes, rels) = chain();
        let w = chain_walkable(&rels);

        let s = w.slice(Some(1), None).unwrap();
        assert_eq!(s.relationships(), rels[1..].to_vec());
        assert_eq!(s.start_node(), nodes[1]);

        let s = w.slice(None, Some(-1)).unwrap();
        assert_eq!(s.relationships(), rels[..2].to_vec());
        assert_eq!(s.end_node(), nodes[2]);

        let s = w.slice(Some(1), Some(2)).unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.get(0), Some(rels[1].clone()));

        assert!(w.slice(Some(2), Some(1)).is_err());
        assert!(w.slice(Some(5), None).is_err());
    }

    #[test]
    fn test_order_sensitive_equality() {
        let a = Node::empty();
        let b = Node::empty();
        let c = Node::empty();
        let x = Relationship::typed(a.clone(), "X", b.clone());
        let y = Relationship::typed(b.clone(), "Y", c.clone());
        let forward = Walkable::from_walk(&[&x, &y]).unwrap();
        let backward = Walkable::new(vec![
            Entity::from(c),
            Entity::from(y),
            Entity::from(b),
            Entity::from(x),
            Entity::from(a),
        ])
        .unwrap();
        assert_ne!(forward, backward);
        assert_eq!(forward.as_subgraph(), backward.as_subgraph());
    }

    #[test]
    fn test_concat() {
        let (nodes, rels) = chain();
        let head = Walkable::from(rels[0].clone());
        let tail = Walkable::from(rels[1].clone());
        let joined = (&head + &tail).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.end_node(), nodes[2]);
        assert_eq!(head.concat(None).unwrap(), head);
    }

    #[test]
    fn test_rewalk_round_trip() {
        let w = chain_walkable(&chain().1);
        let again = Walkable::new(walk(&[&w]).unwrap()).unwrap();
        assert_eq!(again, w);
        assert_eq!(hash_one(&again), hash_one(&w));
    }
}
