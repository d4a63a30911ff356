//! Subgraph: an unordered, deduplicated collection of nodes and
//! relationships, closed under relationship endpoints.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, BitXor, Sub};

use hashbrown::HashSet;
use tracing::debug;

use super::identity::hash_one;
use super::{Node, Relationship};
use crate::tx::{Transaction, TxMode};
use crate::{Error, Result};

/// Arbitrary, unordered collection of nodes and relationships.
///
/// Every endpoint of every relationship is a member node, and there is
/// always at least one node. All set operations return new subgraphs.
///
/// Binding a node or relationship changes its hash, so the stored sets may
/// be keyed on stale hashes. Lookups always go through sets rebuilt from
/// iteration, never through the stored ones.
#[derive(Clone)]
pub struct Subgraph {
    nodes: HashSet<Node>,
    relationships: HashSet<Relationship>,
}

impl Subgraph {
    /// Build a subgraph, adding the endpoints of every relationship to the
    /// node set. Fails with `InvalidArgument` if no node results.
    pub fn new(
        nodes: impl IntoIterator<Item = Node>,
        relationships: impl IntoIterator<Item = Relationship>,
    ) -> Result<Self> {
        let relationships: HashSet<Relationship> = relationships.into_iter().collect();
        let mut nodes: HashSet<Node> = nodes.into_iter().collect();
        for rel in &relationships {
            nodes.extend(rel.nodes());
        }
        if nodes.is_empty() {
            return Err(Error::InvalidArgument(
                "Subgraphs must contain at least one node".into(),
            ));
        }
        Ok(Self { nodes, relationships })
    }

    /// Caller guarantees closure and a non-empty node set.
    pub(crate) fn from_parts(nodes: HashSet<Node>, relationships: HashSet<Relationship>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes, relationships }
    }

    /// Number of unique nodes.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Number of unique relationships.
    pub fn size(&self) -> usize {
        self.relationships.len()
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    /// A subgraph without relationships is empty, however many nodes it has.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Member nodes, re-keyed on their current hashes.
    pub fn nodes(&self) -> HashSet<Node> {
        self.nodes.iter().cloned().collect()
    }

    /// Member relationships, re-keyed on their current hashes.
    pub fn relationships(&self) -> HashSet<Relationship> {
        self.relationships.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Union of all node labels. Refreshes stale nodes.
    pub fn labels(&self) -> Result<HashSet<String>> {
        let mut labels = HashSet::new();
        for node in &self.nodes {
            labels.extend(node.labels()?);
        }
        Ok(labels)
    }

    /// Set of relationship type names present.
    pub fn types(&self) -> HashSet<String> {
        self.relationships.iter().map(|r| r.type_name().to_owned()).collect()
    }

    /// Union of all property keys across nodes and relationships.
    pub fn keys(&self) -> Result<HashSet<String>> {
        let mut keys = HashSet::new();
        for node in &self.nodes {
            keys.extend(node.keys()?);
        }
        for rel in &self.relationships {
            keys.extend(rel.keys());
        }
        Ok(keys)
    }

    // ========================================================================
    // Set algebra
    // ========================================================================

    pub fn union(&self, other: &Subgraph) -> Subgraph {
        let mut nodes = self.nodes();
        nodes.extend(other.nodes.iter().cloned());
        let mut relationships = self.relationships();
        relationships.extend(other.relationships.iter().cloned());
        Subgraph::from_parts(nodes, relationships)
    }

    pub fn intersection(&self, other: &Subgraph) -> Result<Subgraph> {
        let (nodes, relationships) = (other.nodes(), other.relationships());
        Subgraph::new(
            self.nodes.iter().filter(|n| nodes.contains(*n)).cloned(),
            self.relationships.iter().filter(|r| relationships.contains(*r)).cloned(),
        )
    }

    /// Relationships of `self` not in `other`, plus the nodes of `self` not
    /// in `other` and the endpoints of the surviving relationships.
    pub fn difference(&self, other: &Subgraph) -> Result<Subgraph> {
        let (nodes, relationships) = (other.nodes(), other.relationships());
        Subgraph::new(
            self.nodes.iter().filter(|n| !nodes.contains(*n)).cloned(),
            self.relationships.iter().filter(|r| !relationships.contains(*r)).cloned(),
        )
    }

    pub fn symmetric_difference(&self, other: &Subgraph) -> Result<Subgraph> {
        let (mut nodes, mut relationships) = (self.nodes(), self.relationships());
        for node in &other.nodes {
            if !nodes.remove(node) {
                nodes.insert(node.clone());
            }
        }
        for rel in &other.relationships {
            if !relationships.remove(rel) {
                relationships.insert(rel.clone());
            }
        }
        Subgraph::new(nodes, relationships)
    }

    // ========================================================================
    // Persistence hooks (forwarded to the transaction)
    // ========================================================================

    fn require_write(tx: &dyn Transaction, operation: &str) -> Result<()> {
        if tx.mode() == TxMode::ReadOnly {
            return Err(Error::TxError(format!(
                "cannot {operation} in read-only transaction {}",
                tx.id().0
            )));
        }
        Ok(())
    }

    pub fn create(&self, tx: &mut dyn Transaction) -> Result<()> {
        Self::require_write(tx, "create")?;
        debug!(tx = tx.id().0, order = self.order(), size = self.size(), "create subgraph");
        tx.create(self)
    }

    pub fn delete(&self, tx: &mut dyn Transaction) -> Result<()> {
        Self::require_write(tx, "delete")?;
        debug!(tx = tx.id().0, order = self.order(), size = self.size(), "delete subgraph");
        tx.delete(self)
    }

    pub fn merge(
        &self,
        tx: &mut dyn Transaction,
        primary_label: Option<&str>,
        primary_key: Option<&str>,
    ) -> Result<()> {
        Self::require_write(tx, "merge")?;
        debug!(tx = tx.id().0, ?primary_label, ?primary_key, "merge subgraph");
        tx.merge(self, primary_label, primary_key)
    }

    pub fn pull(&self, tx: &mut dyn Transaction) -> Result<()> {
        debug!(tx = tx.id().0, order = self.order(), size = self.size(), "pull subgraph");
        tx.pull(self)
    }

    pub fn push(&self, tx: &mut dyn Transaction) -> Result<()> {
        Self::require_write(tx, "push")?;
        debug!(tx = tx.id().0, order = self.order(), size = self.size(), "push subgraph");
        tx.push(self)
    }

    pub fn separate(&self, tx: &mut dyn Transaction) -> Result<()> {
        Self::require_write(tx, "separate")?;
        debug!(tx = tx.id().0, size = self.size(), "separate subgraph");
        tx.separate(self)
    }
}

// ============================================================================
// Operators
// ============================================================================

impl BitOr for &Subgraph {
    type Output = Subgraph;
    fn bitor(self, other: Self) -> Subgraph {
        self.union(other)
    }
}

impl BitAnd for &Subgraph {
    type Output = Result<Subgraph>;
    fn bitand(self, other: Self) -> Result<Subgraph> {
        self.intersection(other)
    }
}

impl Sub for &Subgraph {
    type Output = Result<Subgraph>;
    fn sub(self, other: Self) -> Result<Subgraph> {
        self.difference(other)
    }
}

impl BitXor for &Subgraph {
    type Output = Result<Subgraph>;
    fn bitxor(self, other: Self) -> Result<Subgraph> {
        self.symmetric_difference(other)
    }
}

// ============================================================================
// Equality, hashing, formatting
// ============================================================================

impl PartialEq for Subgraph {
    fn eq(&self, other: &Self) -> bool {
        self.order() == other.order()
            && self.size() == other.size()
            && self.nodes() == other.nodes()
            && self.relationships() == other.relationships()
    }
}

impl Eq for Subgraph {}

impl Hash for Subgraph {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let nodes = self.nodes.iter().fold(0, |acc, n| acc ^ hash_one(n));
        let value = self.relationships.iter().fold(nodes, |acc, r| acc ^ hash_one(r));
        state.write_u64(value);
    }
}

impl fmt::Debug for Subgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subgraph")
            .field("order", &self.order())
            .field("size", &self.size())
            .field("types", &self.types())
            .finish()
    }
}

impl<'a> IntoIterator for &'a Subgraph {
    type Item = &'a Relationship;
    type IntoIter = hashbrown::hash_set::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.relationships.iter()
    }
}
