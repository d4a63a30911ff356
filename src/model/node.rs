//! Node in the property graph.
//!
//! A `Node` is a shared handle: cloning it yields another reference to the
//! same vertex, so the same node can sit in many subgraphs and paths.
//! Labels and properties are cached locally and may be marked stale by the
//! owning graph, in which case the next read refreshes them first.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use hashbrown::HashSet;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::entity::display_name;
use super::identity::{Binding, GraphRef, NodeId, Token};
use super::walkable::Walk;
use super::{Entity, PropertyDict, PropertyMap, Subgraph, Value};
use crate::{Error, Result};

/// Field group of a node that can go stale independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaleField {
    Labels,
    Properties,
}

#[derive(Debug, Clone, Copy, Default)]
struct Stale {
    labels: bool,
    properties: bool,
}

impl Stale {
    fn get(&self, field: StaleField) -> bool {
        match field {
            StaleField::Labels => self.labels,
            StaleField::Properties => self.properties,
        }
    }

    fn set(&mut self, field: StaleField, value: bool) {
        match field {
            StaleField::Labels => self.labels = value,
            StaleField::Properties => self.properties = value,
        }
    }
}

struct NodeInner {
    token: Token,
    binding: RwLock<Binding<NodeId>>,
    labels: RwLock<HashSet<String>>,
    properties: RwLock<PropertyDict>,
    stale: RwLock<Stale>,
}

/// A labeled vertex of the property graph.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    pub fn new<L, K, V>(
        labels: impl IntoIterator<Item = L>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        L: Into<String>,
        K: Into<String>,
        V: Into<Value>,
    {
        let token = Token::generate();
        Node(Arc::new(NodeInner {
            binding: RwLock::new(Binding::Unbound(token.clone())),
            token,
            labels: RwLock::new(labels.into_iter().map(Into::into).collect()),
            properties: RwLock::new(properties.into_iter().collect()),
            stale: RwLock::new(Stale::default()),
        }))
    }

    /// A node with no labels and no properties.
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new(), PropertyMap::new())
    }

    pub fn with_labels(self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        *self.0.labels.write() = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.properties.write().set(key, value);
        self
    }

    /// Cast an arbitrary value to a node.
    ///
    /// Nodes pass through and `Null` yields `None`. A map is merged in as
    /// properties, a string is added as a label, and a list applies each of
    /// its items in turn. Anything else fails with `TypeCoercion`.
    pub fn cast(obj: impl Into<NodeCast>) -> Result<Option<Node>> {
        match obj.into() {
            NodeCast::Node(node) => Ok(Some(node)),
            NodeCast::Value(Value::Null) => Ok(None),
            NodeCast::Value(value) => {
                let node = Node::empty();
                node.apply_cast(&value, &value)?;
                Ok(Some(node))
            }
        }
    }

    fn apply_cast(&self, x: &Value, original: &Value) -> Result<()> {
        match x {
            Value::Map(map) => {
                self.0.properties.write().update(map.clone());
                Ok(())
            }
            Value::List(items) => {
                for item in items {
                    self.apply_cast(item, original)?;
                }
                Ok(())
            }
            Value::String(label) => {
                self.0.labels.write().insert(label.clone());
                Ok(())
            }
            _ => Err(Error::TypeCoercion {
                from: original.type_name().into(),
                to: "Node".into(),
            }),
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn token(&self) -> &Token {
        &self.0.token
    }

    pub fn binding(&self) -> Binding<NodeId> {
        self.0.binding.read().clone()
    }

    pub fn identity(&self) -> Option<NodeId> {
        self.0.binding.read().identity()
    }

    pub fn graph(&self) -> Option<GraphRef> {
        self.0.binding.read().graph().cloned()
    }

    pub fn is_bound(&self) -> bool {
        self.0.binding.read().is_bound()
    }

    /// Bind this node to a remote counterpart. From here on equality and
    /// hashing use `graph` + `identity`.
    pub fn bind(&self, graph: GraphRef, identity: NodeId) {
        trace!(token = %self.0.token, %identity, "binding node");
        *self.0.binding.write() = Binding::Bound { graph, identity };
    }

    /// Drop the remote binding; the node is known by its token again.
    pub fn unbind(&self) {
        *self.0.binding.write() = Binding::Unbound(self.0.token.clone());
        *self.0.stale.write() = Stale::default();
    }

    /// Whether both handles point at the same in-memory node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // ========================================================================
    // Staleness
    // ========================================================================

    /// Mark a field group as needing a refresh from the owning graph.
    pub fn mark_stale(&self, field: StaleField) {
        self.0.stale.write().set(field, true);
    }

    pub fn is_stale(&self, field: StaleField) -> bool {
        self.0.stale.read().get(field)
    }

    /// Pull from the owning graph if `field` is stale and the node is bound.
    /// The flag is cleared only once the pull has succeeded.
    fn ensure_fresh(&self, field: StaleField) -> Result<()> {
        if !self.is_stale(field) {
            return Ok(());
        }
        let Some(graph) = self.graph() else {
            return Ok(());
        };
        debug!(token = %self.0.token, ?field, "pulling stale node");
        graph.upgrade()?.pull(self)?;
        self.0.stale.write().set(field, false);
        Ok(())
    }

    /// Replace the local caches with state fetched from the remote graph.
    /// Called by `RemoteGraph::pull` implementations.
    pub fn refresh(&self, labels: impl IntoIterator<Item = String>, properties: PropertyMap) {
        *self.0.labels.write() = labels.into_iter().collect();
        *self.0.properties.write() = PropertyDict::from(properties);
        *self.0.stale.write() = Stale::default();
    }

    /// Local labels, without refreshing.
    pub fn cached_labels(&self) -> HashSet<String> {
        self.0.labels.read().clone()
    }

    /// Local properties, without refreshing.
    pub fn cached_properties(&self) -> PropertyDict {
        self.0.properties.read().clone()
    }

    // ========================================================================
    // Labels
    // ========================================================================

    pub fn labels(&self) -> Result<HashSet<String>> {
        self.ensure_fresh(StaleField::Labels)?;
        Ok(self.cached_labels())
    }

    pub fn has_label(&self, label: &str) -> Result<bool> {
        self.ensure_fresh(StaleField::Labels)?;
        Ok(self.0.labels.read().contains(label))
    }

    pub fn add_label(&self, label: impl Into<String>) -> Result<()> {
        self.ensure_fresh(StaleField::Labels)?;
        self.0.labels.write().insert(label.into());
        Ok(())
    }

    pub fn remove_label(&self, label: &str) -> Result<()> {
        self.ensure_fresh(StaleField::Labels)?;
        self.0.labels.write().remove(label);
        Ok(())
    }

    pub fn clear_labels(&self) -> Result<()> {
        self.ensure_fresh(StaleField::Labels)?;
        self.0.labels.write().clear();
        Ok(())
    }

    pub fn update_labels(&self, labels: impl IntoIterator<Item = impl Into<String>>) -> Result<()> {
        self.ensure_fresh(StaleField::Labels)?;
        self.0.labels.write().extend(labels.into_iter().map(Into::into));
        Ok(())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn get(&self, key: &str) -> Result<Value> {
        self.ensure_fresh(StaleField::Properties)?;
        Ok(self.0.properties.read().get(key))
    }

    pub fn properties(&self) -> Result<PropertyDict> {
        self.ensure_fresh(StaleField::Properties)?;
        Ok(self.cached_properties())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.ensure_fresh(StaleField::Properties)?;
        Ok(self.0.properties.read().keys().cloned().collect())
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.ensure_fresh(StaleField::Properties)?;
        self.0.properties.write().set(key, value);
        Ok(())
    }

    pub fn update_properties<K, V>(&self, properties: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.ensure_fresh(StaleField::Properties)?;
        self.0.properties.write().update(properties);
        Ok(())
    }

    pub fn remove_property(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_fresh(StaleField::Properties)?;
        Ok(self.0.properties.write().remove(key))
    }

    /// Display name: `__name__`, then `name`, then `_<identity>`, else empty.
    pub fn name(&self) -> Result<String> {
        let properties = self.properties()?;
        Ok(display_name(&properties, self.identity().map(|id| id.to_string())))
    }
}

// ============================================================================
// Equality, hashing, formatting
// ============================================================================

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.0.binding.read() == *other.0.binding.read()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.binding.read().stable_hash());
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels: Vec<String> = self.cached_labels().into_iter().collect();
        labels.sort();
        f.debug_struct("Node")
            .field("labels", &labels)
            .field("properties", &self.cached_properties().to_map())
            .field("identity", &self.identity())
            .finish()
    }
}

// ============================================================================
// Walk / Subgraph views
// ============================================================================

impl Walk for Node {
    fn sequence(&self) -> Vec<Entity> {
        vec![Entity::Node(self.clone())]
    }

    fn start_node(&self) -> Node {
        self.clone()
    }

    fn end_node(&self) -> Node {
        self.clone()
    }
}

impl From<&Node> for Subgraph {
    fn from(node: &Node) -> Self {
        Subgraph::from_parts(std::iter::once(node.clone()).collect(), HashSet::new())
    }
}

// ============================================================================
// NodeCast
// ============================================================================

/// Input accepted by `Node::cast`.
#[derive(Debug, Clone)]
pub enum NodeCast {
    Node(Node),
    Value(Value),
}

impl From<Node> for NodeCast {
    fn from(node: Node) -> Self { NodeCast::Node(node) }
}

impl From<Option<Node>> for NodeCast {
    fn from(node: Option<Node>) -> Self {
        node.map(NodeCast::Node).unwrap_or(NodeCast::Value(Value::Null))
    }
}

impl From<Value> for NodeCast {
    fn from(value: Value) -> Self { NodeCast::Value(value) }
}

impl From<&str> for NodeCast {
    fn from(label: &str) -> Self { NodeCast::Value(Value::from(label)) }
}

impl From<String> for NodeCast {
    fn from(label: String) -> Self { NodeCast::Value(Value::String(label)) }
}

impl From<PropertyMap> for NodeCast {
    fn from(properties: PropertyMap) -> Self { NodeCast::Value(Value::Map(properties)) }
}

impl From<serde_json::Value> for NodeCast {
    fn from(value: serde_json::Value) -> Self { NodeCast::Value(Value::from(value)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unbound_nodes_equal_only_to_themselves() {
        let a = Node::new(["Person"], [("name", "Alice")]);
        let b = Node::new(["Person"], [("name", "Alice")]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_cast_passthrough_and_null() {
        let a = Node::empty();
        let cast = Node::cast(a.clone()).unwrap().unwrap();
        assert!(cast.ptr_eq(&a));
        assert!(Node::cast(Value::Null).unwrap().is_none());
    }

    #[test]
    fn test_cast_nested_collection() {
        let node = Node::cast(json!(["Person", ["Employee", {"name": "Alice"}], {"age": 33}]))
            .unwrap()
            .unwrap();
        let labels = node.labels().unwrap();
        assert!(labels.contains("Person"));
        assert!(labels.contains("Employee"));
        assert_eq!(node.get("name").unwrap(), Value::from("Alice"));
        assert_eq!(node.get("age").unwrap(), Value::Int(33));
    }

    #[test]
    fn test_cast_rejects_scalars() {
        let err = Node::cast(json!(42)).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
        let err = Node::cast(json!(["Person", true])).unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { .. }));
    }

    #[test]
    fn test_label_mutation() {
        let node = Node::new(["A"], PropertyMap::new());
        node.add_label("B").unwrap();
        node.update_labels(["C", "D"]).unwrap();
        node.remove_label("A").unwrap();
        assert!(!node.has_label("A").unwrap());
        assert_eq!(node.labels().unwrap().len(), 3);
        node.clear_labels().unwrap();
        assert!(node.labels().unwrap().is_empty());
    }

    #[test]
    fn test_stale_unbound_node_reads_locally() {
        let node = Node::new(["A"], PropertyMap::new());
        node.mark_stale(StaleField::Labels);
        assert!(node.has_label("A").unwrap());
        assert!(node.is_stale(StaleField::Labels));
    }

    #[test]
    fn test_name_resolution() {
        let node = Node::empty().with_property("name", "Alice");
        assert_eq!(node.name().unwrap(), "Alice");
        node.set_property("__name__", "alice").unwrap();
        assert_eq!(node.name().unwrap(), "alice");
        assert_eq!(Node::empty().name().unwrap(), "");
    }

    #[test]
    fn test_node_walks_to_itself() {
        let node = Node::empty();
        assert_eq!(node.sequence(), vec![Entity::Node(node.clone())]);
        assert_eq!(node.start_node(), node);
        assert_eq!(node.end_node(), node);
        assert_eq!(node.len(), 0);
    }
}
