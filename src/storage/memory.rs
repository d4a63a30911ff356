//! In-memory graph.
//!
//! The reference implementation of `RemoteGraph` and `Transaction`.
//! It keeps node and relationship records in HashMaps protected by RwLock
//! and hands out `MemoryTx` executors that bind, refresh and unbind model
//! entities.
//!
//! ## Limitations
//!
//! - **No real transactions**: writes are applied immediately and there is
//!   no rollback.
//! - **Single-writer only**: per-collection locks mean multi-step mutations
//!   are NOT atomic.
//! - **No property indexes**: `merge` does a full scan of node records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{GraphConfig, RemoteGraph};
use crate::model::{
    GraphRef, Node, NodeId, PropertyMap, RelId, Relationship, RelationshipType, Subgraph, Value, Walk,
};
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
struct NodeRecord {
    labels: Vec<String>,
    properties: PropertyMap,
}

impl NodeRecord {
    fn add_labels(&mut self, labels: impl IntoIterator<Item = String>) {
        for label in labels {
            if !self.labels.contains(&label) {
                self.labels.push(label);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RelRecord {
    start: NodeId,
    end: NodeId,
    rel_type: String,
    properties: PropertyMap,
}

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory property graph.
///
/// Always handled through an `Arc`, since bound entities keep a weak
/// reference back to it.
pub struct MemoryGraph {
    config: GraphConfig,
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
    relationships: RwLock<HashMap<RelId, RelRecord>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryGraph {
    pub fn new() -> Arc<Self> {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Arc<Self> {
        debug!(database = %config.database, name = %config.name, "opening memory graph");
        Arc::new(Self {
            config,
            nodes: RwLock::new(HashMap::new()),
            relationships: RwLock::new(HashMap::new()),
            next_node_id: AtomicU64::new(1),
            next_rel_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Start a transaction against this graph.
    pub fn begin(self: &Arc<Self>, mode: TxMode) -> MemoryTx {
        let id = TxId(self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        trace!(tx = id.0, ?mode, "begin");
        MemoryTx { graph: Arc::clone(self), id, mode }
    }

    /// Back-reference handed to every entity bound to this graph.
    pub fn graph_ref(self: &Arc<Self>) -> GraphRef {
        GraphRef::new(self)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.read().len()
    }

    /// A fresh handle on a stored node, already bound.
    pub fn get_node(self: &Arc<Self>, id: NodeId) -> Option<Node> {
        let record = self.nodes.read().get(&id).cloned()?;
        let node = Node::new(record.labels, record.properties);
        node.bind(self.graph_ref(), id);
        Some(node)
    }

    /// A fresh handle on a stored relationship and its endpoints, already bound.
    pub fn get_relationship(self: &Arc<Self>, id: RelId) -> Option<Relationship> {
        let record = self.relationships.read().get(&id).cloned()?;
        let start = self.get_node(record.start)?;
        let end = if record.start == record.end { start.clone() } else { self.get_node(record.end)? };
        let rel = RelationshipType::named(&record.rel_type)
            .relate_with(start, end, record.properties);
        rel.bind(self.graph_ref(), id);
        Some(rel)
    }

    // ========================================================================
    // Direct writes (bypass any local node cache)
    // ========================================================================

    pub fn set_node_property(&self, id: NodeId, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut nodes = self.nodes.write();
        let record = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let value: Value = value.into();
        match value {
            Value::Null => {
                record.properties.shift_remove(key);
            }
            value => {
                record.properties.insert(key.to_owned(), value);
            }
        }
        Ok(())
    }

    pub fn add_label(&self, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let record = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        record.add_labels([label.to_owned()]);
        Ok(())
    }

    pub fn remove_label(&self, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let record = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        record.labels.retain(|l| l != label);
        Ok(())
    }

    // ========================================================================
    // Record helpers
    // ========================================================================

    /// Whether an entity bound to `graph` belongs here.
    ///
    /// `Ok(None)` for unbound entities. Entities bound to a different graph
    /// are rejected.
    fn owned<I: Copy>(&self, graph: Option<GraphRef>, identity: Option<I>) -> Result<Option<I>> {
        match (graph, identity) {
            (Some(graph), Some(identity)) => {
                if graph.database() == self.config.database && graph.name() == self.config.name {
                    Ok(Some(identity))
                } else {
                    Err(Error::ConstraintViolation(format!(
                        "entity is bound to {}/{}, not {}/{}",
                        graph.database(),
                        graph.name(),
                        self.config.database,
                        self.config.name
                    )))
                }
            }
            _ => Ok(None),
        }
    }

    fn insert_node(&self, record: NodeRecord) -> NodeId {
        let id = NodeId(self.next_node_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.write().insert(id, record);
        id
    }

    fn insert_relationship(&self, record: RelRecord) -> Result<RelId> {
        {
            let nodes = self.nodes.read();
            if !nodes.contains_key(&record.start) {
                return Err(Error::NotFound(format!("Start node {}", record.start)));
            }
            if !nodes.contains_key(&record.end) {
                return Err(Error::NotFound(format!("End node {}", record.end)));
            }
        }
        let id = RelId(self.next_rel_id.fetch_add(1, Ordering::Relaxed));
        self.relationships.write().insert(id, record);
        Ok(id)
    }

    /// Remove a node together with every relationship attached to it.
    fn detach_delete(&self, id: NodeId) -> bool {
        self.relationships.write().retain(|_, rel| rel.start != id && rel.end != id);
        self.nodes.write().remove(&id).is_some()
    }

    /// Node id of a relationship endpoint. The endpoint has to be bound here.
    fn endpoint(&self, node: &Node) -> Result<NodeId> {
        self.owned(node.graph(), node.identity())?
            .ok_or_else(|| Error::ConstraintViolation(format!("endpoint {node:?} is not bound")))
    }

    fn find_node(&self, node: &Node, label: Option<&str>, key: Option<&str>) -> Result<Option<NodeId>> {
        let labels = node.labels()?;
        let properties = node.properties()?;
        let label = match label {
            Some(label) => label.to_owned(),
            None => {
                let mut sorted: Vec<_> = labels.iter().cloned().collect();
                sorted.sort();
                match sorted.into_iter().next() {
                    Some(label) => label,
                    None => return Ok(None),
                }
            }
        };
        let nodes = self.nodes.read();
        let found = nodes.iter().find(|(_, record)| {
            if !record.labels.contains(&label) {
                return false;
            }
            match key {
                Some(key) => {
                    let wanted = properties.get(key);
                    !wanted.is_null() && record.properties.get(key) == Some(&wanted)
                }
                None => properties.iter().all(|(k, v)| record.properties.get(k) == Some(v)),
            }
        });
        Ok(found.map(|(id, _)| *id))
    }

    fn find_relationship(&self, start: NodeId, end: NodeId, rel_type: &str) -> Option<RelId> {
        self.relationships
            .read()
            .iter()
            .find(|(_, rel)| rel.start == start && rel.end == end && rel.rel_type == rel_type)
            .map(|(id, _)| *id)
    }
}

impl RemoteGraph for MemoryGraph {
    fn database(&self) -> &str {
        &self.config.database
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn pull(&self, node: &Node) -> Result<()> {
        let id = self
            .owned(node.graph(), node.identity())?
            .ok_or_else(|| Error::NotFound(format!("{node:?} is not bound")))?;
        let record = self
            .nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        trace!(%id, "pull node");
        node.refresh(record.labels, record.properties);
        Ok(())
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// Transaction over a `MemoryGraph`. Writes take effect immediately.
pub struct MemoryTx {
    graph: Arc<MemoryGraph>,
    id: TxId,
    mode: TxMode,
}

impl MemoryTx {
    pub fn graph(&self) -> &Arc<MemoryGraph> {
        &self.graph
    }

    fn create_relationship(&self, rel: &Relationship) -> Result<RelId> {
        let record = RelRecord {
            start: self.graph.endpoint(&rel.start_node())?,
            end: self.graph.endpoint(&rel.end_node())?,
            rel_type: rel.type_name().to_owned(),
            properties: rel.properties().to_map(),
        };
        self.graph.insert_relationship(record)
    }
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn id(&self) -> TxId {
        self.id
    }

    fn create(&mut self, subgraph: &Subgraph) -> Result<()> {
        let graph_ref = self.graph.graph_ref();
        let mut created = (0usize, 0usize);
        for node in &subgraph.nodes() {
            if self.graph.owned(node.graph(), node.identity())?.is_some() {
                continue;
            }
            let record = NodeRecord {
                labels: node.cached_labels().into_iter().collect(),
                properties: node.cached_properties().to_map(),
            };
            node.bind(graph_ref.clone(), self.graph.insert_node(record));
            created.0 += 1;
        }
        for rel in &subgraph.relationships() {
            if self.graph.owned(rel.graph(), rel.identity())?.is_some() {
                continue;
            }
            let id = self.create_relationship(rel)?;
            rel.bind(graph_ref.clone(), id);
            created.1 += 1;
        }
        debug!(tx = self.id.0, nodes = created.0, relationships = created.1, "created");
        Ok(())
    }

    fn delete(&mut self, subgraph: &Subgraph) -> Result<()> {
        for rel in &subgraph.relationships() {
            if let Some(id) = self.graph.owned(rel.graph(), rel.identity())? {
                self.graph.relationships.write().remove(&id);
                rel.unbind();
            }
        }
        for node in &subgraph.nodes() {
            if let Some(id) = self.graph.owned(node.graph(), node.identity())? {
                self.graph.detach_delete(id);
                node.unbind();
            }
        }
        debug!(tx = self.id.0, order = subgraph.order(), size = subgraph.size(), "deleted");
        Ok(())
    }

    fn merge(
        &mut self,
        subgraph: &Subgraph,
        primary_label: Option<&str>,
        primary_key: Option<&str>,
    ) -> Result<()> {
        let graph_ref = self.graph.graph_ref();
        for node in &subgraph.nodes() {
            if self.graph.owned(node.graph(), node.identity())?.is_some() {
                continue;
            }
            let labels: Vec<String> = node.labels()?.into_iter().collect();
            let properties = node.properties()?.to_map();
            let id = match self.graph.find_node(node, primary_label, primary_key)? {
                Some(id) => {
                    trace!(%id, "merge matched node");
                    let mut nodes = self.graph.nodes.write();
                    if let Some(record) = nodes.get_mut(&id) {
                        record.add_labels(labels);
                        record.properties = properties;
                    }
                    id
                }
                None => {
                    let mut record = NodeRecord { labels, properties };
                    if let Some(label) = primary_label {
                        record.add_labels([label.to_owned()]);
                    }
                    self.graph.insert_node(record)
                }
            };
            node.bind(graph_ref.clone(), id);
        }
        for rel in &subgraph.relationships() {
            if self.graph.owned(rel.graph(), rel.identity())?.is_some() {
                continue;
            }
            let start = self.graph.endpoint(&rel.start_node())?;
            let end = self.graph.endpoint(&rel.end_node())?;
            let id = match self.graph.find_relationship(start, end, rel.type_name()) {
                Some(id) => {
                    if let Some(record) = self.graph.relationships.write().get_mut(&id) {
                        record.properties = rel.properties().to_map();
                    }
                    id
                }
                None => self.create_relationship(rel)?,
            };
            rel.bind(graph_ref.clone(), id);
        }
        debug!(tx = self.id.0, order = subgraph.order(), size = subgraph.size(), "merged");
        Ok(())
    }

    fn pull(&mut self, subgraph: &Subgraph) -> Result<()> {
        for node in &subgraph.nodes() {
            if self.graph.owned(node.graph(), node.identity())?.is_some() {
                RemoteGraph::pull(self.graph.as_ref(), node)?;
            }
        }
        for rel in &subgraph.relationships() {
            if let Some(id) = self.graph.owned(rel.graph(), rel.identity())? {
                let properties = self
                    .graph
                    .relationships
                    .read()
                    .get(&id)
                    .map(|record| record.properties.clone())
                    .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
                rel.refresh(properties);
            }
        }
        Ok(())
    }

    fn push(&mut self, subgraph: &Subgraph) -> Result<()> {
        for node in &subgraph.nodes() {
            if let Some(id) = self.graph.owned(node.graph(), node.identity())? {
                // read first: a stale node pulls before its state is written back
                let labels = node.labels()?.into_iter().collect();
                let properties = node.properties()?.to_map();
                let mut nodes = self.graph.nodes.write();
                let record = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
                *record = NodeRecord { labels, properties };
            }
        }
        for rel in &subgraph.relationships() {
            if let Some(id) = self.graph.owned(rel.graph(), rel.identity())? {
                let mut rels = self.graph.relationships.write();
                let record = rels
                    .get_mut(&id)
                    .ok_or_else(|| Error::NotFound(format!("Relationship {id}")))?;
                record.properties = rel.properties().to_map();
            }
        }
        debug!(tx = self.id.0, order = subgraph.order(), size = subgraph.size(), "pushed");
        Ok(())
    }

    fn separate(&mut self, subgraph: &Subgraph) -> Result<()> {
        for rel in &subgraph.relationships() {
            if let Some(id) = self.graph.owned(rel.graph(), rel.identity())? {
                self.graph.relationships.write().remove(&id);
                rel.unbind();
            }
        }
        debug!(tx = self.id.0, size = subgraph.size(), "separated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StaleField;

    fn knows() -> (Node, Node, Relationship, Subgraph) {
        let a = Node::new(["Person"], [("name", "Alice")]);
        let b = Node::new(["Person"], [("name", "Bob")]);
        let ab = Relationship::typed(a.clone(), "KNOWS", b.clone()).with_property("since", 1999);
        let s = Subgraph::new([], [ab.clone()]).unwrap();
        (a, b, ab, s)
    }

    #[test]
    fn test_create_binds_everything() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (a, b, ab, s) = knows();

        s.create(&mut tx).unwrap();

        assert!(a.is_bound() && b.is_bound() && ab.is_bound());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relationship_count(), 1);

        let stored = graph.get_relationship(ab.identity().unwrap()).unwrap();
        assert_eq!(stored, ab);
        assert_eq!(stored.get("since"), Value::Int(1999));
        assert_eq!(graph.get_node(a.identity().unwrap()).unwrap(), a);
    }

    #[test]
    fn test_create_twice_is_idempotent() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (_, _, _, s) = knows();
        s.create(&mut tx).unwrap();
        s.create(&mut tx).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_foreign_binding_rejected() {
        let home = MemoryGraph::new();
        let away = MemoryGraph::with_config(GraphConfig { database: "neo4j".into(), name: "away".into() });
        let a = Node::empty();
        let s = Subgraph::from(&a);
        s.create(&mut home.begin(TxMode::ReadWrite)).unwrap();
        let err = s.create(&mut away.begin(TxMode::ReadWrite)).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn test_lazy_refresh_pulls_stale_node() {
        let graph = MemoryGraph::new();
        let (a, _, _, s) = knows();
        s.create(&mut graph.begin(TxMode::ReadWrite)).unwrap();
        let id = a.identity().unwrap();

        graph.set_node_property(id, "age", 36).unwrap();
        graph.add_label(id, "Engineer").unwrap();
        assert_eq!(a.get("age").unwrap(), Value::Null);

        a.mark_stale(StaleField::Properties);
        assert_eq!(a.get("age").unwrap(), Value::Int(36));
        assert!(!a.is_stale(StaleField::Properties));
        assert!(a.has_label("Engineer").unwrap());
    }

    #[test]
    fn test_pull_after_graph_dropped() {
        let graph = MemoryGraph::new();
        let a = Node::empty();
        Subgraph::from(&a).create(&mut graph.begin(TxMode::ReadWrite)).unwrap();
        drop(graph);
        a.mark_stale(StaleField::Labels);
        assert!(matches!(a.labels(), Err(Error::GraphUnavailable(_))));
    }

    #[test]
    fn test_push_and_pull() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (a, _, ab, s) = knows();
        s.create(&mut tx).unwrap();

        a.set_property("name", "Alicia").unwrap();
        ab.set_property("since", 2001);
        s.push(&mut tx).unwrap();
        let stored = graph.get_node(a.identity().unwrap()).unwrap();
        assert_eq!(stored.get("name").unwrap(), Value::from("Alicia"));

        graph.set_node_property(a.identity().unwrap(), "name", "Ali").unwrap();
        s.pull(&mut tx).unwrap();
        assert_eq!(a.get("name").unwrap(), Value::from("Ali"));
        assert_eq!(ab.get("since"), Value::Int(2001));
    }

    #[test]
    fn test_delete_detaches_and_unbinds() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (a, b, ab, s) = knows();
        s.create(&mut tx).unwrap();

        Subgraph::from(&a).delete(&mut tx).unwrap();
        assert!(!a.is_bound());
        assert!(b.is_bound());
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.relationship_count(), 0);
        // the relationship handle still claims its old identity
        assert!(ab.is_bound());
    }

    #[test]
    fn test_separate_keeps_nodes() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (a, _, ab, s) = knows();
        s.create(&mut tx).unwrap();
        s.separate(&mut tx).unwrap();
        assert!(!ab.is_bound());
        assert!(a.is_bound());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.relationship_count(), 0);
    }

    #[test]
    fn test_merge_matches_on_primary_key() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (a, _, _, s) = knows();
        s.create(&mut tx).unwrap();

        let again = Node::new(["Person"], [("name", "Alice"), ("city", "London")]);
        let other = Node::new(["Person"], [("name", "Zoe")]);
        let r = Relationship::typed(again.clone(), "KNOWS", other.clone());
        Subgraph::new([], [r]).unwrap().merge(&mut tx, Some("Person"), Some("name")).unwrap();

        assert_eq!(again.identity(), a.identity());
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.relationship_count(), 2);
        let stored = graph.get_node(a.identity().unwrap()).unwrap();
        assert_eq!(stored.get("city").unwrap(), Value::from("London"));
    }

    #[test]
    fn test_merge_reuses_relationship() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadWrite);
        let (_, _, ab, s) = knows();
        s.create(&mut tx).unwrap();

        let a2 = Node::new(["Person"], [("name", "Alice")]);
        let b2 = Node::new(["Person"], [("name", "Bob")]);
        let ab2 = Relationship::typed(a2, "KNOWS", b2);
        Subgraph::new([], [ab2.clone()]).unwrap().merge(&mut tx, None, Some("name")).unwrap();

        assert_eq!(ab2.identity(), ab.identity());
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let graph = MemoryGraph::new();
        let mut tx = graph.begin(TxMode::ReadOnly);
        let (_, _, _, s) = knows();
        assert!(matches!(s.create(&mut tx), Err(Error::TxError(_))));
        assert!(s.pull(&mut tx).is_ok());
        assert_eq!(graph.node_count(), 0);
    }
}
