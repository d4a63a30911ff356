//! Relationship (edge) in the property graph.
//!
//! Relationship kinds are distinguished by type name. Each name maps to a
//! single cached `RelationshipType` variant, so looking up `"KNOWS"` twice
//! yields the same variant object and every `KNOWS` relationship carries it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace};

use super::entity::display_name;
use super::identity::{hash_one, Binding, GraphRef, RelId, Token};
use super::walkable::Walk;
use super::{Entity, Node, NodeCast, PropertyDict, PropertyMap, Subgraph, Value};
use crate::{Error, Result};

/// Name of the variant used when no type name is given.
pub const BASE_TYPE: &str = "Relationship";

// ============================================================================
// RelationshipType registry
// ============================================================================

static REGISTRY: LazyLock<Mutex<HashMap<String, RelationshipType>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

#[derive(Debug)]
struct TypeInner {
    name: String,
}

/// A named relationship variant.
///
/// Variants are interned: two handles are equal iff they came from the
/// same registry entry.
#[derive(Clone)]
pub struct RelationshipType(Arc<TypeInner>);

impl RelationshipType {
    /// Look up the variant for `name`, registering it on first use.
    pub fn named(name: &str) -> Self {
        let mut registry = REGISTRY.lock();
        if let Some(existing) = registry.get(name) {
            return existing.clone();
        }
        debug!(name, "registering relationship type");
        let variant = RelationshipType(Arc::new(TypeInner { name: name.to_owned() }));
        registry.insert(name.to_owned(), variant.clone());
        variant
    }

    /// The variant used for untyped relationships.
    pub fn base() -> Self {
        Self::named(BASE_TYPE)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether both handles are the same registry entry.
    pub fn same_variant(&self, other: &RelationshipType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// `start -[:THIS]-> end`
    pub fn relate(&self, start: Node, end: Node) -> Relationship {
        self.relate_with(start, end, PropertyMap::new())
    }

    /// `node -[:THIS]-> node`
    pub fn self_loop(&self, node: Node) -> Relationship {
        self.relate(node.clone(), node)
    }

    pub fn relate_with<K, V>(
        &self,
        start: Node,
        end: Node,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Relationship
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let token = Token::generate();
        Relationship(Arc::new(RelInner {
            binding: RwLock::new(Binding::Unbound(token.clone())),
            token,
            rel_type: self.clone(),
            start,
            end,
            properties: RwLock::new(properties.into_iter().collect()),
        }))
    }

    /// Build a relationship from positional arguments, using this variant
    /// when the arguments do not name one.
    ///
    /// | args | result |
    /// |---|---|
    /// | `a` | self-loop on `a` |
    /// | `a, b` | `a -> b` |
    /// | `a, type` | self-loop on `a` of `type` |
    /// | `a, type, b` | `a -> b` of `type` |
    ///
    /// Any other count fails with `UnsupportedArity`.
    pub fn build(&self, args: Vec<RelArg>, properties: PropertyMap) -> Result<Relationship> {
        let mut args = args.into_iter();
        let (variant, start, end) = match (args.next(), args.next(), args.next(), args.next()) {
            (Some(a), None, None, None) => {
                let a = a.into_endpoint()?;
                (self.clone(), a.clone(), a)
            }
            (Some(a), Some(b), None, None) => match b {
                RelArg::Type(name) => {
                    let a = a.into_endpoint()?;
                    (RelationshipType::named(&name), a.clone(), a)
                }
                RelArg::Untyped => {
                    let a = a.into_endpoint()?;
                    (self.clone(), a.clone(), a)
                }
                b @ RelArg::Endpoint(_) => (self.clone(), a.into_endpoint()?, b.into_endpoint()?),
            },
            (Some(a), Some(t), Some(b), None) => {
                let variant = match t {
                    RelArg::Type(name) => RelationshipType::named(&name),
                    RelArg::Untyped => self.clone(),
                    RelArg::Endpoint(_) => {
                        return Err(Error::TypeCoercion {
                            from: "Node".into(),
                            to: "relationship type".into(),
                        });
                    }
                };
                (variant, a.into_endpoint()?, b.into_endpoint()?)
            }
            (None, ..) => return Err(Error::UnsupportedArity(0)),
            _ => return Err(Error::UnsupportedArity(4 + args.count())),
        };
        Ok(variant.relate_with(start, end, properties))
    }
}

impl PartialEq for RelationshipType {
    fn eq(&self, other: &Self) -> bool {
        self.same_variant(other)
    }
}

impl Eq for RelationshipType {}

impl Hash for RelationshipType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationshipType({})", self.0.name)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A positional argument to `Relationship::from_args`.
#[derive(Debug, Clone)]
pub enum RelArg {
    /// Anything castable to a node.
    Endpoint(NodeCast),
    /// A relationship type name.
    Type(String),
    /// An explicit "no type name", meaning the caller's default variant.
    Untyped,
}

impl RelArg {
    fn into_endpoint(self) -> Result<Node> {
        let from = match self {
            RelArg::Endpoint(cast) => {
                return Node::cast(cast)?.ok_or_else(|| Error::TypeCoercion {
                    from: "NULL".into(),
                    to: "Node".into(),
                });
            }
            RelArg::Type(_) => "STRING",
            RelArg::Untyped => "NULL",
        };
        Err(Error::TypeCoercion { from: from.into(), to: "Node".into() })
    }
}

impl From<Node> for RelArg {
    fn from(node: Node) -> Self { RelArg::Endpoint(NodeCast::Node(node)) }
}

impl From<&str> for RelArg {
    fn from(name: &str) -> Self { RelArg::Type(name.to_owned()) }
}

impl From<String> for RelArg {
    fn from(name: String) -> Self { RelArg::Type(name) }
}

impl From<Option<&str>> for RelArg {
    fn from(name: Option<&str>) -> Self {
        name.map(RelArg::from).unwrap_or(RelArg::Untyped)
    }
}

impl From<Value> for RelArg {
    fn from(value: Value) -> Self {
        match value {
            Value::String(name) => RelArg::Type(name),
            Value::Null => RelArg::Untyped,
            other => RelArg::Endpoint(NodeCast::Value(other)),
        }
    }
}

// ============================================================================
// Relationship
// ============================================================================

struct RelInner {
    token: Token,
    rel_type: RelationshipType,
    start: Node,
    end: Node,
    binding: RwLock<Binding<RelId>>,
    properties: RwLock<PropertyDict>,
}

/// A typed, directed connection between two nodes (possibly the same one).
#[derive(Clone)]
pub struct Relationship(Arc<RelInner>);

impl Relationship {
    /// Untyped self-loop: `Relationship(a)`.
    pub fn new(node: Node) -> Self {
        RelationshipType::base().self_loop(node)
    }

    /// Untyped edge: `Relationship(a, b)`.
    pub fn between(start: Node, end: Node) -> Self {
        RelationshipType::base().relate(start, end)
    }

    /// Typed edge: `Relationship(a, "TYPE", b)`.
    pub fn typed(start: Node, rel_type: &str, end: Node) -> Self {
        RelationshipType::named(rel_type).relate(start, end)
    }

    /// Positional construction with the base variant as default type.
    /// See [`RelationshipType::build`].
    pub fn from_args(args: Vec<RelArg>, properties: PropertyMap) -> Result<Self> {
        RelationshipType::base().build(args, properties)
    }

    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.properties.write().set(key, value);
        self
    }

    /// Cast a relationship from one of the shapes in [`RelationshipCast`].
    ///
    /// When `entities` is supplied, index endpoints are resolved through it
    /// and must refer to nodes.
    pub fn cast(obj: impl Into<RelationshipCast>, entities: Option<&[Entity]>) -> Result<Self> {
        let (start, spec, end, extra) = match obj.into() {
            RelationshipCast::Relationship(rel) => return Ok(rel),
            RelationshipCast::Triple(start, spec, end) => (start, spec, end, PropertyMap::new()),
            RelationshipCast::Quad(start, spec, end, extra) => (start, spec, end, extra),
        };
        let start = start.resolve(entities)?;
        let end = end.resolve(entities)?;
        let mut properties = spec.properties();
        properties.extend(extra);
        Ok(RelationshipType::named(spec.type_name()).relate_with(start, end, properties))
    }

    // ========================================================================
    // Structure
    // ========================================================================

    pub fn rel_type(&self) -> &RelationshipType {
        &self.0.rel_type
    }

    pub fn type_name(&self) -> &str {
        self.0.rel_type.name()
    }

    /// Endpoints in order: `[start, end]`.
    pub fn nodes(&self) -> SmallVec<[Node; 2]> {
        smallvec![self.0.start.clone(), self.0.end.clone()]
    }

    pub fn is_self_loop(&self) -> bool {
        self.0.start == self.0.end
    }

    /// The endpoint opposite `node`, if `node` is an endpoint at all.
    pub fn other_node(&self, node: &Node) -> Option<Node> {
        if *node == self.0.start { Some(self.0.end.clone()) }
        else if *node == self.0.end { Some(self.0.start.clone()) }
        else { None }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    pub fn token(&self) -> &Token {
        &self.0.token
    }

    pub fn binding(&self) -> Binding<RelId> {
        self.0.binding.read().clone()
    }

    pub fn identity(&self) -> Option<RelId> {
        self.0.binding.read().identity()
    }

    pub fn graph(&self) -> Option<GraphRef> {
        self.0.binding.read().graph().cloned()
    }

    pub fn is_bound(&self) -> bool {
        self.0.binding.read().is_bound()
    }

    pub fn bind(&self, graph: GraphRef, identity: RelId) {
        trace!(token = %self.0.token, %identity, "binding relationship");
        *self.0.binding.write() = Binding::Bound { graph, identity };
    }

    pub fn unbind(&self) {
        *self.0.binding.write() = Binding::Unbound(self.0.token.clone());
    }

    pub fn ptr_eq(&self, other: &Relationship) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn properties(&self) -> PropertyDict {
        self.0.properties.read().clone()
    }

    pub fn get(&self, key: &str) -> Value {
        self.0.properties.read().get(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.properties.read().keys().cloned().collect()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.properties.write().set(key, value);
    }

    pub fn update_properties<K, V>(&self, properties: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.0.properties.write().update(properties);
    }

    pub fn remove_property(&self, key: &str) -> Option<Value> {
        self.0.properties.write().remove(key)
    }

    /// Replace local properties with state fetched from the remote graph.
    pub fn refresh(&self, properties: PropertyMap) {
        *self.0.properties.write() = PropertyDict::from(properties);
    }

    pub fn name(&self) -> String {
        display_name(&self.properties(), self.identity().map(|id| id.to_string()))
    }
}

// ============================================================================
// Equality, hashing, formatting
// ============================================================================

impl PartialEq for Relationship {
    /// Bound relationships compare by graph and identity. Otherwise two
    /// relationships are equal when variant, endpoints and properties match.
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        {
            let a = self.0.binding.read();
            let b = other.0.binding.read();
            if a.is_bound() && b.is_bound() {
                return *a == *b;
            }
        }
        self.0.rel_type == other.0.rel_type
            && self.0.start == other.0.start
            && self.0.end == other.0.end
            && *self.0.properties.read() == *other.0.properties.read()
    }
}

impl Eq for Relationship {}

impl Hash for Relationship {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let endpoints = hash_one(&(&self.0.start, &self.0.end));
        state.write_u64(endpoints ^ hash_one(self.0.rel_type.name()));
    }
}

impl fmt::Debug for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relationship")
            .field("type", &self.0.rel_type.name())
            .field("start", &self.0.start)
            .field("end", &self.0.end)
            .field("properties", &self.properties().to_map())
            .field("identity", &self.identity())
            .finish()
    }
}

// ============================================================================
// Walk / Subgraph views
// ============================================================================

impl Walk for Relationship {
    fn sequence(&self) -> Vec<Entity> {
        vec![
            Entity::Node(self.0.start.clone()),
            Entity::Relationship(self.clone()),
            Entity::Node(self.0.end.clone()),
        ]
    }

    fn start_node(&self) -> Node {
        self.0.start.clone()
    }

    fn end_node(&self) -> Node {
        self.0.end.clone()
    }
}

impl From<&Relationship> for Subgraph {
    fn from(rel: &Relationship) -> Self {
        let nodes: HashSet<Node> = rel.nodes().into_iter().collect();
        Subgraph::from_parts(nodes, std::iter::once(rel.clone()).collect())
    }
}

// ============================================================================
// Cast shapes
// ============================================================================

/// Endpoint of a relationship being cast: a node, or an index into an
/// entity lookup.
#[derive(Debug, Clone)]
pub enum RelEndpoint {
    Node(Node),
    Index(usize),
}

impl RelEndpoint {
    fn resolve(self, entities: Option<&[Entity]>) -> Result<Node> {
        match self {
            RelEndpoint::Node(node) => Ok(node),
            RelEndpoint::Index(index) => {
                let entities = entities.ok_or_else(|| Error::TypeCoercion {
                    from: "INTEGER".into(),
                    to: "Node".into(),
                })?;
                match entities.get(index) {
                    Some(Entity::Node(node)) => Ok(node.clone()),
                    Some(Entity::Relationship(_)) => Err(Error::TypeCoercion {
                        from: "Relationship".into(),
                        to: "Node".into(),
                    }),
                    None => Err(Error::NotFound(format!("entity {index}"))),
                }
            }
        }
    }
}

impl From<Node> for RelEndpoint {
    fn from(node: Node) -> Self { RelEndpoint::Node(node) }
}

impl From<usize> for RelEndpoint {
    fn from(index: usize) -> Self { RelEndpoint::Index(index) }
}

/// The middle element of a cast tuple, which implies the type name and
/// possibly some properties.
#[derive(Debug, Clone)]
pub enum RelTypeSpec {
    Name(String),
    Relationship(Relationship),
    Pair(String, PropertyMap),
}

impl RelTypeSpec {
    fn type_name(&self) -> &str {
        match self {
            RelTypeSpec::Name(name) | RelTypeSpec::Pair(name, _) => name,
            RelTypeSpec::Relationship(rel) => rel.type_name(),
        }
    }

    fn properties(&self) -> PropertyMap {
        match self {
            RelTypeSpec::Name(_) => PropertyMap::new(),
            RelTypeSpec::Relationship(rel) => rel.properties().to_map(),
            RelTypeSpec::Pair(_, properties) => properties.clone(),
        }
    }
}

impl From<&str> for RelTypeSpec {
    fn from(name: &str) -> Self { RelTypeSpec::Name(name.to_owned()) }
}

impl From<String> for RelTypeSpec {
    fn from(name: String) -> Self { RelTypeSpec::Name(name) }
}

impl From<Relationship> for RelTypeSpec {
    fn from(rel: Relationship) -> Self { RelTypeSpec::Relationship(rel) }
}

impl<S: Into<String>> From<(S, PropertyMap)> for RelTypeSpec {
    fn from((name, properties): (S, PropertyMap)) -> Self {
        RelTypeSpec::Pair(name.into(), properties)
    }
}

/// Shapes accepted by `Relationship::cast`.
#[derive(Debug, Clone)]
pub enum RelationshipCast {
    Relationship(Relationship),
    /// `(start, type, end)`
    Triple(RelEndpoint, RelTypeSpec, RelEndpoint),
    /// `(start, type, end, properties)`; the explicit properties win.
    Quad(RelEndpoint, RelTypeSpec, RelEndpoint, PropertyMap),
}

impl From<Relationship> for RelationshipCast {
    fn from(rel: Relationship) -> Self { RelationshipCast::Relationship(rel) }
}

impl<A, T, B> From<(A, T, B)> for RelationshipCast
where
    A: Into<RelEndpoint>,
    T: Into<RelTypeSpec>,
    B: Into<RelEndpoint>,
{
    fn from((a, t, b): (A, T, B)) -> Self {
        RelationshipCast::Triple(a.into(), t.into(), b.into())
    }
}

impl<A, T, B> From<(A, T, B, PropertyMap)> for RelationshipCast
where
    A: Into<RelEndpoint>,
    T: Into<RelTypeSpec>,
    B: Into<RelEndpoint>,
{
    fn from((a, t, b, properties): (A, T, B, PropertyMap)) -> Self {
        RelationshipCast::Quad(a.into(), t.into(), b.into(), properties)
    }
}

/// Dynamic shape: a list `[start, type, end]` or `[start, type, end, props]`
/// where endpoints are entity indices and `type` is a name or a
/// `[name, props]` pair.
impl TryFrom<Value> for RelationshipCast {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        fn endpoint(value: Value) -> Result<RelEndpoint> {
            match value {
                Value::Int(i) if i >= 0 => Ok(RelEndpoint::Index(i as usize)),
                other => Err(Error::TypeCoercion {
                    from: other.type_name().into(),
                    to: "relationship endpoint".into(),
                }),
            }
        }

        fn type_spec(value: Value) -> Result<RelTypeSpec> {
            match value {
                Value::String(name) => Ok(RelTypeSpec::Name(name)),
                Value::List(pair) => match <[Value; 2]>::try_from(pair) {
                    Ok([Value::String(name), Value::Map(properties)]) => {
                        Ok(RelTypeSpec::Pair(name, properties))
                    }
                    _ => Err(Error::InvalidArgument(
                        "cannot determine relationship type from list".into(),
                    )),
                },
                other => Err(Error::InvalidArgument(format!(
                    "cannot determine relationship type from {}",
                    other.type_name()
                ))),
            }
        }

        let Value::List(items) = value else {
            return Err(Error::TypeCoercion {
                from: value.type_name().into(),
                to: "Relationship".into(),
            });
        };
        let arity = items.len();
        let mut items = items.into_iter();
        match (items.next(), items.next(), items.next(), items.next(), arity) {
            (Some(a), Some(t), Some(b), None, 3) => {
                Ok(RelationshipCast::Triple(endpoint(a)?, type_spec(t)?, endpoint(b)?))
            }
            (Some(a), Some(t), Some(b), Some(Value::Map(properties)), 4) => Ok(
                RelationshipCast::Quad(endpoint(a)?, type_spec(t)?, endpoint(b)?, properties),
            ),
            _ => Err(Error::TypeCoercion {
                from: format!("LIST of {arity}"),
                to: "Relationship".into(),
            }),
        }
    }
}
