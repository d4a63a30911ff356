//! Entity identity: local tokens before binding, graph + id after.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::storage::RemoteGraph;
use crate::{Error, Result};

/// Remote node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelId(pub u64);

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash a value with a fixed-key hasher, so that XOR-combined hashes are
/// comparable across containers.
pub(crate) fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

// ============================================================================
// Token
// ============================================================================

/// Process-unique identity assigned to every entity at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(Arc<str>);

impl Token {
    /// Generate a fresh token.
    ///
    /// Candidates whose 7th character from the end is a decimal digit are
    /// discarded, which keeps tokens from reading like numeric identities.
    pub fn generate() -> Self {
        loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if Self::is_acceptable(&candidate) {
                return Token(candidate.into());
            }
        }
    }

    fn is_acceptable(candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        match bytes.len().checked_sub(7) {
            Some(i) => !bytes[i].is_ascii_digit(),
            None => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// GraphRef
// ============================================================================

/// Non-owning back-reference from a bound entity to its graph.
///
/// Two references are equal when they name the same database and graph,
/// even if the graph object itself has been dropped.
#[derive(Clone)]
pub struct GraphRef {
    database: Arc<str>,
    name: Arc<str>,
    graph: Weak<dyn RemoteGraph>,
}

impl GraphRef {
    pub fn new<G: RemoteGraph + 'static>(graph: &Arc<G>) -> Self {
        let dynamic: Arc<dyn RemoteGraph> = graph.clone();
        Self {
            database: graph.database().into(),
            name: graph.name().into(),
            graph: Arc::downgrade(&dynamic),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referenced graph, if it is still alive.
    pub fn upgrade(&self) -> Result<Arc<dyn RemoteGraph>> {
        self.graph.upgrade().ok_or_else(|| {
            Error::GraphUnavailable(format!("{}/{}", self.database, self.name))
        })
    }
}

impl PartialEq for GraphRef {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database && self.name == other.name
    }
}

impl Eq for GraphRef {}

impl Hash for GraphRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_one(&*self.database) ^ hash_one(&*self.name));
    }
}

impl fmt::Debug for GraphRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GraphRef({}/{})", self.database, self.name)
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Lifecycle state of an entity's identity.
///
/// Equality and hashing dispatch on this tag: an unbound entity is known
/// only by its token, a bound one by graph and remote identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding<I> {
    Unbound(Token),
    Bound { graph: GraphRef, identity: I },
}

impl<I: Copy + Hash> Binding<I> {
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound { .. })
    }

    pub fn identity(&self) -> Option<I> {
        match self {
            Binding::Bound { identity, .. } => Some(*identity),
            Binding::Unbound(_) => None,
        }
    }

    pub fn graph(&self) -> Option<&GraphRef> {
        match self {
            Binding::Bound { graph, .. } => Some(graph),
            Binding::Unbound(_) => None,
        }
    }

    /// Hash consistent with `==`: graph ^ identity when bound, token otherwise.
    pub fn stable_hash(&self) -> u64 {
        match self {
            Binding::Bound { graph, identity } => hash_one(graph) ^ hash_one(identity),
            Binding::Unbound(token) => hash_one(token),
        }
    }
}
