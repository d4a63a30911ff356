//! # Remote Graph Contract
//!
//! A bound entity keeps a non-owning reference to the graph it came from.
//! The only thing the model ever asks of that graph is `pull(node)`, used
//! to refresh a node whose labels or properties were marked stale.
//!
//! ## Implementations
//!
//! | Graph | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryGraph` | `memory` | In-process graph for testing/embedding |

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::Node;
use crate::Result;

pub use memory::{MemoryGraph, MemoryTx};

// ============================================================================
// Graph Configuration
// ============================================================================

/// Identity of a remote graph. Two bound entities can only be equal when
/// their graphs agree on both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub database: String,
    pub name: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            database: "neo4j".into(),
            name: "data".into(),
        }
    }
}

// ============================================================================
// RemoteGraph Trait
// ============================================================================

/// The graph a bound entity refers back to.
pub trait RemoteGraph: Send + Sync {
    fn database(&self) -> &str;

    fn name(&self) -> &str;

    /// Re-read `node` from the graph and overwrite its local labels and
    /// properties (see `Node::refresh`).
    fn pull(&self, node: &Node) -> Result<()>;
}
