//! Entity: an addressable graph element, either a node or a relationship.

use std::hash::{Hash, Hasher};

use super::walkable::Walk;
use super::{Node, PropertyDict, Relationship};
use crate::Result;

/// A node or relationship appearing in a traversal sequence.
///
/// Both variants are shared handles, so an `Entity` is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Node(Node),
    Relationship(Relationship),
}

impl Entity {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Entity::Node(node) => Some(node),
            Entity::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Entity::Relationship(rel) => Some(rel),
            Entity::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Entity::Node(_))
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, Entity::Relationship(_))
    }

    /// True when the entity carries at least one relationship, which is
    /// never the case for a bare node.
    pub fn is_truthy(&self) -> bool {
        self.len() > 0
    }

    pub fn properties(&self) -> Result<PropertyDict> {
        match self {
            Entity::Node(node) => node.properties(),
            Entity::Relationship(rel) => Ok(rel.properties()),
        }
    }

    pub fn name(&self) -> Result<String> {
        match self {
            Entity::Node(node) => node.name(),
            Entity::Relationship(rel) => Ok(rel.name()),
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            Entity::Node(node) => node.is_bound(),
            Entity::Relationship(rel) => rel.is_bound(),
        }
    }
}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Entity::Node(node) => node.hash(state),
            Entity::Relationship(rel) => rel.hash(state),
        }
    }
}

impl Walk for Entity {
    fn sequence(&self) -> Vec<Entity> {
        match self {
            Entity::Node(node) => node.sequence(),
            Entity::Relationship(rel) => rel.sequence(),
        }
    }

    fn start_node(&self) -> Node {
        match self {
            Entity::Node(node) => node.clone(),
            Entity::Relationship(rel) => rel.start_node(),
        }
    }

    fn end_node(&self) -> Node {
        match self {
            Entity::Node(node) => node.clone(),
            Entity::Relationship(rel) => rel.end_node(),
        }
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Entity::Node(node)
    }
}

impl From<Relationship> for Entity {
    fn from(rel: Relationship) -> Self {
        Entity::Relationship(rel)
    }
}

/// Resolve the display name of an entity from its properties and identity.
pub(crate) fn display_name(properties: &PropertyDict, identity: Option<String>) -> String {
    for key in ["__name__", "name"] {
        let value = properties.get(key);
        if !value.is_null() {
            return value.to_text();
        }
    }
    identity.map(|id| format!("_{id}")).unwrap_or_default()
}
