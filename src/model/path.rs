//! Path: a walkable built from a loose mix of entities and shorthand.

use std::fmt;
use std::ops::Deref;

use super::walkable::Walk;
use super::{Entity, Node, PropertyMap, Relationship, RelationshipType, Walkable};
use crate::{Error, Result};

/// One element of the argument list given to `Path::new`.
#[derive(Debug, Clone)]
pub enum PathItem {
    Entity(Entity),
    Walkable(Walkable),
    /// Becomes a fresh node without labels or properties.
    Empty,
    /// Becomes a fresh node carrying these properties.
    Properties(PropertyMap),
    /// Between two walkable neighbours, becomes a relationship of this type.
    Type(String),
    /// Like `Type`, with properties for the relationship.
    TypedProperties(String, PropertyMap),
}

impl From<Node> for PathItem {
    fn from(node: Node) -> Self { PathItem::Entity(Entity::Node(node)) }
}

impl From<Option<Node>> for PathItem {
    fn from(node: Option<Node>) -> Self { node.map(PathItem::from).unwrap_or(PathItem::Empty) }
}

impl From<Relationship> for PathItem {
    fn from(rel: Relationship) -> Self { PathItem::Entity(Entity::Relationship(rel)) }
}

impl From<Entity> for PathItem {
    fn from(entity: Entity) -> Self { PathItem::Entity(entity) }
}

impl From<Walkable> for PathItem {
    fn from(walkable: Walkable) -> Self { PathItem::Walkable(walkable) }
}

impl From<Path> for PathItem {
    fn from(path: Path) -> Self { PathItem::Walkable(path.0) }
}

impl From<&str> for PathItem {
    fn from(name: &str) -> Self { PathItem::Type(name.to_owned()) }
}

impl From<String> for PathItem {
    fn from(name: String) -> Self { PathItem::Type(name) }
}

impl From<PropertyMap> for PathItem {
    fn from(properties: PropertyMap) -> Self { PathItem::Properties(properties) }
}

impl<S: Into<String>> From<(S, PropertyMap)> for PathItem {
    fn from((name, properties): (S, PropertyMap)) -> Self {
        PathItem::TypedProperties(name.into(), properties)
    }
}

/// Element state while a path is being assembled.
enum Slot {
    Entity(Entity),
    Walkable(Walkable),
    Pending(String, PropertyMap),
}

impl Slot {
    fn as_walk(&self) -> Option<&dyn Walk> {
        match self {
            Slot::Entity(entity) => Some(entity as &dyn Walk),
            Slot::Walkable(walkable) => Some(walkable as &dyn Walk),
            Slot::Pending(..) => None,
        }
    }
}

/// A sequence of nodes connected by relationships.
///
/// ```rust
/// use neo4j_data::{Node, Path, PathItem, Walk};
///
/// # fn example() -> neo4j_data::Result<()> {
/// let alice = Node::empty().with_property("name", "Alice");
/// let path = Path::new([PathItem::from(alice), "KNOWS".into(), PathItem::Empty])?;
/// assert_eq!(path.len(), 1);
/// assert_eq!(path.relationships()[0].type_name(), "KNOWS");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Path(Walkable);

impl Path {
    /// Coerce `items` into one continuous traversal.
    ///
    /// Empty items and property maps become fresh nodes. A type name (with
    /// optional properties) sitting between two walkable neighbours becomes
    /// a relationship from the previous neighbour's end node to the next
    /// one's start node. Everything is then spliced with [`walk`](super::walk).
    /// A type name without two walkable neighbours fails with `NotWalkable`.
    pub fn new(items: impl IntoIterator<Item = PathItem>) -> Result<Path> {
        let mut slots: Vec<Slot> = items
            .into_iter()
            .map(|item| match item {
                PathItem::Entity(entity) => Slot::Entity(entity),
                PathItem::Walkable(walkable) => Slot::Walkable(walkable),
                PathItem::Empty => Slot::Entity(Entity::Node(Node::empty())),
                PathItem::Properties(properties) => {
                    Slot::Entity(Entity::Node(Node::new(Vec::<String>::new(), properties)))
                }
                PathItem::Type(name) => Slot::Pending(name, PropertyMap::new()),
                PathItem::TypedProperties(name, properties) => Slot::Pending(name, properties),
            })
            .collect();

        for i in 1..slots.len().saturating_sub(1) {
            if !matches!(slots[i], Slot::Pending(..)) {
                continue;
            }
            let (Some(prev), Some(next)) = (slots[i - 1].as_walk(), slots[i + 1].as_walk()) else {
                continue;
            };
            let (start, end) = (prev.end_node(), next.start_node());
            if let Slot::Pending(name, properties) = &slots[i] {
                let rel = RelationshipType::named(name).relate_with(start, end, properties.clone());
                slots[i] = Slot::Entity(Entity::Relationship(rel));
            }
        }

        let mut walkables: Vec<&dyn Walk> = Vec::with_capacity(slots.len());
        for slot in &slots {
            match slot {
                Slot::Pending(name, _) => return Err(Error::NotWalkable(format!("{name:?}"))),
                other => walkables.extend(other.as_walk()),
            }
        }
        Ok(Path(Walkable::from_walk(&walkables)?))
    }

    pub fn as_walkable(&self) -> &Walkable {
        &self.0
    }

    pub fn into_walkable(self) -> Walkable {
        self.0
    }
}

impl Deref for Path {
    type Target = Walkable;

    fn deref(&self) -> &Walkable {
        &self.0
    }
}

impl Walk for Path {
    fn sequence(&self) -> Vec<Entity> {
        self.0.sequence()
    }

    fn start_node(&self) -> Node {
        self.0.start_node()
    }

    fn end_node(&self) -> Node {
        self.0.end_node()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl PartialEq<Walkable> for Path {
    fn eq(&self, other: &Walkable) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Path> for Walkable {
    fn eq(&self, other: &Path) -> bool {
        *self == other.0
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path(order={}, size={}) ", self.0.as_subgraph().order(), self.0.len())?;
        fmt::Debug::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_empty_nodes_and_type() {
        let path = Path::new([PathItem::Empty, "X".into(), PathItem::Empty]).unwrap();
        assert_eq!(path.as_sequence().len(), 3);
        assert_ne!(path.start_node(), path.end_node());
        assert_eq!(path.relationships()[0].type_name(), "X");
        assert!(path.start_node().labels().unwrap().is_empty());
    }

    #[test]
    fn test_equal_to_walkable_both_ways() {
        let path = Path::new([PathItem::Empty, "X".into(), PathItem::Empty]).unwrap();
        let same = Walkable::new(path.as_sequence().to_vec()).unwrap();
        assert!(path == same);
        assert!(same == path);

        let reversed: Vec<Entity> = path.as_sequence().iter().rev().cloned().collect();
        let other = Walkable::new(reversed).unwrap();
        assert!(other != path);
        assert!(path != other);
    }

    #[test]
    fn test_property_shorthand() {
        let mut alice = PropertyMap::new();
        alice.insert("name".into(), Value::from("Alice"));
        let mut since = PropertyMap::new();
        since.insert("since".into(), Value::Int(1999));
        let path = Path::new([
            PathItem::from(alice),
            PathItem::from(("KNOWS", since)),
            PathItem::Empty,
        ])
        .unwrap();
        assert_eq!(path.start_node().get("name").unwrap(), Value::from("Alice"));
        assert_eq!(path.get(0).unwrap().get("since"), Value::Int(1999));
    }

    #[test]
    fn test_splices_paths_and_reverses_relationships() {
        let alice = Node::empty().with_property("name", "Alice");
        let bob = Node::empty().with_property("name", "Bob");
        let carol = Node::empty().with_property("name", "Carol");
        let dave = Node::empty().with_property("name", "Dave");
        let eve = Node::empty().with_property("name", "Eve");

        let abc = Path::new([
            PathItem::from(alice.clone()),
            "KNOWS".into(),
            bob.clone().into(),
            Relationship::typed(carol.clone(), "KNOWS", bob.clone()).into(),
            carol.clone().into(),
        ])
        .unwrap();
        assert_eq!(abc.as_subgraph().order(), 3);
        assert_eq!(abc.len(), 2);

        let de = Path::new([PathItem::from(dave.clone()), "KNOWS".into(), eve.clone().into()]).unwrap();
        let abcde = Path::new([PathItem::from(abc), "KNOWS".into(), de.into()]).unwrap();
        assert_eq!(abcde.as_subgraph().order(), 5);
        assert_eq!(abcde.len(), 4);
        assert_eq!(abcde.nodes(), vec![alice, bob, carol.clone(), dave.clone(), eve]);
        let bridge = abcde.get(2).unwrap();
        assert_eq!(bridge.start_node(), carol);
        assert_eq!(bridge.end_node(), dave);
    }

    #[test]
    fn test_type_without_neighbours_is_not_walkable() {
        let err = Path::new([PathItem::from("KNOWS"), PathItem::Empty]).unwrap_err();
        assert!(matches!(err, Error::NotWalkable(_)));
        let err = Path::new([PathItem::Empty, "A".into(), "B".into(), PathItem::Empty]).unwrap_err();
        assert!(matches!(err, Error::NotWalkable(_)));
    }

    #[test]
    fn test_no_items() {
        assert!(matches!(Path::new(Vec::<PathItem>::new()), Err(Error::InvalidArgument(_))));
    }
}
