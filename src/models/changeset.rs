//! # Changesets
//!
//! The ordered edit operations the change compiler produces for one entity
//! batch. A changeset has no identity until it is opened against the remote
//! API; before upload it is sliced into chunks of bounded size, and chunk
//! order must be preserved because later chunks may reference versions
//! created by earlier ones.

use crate::models::candidate::EntityType;
use serde::{Deserialize, Serialize};

/// Default upper bound on elements per uploaded chunk. The remote service
/// rejects larger uploads.
pub const DEFAULT_MAX_CHANGESET_ELEMENTS: usize = 500;

/// What an edit does to its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    Create,
    Modify,
    Delete,
}

impl EditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::Create => "create",
            EditAction::Modify => "modify",
            EditAction::Delete => "delete",
        }
    }
}

/// Key/value tag pair. Order is kept as produced.
pub type Tag = (String, String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMember {
    pub member_type: EntityType,
    pub member_ref: i64,
    pub role: String,
}

/// Element body in the shape the upload document needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Node {
        id: i64,
        version: i64,
        lat: f64,
        lon: f64,
        tags: Vec<Tag>,
    },
    Way {
        id: i64,
        version: i64,
        nodes: Vec<i64>,
        tags: Vec<Tag>,
    },
    Relation {
        id: i64,
        version: i64,
        members: Vec<RelationMember>,
        tags: Vec<Tag>,
    },
}

impl Element {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Element::Node { .. } => EntityType::Node,
            Element::Way { .. } => EntityType::Way,
            Element::Relation { .. } => EntityType::Relation,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Element::Node { id, .. } | Element::Way { id, .. } | Element::Relation { id, .. } => {
                *id
            }
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            Element::Node { version, .. }
            | Element::Way { version, .. }
            | Element::Relation { version, .. } => *version,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        match self {
            Element::Node { tags, .. } | Element::Way { tags, .. } | Element::Relation { tags, .. } => {
                tags
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    pub action: EditAction,
    pub element: Element,
    /// Only meaningful for deletes: ask the server to skip the delete when
    /// the element is still referenced.
    #[serde(default)]
    pub if_unused: bool,
}

impl EditOperation {
    pub fn new(action: EditAction, element: Element) -> Self {
        Self {
            action,
            element,
            if_unused: false,
        }
    }
}

/// Ordered list of edit operations for one entity batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    operations: Vec<EditOperation>,
}

impl Changeset {
    pub fn new(operations: Vec<EditOperation>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &[EditOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Consecutive slices of at most `max_elements` operations, in order.
    /// A zero bound is treated as one element per chunk.
    pub fn chunks(&self, max_elements: usize) -> impl Iterator<Item = &[EditOperation]> {
        self.operations.chunks(max_elements.max(1))
    }

    pub fn chunk_count(&self, max_elements: usize) -> usize {
        self.operations.len().div_ceil(max_elements.max(1))
    }
}

impl From<Vec<EditOperation>> for Changeset {
    fn from(operations: Vec<EditOperation>) -> Self {
        Self::new(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_delete(id: i64) -> EditOperation {
        EditOperation::new(
            EditAction::Delete,
            Element::Node {
                id,
                version: 1,
                lat: 0.0,
                lon: 0.0,
                tags: vec![],
            },
        )
    }

    #[test]
    fn test_chunks_preserve_order_and_bound() {
        let changeset: Changeset = (1..=1201).map(node_delete).collect::<Vec<_>>().into();
        let chunks: Vec<_> = changeset.chunks(500).collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(changeset.chunk_count(500), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[2].len(), 201);
        assert_eq!(chunks[1][0].element.id(), 501);
        assert_eq!(chunks[2].last().unwrap().element.id(), 1201);
    }

    #[test]
    fn test_empty_changeset_has_no_chunks() {
        let changeset = Changeset::default();
        assert!(changeset.is_empty());
        assert_eq!(changeset.chunks(500).count(), 0);
        assert_eq!(changeset.chunk_count(500), 0);
    }

    #[test]
    fn test_element_accessors() {
        let way = Element::Way {
            id: 42,
            version: 3,
            nodes: vec![1, 2],
            tags: vec![("highway".to_string(), "residential".to_string())],
        };
        assert_eq!(way.entity_type(), EntityType::Way);
        assert_eq!(way.id(), 42);
        assert_eq!(way.version(), 3);
        assert_eq!(way.tags().len(), 1);
    }
}
