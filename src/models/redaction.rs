//! # Redactions
//!
//! Directives that hide one historical version of an entity. They are issued
//! one request at a time, after the owning changeset has been fully applied,
//! in the order the change compiler produced them.

use crate::models::candidate::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which configured redaction id a directive is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionMode {
    Hidden,
    Visible,
}

impl RedactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedactionMode::Hidden => "hidden",
            RedactionMode::Visible => "visible",
        }
    }
}

/// A specific version of a specific entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityRef {
    Node { id: i64, version: i64 },
    Way { id: i64, version: i64 },
    Relation { id: i64, version: i64 },
}

impl EntityRef {
    pub fn new(entity_type: EntityType, id: i64, version: i64) -> Self {
        match entity_type {
            EntityType::Node => EntityRef::Node { id, version },
            EntityType::Way => EntityRef::Way { id, version },
            EntityType::Relation => EntityRef::Relation { id, version },
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityRef::Node { .. } => EntityType::Node,
            EntityRef::Way { .. } => EntityType::Way,
            EntityRef::Relation { .. } => EntityType::Relation,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            EntityRef::Node { id, .. } | EntityRef::Way { id, .. } | EntityRef::Relation { id, .. } => {
                *id
            }
        }
    }

    pub fn version(&self) -> i64 {
        match self {
            EntityRef::Node { version, .. }
            | EntityRef::Way { version, .. }
            | EntityRef::Relation { version, .. } => *version,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} v{}", self.entity_type(), self.id(), self.version())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redaction {
    pub target: EntityRef,
    pub mode: RedactionMode,
}

impl Redaction {
    pub fn new(target: EntityRef, mode: RedactionMode) -> Self {
        Self { target, mode }
    }

    pub fn hidden(target: EntityRef) -> Self {
        Self::new(target, RedactionMode::Hidden)
    }

    pub fn visible(target: EntityRef) -> Self {
        Self::new(target, RedactionMode::Visible)
    }
}

impl fmt::Display for Redaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.mode.as_str())
    }
}

/// The pair of redaction ids configured for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionIds {
    pub hidden: i64,
    pub visible: i64,
}

impl Default for RedactionIds {
    fn default() -> Self {
        Self {
            hidden: 1,
            visible: 2,
        }
    }
}

impl RedactionIds {
    pub fn for_mode(&self, mode: RedactionMode) -> i64 {
        match mode {
            RedactionMode::Hidden => self.hidden,
            RedactionMode::Visible => self.visible,
        }
    }

    /// The configured ids without duplicates, ascending.
    pub fn distinct(&self) -> Vec<i64> {
        let mut ids = vec![self.hidden, self.visible];
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
