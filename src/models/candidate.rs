//! # Candidates
//!
//! Entities flagged for possible editing or redaction, and the per-area batch
//! the orchestrator hands to the change compiler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three taggable entity kinds of the map data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Node,
    Way,
    Relation,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Node, EntityType::Way, EntityType::Relation];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Node => "node",
            EntityType::Way => "way",
            EntityType::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(EntityType::Node),
            "way" => Ok(EntityType::Way),
            "relation" => Ok(EntityType::Relation),
            other => Err(format!("unknown entity type '{other}'")),
        }
    }
}

/// Processing status of a candidate in the tracker store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Unprocessed,
    Processed,
    Failed,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Unprocessed => "unprocessed",
            CandidateStatus::Processed => "processed",
            CandidateStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(CandidateStatus::Unprocessed),
            "processed" => Ok(CandidateStatus::Processed),
            "failed" => Ok(CandidateStatus::Failed),
            other => Err(format!("unknown candidate status '{other}'")),
        }
    }
}

/// A candidate row as stored in the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_type: EntityType,
    pub osm_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub status: CandidateStatus,
}

impl Candidate {
    pub fn new(entity_type: EntityType, osm_id: i64, lat: f64, lon: f64) -> Self {
        Self {
            entity_type,
            osm_id,
            lat,
            lon,
            status: CandidateStatus::Unprocessed,
        }
    }
}

/// One unit of work for the change compiler: the candidate ids of each type
/// found in a single area (or taken directly in ignore-regions mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityBatch {
    pub nodes: Vec<i64>,
    pub ways: Vec<i64>,
    pub relations: Vec<i64>,
}

impl EntityBatch {
    pub fn new(nodes: Vec<i64>, ways: Vec<i64>, relations: Vec<i64>) -> Self {
        Self {
            nodes,
            ways,
            relations,
        }
    }

    pub fn ids(&self, entity_type: EntityType) -> &[i64] {
        match entity_type {
            EntityType::Node => &self.nodes,
            EntityType::Way => &self.ways,
            EntityType::Relation => &self.relations,
        }
    }

    pub fn ids_mut(&mut self, entity_type: EntityType) -> &mut Vec<i64> {
        match entity_type {
            EntityType::Node => &mut self.nodes,
            EntityType::Way => &mut self.ways,
            EntityType::Relation => &mut self.relations,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len() + self.ways.len() + self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for EntityBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {}",
            self.nodes.len(),
            self.ways.len(),
            self.relations.len()
        )
    }
}
