use thiserror::Error;

use crate::core::types::{Coord, ItemId, NodeId, TaskId, WorkerId};

/// Plain classification of a [`ColonyError`], used by the scheduler to pick
/// a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingRecipeData,
    Unsatisfiable,
    RecipeCycle,
    InvalidWorldReference,
    InvalidRequest,
    InvalidConfig,
    Io,
    Serialization,
}

/// A world lookup that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldRef {
    Tile(Coord),
    Node(NodeId),
    Item(ItemId),
    Task(TaskId),
    Worker(WorkerId),
}

impl std::fmt::Display for WorldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldRef::Tile(c) => write!(f, "tile {}", c),
            WorldRef::Node(id) => write!(f, "node {}", id.0),
            WorldRef::Item(id) => write!(f, "item {}", id.0),
            WorldRef::Task(id) => write!(f, "task {}", id.0),
            WorldRef::Worker(id) => write!(f, "worker {}", id.0),
        }
    }
}

#[derive(Error, Debug)]
pub enum ColonyError {
    #[error("Missing recipe data: {0}")]
    MissingRecipeData(String),

    #[error("Unsatisfiable demand for {need}: {reason}")]
    Unsatisfiable { need: String, reason: String },

    #[error("Recipe cycle while producing {0}")]
    RecipeCycle(String),

    #[error("Invalid world reference: {0}")]
    InvalidWorldReference(WorldRef),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ColonyError {
    pub fn unsatisfiable(need: impl Into<String>, reason: impl Into<String>) -> Self {
        ColonyError::Unsatisfiable {
            need: need.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ColonyError::MissingRecipeData(_) => ErrorKind::MissingRecipeData,
            ColonyError::Unsatisfiable { .. } => ErrorKind::Unsatisfiable,
            ColonyError::RecipeCycle(_) => ErrorKind::RecipeCycle,
            ColonyError::InvalidWorldReference(_) => ErrorKind::InvalidWorldReference,
            ColonyError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ColonyError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ColonyError::IoError(_) => ErrorKind::Io,
            ColonyError::SerdeError(_) | ColonyError::TomlError(_) => ErrorKind::Serialization,
        }
    }
}

pub type Result<T> = std::result::Result<T, ColonyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_projection() {
        let err = ColonyError::unsatisfiable("Axe", "no producer");
        assert_eq!(err.kind(), ErrorKind::Unsatisfiable);
        assert_eq!(err.to_string(), "Unsatisfiable demand for Axe: no producer");

        let err = ColonyError::InvalidWorldReference(WorldRef::Node(NodeId(7)));
        assert_eq!(err.kind(), ErrorKind::InvalidWorldReference);
        assert_eq!(err.to_string(), "Invalid world reference: node 7");
    }
}
