//! Property graph storage.
//!
//! A [`GraphStore`] hands out [`GraphTransaction`]s. Everything written
//! through a transaction becomes visible together on
//! [`GraphTransaction::commit`]; dropping the transaction discards it.
//!
//! Nodes are identified for matching by a [`NodeKey`]: an explicit node kind
//! plus the feature source id or the point index. Centroids use WGS84 with
//! `x = longitude`, `y = latitude`.

use std::{error::Error as StdError, fmt};

use geo::Coord;
use thiserror::Error;

use crate::FeatureCategory;

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::{SqliteGraphStore, SqliteGraphTransaction};

/// JSON object holding node or relationship properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Store-assigned node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i64);

/// Store-assigned relationship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub i64);

/// Kind tag stored alongside every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    /// A map feature of the given category.
    Feature(FeatureCategory),
    /// A point of interest.
    Point,
}

impl NodeKind {
    /// Every node kind.
    pub const ALL: [Self; 4] = [
        Self::Feature(FeatureCategory::Building),
        Self::Feature(FeatureCategory::Street),
        Self::Feature(FeatureCategory::Vegetation),
        Self::Point,
    ];

    /// Label persisted for the kind.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Feature(category) => category.label(),
            Self::Point => "Point",
        }
    }

    /// Parse a persisted label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity used to match nodes: kind plus external key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    /// Node kind.
    pub kind: NodeKind,
    /// Feature source id, or the decimal point index.
    pub key: String,
}

impl NodeKey {
    /// Key of a feature node.
    pub fn feature(category: FeatureCategory, source_id: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Feature(category),
            key: source_id.into(),
        }
    }

    /// Key of a point node.
    pub fn point(idx: u64) -> Self {
        Self {
            kind: NodeKind::Point,
            key: idx.to_string(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.key)
    }
}

/// Node to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    /// Matching identity.
    pub key: NodeKey,
    /// Location of the node.
    pub centroid: Coord<f64>,
    /// Remaining properties.
    pub properties: Properties,
}

/// Node as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Store-assigned id.
    pub id: NodeId,
    /// Matching identity.
    pub key: NodeKey,
    /// Location of the node.
    pub centroid: Coord<f64>,
    /// Remaining properties.
    pub properties: Properties,
}

/// Directed relationship to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRelationship {
    /// Relationship type.
    pub rel_type: String,
    /// Start node.
    pub source: NodeId,
    /// End node.
    pub target: NodeId,
    /// Relationship properties.
    pub properties: Properties,
}

/// Relationship as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRelationship {
    /// Store-assigned id.
    pub id: RelationshipId,
    /// Relationship type.
    pub rel_type: String,
    /// Start node.
    pub source: NodeId,
    /// End node.
    pub target: NodeId,
    /// Relationship properties.
    pub properties: Properties,
}

/// Result of a merge-by-key write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No node had the key; one was created.
    Created(NodeId),
    /// A node with the key already existed and was left untouched.
    Matched(NodeId),
}

impl MergeOutcome {
    /// Id of the created or matched node.
    pub const fn id(self) -> NodeId {
        match self {
            Self::Created(id) | Self::Matched(id) => id,
        }
    }
}

/// Boxed error raised by a storage backend.
pub type BackendError = Box<dyn StdError + Send + Sync>;

/// Errors raised by a graph store.
#[derive(Debug, Error)]
pub enum GraphStoreError {
    /// The store could not be reached or opened.
    #[error("failed to connect to graph store {target}")]
    Connectivity {
        /// Description of the store.
        target: String,
        /// Underlying failure.
        #[source]
        source: BackendError,
    },
    /// A read or write failed.
    #[error("graph store operation '{operation}' failed")]
    Operation {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: BackendError,
    },
    /// Properties could not be encoded or decoded.
    #[error("failed to encode properties for {subject}")]
    Properties {
        /// Node or relationship whose properties failed.
        subject: String,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// A persisted value did not match the expected model.
    #[error("corrupt graph data: {message}")]
    Corrupt {
        /// Description of the problem.
        message: String,
    },
}

impl GraphStoreError {
    /// Wrap a backend failure for `operation`.
    pub fn operation(operation: &'static str, source: impl Into<BackendError>) -> Self {
        Self::Operation {
            operation,
            source: source.into(),
        }
    }
}

/// Writes applied atomically to a graph store.
pub trait GraphTransaction {
    /// Create a node unconditionally.
    fn create_node(&mut self, node: &NewNode) -> Result<NodeId, GraphStoreError>;

    /// Create a node unless one with the same key exists.
    ///
    /// A matched node keeps its original centroid and properties.
    fn merge_node(&mut self, node: &NewNode) -> Result<MergeOutcome, GraphStoreError>;

    /// Ids of every node carrying `key`, including uncommitted writes.
    fn find_nodes(&mut self, key: &NodeKey) -> Result<Vec<NodeId>, GraphStoreError>;

    /// Create a directed relationship between two existing nodes.
    fn create_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, GraphStoreError>;

    /// Make every write of the transaction visible.
    fn commit(self) -> Result<(), GraphStoreError>;
}

/// Transactional property graph store.
pub trait GraphStore {
    /// Transaction type handed out by [`GraphStore::begin`].
    type Transaction<'a>: GraphTransaction
    where
        Self: 'a;

    /// Start a transaction.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, GraphStoreError>;

    /// Committed nodes, optionally restricted to one kind, ordered by id.
    fn nodes(&self, kind: Option<NodeKind>) -> Result<Vec<GraphNode>, GraphStoreError>;

    /// Committed relationships ordered by id.
    fn relationships(&self) -> Result<Vec<GraphRelationship>, GraphStoreError>;
}

impl<S: GraphStore> GraphStore for &mut S {
    type Transaction<'a>
        = S::Transaction<'a>
    where
        Self: 'a;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, GraphStoreError> {
        (**self).begin()
    }

    fn nodes(&self, kind: Option<NodeKind>) -> Result<Vec<GraphNode>, GraphStoreError> {
        (**self).nodes(kind)
    }

    fn relationships(&self) -> Result<Vec<GraphRelationship>, GraphStoreError> {
        (**self).relationships()
    }
}
