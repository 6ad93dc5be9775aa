//! Writing projected records into a graph store.
//!
//! Each `load_*` call runs in exactly one store transaction. On any error the
//! transaction is dropped and nothing from that batch becomes visible.
//!
//! Feature creation is unconditional, so loading the same batch twice yields
//! duplicate feature nodes. Point loading merges by index and is idempotent.

use std::fmt;

use log::{debug, warn};
use serde_json::{Value, json};
use thiserror::Error;

use crate::graph::{
    GraphStore, GraphStoreError, GraphTransaction, MergeOutcome, NewNode, NewRelationship, NodeId,
    NodeKey, Properties,
};
use crate::{
    FeatureBatch, FeatureCategory, FeatureDescriptors, FeatureRef, NEIGHBOUR_RELATIONSHIP,
    PointNodeRecord, ProximityEdgeRecord,
};

/// Counts of what a load call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Nodes newly created.
    pub nodes_created: usize,
    /// Nodes that already existed and were matched by key.
    pub nodes_matched: usize,
    /// Relationships created.
    pub relationships_created: usize,
}

/// Which end of a proximity edge could not be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingEndpoint {
    /// The point node is absent.
    Point,
    /// The feature node is absent.
    Feature,
    /// Neither node exists.
    Both,
}

impl fmt::Display for MissingEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "point",
            Self::Feature => "feature",
            Self::Both => "point and feature",
        })
    }
}

/// A proximity edge whose endpoints are not both in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    /// Index of the point the edge ends at.
    pub point_idx: u64,
    /// Feature the edge starts from.
    pub feature: FeatureRef,
    /// The endpoint(s) that were not found.
    pub missing: MissingEndpoint,
}

impl fmt::Display for DanglingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> point {} (missing {})",
            self.feature, self.point_idx, self.missing
        )
    }
}

/// Errors raised while loading records into the graph.
#[derive(Debug, Error)]
pub enum GraphLoadError {
    /// Edges referenced nodes that do not exist. Every offender is listed.
    #[error("{} proximity edge(s) reference missing nodes", .references.len())]
    DanglingReference {
        /// All dangling edges of the batch, in batch order.
        references: Vec<DanglingEdge>,
    },
    /// An edge endpoint matched more than one node.
    #[error("reference matches {} nodes: {}", .matched.len(), join_keys(.matched))]
    AmbiguousReference {
        /// Key of every matching node, in lookup order.
        matched: Vec<NodeKey>,
    },
    /// The store rejected an operation.
    #[error(transparent)]
    Store(#[from] GraphStoreError),
}

/// Loads feature nodes, point nodes and proximity edges into a store.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::graph::GraphStore;
/// use mapgraph_core::loader::GraphLoader;
/// use mapgraph_core::{PointNodeRecord, SqliteGraphStore};
///
/// let store = SqliteGraphStore::open_in_memory()?;
/// let mut loader = GraphLoader::new(store);
/// let points = [PointNodeRecord { idx: 7, centroid: Coord { x: 10.0, y: 20.0 } }];
/// loader.load_point_nodes(&points)?;
/// let again = loader.load_point_nodes(&points)?;
/// assert_eq!(again.nodes_matched, 1);
/// assert_eq!(loader.store().nodes(None)?.len(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct GraphLoader<S> {
    store: S,
}

impl<S: GraphStore> GraphLoader<S> {
    /// Wrap a graph store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Release the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Create one node per record of the batch.
    ///
    /// Nodes are created unconditionally; running this twice for the same
    /// batch creates duplicates.
    pub fn load_feature_nodes(
        &mut self,
        batch: &FeatureBatch,
    ) -> Result<LoadSummary, GraphLoadError> {
        let mut tx = self.store.begin()?;
        for record in batch.records() {
            let mut properties = descriptor_properties(&record.descriptors, &record.source_id)?;
            properties.insert("source_id".into(), Value::String(record.source_id.clone()));
            tx.create_node(&NewNode {
                key: NodeKey::feature(record.category, record.source_id.as_str()),
                centroid: record.centroid,
                properties,
            })?;
        }
        tx.commit()?;
        debug!("committed {} {} nodes", batch.len(), batch.category());
        Ok(LoadSummary {
            nodes_created: batch.len(),
            ..LoadSummary::default()
        })
    }

    /// Merge one node per point index.
    ///
    /// A point already in the graph is matched and left untouched, including
    /// its centroid.
    pub fn load_point_nodes(
        &mut self,
        points: &[PointNodeRecord],
    ) -> Result<LoadSummary, GraphLoadError> {
        let mut tx = self.store.begin()?;
        let mut summary = LoadSummary::default();
        for point in points {
            let mut properties = Properties::new();
            properties.insert("idx".into(), json!(point.idx));
            let outcome = tx.merge_node(&NewNode {
                key: NodeKey::point(point.idx),
                centroid: point.centroid,
                properties,
            })?;
            match outcome {
                MergeOutcome::Created(_) => summary.nodes_created += 1,
                MergeOutcome::Matched(_) => summary.nodes_matched += 1,
            }
        }
        tx.commit()?;
        debug!(
            "committed {} point nodes ({} created, {} matched)",
            points.len(),
            summary.nodes_created,
            summary.nodes_matched
        );
        Ok(summary)
    }

    /// Create one `IS_NEIGHBOR_OF` relationship per record, directed from
    /// the feature node to the point node.
    ///
    /// Every record whose endpoints are missing is collected before the
    /// batch is rejected, so the error lists all of them.
    pub fn load_proximity_edges(
        &mut self,
        edges: &[ProximityEdgeRecord],
    ) -> Result<LoadSummary, GraphLoadError> {
        let mut tx = self.store.begin()?;
        let mut resolved = Vec::with_capacity(edges.len());
        let mut dangling = Vec::new();

        for edge in edges {
            let point = find_unique(&mut tx, &[NodeKey::point(edge.point_idx)])?;
            let feature = find_unique(&mut tx, &feature_keys(&edge.feature))?;
            match (feature, point) {
                (Some(feature), Some(point)) => resolved.push((edge, feature, point)),
                (feature, point) => dangling.push(DanglingEdge {
                    point_idx: edge.point_idx,
                    feature: edge.feature.clone(),
                    missing: match (feature, point) {
                        (Some(_), None) => MissingEndpoint::Point,
                        (None, Some(_)) => MissingEndpoint::Feature,
                        _ => MissingEndpoint::Both,
                    },
                }),
            }
        }

        if !dangling.is_empty() {
            warn!(
                "rejected {} proximity edges: {} reference missing nodes",
                edges.len(),
                dangling.len()
            );
            return Err(GraphLoadError::DanglingReference {
                references: dangling,
            });
        }

        for (edge, feature, point) in resolved {
            let mut properties = Properties::new();
            properties.insert("distance".into(), json!(edge.distance));
            properties.insert("bearing".into(), json!(edge.bearing));
            tx.create_relationship(&NewRelationship {
                rel_type: NEIGHBOUR_RELATIONSHIP.to_owned(),
                source: feature,
                target: point,
                properties,
            })?;
        }
        tx.commit()?;
        debug!("committed {} proximity edges", edges.len());
        Ok(LoadSummary {
            relationships_created: edges.len(),
            ..LoadSummary::default()
        })
    }
}

fn descriptor_properties(
    descriptors: &FeatureDescriptors,
    source_id: &str,
) -> Result<Properties, GraphStoreError> {
    match serde_json::to_value(descriptors) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(GraphStoreError::Corrupt {
            message: format!("descriptors of {source_id} serialised to {other}"),
        }),
        Err(source) => Err(GraphStoreError::Properties {
            subject: source_id.to_owned(),
            source,
        }),
    }
}

fn feature_keys(feature: &FeatureRef) -> Vec<NodeKey> {
    match feature.category {
        Some(category) => vec![NodeKey::feature(category, feature.source_id.as_str())],
        None => FeatureCategory::ALL
            .into_iter()
            .map(|category| NodeKey::feature(category, feature.source_id.as_str()))
            .collect(),
    }
}

fn find_unique<T: GraphTransaction>(
    tx: &mut T,
    keys: &[NodeKey],
) -> Result<Option<NodeId>, GraphLoadError> {
    let mut found = Vec::new();
    for key in keys {
        found.extend(tx.find_nodes(key)?.into_iter().map(|id| (key, id)));
    }
    match found.as_slice() {
        [] => Ok(None),
        [(_, id)] => Ok(Some(*id)),
        _ => Err(GraphLoadError::AmbiguousReference {
            matched: found.into_iter().map(|(key, _)| key.clone()).collect(),
        }),
    }
}

fn join_keys(keys: &[NodeKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
