//! In-memory doubles for the geometry source and the graph store, used by
//! unit and behaviour tests.

use std::collections::HashMap;
use std::io;

use geo::Coord;

use crate::graph::{
    GraphNode, GraphRelationship, GraphStore, GraphStoreError, GraphTransaction, MergeOutcome,
    NewNode, NewRelationship, NodeId, NodeKey, NodeKind, RelationshipId,
};
use crate::{
    FeatureCategory, GeometrySource, GeometrySourceError, RawCandidate, RawFeatureRow,
    RawProximityRow, SearchRadius,
};

/// Geometry source serving canned rows.
///
/// Proximity rows are returned as stored, minus candidates whose category is
/// not requested or whose distance falls outside the radius. The double does
/// not synthesise candidate-less rows; tests add them explicitly.
#[derive(Debug, Default, Clone)]
pub struct MemoryGeometrySource {
    features: HashMap<FeatureCategory, Vec<RawFeatureRow>>,
    proximity: Vec<RawProximityRow>,
    unreachable: Option<String>,
}

impl MemoryGeometrySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source whose every query fails to connect to `target`.
    pub fn unreachable(target: impl Into<String>) -> Self {
        Self {
            unreachable: Some(target.into()),
            ..Self::default()
        }
    }

    /// Add a feature row of `category`.
    #[must_use]
    pub fn with_feature(mut self, category: FeatureCategory, row: RawFeatureRow) -> Self {
        self.features.entry(category).or_default().push(row);
        self
    }

    /// Add a proximity row linking point `idx` to a feature.
    #[must_use]
    pub fn with_neighbour(
        mut self,
        idx: u64,
        at: Coord<f64>,
        category: FeatureCategory,
        source_id: &str,
        distance: f64,
        bearing: f64,
    ) -> Self {
        self.proximity.push(RawProximityRow {
            point_idx: idx,
            point_centroid: at,
            candidate: Some(RawCandidate {
                category: Some(category),
                source_id: source_id.to_owned(),
                distance,
                bearing,
            }),
        });
        self
    }

    /// Add a proximity row for point `idx` with no feature in range.
    #[must_use]
    pub fn with_lonely_point(mut self, idx: u64, at: Coord<f64>) -> Self {
        self.proximity.push(RawProximityRow {
            point_idx: idx,
            point_centroid: at,
            candidate: None,
        });
        self
    }

    fn check_reachable(&self) -> Result<(), GeometrySourceError> {
        match &self.unreachable {
            Some(target) => Err(GeometrySourceError::Connectivity {
                target: target.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "unreachable").into(),
            }),
            None => Ok(()),
        }
    }
}

/// Build a well-formed feature row for tests.
pub fn feature_row(source_id: &str, centroid: Coord<f64>) -> RawFeatureRow {
    RawFeatureRow {
        source_id: Some(source_id.to_owned()),
        area: Some(120.0),
        length: Some(80.0),
        centroid: Some(centroid),
        ..RawFeatureRow::default()
    }
}

impl GeometrySource for MemoryGeometrySource {
    fn query_features(
        &self,
        category: FeatureCategory,
    ) -> Result<Vec<RawFeatureRow>, GeometrySourceError> {
        self.check_reachable()?;
        Ok(self.features.get(&category).cloned().unwrap_or_default())
    }

    fn query_proximity(
        &self,
        categories: &[FeatureCategory],
        radius: SearchRadius,
    ) -> Result<Vec<RawProximityRow>, GeometrySourceError> {
        self.check_reachable()?;
        Ok(self
            .proximity
            .iter()
            .filter(|row| {
                row.candidate.as_ref().is_none_or(|candidate| {
                    candidate
                        .category
                        .is_none_or(|category| categories.contains(&category))
                        && radius.contains(candidate.distance)
                })
            })
            .cloned()
            .collect())
    }
}

/// Graph store keeping everything in memory.
///
/// A transaction works on a copy of the committed state and writes it back
/// on commit, so dropping a transaction discards its writes.
#[derive(Debug, Default, Clone)]
pub struct MemoryGraphStore {
    state: GraphState,
}

#[derive(Debug, Default, Clone)]
struct GraphState {
    nodes: Vec<GraphNode>,
    relationships: Vec<GraphRelationship>,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryGraphStore {
    type Transaction<'a> = MemoryGraphTransaction<'a>;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, GraphStoreError> {
        let staged = self.state.clone();
        Ok(MemoryGraphTransaction {
            target: &mut self.state,
            staged,
        })
    }

    fn nodes(&self, kind: Option<NodeKind>) -> Result<Vec<GraphNode>, GraphStoreError> {
        Ok(self
            .state
            .nodes
            .iter()
            .filter(|node| kind.is_none_or(|kind| node.key.kind == kind))
            .cloned()
            .collect())
    }

    fn relationships(&self) -> Result<Vec<GraphRelationship>, GraphStoreError> {
        Ok(self.state.relationships.clone())
    }
}

/// Transaction over a [`MemoryGraphStore`].
#[derive(Debug)]
pub struct MemoryGraphTransaction<'a> {
    target: &'a mut GraphState,
    staged: GraphState,
}

impl MemoryGraphTransaction<'_> {
    fn contains(&self, id: NodeId) -> bool {
        self.staged.nodes.iter().any(|node| node.id == id)
    }
}

impl GraphTransaction for MemoryGraphTransaction<'_> {
    fn create_node(&mut self, node: &NewNode) -> Result<NodeId, GraphStoreError> {
        let id = NodeId(next_id(self.staged.nodes.len()));
        self.staged.nodes.push(GraphNode {
            id,
            key: node.key.clone(),
            centroid: node.centroid,
            properties: node.properties.clone(),
        });
        Ok(id)
    }

    fn merge_node(&mut self, node: &NewNode) -> Result<MergeOutcome, GraphStoreError> {
        match self.staged.nodes.iter().find(|existing| existing.key == node.key) {
            Some(existing) => Ok(MergeOutcome::Matched(existing.id)),
            None => self.create_node(node).map(MergeOutcome::Created),
        }
    }

    fn find_nodes(&mut self, key: &NodeKey) -> Result<Vec<NodeId>, GraphStoreError> {
        Ok(self
            .staged
            .nodes
            .iter()
            .filter(|node| &node.key == key)
            .map(|node| node.id)
            .collect())
    }

    fn create_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, GraphStoreError> {
        for end in [relationship.source, relationship.target] {
            if !self.contains(end) {
                return Err(GraphStoreError::operation(
                    "insert relationship",
                    format!("node {} does not exist", end.0),
                ));
            }
        }
        let id = RelationshipId(next_id(self.staged.relationships.len()));
        self.staged.relationships.push(GraphRelationship {
            id,
            rel_type: relationship.rel_type.clone(),
            source: relationship.source,
            target: relationship.target,
            properties: relationship.properties.clone(),
        });
        Ok(id)
    }

    fn commit(self) -> Result<(), GraphStoreError> {
        *self.target = self.staged;
        Ok(())
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).map_or(i64::MAX, |len| len + 1)
}
