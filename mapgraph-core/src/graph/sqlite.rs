//! SQLite-backed property graph store.
//!
//! Nodes and relationships live in two tables. Properties are stored as JSON
//! text. Point keys are unique through a partial index so merge semantics
//! hold even if two writers race; feature keys are deliberately not unique
//! because feature creation is unconditional.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use geo::Coord;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use super::{
    GraphNode, GraphRelationship, GraphStore, GraphStoreError, GraphTransaction, MergeOutcome,
    NewNode, NewRelationship, NodeId, NodeKey, NodeKind, Properties, RelationshipId,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS graph_nodes (
        id INTEGER PRIMARY KEY,
        kind TEXT NOT NULL,
        node_key TEXT NOT NULL,
        x REAL NOT NULL,
        y REAL NOT NULL,
        properties TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_graph_nodes_kind_key
        ON graph_nodes(kind, node_key);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_graph_nodes_point_key
        ON graph_nodes(node_key) WHERE kind = 'Point';
    CREATE TABLE IF NOT EXISTS graph_relationships (
        id INTEGER PRIMARY KEY,
        rel_type TEXT NOT NULL,
        source_id INTEGER NOT NULL REFERENCES graph_nodes(id),
        target_id INTEGER NOT NULL REFERENCES graph_nodes(id),
        properties TEXT NOT NULL
    );
";

/// Graph store persisted in a SQLite database.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use mapgraph_core::graph::{GraphStore, GraphTransaction, NewNode, NodeKey, Properties};
/// use mapgraph_core::SqliteGraphStore;
///
/// let mut store = SqliteGraphStore::open_in_memory()?;
/// let mut tx = store.begin()?;
/// tx.merge_node(&NewNode {
///     key: NodeKey::point(7),
///     centroid: Coord { x: 10.0, y: 20.0 },
///     properties: Properties::new(),
/// })?;
/// tx.commit()?;
/// assert_eq!(store.nodes(None)?.len(), 1);
/// # Ok::<(), mapgraph_core::graph::GraphStoreError>(())
/// ```
pub struct SqliteGraphStore {
    connection: Connection,
    location: String,
}

impl fmt::Debug for SqliteGraphStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteGraphStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqliteGraphStore {
    /// Open or create a graph database at `path`.
    ///
    /// Parent directories are created and the schema is initialised when
    /// missing.
    pub fn open(path: &Utf8Path) -> Result<Self, GraphStoreError> {
        ensure_parent_dir(path).map_err(|source| GraphStoreError::Connectivity {
            target: path.to_string(),
            source: source.into(),
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| GraphStoreError::Connectivity {
                target: path.to_string(),
                source: source.into(),
            })?;
        Self::from_connection(connection, path.to_string())
    }

    /// Open a private in-memory graph database.
    pub fn open_in_memory() -> Result<Self, GraphStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| GraphStoreError::Connectivity {
                target: String::from(":memory:"),
                source: source.into(),
            })?;
        Self::from_connection(connection, String::from(":memory:"))
    }

    fn from_connection(connection: Connection, location: String) -> Result<Self, GraphStoreError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| GraphStoreError::operation("enable foreign keys", source))?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| GraphStoreError::operation("create graph schema", source))?;
        Ok(Self {
            connection,
            location,
        })
    }
}

impl GraphStore for SqliteGraphStore {
    type Transaction<'a> = SqliteGraphTransaction<'a>;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, GraphStoreError> {
        let transaction = self
            .connection
            .transaction()
            .map_err(|source| GraphStoreError::operation("begin transaction", source))?;
        Ok(SqliteGraphTransaction { transaction })
    }

    fn nodes(&self, kind: Option<NodeKind>) -> Result<Vec<GraphNode>, GraphStoreError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT id, kind, node_key, x, y, properties FROM graph_nodes
                 WHERE ?1 IS NULL OR kind = ?1 ORDER BY id",
            )
            .map_err(|source| GraphStoreError::operation("prepare node scan", source))?;
        let rows = statement
            .query_map([kind.map(NodeKind::label)], raw_node)
            .map_err(|source| GraphStoreError::operation("scan nodes", source))?;
        let nodes = rows
            .map(|row| {
                row.map_err(|source| GraphStoreError::operation("read node", source))
                    .and_then(RawNode::into_node)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    fn relationships(&self) -> Result<Vec<GraphRelationship>, GraphStoreError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT id, rel_type, source_id, target_id, properties
                 FROM graph_relationships ORDER BY id",
            )
            .map_err(|source| GraphStoreError::operation("prepare relationship scan", source))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|source| GraphStoreError::operation("scan relationships", source))?;
        let relationships = rows
            .map(|row| -> Result<GraphRelationship, GraphStoreError> {
                let (id, rel_type, source, target, properties) = row
                    .map_err(|source| GraphStoreError::operation("read relationship", source))?;
                Ok(GraphRelationship {
                    id: RelationshipId(id),
                    properties: decode_properties(&properties, || format!("relationship {id}"))?,
                    rel_type,
                    source: NodeId(source),
                    target: NodeId(target),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(relationships)
    }
}

/// Transaction over a [`SqliteGraphStore`]; rolls back when dropped.
pub struct SqliteGraphTransaction<'a> {
    transaction: Transaction<'a>,
}

impl fmt::Debug for SqliteGraphTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteGraphTransaction").finish_non_exhaustive()
    }
}

impl SqliteGraphTransaction<'_> {
    fn insert_node(&self, node: &NewNode) -> Result<NodeId, GraphStoreError> {
        let properties = encode_properties(&node.properties, || node.key.to_string())?;
        let mut statement = self
            .transaction
            .prepare_cached(
                "INSERT INTO graph_nodes (kind, node_key, x, y, properties)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .map_err(|source| GraphStoreError::operation("prepare node insert", source))?;
        statement
            .execute(params![
                node.key.kind.label(),
                node.key.key,
                node.centroid.x,
                node.centroid.y,
                properties
            ])
            .map_err(|source| GraphStoreError::operation("insert node", source))?;
        Ok(NodeId(self.transaction.last_insert_rowid()))
    }
}

impl GraphTransaction for SqliteGraphTransaction<'_> {
    fn create_node(&mut self, node: &NewNode) -> Result<NodeId, GraphStoreError> {
        self.insert_node(node)
    }

    fn merge_node(&mut self, node: &NewNode) -> Result<MergeOutcome, GraphStoreError> {
        let existing = self
            .transaction
            .prepare_cached("SELECT id FROM graph_nodes WHERE kind = ?1 AND node_key = ?2 LIMIT 1")
            .and_then(|mut statement| {
                statement
                    .query_row(params![node.key.kind.label(), node.key.key], |row| {
                        row.get::<_, i64>(0)
                    })
                    .optional()
            })
            .map_err(|source| GraphStoreError::operation("match node", source))?;
        match existing {
            Some(id) => Ok(MergeOutcome::Matched(NodeId(id))),
            None => self.insert_node(node).map(MergeOutcome::Created),
        }
    }

    fn find_nodes(&mut self, key: &NodeKey) -> Result<Vec<NodeId>, GraphStoreError> {
        let mut statement = self
            .transaction
            .prepare_cached("SELECT id FROM graph_nodes WHERE kind = ?1 AND node_key = ?2 ORDER BY id")
            .map_err(|source| GraphStoreError::operation("prepare node lookup", source))?;
        let ids = statement
            .query_map(params![key.kind.label(), key.key], |row| row.get::<_, i64>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|source| GraphStoreError::operation("look up node", source))?;
        Ok(ids.into_iter().map(NodeId).collect())
    }

    fn create_relationship(
        &mut self,
        relationship: &NewRelationship,
    ) -> Result<RelationshipId, GraphStoreError> {
        let properties = encode_properties(&relationship.properties, || {
            format!(
                "{} {}->{}",
                relationship.rel_type, relationship.source.0, relationship.target.0
            )
        })?;
        let mut statement = self
            .transaction
            .prepare_cached(
                "INSERT INTO graph_relationships (rel_type, source_id, target_id, properties)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(|source| GraphStoreError::operation("prepare relationship insert", source))?;
        statement
            .execute(params![
                relationship.rel_type,
                relationship.source.0,
                relationship.target.0,
                properties
            ])
            .map_err(|source| GraphStoreError::operation("insert relationship", source))?;
        Ok(RelationshipId(self.transaction.last_insert_rowid()))
    }

    fn commit(self) -> Result<(), GraphStoreError> {
        self.transaction
            .commit()
            .map_err(|source| GraphStoreError::operation("commit transaction", source))
    }
}

struct RawNode {
    id: i64,
    kind: String,
    key: String,
    x: f64,
    y: f64,
    properties: String,
}

fn raw_node(row: &Row<'_>) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        id: row.get(0)?,
        kind: row.get(1)?,
        key: row.get(2)?,
        x: row.get(3)?,
        y: row.get(4)?,
        properties: row.get(5)?,
    })
}

impl RawNode {
    fn into_node(self) -> Result<GraphNode, GraphStoreError> {
        let kind = NodeKind::from_label(&self.kind).ok_or_else(|| GraphStoreError::Corrupt {
            message: format!("node {} has unknown kind '{}'", self.id, self.kind),
        })?;
        let id = self.id;
        Ok(GraphNode {
            id: NodeId(id),
            key: NodeKey {
                kind,
                key: self.key,
            },
            centroid: Coord {
                x: self.x,
                y: self.y,
            },
            properties: decode_properties(&self.properties, || format!("node {id}"))?,
        })
    }
}

fn encode_properties(
    properties: &Properties,
    subject: impl FnOnce() -> String,
) -> Result<String, GraphStoreError> {
    serde_json::to_string(properties).map_err(|source| GraphStoreError::Properties {
        subject: subject(),
        source,
    })
}

fn decode_properties(
    text: &str,
    subject: impl FnOnce() -> String,
) -> Result<Properties, GraphStoreError> {
    serde_json::from_str(text).map_err(|source| GraphStoreError::Properties {
        subject: subject(),
        source,
    })
}

fn ensure_parent_dir(path: &Utf8Path) -> std::io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base, relative) = match parent.strip_prefix("/") {
        Ok(relative) => ("/", relative.to_path_buf()),
        Err(_) => (".", Utf8PathBuf::from(parent)),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(base, ambient_authority())?;
    dir.create_dir_all(&relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    #[fixture]
    fn store() -> SqliteGraphStore {
        SqliteGraphStore::open_in_memory().expect("open in-memory graph")
    }

    fn node(key: NodeKey, x: f64) -> NewNode {
        let mut properties = Properties::new();
        properties.insert("label".into(), json!(key.to_string()));
        NewNode {
            key,
            centroid: Coord { x, y: 1.0 },
            properties,
        }
    }

    #[rstest]
    fn dropped_transaction_rolls_back(mut store: SqliteGraphStore) {
        {
            let mut tx = store.begin().expect("begin");
            tx.create_node(&node(NodeKey::point(1), 0.0)).expect("create");
        }
        assert!(store.nodes(None).expect("scan").is_empty());
    }

    #[rstest]
    fn merge_keeps_first_centroid(mut store: SqliteGraphStore) {
        let mut tx = store.begin().expect("begin");
        let first = tx.merge_node(&node(NodeKey::point(1), 0.0)).expect("merge");
        let second = tx.merge_node(&node(NodeKey::point(1), 5.0)).expect("merge");
        tx.commit().expect("commit");

        assert!(matches!(first, MergeOutcome::Created(_)));
        assert_eq!(second, MergeOutcome::Matched(first.id()));
        let nodes = store.nodes(Some(NodeKind::Point)).expect("scan");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].centroid, Coord { x: 0.0, y: 1.0 });
    }

    #[rstest]
    fn feature_keys_may_repeat(mut store: SqliteGraphStore) {
        let key = NodeKey::feature(crate::FeatureCategory::Building, "A1");
        let mut tx = store.begin().expect("begin");
        tx.create_node(&node(key.clone(), 0.0)).expect("create");
        tx.create_node(&node(key.clone(), 0.0)).expect("create again");
        let found = tx.find_nodes(&key).expect("lookup");
        tx.commit().expect("commit");
        assert_eq!(found.len(), 2);
    }

    #[rstest]
    fn relationships_round_trip_properties(mut store: SqliteGraphStore) {
        let mut tx = store.begin().expect("begin");
        let source = tx
            .create_node(&node(NodeKey::feature(crate::FeatureCategory::Street, "S1"), 0.0))
            .expect("create feature");
        let target = tx
            .create_node(&node(NodeKey::point(3), 0.0))
            .expect("create point");
        let mut properties = Properties::new();
        properties.insert("distance".into(), json!(4.5));
        tx.create_relationship(&NewRelationship {
            rel_type: "IS_NEIGHBOR_OF".into(),
            source,
            target,
            properties: properties.clone(),
        })
        .expect("relate");
        tx.commit().expect("commit");

        let relationships = store.relationships().expect("scan");
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].source, source);
        assert_eq!(relationships[0].target, target);
        assert_eq!(relationships[0].properties, properties);
    }

    #[rstest]
    fn relationships_require_existing_nodes(mut store: SqliteGraphStore) {
        let mut tx = store.begin().expect("begin");
        let result = tx.create_relationship(&NewRelationship {
            rel_type: "IS_NEIGHBOR_OF".into(),
            source: NodeId(41),
            target: NodeId(42),
            properties: Properties::new(),
        });
        assert!(matches!(result, Err(GraphStoreError::Operation { .. })));
    }

    #[rstest]
    fn open_creates_parent_directories() {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nested/graph.db"))
            .expect("utf-8 path");
        let mut store = SqliteGraphStore::open(&path).expect("open on disk");
        let mut tx = store.begin().expect("begin");
        tx.merge_node(&node(NodeKey::point(9), 0.0)).expect("merge");
        tx.commit().expect("commit");
        drop(store);

        let reopened = SqliteGraphStore::open(&path).expect("reopen");
        assert_eq!(reopened.nodes(None).expect("scan").len(), 1);
    }
}
