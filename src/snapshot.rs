//! Whole-graph snapshots
//!
//! A snapshot is the full node and relationship tables plus a format
//! version, serialized as JSON or bincode, optionally gzip-compressed.
//! Loading rebuilds the store through [`GraphStore::from_parts`] without
//! endpoint validation; callers run the integrity validator over files
//! they do not trust.

use crate::graph::{GraphStore, Node, Relationship};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Bumped when the snapshot layout changes incompatibly
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    VersionMismatch { found: u32 },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Bincode,
    JsonGz,
    BincodeGz,
}

impl SnapshotFormat {
    /// Conventional file extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
            SnapshotFormat::JsonGz => "json.gz",
            SnapshotFormat::BincodeGz => "bin.gz",
        }
    }

    /// Guess the format from a file name, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with(".bin.gz") {
            SnapshotFormat::BincodeGz
        } else if name.ends_with(".json.gz") {
            SnapshotFormat::JsonGz
        } else if name.ends_with(".bin") {
            SnapshotFormat::Bincode
        } else {
            SnapshotFormat::Json
        }
    }
}

/// Serializable image of the whole graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    /// Capture time, Unix milliseconds
    pub created_at: i64,
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl GraphSnapshot {
    /// Capture the resident graph. Evicted nodes are reloaded by the
    /// caller beforehand if they should be included.
    pub fn capture(store: &GraphStore) -> Self {
        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            created_at: chrono::Utc::now().timestamp_millis(),
            nodes: store.all_nodes().cloned().collect(),
            relationships: store.all_relationships().cloned().collect(),
        }
    }

    /// Rebuild a store from this snapshot
    pub fn restore(self) -> SnapshotResult<GraphStore> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: self.version,
            });
        }
        Ok(GraphStore::from_parts(self.nodes, self.relationships))
    }

    pub fn write_to(&self, writer: impl Write, format: SnapshotFormat) -> SnapshotResult<()> {
        match format {
            SnapshotFormat::Json => serde_json::to_writer(writer, self)?,
            SnapshotFormat::Bincode => bincode::serialize_into(writer, self)?,
            SnapshotFormat::JsonGz => {
                let mut encoder = GzEncoder::new(writer, Compression::default());
                serde_json::to_writer(&mut encoder, self)?;
                encoder.finish()?;
            }
            SnapshotFormat::BincodeGz => {
                let mut encoder = GzEncoder::new(writer, Compression::default());
                bincode::serialize_into(&mut encoder, self)?;
                encoder.finish()?;
            }
        }
        Ok(())
    }

    pub fn read_from(reader: impl Read, format: SnapshotFormat) -> SnapshotResult<Self> {
        let snapshot = match format {
            SnapshotFormat::Json => serde_json::from_reader(reader)?,
            SnapshotFormat::Bincode => bincode::deserialize_from(reader)?,
            SnapshotFormat::JsonGz => serde_json::from_reader(GzDecoder::new(reader))?,
            SnapshotFormat::BincodeGz => bincode::deserialize_from(GzDecoder::new(reader))?,
        };
        Ok(snapshot)
    }
}

/// Save the resident graph to a file
pub fn save_graph(
    store: &GraphStore,
    path: impl AsRef<Path>,
    format: SnapshotFormat,
) -> SnapshotResult<()> {
    let path = path.as_ref();
    let snapshot = GraphSnapshot::capture(store);
    let writer = BufWriter::new(File::create(path)?);
    snapshot.write_to(writer, format)?;
    info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        relationships = snapshot.relationships.len(),
        "graph snapshot written"
    );
    Ok(())
}

/// Load a graph from a snapshot file
pub fn load_graph(path: impl AsRef<Path>, format: SnapshotFormat) -> SnapshotResult<GraphStore> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let snapshot = GraphSnapshot::read_from(reader, format)?;
    let store = snapshot.restore()?;
    info!(
        path = %path.display(),
        nodes = store.node_count(),
        relationships = store.relationship_count(),
        "graph snapshot loaded"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PropertyValue, Relationship};

    fn sample_store() -> GraphStore {
        let mut store = GraphStore::new();
        let mut a = Node::new("Actor", "USDA");
        a.set_property("budget", 150_000i64);
        let b = Node::new("Institution", "Farm Credit System");
        let (a_id, b_id) = (a.id, b.id);
        store.add_node(a).unwrap();
        store.add_node(b).unwrap();
        store
            .add_relationship(Relationship::new(a_id, b_id, "FUNDS").with_weight(0.8))
            .unwrap();
        store
    }

    #[test]
    fn test_save_and_load_all_formats() {
        let store = sample_store();
        let dir = tempfile::tempdir().unwrap();

        for format in [
            SnapshotFormat::Json,
            SnapshotFormat::Bincode,
            SnapshotFormat::JsonGz,
            SnapshotFormat::BincodeGz,
        ] {
            let path = dir.path().join(format!("graph.{}", format.extension()));
            save_graph(&store, &path, format).unwrap();
            let loaded = load_graph(&path, format).unwrap();

            assert_eq!(loaded.node_count(), 2);
            assert_eq!(loaded.relationship_count(), 1);
        }
    }

    #[test]
    fn test_snapshot_preserves_state_exactly() {
        let store = sample_store();
        let snapshot = GraphSnapshot::capture(&store);
        let loaded = snapshot.restore().unwrap();

        let mut original: Vec<Node> = store.all_nodes().cloned().collect();
        let mut restored: Vec<Node> = loaded.all_nodes().cloned().collect();
        original.sort_by_key(|n| n.id);
        restored.sort_by_key(|n| n.id);
        assert_eq!(original, restored);

        let budget = restored
            .iter()
            .find(|n| n.label == "USDA")
            .and_then(|n| n.get_property("budget"))
            .cloned();
        assert_eq!(budget, Some(PropertyValue::Integer(150_000)));
    }

    #[test]
    fn test_format_detection_from_path() {
        assert_eq!(
            SnapshotFormat::from_path(Path::new("g.json")),
            SnapshotFormat::Json
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("g.bin")),
            SnapshotFormat::Bincode
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("g.json.gz")),
            SnapshotFormat::JsonGz
        );
        assert_eq!(
            SnapshotFormat::from_path(Path::new("g.bin.gz")),
            SnapshotFormat::BincodeGz
        );
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let store = sample_store();
        let mut snapshot = GraphSnapshot::capture(&store);
        snapshot.version = 99;
        assert!(matches!(
            snapshot.restore(),
            Err(SnapshotError::VersionMismatch { found: 99 })
        ));
    }

    #[test]
    fn test_gzip_actually_compresses() {
        let mut store = GraphStore::new();
        for i in 0..200 {
            let mut node = Node::new("Actor", format!("node with a long repetitive label {i}"));
            node.set_property("description", "the same long string every time");
            store.add_node(node).unwrap();
        }
        let snapshot = GraphSnapshot::capture(&store);

        let mut plain = Vec::new();
        let mut packed = Vec::new();
        snapshot.write_to(&mut plain, SnapshotFormat::Json).unwrap();
        snapshot.write_to(&mut packed, SnapshotFormat::JsonGz).unwrap();
        assert!(packed.len() < plain.len());
    }
}
