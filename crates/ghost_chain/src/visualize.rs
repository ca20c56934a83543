use crate::chain::Chain;
use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct NodeRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Label")]
    label: String,
    #[serde(rename = "Slot")]
    slot: u64,
    x: u64,
    #[serde(rename = "Proposer")]
    proposer: u64,
    #[serde(rename = "BlockType")]
    block_type: &'static str,
}

#[derive(Serialize)]
struct EdgeRow {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Target")]
    target: String,
}

/// Writes `<path>.nodes.csv` and `<path>.edges.csv` (spec.md §6),
/// mirroring `viz.go`'s `CreateVizGraph`: one row per live DAG node plus
/// one row per parent/child edge (the genesis node, which has no
/// parent, contributes no edge row), `x = slot + 1`, hex-encoded ids.
pub fn write_csv(path: impl AsRef<Path>, chain: &Chain) -> Result<()> {
    let nodes = chain.nodes();

    let mut nodes_writer = csv::Writer::from_path(with_suffix(path.as_ref(), "nodes.csv"))?;
    for n in &nodes {
        nodes_writer.serialize(NodeRow {
            id: n.hash.to_string(),
            label: n.hash.to_string(),
            slot: n.slot,
            x: n.slot + 1,
            proposer: n.proposer,
            block_type: n.role.as_str(),
        })?;
    }
    nodes_writer.flush()?;

    let mut edges_writer = csv::Writer::from_path(with_suffix(path.as_ref(), "edges.csv"))?;
    for n in &nodes {
        if let Some(parent) = n.parent {
            edges_writer.serialize(EdgeRow {
                source: parent.to_string(),
                target: n.hash.to_string(),
            })?;
        }
    }
    edges_writer.flush()?;

    Ok(())
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}
