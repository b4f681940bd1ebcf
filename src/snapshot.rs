//! Optional JSON snapshot of the routing table. Loaded on startup only when
//! the `load` CLI token is present; written once at startup, best-effort,
//! with whatever table the engine begins with (direct-neighbour routes, or
//! the loaded snapshot if `load` was given). A missing or corrupt snapshot
//! is never fatal — it just means the router starts with an empty table,
//! same as any other boot.

use crate::table::{RoutingTable, UpsertFields};
use crate::types::RouterId;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    destination: RouterId,
    first_hop: RouterId,
    cost: crate::types::Cost,
    timer: u64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Snapshot {
    routes: Vec<SnapshotEntry>,
}

pub fn default_path(router_id: RouterId) -> std::path::PathBuf {
    std::path::PathBuf::from("json-memory").join(format!("routing-table-{}.json", router_id))
}

pub fn save(path: &Path, table: &RoutingTable) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let snapshot = Snapshot {
        routes: table
            .iter()
            .map(|(dest, info)| SnapshotEntry {
                destination: dest,
                first_hop: info.first_hop,
                cost: info.cost,
                timer: info.timer,
            })
            .collect(),
    };
    let text = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, text)
}

/// Loads a snapshot into a fresh table, logging and returning an empty
/// table on any I/O or parse failure rather than treating it as fatal.
pub fn load(path: &Path) -> RoutingTable {
    let mut table = RoutingTable::new();
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read routing table snapshot, starting empty");
            return table;
        }
    };
    let snapshot: Snapshot = match serde_json::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse routing table snapshot, starting empty");
            return table;
        }
    };
    for entry in snapshot.routes {
        if let Err(e) = table.upsert(
            entry.destination,
            UpsertFields::create(entry.first_hop, entry.cost, entry.timer),
        ) {
            tracing::warn!(error = %e, "dropping invalid snapshot entry");
        }
    }
    table
}
