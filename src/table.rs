//! The routing table: `destination -> route_info`, owned exclusively by the
//! protocol engine. No internal locking — the single-writer rule is enforced
//! by construction (only `Engine` holds a `RoutingTable`).

use crate::types::{Cost, RouterId};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("cannot create entry for {0}: first_hop, cost, and timer are all required for a new entry")]
    UndefinedNewEntry(RouterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfo {
    pub first_hop: RouterId,
    pub cost: Cost,
    /// Seconds elapsed since the route was last refreshed.
    pub timer: u64,
}

/// Named-field update for `RoutingTable::upsert`. Any field left `None` is
/// left untouched on an existing entry; all three are required to create one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertFields {
    pub first_hop: Option<RouterId>,
    pub cost: Option<Cost>,
    pub timer: Option<u64>,
}

impl UpsertFields {
    pub fn create(first_hop: RouterId, cost: Cost, timer: u64) -> Self {
        Self {
            first_hop: Some(first_hop),
            cost: Some(cost),
            timer: Some(timer),
        }
    }

    pub fn timer_only(timer: u64) -> Self {
        Self {
            timer: Some(timer),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    entries: HashMap<RouterId, RouteInfo>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, dest: RouterId) -> Option<&RouteInfo> {
        self.entries.get(&dest)
    }

    pub fn has(&self, dest: RouterId) -> bool {
        self.entries.contains_key(&dest)
    }

    pub fn delete(&mut self, dest: RouterId) -> Option<RouteInfo> {
        self.entries.remove(&dest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RouterId, &RouteInfo)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn destinations(&self) -> impl Iterator<Item = RouterId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates `dest` if absent (all three fields in `fields` must be
    /// present), otherwise updates only the fields given.
    pub fn upsert(&mut self, dest: RouterId, fields: UpsertFields) -> Result<(), TableError> {
        if let Some(entry) = self.entries.get_mut(&dest) {
            if let Some(first_hop) = fields.first_hop {
                entry.first_hop = first_hop;
            }
            if let Some(cost) = fields.cost {
                entry.cost = cost;
            }
            if let Some(timer) = fields.timer {
                entry.timer = timer;
            }
            return Ok(());
        }

        match (fields.first_hop, fields.cost, fields.timer) {
            (Some(first_hop), Some(cost), Some(timer)) => {
                self.entries.insert(
                    dest,
                    RouteInfo {
                        first_hop,
                        cost,
                        timer,
                    },
                );
                Ok(())
            }
            _ => Err(TableError::UndefinedNewEntry(dest)),
        }
    }
}
