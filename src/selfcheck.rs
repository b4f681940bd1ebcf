//! Convergence self-check: compares the live routing table against a
//! caller-supplied expected table. Pure function, no I/O — loading the
//! expected table from disk is the caller's job (see `main.rs`).

use crate::table::RoutingTable;
use crate::types::{Cost, RouterId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedRoute {
    pub first_hop: RouterId,
    pub cost: Cost,
}

#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    pub matching: Vec<RouterId>,
    pub mismatched: Vec<(RouterId, ExpectedRoute, ExpectedRoute)>,
    pub missing: Vec<RouterId>,
    pub unexpected: Vec<RouterId>,
}

impl ConvergenceReport {
    pub fn is_convergent(&self) -> bool {
        self.mismatched.is_empty() && self.missing.is_empty() && self.unexpected.is_empty()
    }
}

pub fn check(
    table: &RoutingTable,
    expected: &HashMap<RouterId, ExpectedRoute>,
) -> ConvergenceReport {
    let mut matching = Vec::new();
    let mut mismatched = Vec::new();
    let mut missing = Vec::new();
    let mut unexpected = Vec::new();

    for (&dest, want) in expected {
        match table.get(dest) {
            None => missing.push(dest),
            Some(have) => {
                let have_route = ExpectedRoute {
                    first_hop: have.first_hop,
                    cost: have.cost,
                };
                if have_route == *want {
                    matching.push(dest);
                } else {
                    mismatched.push((dest, *want, have_route));
                }
            }
        }
    }

    for (dest, _) in table.iter() {
        if !expected.contains_key(&dest) {
            unexpected.push(dest);
        }
    }

    ConvergenceReport {
        matching,
        mismatched,
        missing,
        unexpected,
    }
}
