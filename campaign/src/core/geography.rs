//! Read-only settlement graph shared by every turn (and by concurrent runs).

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInfo {
    pub id: String,
    #[serde(default)]
    pub municipality_id: Option<String>,
}

/// Settlements and undirected adjacency.
///
/// Edges are stored normalized (`a < b`), deduplicated and sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geography {
    settlements: BTreeMap<String, SettlementInfo>,
    edges: Vec<(String, String)>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
}

impl Geography {
    pub fn new(settlements: Vec<SettlementInfo>, edges: Vec<(String, String)>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for settlement in settlements {
            if settlement.id.trim().is_empty() {
                bail!("settlement id must be non-empty");
            }
            if by_id.contains_key(&settlement.id) {
                bail!("duplicate settlement id {}", settlement.id);
            }
            by_id.insert(settlement.id.clone(), settlement);
        }

        let mut normalized = BTreeSet::new();
        for (left, right) in edges {
            if left == right {
                bail!("self-loop edge on settlement {left}");
            }
            for endpoint in [&left, &right] {
                if !by_id.contains_key(endpoint) {
                    bail!("edge references unknown settlement {endpoint}");
                }
            }
            if left < right {
                normalized.insert((left, right));
            } else {
                normalized.insert((right, left));
            }
        }

        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (a, b) in &normalized {
            adjacency.entry(a.clone()).or_default().insert(b.clone());
            adjacency.entry(b.clone()).or_default().insert(a.clone());
        }

        Ok(Self {
            settlements: by_id,
            edges: normalized.into_iter().collect(),
            adjacency,
        })
    }

    /// Settlements in id order.
    pub fn settlements(&self) -> impl Iterator<Item = &SettlementInfo> {
        self.settlements.values()
    }

    pub fn settlement_ids(&self) -> impl Iterator<Item = &str> {
        self.settlements.keys().map(String::as_str)
    }

    pub fn contains(&self, settlement_id: &str) -> bool {
        self.settlements.contains_key(settlement_id)
    }

    pub fn municipality_of(&self, settlement_id: &str) -> Option<&str> {
        self.settlements
            .get(settlement_id)
            .and_then(|info| info.municipality_id.as_deref())
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    /// Neighbours of a settlement in id order (empty when isolated or unknown).
    pub fn neighbours(&self, settlement_id: &str) -> impl Iterator<Item = &str> {
        self.adjacency
            .get(settlement_id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.settlements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settlements.is_empty()
    }
}
