use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type RecordId = u64;

// A global priority is serialized as its local value offset by this
// constant; the manifest codec and the comparison both go through it.
pub const GLOBAL_PRIORITY_DIVISOR: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub value: i32,
    pub is_global: bool,
}

impl Priority {
    pub fn local(value: i32) -> Self {
        Self {
            value,
            is_global: false,
        }
    }

    pub fn global(value: i32) -> Self {
        Self {
            value,
            is_global: true,
        }
    }

    pub fn decode(raw: i64) -> Self {
        if raw >= GLOBAL_PRIORITY_DIVISOR || raw <= -GLOBAL_PRIORITY_DIVISOR {
            Self {
                value: (raw % GLOBAL_PRIORITY_DIVISOR) as i32,
                is_global: true,
            }
        } else {
            Self {
                value: raw as i32,
                is_global: false,
            }
        }
    }

    pub fn encode(&self) -> i64 {
        if self.is_global {
            let offset = if self.value < 0 {
                -GLOBAL_PRIORITY_DIVISOR
            } else {
                GLOBAL_PRIORITY_DIVISOR
            };
            self.value as i64 + offset
        } else {
            self.value as i64
        }
    }

    // Any global priority outranks any local one; higher rank loads later.
    fn rank(&self) -> (bool, i32) {
        (self.is_global, self.value)
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginData {
    pub name: String,
    #[serde(default)]
    pub is_master: bool,
    #[serde(default)]
    pub is_light: bool,
    #[serde(default)]
    pub masters: Vec<String>,
    #[serde(default)]
    pub overridden_records: HashSet<RecordId>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub masterlist_requirements: Vec<String>,
    #[serde(default)]
    pub user_requirements: Vec<String>,
    #[serde(default)]
    pub masterlist_load_after: Vec<String>,
    #[serde(default)]
    pub user_load_after: Vec<String>,
}

impl PluginData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_master: false,
            is_light: false,
            masters: Vec::new(),
            overridden_records: HashSet::new(),
            priority: None,
            group: None,
            masterlist_requirements: Vec::new(),
            user_requirements: Vec::new(),
            masterlist_load_after: Vec::new(),
            user_load_after: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn override_count(&self) -> usize {
        self.overridden_records.len()
    }

    pub fn records_overlap(&self, other: &PluginData) -> bool {
        let (small, large) = if self.overridden_records.len() <= other.overridden_records.len() {
            (&self.overridden_records, &other.overridden_records)
        } else {
            (&other.overridden_records, &self.overridden_records)
        };
        small.iter().any(|record| large.contains(record))
    }
}

pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}
