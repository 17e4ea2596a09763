use crate::group::Group;
use crate::plugin::{PluginData, Priority, RecordId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

// Snapshot of everything the sorter needs, produced by whatever merges
// masterlist/userlist/binary data; this crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortManifest {
    #[serde(default)]
    pub plugins: Vec<PluginManifest>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub hardcoded: Vec<String>,
    #[serde(default)]
    pub previous_order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub is_master: bool,
    #[serde(default)]
    pub is_light: bool,
    #[serde(default)]
    pub masters: Vec<String>,
    #[serde(default)]
    pub overridden_records: Vec<RecordId>,
    // Globals are offset by plugin::GLOBAL_PRIORITY_DIVISOR.
    #[serde(default)]
    pub priority: Option<i64>,
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

impl PluginManifest {
    pub fn into_plugin(self) -> PluginData {
        PluginData {
            name: self.name,
            is_master: self.is_master,
            is_light: self.is_light,
            masters: self.masters,
            overridden_records: self.overridden_records.into_iter().collect(),
            priority: self.priority.map(Priority::decode),
            group: self.group,
            masterlist_requirements: self.masterlist_requirements,
            user_requirements: self.user_requirements,
            masterlist_load_after: self.masterlist_load_after,
            user_load_after: self.user_load_after,
        }
    }

    #[cfg(test)]
    fn from_plugin(plugin: PluginData) -> Self {
        let mut overridden: Vec<RecordId> = plugin.overridden_records.into_iter().collect();
        overridden.sort_unstable();
        Self {
            name: plugin.name,
            is_master: plugin.is_master,
            is_light: plugin.is_light,
            masters: plugin.masters,
            overridden_records: overridden,
            priority: plugin.priority.map(|priority| priority.encode()),
            group: plugin.group,
            masterlist_requirements: plugin.masterlist_requirements,
            user_requirements: plugin.user_requirements,
            masterlist_load_after: plugin.masterlist_load_after,
            user_load_after: plugin.user_load_after,
        }
    }
}

impl SortManifest {
    pub fn into_plugins(self) -> Vec<PluginData> {
        self.plugins
            .into_iter()
            .map(PluginManifest::into_plugin)
            .collect()
    }
}

pub fn load_manifest(path: &Path) -> Result<SortManifest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read sort manifest {}", path.display()))?;
    let manifest: SortManifest =
        serde_json::from_str(&raw).context("parse sort manifest")?;
    Ok(manifest)
}
