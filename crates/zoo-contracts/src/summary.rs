use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::events::now_utc_iso;
use crate::models::CatalogIndex;

/// Counts describing a loaded catalog, written next to generated docs or dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub catalog_id: String,
    pub root: String,
    pub total_files: u64,
    pub total_collections: u64,
    pub total_models: u64,
    pub total_results: u64,
    pub tasks: IndexMap<String, u64>,
}

impl CatalogSummary {
    pub fn from_index(
        index: &CatalogIndex,
        catalog_id: impl Into<String>,
        root: &Path,
        total_files: usize,
    ) -> Self {
        let mut tasks: IndexMap<String, u64> = IndexMap::new();
        let mut total_results = 0u64;
        for result in index.models().flat_map(|model| model.results.iter()) {
            *tasks.entry(result.task.clone()).or_default() += 1;
            total_results += 1;
        }
        Self {
            catalog_id: catalog_id.into(),
            root: root.display().to_string(),
            total_files: total_files as u64,
            total_collections: index.collection_count() as u64,
            total_models: index.model_count() as u64,
            total_results,
            tasks,
        }
    }
}

pub fn write_summary(
    path: &Path,
    summary: &CatalogSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}
