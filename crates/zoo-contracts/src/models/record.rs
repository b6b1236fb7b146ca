use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One catalog file: the collections and models it declares, in file order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "Collections", default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<Collection>,
    #[serde(rename = "Models", default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Metadata")]
    pub metadata: CollectionMetadata,
    #[serde(rename = "Paper")]
    pub paper: Paper,
    #[serde(rename = "README")]
    pub readme: String,
    #[serde(rename = "Code")]
    pub code: CodeRef,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionMetadata {
    #[serde(rename = "Training Data", default, skip_serializing_if = "Option::is_none")]
    pub training_data: Option<String>,
    #[serde(
        rename = "Training Techniques",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub training_techniques: Vec<String>,
    #[serde(
        rename = "Training Resources",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub training_resources: Option<String>,
    #[serde(rename = "Architecture", default, skip_serializing_if = "Vec::is_empty")]
    pub architecture: Vec<String>,
    /// Keys the zoo tooling does not interpret, kept in source order.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paper {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Title")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Alias", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "In Collection")]
    pub in_collection: String,
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "Metadata", default, skip_serializing_if = "ModelMetadata::is_empty")]
    pub metadata: ModelMetadata,
    #[serde(rename = "Results")]
    pub results: Vec<BenchmarkResult>,
    #[serde(rename = "Weights")]
    pub weights: String,
}

impl Model {
    /// Hash prefix encoded in the weights filename, e.g. `83442923` for
    /// `..._20210831_060805-83442923.pth`.
    pub fn weights_hash(&self) -> Option<&str> {
        weights_hash(&self.weights)
    }

    pub fn weights_file_name(&self) -> Option<&str> {
        file_name(&self.weights)
    }

    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.alias.as_deref() == Some(key)
    }

    pub fn metric(&self, task: &str, dataset: &str, metric: &str) -> Option<f64> {
        self.results
            .iter()
            .filter(|result| result.task == task && result.dataset == dataset)
            .find_map(|result| result.metrics.get(metric).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(
        rename = "Training Memory (GB)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub training_memory_gb: Option<f64>,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ModelMetadata {
    pub fn is_empty(&self) -> bool {
        self.training_memory_gb.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Dataset")]
    pub dataset: String,
    #[serde(rename = "Metrics")]
    pub metrics: IndexMap<String, f64>,
}

fn file_name(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

fn weights_hash(url: &str) -> Option<&str> {
    let name = file_name(url)?;
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    let (_, suffix) = stem.rsplit_once('-')?;
    if suffix.len() >= 4 && suffix.chars().all(|ch| ch.is_ascii_hexdigit()) {
        Some(suffix)
    } else {
        None
    }
}
