use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{collect, Location, ValidationError, ValidationErrors};
use crate::models::{
    BenchmarkResult, CatalogIndex, CatalogRecord, CodeRef, Collection, CollectionMetadata, Model,
    ModelMetadata, Paper, SourcedRecord,
};

pub const COLLECTIONS_KEY: &str = "Collections";
pub const MODELS_KEY: &str = "Models";
pub const TRAINING_MEMORY_KEY: &str = "Training Memory (GB)";

/// Validates one decoded document and converts it into a typed record.
pub fn validate_document(
    value: &Value,
    origin: Option<&Path>,
) -> Result<CatalogRecord, ValidationErrors> {
    let mut checker = Checker::new(origin);
    let record = checker.document(value);
    collect(record, checker.errors)
}

pub fn validate(value: &Value) -> Result<CatalogIndex, ValidationErrors> {
    let record = validate_document(value, None)?;
    CatalogIndex::build([SourcedRecord {
        origin: None,
        record,
    }])
}

struct Checker<'a> {
    origin: Option<&'a Path>,
    errors: Vec<ValidationError>,
}

impl<'a> Checker<'a> {
    fn new(origin: Option<&'a Path>) -> Self {
        Self {
            origin,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors
            .push(ValidationError::schema(Location::new(self.origin, path), message));
    }

    fn document(&mut self, value: &Value) -> CatalogRecord {
        let mut record = CatalogRecord::default();
        let Some(root) = value.as_object() else {
            self.fail(
                "$",
                format!(
                    "expected a mapping with '{COLLECTIONS_KEY}' and/or '{MODELS_KEY}', found {}",
                    type_name(value)
                ),
            );
            return record;
        };

        for key in root.keys() {
            if key != COLLECTIONS_KEY && key != MODELS_KEY {
                self.fail(key, "unknown top-level key");
            }
        }

        for (idx, item) in self.sequence(root, COLLECTIONS_KEY).iter().enumerate() {
            let path = format!("{COLLECTIONS_KEY}[{idx}]");
            if let Some(collection) = self.collection(item, &path) {
                record.collections.push(collection);
            }
        }
        for (idx, item) in self.sequence(root, MODELS_KEY).iter().enumerate() {
            let path = format!("{MODELS_KEY}[{idx}]");
            if let Some(model) = self.model(item, &path) {
                record.models.push(model);
            }
        }
        record
    }

    fn sequence(&mut self, root: &Map<String, Value>, key: &str) -> Vec<Value> {
        match root.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                self.fail(key, format!("expected a sequence, found {}", type_name(other)));
                Vec::new()
            }
        }
    }

    fn collection(&mut self, value: &Value, path: &str) -> Option<Collection> {
        let obj = self.mapping(value, path)?;
        let name = self.required_str(obj, "Name", path);
        let metadata = self.collection_metadata(obj, path);

        let paper_path = join(path, "Paper");
        let paper = self.required_mapping(obj, "Paper", path).and_then(|paper| {
            let url = self.required_uri(paper, "URL", &paper_path);
            let title = self.required_str(paper, "Title", &paper_path);
            Some(Paper {
                url: url?,
                title: title?,
            })
        });

        let readme = self.required_str(obj, "README", path);

        let code_path = join(path, "Code");
        let code = self.required_mapping(obj, "Code", path).and_then(|code| {
            let url = self.required_uri(code, "URL", &code_path);
            let version = self.required_str(code, "Version", &code_path);
            Some(CodeRef {
                url: url?,
                version: version?,
            })
        });

        Some(Collection {
            name: name?,
            metadata: metadata?,
            paper: paper?,
            readme: readme?,
            code: code?,
        })
    }

    fn collection_metadata(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Option<CollectionMetadata> {
        let meta_path = join(path, "Metadata");
        let meta = self.required_mapping(obj, "Metadata", path)?;
        let mut metadata = CollectionMetadata::default();
        let mut ok = true;
        for (key, value) in meta {
            let field_path = join(&meta_path, key);
            match key.as_str() {
                "Training Data" => match self.string(value, &field_path) {
                    Some(text) => metadata.training_data = Some(text),
                    None => ok = false,
                },
                "Training Resources" => match self.string(value, &field_path) {
                    Some(text) => metadata.training_resources = Some(text),
                    None => ok = false,
                },
                "Training Techniques" => match self.string_list(value, &field_path) {
                    Some(items) => metadata.training_techniques = items,
                    None => ok = false,
                },
                "Architecture" => match self.string_list(value, &field_path) {
                    Some(items) => metadata.architecture = items,
                    None => ok = false,
                },
                _ => {
                    metadata.extra.insert(key.clone(), value.clone());
                }
            }
        }
        ok.then_some(metadata)
    }

    fn model(&mut self, value: &Value, path: &str) -> Option<Model> {
        let obj = self.mapping(value, path)?;
        let name = self.required_str(obj, "Name", path);
        let alias = match obj.get("Alias") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.string(value, &join(path, "Alias")).map(Some).ok_or(()),
        };
        let in_collection = self.required_str(obj, "In Collection", path);
        let config = self.required_str(obj, "Config", path);
        let metadata = self.model_metadata(obj, path);
        let results = self.results(obj, path);
        let weights = self.required_uri(obj, "Weights", path);

        Some(Model {
            name: name?,
            alias: alias.ok()?,
            in_collection: in_collection?,
            config: config?,
            metadata: metadata?,
            results: results?,
            weights: weights?,
        })
    }

    fn model_metadata(&mut self, obj: &Map<String, Value>, path: &str) -> Option<ModelMetadata> {
        let meta_path = join(path, "Metadata");
        let meta = match obj.get("Metadata") {
            None | Some(Value::Null) => return Some(ModelMetadata::default()),
            Some(value) => self.mapping(value, &meta_path)?,
        };

        let mut metadata = ModelMetadata::default();
        let mut ok = true;
        for (key, value) in meta {
            if key == TRAINING_MEMORY_KEY {
                let field_path = join(&meta_path, key);
                match value.as_f64() {
                    Some(gb) if gb.is_finite() && gb > 0.0 => {
                        metadata.training_memory_gb = Some(gb)
                    }
                    Some(gb) => {
                        self.fail(&field_path, format!("must be a positive number, got {gb}"));
                        ok = false;
                    }
                    None => {
                        self.fail(&field_path, number_expected(value));
                        ok = false;
                    }
                }
            } else {
                metadata.extra.insert(key.clone(), value.clone());
            }
        }
        ok.then_some(metadata)
    }

    fn results(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Vec<BenchmarkResult>> {
        let results_path = join(path, "Results");
        let items = match obj.get("Results") {
            None | Some(Value::Null) => {
                self.fail(&results_path, "missing required field");
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.fail(
                    &results_path,
                    format!("expected a sequence, found {}", type_name(other)),
                );
                return None;
            }
        };
        if items.is_empty() {
            self.fail(&results_path, "must contain at least one result");
            return None;
        }

        let mut results = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match self.result(item, &format!("{results_path}[{idx}]")) {
                Some(result) => results.push(result),
                None => ok = false,
            }
        }
        ok.then_some(results)
    }

    fn result(&mut self, value: &Value, path: &str) -> Option<BenchmarkResult> {
        let obj = self.mapping(value, path)?;
        let task = self.required_str(obj, "Task", path);
        let dataset = self.required_str(obj, "Dataset", path);

        let metrics_path = join(path, "Metrics");
        let metrics = self.required_mapping(obj, "Metrics", path).and_then(|raw| {
            let mut metrics = IndexMap::new();
            let mut ok = true;
            for (name, value) in raw {
                match value.as_f64() {
                    Some(number) => {
                        metrics.insert(name.clone(), number);
                    }
                    None => {
                        self.fail(&join(&metrics_path, name), number_expected(value));
                        ok = false;
                    }
                }
            }
            ok.then_some(metrics)
        });

        Some(BenchmarkResult {
            task: task?,
            dataset: dataset?,
            metrics: metrics?,
        })
    }

    fn mapping<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.fail(path, format!("expected a mapping, found {}", type_name(value)));
                None
            }
        }
    }

    fn required<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        parent: &str,
    ) -> Option<&'v Value> {
        match obj.get(key) {
            None | Some(Value::Null) => {
                self.fail(&join(parent, key), "missing required field");
                None
            }
            Some(value) => Some(value),
        }
    }

    fn required_mapping<'v>(
        &mut self,
        obj: &'v Map<String, Value>,
        key: &str,
        parent: &str,
    ) -> Option<&'v Map<String, Value>> {
        let value = self.required(obj, key, parent)?;
        self.mapping(value, &join(parent, key))
    }

    fn required_str(&mut self, obj: &Map<String, Value>, key: &str, parent: &str) -> Option<String> {
        let value = self.required(obj, key, parent)?;
        self.string(value, &join(parent, key))
    }

    fn required_uri(&mut self, obj: &Map<String, Value>, key: &str, parent: &str) -> Option<String> {
        let text = self.required_str(obj, key, parent)?;
        match url::Url::parse(&text) {
            Ok(_) => Some(text),
            Err(err) => {
                self.fail(&join(parent, key), format!("'{text}' is not a valid URI: {err}"));
                None
            }
        }
    }

    fn string(&mut self, value: &Value, path: &str) -> Option<String> {
        match value.as_str() {
            Some(text) if text.trim().is_empty() => {
                self.fail(path, "must not be empty");
                None
            }
            Some(text) => Some(text.to_string()),
            None => {
                self.fail(path, format!("expected a string, found {}", type_name(value)));
                None
            }
        }
    }

    fn string_list(&mut self, value: &Value, path: &str) -> Option<Vec<String>> {
        let Some(items) = value.as_array() else {
            self.fail(path, format!("expected a sequence, found {}", type_name(value)));
            return None;
        };
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match self.string(item, &format!("{path}[{idx}]")) {
                Some(text) => out.push(text),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }
}

fn join(parent: &str, key: &str) -> String {
    format!("{parent}.{key}")
}

// Non-finite YAML floats (`.nan`, `.inf`) decode to null.
fn number_expected(value: &Value) -> String {
    match value {
        Value::Null => "must be a finite number".to_string(),
        other => format!("expected a number, found {}", type_name(other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
