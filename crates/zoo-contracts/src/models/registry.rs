use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;

use super::record::{CatalogRecord, Collection, Model};
use crate::error::{collect, KeyKind, Location, ValidationError, ValidationErrors};

#[derive(Debug, Clone, PartialEq)]
pub struct SourcedRecord {
    pub origin: Option<PathBuf>,
    pub record: CatalogRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub collection: Collection,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntry {
    pub model: Model,
    pub location: Location,
}

/// Immutable, merged view over every record of a catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    collections: IndexMap<String, CollectionEntry>,
    models: IndexMap<String, ModelEntry>,
    aliases: HashMap<String, usize>,
    members: HashMap<String, Vec<usize>>,
}

impl CatalogIndex {
    /// Merges records in order, enforcing catalog-wide uniqueness and that every model's
    /// collection exists. All violations are reported together.
    pub fn build(
        records: impl IntoIterator<Item = SourcedRecord>,
    ) -> Result<Self, ValidationErrors> {
        let mut index = Self::default();
        let mut errors = Vec::new();
        // Model names and aliases share one namespace.
        let mut model_keys: HashMap<String, Location> = HashMap::new();

        for sourced in records {
            let origin = sourced.origin.as_deref();
            for (idx, collection) in sourced.record.collections.into_iter().enumerate() {
                let location = Location::new(origin, format!("Collections[{idx}]"));
                if let Some(existing) = index.collections.get(&collection.name) {
                    errors.push(ValidationError::DuplicateKey {
                        kind: KeyKind::Collection,
                        name: collection.name.clone(),
                        first: existing.location.clone(),
                        second: location,
                    });
                    continue;
                }
                index.collections.insert(
                    collection.name.clone(),
                    CollectionEntry {
                        collection,
                        location,
                    },
                );
            }

            for (idx, model) in sourced.record.models.into_iter().enumerate() {
                let location = Location::new(origin, format!("Models[{idx}]"));
                let mut keys = vec![model.name.clone()];
                if let Some(alias) = model.alias.as_ref().filter(|alias| **alias != model.name) {
                    keys.push(alias.clone());
                }

                let mut clashed = false;
                for key in &keys {
                    if let Some(first) = model_keys.get(key) {
                        errors.push(ValidationError::DuplicateKey {
                            kind: KeyKind::Model,
                            name: key.clone(),
                            first: first.clone(),
                            second: location.clone(),
                        });
                        clashed = true;
                    }
                }

                if clashed {
                    continue;
                }
                for key in keys {
                    model_keys.insert(key, location.clone());
                }
                index.insert_model(model, location);
            }
        }

        // Collections may be declared in a later file than the models that use them.
        for entry in index.models.values() {
            if !index.collections.contains_key(&entry.model.in_collection) {
                errors.push(ValidationError::Reference {
                    location: Location {
                        file: entry.location.file.clone(),
                        path: format!("{}.In Collection", entry.location.path),
                    },
                    collection: entry.model.in_collection.clone(),
                });
            }
        }

        collect(index, errors)
    }

    fn insert_model(&mut self, model: Model, location: Location) {
        let position = self.models.len();
        if let Some(alias) = &model.alias {
            if *alias != model.name {
                self.aliases.insert(alias.clone(), position);
            }
        }
        self.members
            .entry(model.in_collection.clone())
            .or_default()
            .push(position);
        self.models
            .insert(model.name.clone(), ModelEntry { model, location });
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collection_entry(name).map(|entry| &entry.collection)
    }

    pub fn collection_entry(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.get(name)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name).map(|entry| &entry.model)
    }

    pub fn model_by_alias(&self, alias: &str) -> Option<&Model> {
        let position = *self.aliases.get(alias)?;
        self.models
            .get_index(position)
            .map(|(_, entry)| &entry.model)
    }

    pub fn lookup_model(&self, key: &str) -> Option<&Model> {
        self.model_entry(key).map(|entry| &entry.model)
    }

    pub fn model_entry(&self, key: &str) -> Option<&ModelEntry> {
        if let Some(entry) = self.models.get(key) {
            return Some(entry);
        }
        let position = *self.aliases.get(key)?;
        self.models.get_index(position).map(|(_, entry)| entry)
    }

    pub fn models_in<'a>(&'a self, collection: &str) -> impl Iterator<Item = &'a Model> + 'a {
        self.members
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|position| self.models.get_index(*position))
            .map(|(_, entry)| &entry.model)
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values().map(|entry| &entry.collection)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values().map(|entry| &entry.model)
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.models.is_empty()
    }

    /// Model with the highest value of `metric` for a task/dataset pair.
    pub fn best_model(&self, task: &str, dataset: &str, metric: &str) -> Option<(&Model, f64)> {
        self.models()
            .filter_map(|model| Some((model, model.metric(task, dataset, metric)?)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Flattens the index back into one record, collections first, in load order.
    pub fn to_record(&self) -> CatalogRecord {
        CatalogRecord {
            collections: self.collections().cloned().collect(),
            models: self.models().cloned().collect(),
        }
    }
}
