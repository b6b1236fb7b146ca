use super::record::Model;
use super::registry::CatalogIndex;

const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Name,
    Alias,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSelection<'a> {
    pub model: &'a Model,
    pub query: String,
    pub matched_by: MatchKind,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelSelector<'a> {
    pub index: &'a CatalogIndex,
}

impl<'a> ModelSelector<'a> {
    pub fn new(index: &'a CatalogIndex) -> Self {
        Self { index }
    }

    pub fn select(&self, query: &str) -> Result<ModelSelection<'a>, String> {
        let query = query.trim();
        if query.is_empty() {
            return Err("No model specified.".to_string());
        }
        if let Some(model) = self.index.model(query) {
            return Ok(ModelSelection {
                model,
                query: query.to_string(),
                matched_by: MatchKind::Name,
            });
        }
        if let Some(model) = self.index.model_by_alias(query) {
            return Ok(ModelSelection {
                model,
                query: query.to_string(),
                matched_by: MatchKind::Alias,
            });
        }

        let suggestions = self.suggestions(query);
        if suggestions.is_empty() {
            Err(format!("No model named or aliased '{query}'."))
        } else {
            Err(format!(
                "No model named or aliased '{query}'. Did you mean: {}?",
                suggestions.join(", ")
            ))
        }
    }

    /// Names and aliases containing the query, case-insensitively.
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut out: Vec<String> = Vec::new();
        for model in self.index.models() {
            let keys = std::iter::once(&model.name).chain(model.alias.as_ref());
            for key in keys {
                if key.to_lowercase().contains(&needle) && !out.contains(key) {
                    out.push(key.clone());
                }
            }
            if out.len() >= MAX_SUGGESTIONS {
                break;
            }
        }
        out.truncate(MAX_SUGGESTIONS);
        out
    }
}
