use crate::domain::Query;

/// Maximum number of suggestions offered for one prefix.
pub const MAX_SUGGESTIONS: usize = 25;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown base level {0:?}")]
    UnknownLevel(String),

    #[error("unknown base type {0:?}")]
    UnknownCategory(String),
}

/// Accepted level and category tags for the command surface.
#[derive(Clone, Debug)]
pub struct QueryCatalog {
    levels: Vec<String>,
    categories: Vec<String>,
}

impl QueryCatalog {
    pub fn new(levels: Vec<String>, categories: Vec<String>) -> Self {
        Self { levels, categories }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Validate user input and return the canonical query (tags as configured).
    pub fn parse(&self, level: &str, category: &str) -> Result<Query, CatalogError> {
        let level_c = canonical(&self.levels, level)
            .ok_or_else(|| CatalogError::UnknownLevel(level.trim().to_string()))?;
        let category_c = canonical(&self.categories, category)
            .ok_or_else(|| CatalogError::UnknownCategory(category.trim().to_string()))?;
        Ok(Query::new(level_c, category_c))
    }

    pub fn suggest_levels(&self, input: &str) -> Vec<String> {
        suggest(&self.levels, input)
    }

    pub fn suggest_categories(&self, input: &str) -> Vec<String> {
        suggest(&self.categories, input)
    }
}

fn canonical(options: &[String], input: &str) -> Option<String> {
    let input = input.trim();
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(input))
        .cloned()
}

fn suggest(options: &[String], input: &str) -> Vec<String> {
    let needle = input.trim().to_lowercase();
    options
        .iter()
        .filter(|o| o.to_lowercase().contains(&needle))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}
