//! Retrieval query description

use std::time::Duration;

/// Entity type of bibliographic works
pub const WORKS: &str = "works";

/// A per-query value, or the configured default when left alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Setting<T> {
    #[default]
    Inherit,
    Set(T),
}

impl<T> Setting<T> {
    /// The explicit value, else `inherited`
    pub fn resolve(self, inherited: T) -> T {
        match self {
            Setting::Inherit => inherited,
            Setting::Set(value) => value,
        }
    }
}

/// A bulk retrieval request
///
/// Empty parts are left out of the request entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub entity_type: String,
    pub filters: Vec<(String, String)>,
    pub search: Option<String>,
    pub sort: Vec<String>,
    /// `Set(None)` retrieves everything
    pub max_entities: Setting<Option<usize>>,
    pub rate_interval: Setting<Duration>,
}

impl Default for RetrievalQuery {
    fn default() -> Self {
        Self {
            entity_type: WORKS.to_string(),
            filters: Vec::new(),
            search: None,
            sort: Vec::new(),
            max_entities: Setting::Inherit,
            rate_interval: Setting::Inherit,
        }
    }
}

impl RetrievalQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    /// Add a `field:value` predicate, replacing an earlier one on the same field
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.filters.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = value,
            None => self.filters.push((field, value)),
        }
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.is_empty()).then_some(search);
        self
    }

    pub fn sort(mut self, key: impl Into<String>) -> Self {
        self.sort.push(key.into());
        self
    }

    /// Cap on records returned; `None` retrieves everything
    pub fn max_entities(mut self, max_entities: Option<usize>) -> Self {
        self.max_entities = Setting::Set(max_entities);
        self
    }

    /// Delay slept before each API call
    pub fn rate_interval(mut self, rate_interval: Duration) -> Self {
        self.rate_interval = Setting::Set(rate_interval);
        self
    }

    /// Comma-joined `field:value` pairs
    pub fn filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|(field, value)| format!("{}:{}", field, value))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Request parameters shared by every page of this query
    pub fn to_params(&self, mailto: Option<&str>) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if !self.filters.is_empty() {
            params.push(("filter".to_string(), self.filter_string()));
        }

        if let Some(search) = &self.search {
            params.push(("search".to_string(), search.clone()));
        }

        let sort: Vec<&str> = self
            .sort
            .iter()
            .map(String::as_str)
            .filter(|key| !key.is_empty())
            .collect();
        if !sort.is_empty() {
            params.push(("sort".to_string(), sort.join(",")));
        }

        if let Some(mailto) = mailto.filter(|m| !m.is_empty()) {
            params.push(("mailto".to_string(), mailto.to_string()));
        }

        params
    }
}
