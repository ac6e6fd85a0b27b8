//! Repository configuration.

use std::time::Duration;

pub const DEFAULT_COLLECTION: &str = "contacts";
pub const DEFAULT_UPDATE_MAX_TIME: Duration = Duration::from_secs(10);

/// How `find_by_name` interprets caller text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameSearch {
    /// Caller text is a regular-expression source.
    #[default]
    Pattern,
    /// Caller text is escaped and matched as a literal substring.
    Literal,
}

/// Settings for one `ContactRepository`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Collection name callers pass when building the collection handle.
    ///
    /// The repository never opens collections itself; it works on the
    /// handle it was given.
    pub collection: String,
    /// Execution time budget handed to the store for `update`.
    pub update_max_time: Duration,
    pub name_search: NameSearch,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            update_max_time: DEFAULT_UPDATE_MAX_TIME,
            name_search: NameSearch::default(),
        }
    }
}

impl RepositoryConfig {
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_update_max_time(mut self, max_time: Duration) -> Self {
        self.update_max_time = max_time;
        self
    }

    pub fn with_name_search(mut self, mode: NameSearch) -> Self {
        self.name_search = mode;
        self
    }

    /// Turns caller text into the pattern source handed to the store.
    pub fn name_pattern(&self, name: &str) -> String {
        match self.name_search {
            NameSearch::Pattern => name.to_string(),
            NameSearch::Literal => regex::escape(name),
        }
    }
}
