use std::fmt;

/// Messenger user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// A content channel to search, loaded once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub display_name: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// The `(level, category)` pair identifying a request and its cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    pub level: String,
    pub category: String,
}

impl Query {
    pub fn new(level: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            category: category.into(),
        }
    }

    /// Free-text query sent to the search provider.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.level, self.category)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.level, self.category)
    }
}
