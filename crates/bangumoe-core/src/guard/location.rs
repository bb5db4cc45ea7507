use std::fmt;

use reqwest::Url;

/// Base used to parse and serialize app-relative paths
const LOCATION_BASE: &str = "http://bangumoe.local";

/// An app-relative location: a path plus decoded query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Location {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Parse `"/path?key=value"`. Input that cannot be parsed is kept as a bare path.
    pub fn parse(full_path: &str) -> Self {
        let joined = Url::parse(LOCATION_BASE).and_then(|base| base.join(full_path));
        match joined {
            Ok(url) => Self {
                path: url.path().to_string(),
                query: url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            },
            Err(_) => Self::new(full_path),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus encoded query string.
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        match Url::parse(LOCATION_BASE) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .extend_pairs(self.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                format!("{}?{}", self.path, url.query().unwrap_or_default())
            }
            Err(_) => self.path.clone(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path())
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
