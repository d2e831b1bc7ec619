//! Paths that bypass admission control.

/// Prefix-based predicate for request paths exempt from admission control
/// (health checks, documentation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedPaths {
    prefixes: Vec<String>,
}

impl ExcludedPaths {
    /// Build from a list of prefixes. Empty prefixes are ignored, since they
    /// would exempt every path.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Whether `path` bypasses admission control.
    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}
