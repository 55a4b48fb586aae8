use serde::{Deserialize, Serialize};

/// Unique identifier for a managed game server.
///
/// Server ids are short operator-chosen strings ("1", "2", ...) that double
/// as the name of the server's subdirectory beneath the data root. The empty
/// id is reserved for events scoped to the global save directory.
///
/// # Examples
///
/// ```rust
/// use garrison_types::ServerId;
///
/// let id = ServerId::new("1");
/// assert_eq!(id.as_str(), "1");
/// assert!(!id.is_global());
/// assert!(ServerId::global().is_global());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Creates a server id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The empty id used to scope events to the global save directory.
    pub fn global() -> Self {
        Self(String::new())
    }

    /// Returns true for the global (empty) scope.
    pub fn is_global(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_id_is_empty() {
        assert!(ServerId::global().is_global());
        assert!(!ServerId::new("1").is_global());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ServerId::new("7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
    }
}
