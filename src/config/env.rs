//! Snapshot of the process environment.
//!
//! The environment is read once at startup and handed to the subsystems that
//! need it, so request handling never touches `std::env` directly and tests
//! can supply their own values.

use std::collections::HashMap;
use std::sync::Arc;

/// Immutable set of environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: Arc<HashMap<String, String>>,
}

impl EnvVars {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let env: EnvVars = [("A", "1"), ("B", "two")].into_iter().collect();
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("two"));
        assert_eq!(env.get("C"), None);
        assert_eq!(env.len(), 2);
        assert!(EnvVars::default().is_empty());
    }
}
