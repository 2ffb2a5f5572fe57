use std::collections::HashMap;

use hostflow_core::types::{GlobalVariable, NodeResult};

/// Results exposed to templates within one branch, keyed by ref name.
///
/// Each host branch owns its own context; branches never share one.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    results: HashMap<String, NodeResult>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ref_name: &str) -> Option<&NodeResult> {
        self.results.get(ref_name)
    }

    /// Store a result, replacing any earlier one under the same name.
    pub fn insert(&mut self, ref_name: impl Into<String>, result: NodeResult) {
        self.results.insert(ref_name.into(), result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Read-only snapshot of global variables for one run.
#[derive(Debug, Clone, Default)]
pub struct GlobalVariables {
    values: HashMap<String, String>,
}

impl GlobalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<GlobalVariable>> for GlobalVariables {
    fn from(vars: Vec<GlobalVariable>) -> Self {
        Self {
            values: vars.into_iter().map(|v| (v.key, v.value)).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GlobalVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_overwrites_same_ref() {
        let mut ctx = ExecutionContext::new();
        ctx.insert("build", NodeResult::failure("first"));
        ctx.insert("build", NodeResult::failure("second"));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.get("build").unwrap().error.as_deref(), Some("second"));
    }

    #[test]
    fn test_globals_from_store_listing() {
        let globals = GlobalVariables::from(vec![GlobalVariable {
            key: "region".into(),
            value: "eu-west".into(),
            description: String::new(),
        }]);
        assert_eq!(globals.get("region"), Some("eu-west"));
        assert!(!globals.contains("zone"));
    }
}
