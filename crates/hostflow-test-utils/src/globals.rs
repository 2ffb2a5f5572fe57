use std::collections::BTreeMap;
use std::sync::Mutex;

use futures::future::BoxFuture;

use hostflow_core::error::{HostflowError, Result};
use hostflow_core::traits::GlobalStore;
use hostflow_core::types::GlobalVariable;

/// Global store backed by a map.
#[derive(Default)]
pub struct MemoryGlobalStore {
    vars: Mutex<BTreeMap<String, GlobalVariable>>,
}

impl MemoryGlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.vars.lock().unwrap().insert(
            key.to_string(),
            GlobalVariable {
                key: key.to_string(),
                value: value.to_string(),
                description: String::new(),
            },
        );
        self
    }
}

impl GlobalStore for MemoryGlobalStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<GlobalVariable>>> {
        Box::pin(async move { Ok(self.vars.lock().unwrap().values().cloned().collect()) })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.vars.lock().unwrap().insert(
                key.to_string(),
                GlobalVariable {
                    key: key.to_string(),
                    value: value.to_string(),
                    description: description.to_string(),
                },
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.vars.lock().unwrap().remove(key);
            Ok(())
        })
    }
}

/// Global store whose every call fails.
pub struct FailingGlobalStore;

impl GlobalStore for FailingGlobalStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<GlobalVariable>>> {
        Box::pin(async { Err(HostflowError::Http("connection refused".into())) })
    }

    fn put<'a>(&'a self, _: &'a str, _: &'a str, _: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Err(HostflowError::Http("connection refused".into())) })
    }

    fn delete<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Err(HostflowError::Http("connection refused".into())) })
    }
}
