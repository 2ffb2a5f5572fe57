use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::{debug, info};

use hostflow_core::config::GatewayConfig;
use hostflow_core::error::{HostflowError, Result};
use hostflow_core::traits::{GlobalStore, RemoteGateway};
use hostflow_core::types::{
    CommandOutput, FileHandle, GlobalVariable, HostRef, UploadOutput,
};

use crate::api::ApiClient;
use crate::path::normalize_remote_path;

/// Gateway backed by the host-management service's HTTP API.
///
/// The service owns credentials and transport; hosts are addressed by id.
pub struct HttpGateway {
    api: ApiClient,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, timeout_secs)?,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout_secs)
    }
}

impl RemoteGateway for HttpGateway {
    fn name(&self) -> &str {
        "http"
    }

    fn execute_command<'a>(
        &'a self,
        host: &'a HostRef,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput>> {
        Box::pin(async move {
            let host_id = host.id.to_string();
            let url = self.api.url(&["api", "servers", &host_id, "execute"]);
            debug!(host = %host.name, host_id = %host.id, "Sending command");

            let request = self.api.client().post(url).json(&json!({ "command": command }));
            let output: Option<CommandOutput> = self.api.send("execute", request).await?;
            output.ok_or_else(|| HostflowError::Gateway("execute response carried no data".into()))
        })
    }

    fn upload_file<'a>(
        &'a self,
        host: &'a HostRef,
        file: &'a FileHandle,
        remote_path: &'a str,
    ) -> BoxFuture<'a, Result<UploadOutput>> {
        Box::pin(async move {
            let remote_path = normalize_remote_path(remote_path, &file.name);
            let bytes = tokio::fs::read(&file.path).await.map_err(|e| {
                HostflowError::Gateway(format!("cannot read {}: {}", file.path.display(), e))
            })?;
            info!(
                host = %host.name,
                file = %file.name,
                bytes = bytes.len(),
                remote_path = %remote_path,
                "Uploading file"
            );

            let form = Form::new()
                .part("file", Part::bytes(bytes).file_name(file.name.clone()))
                .text("remote_path", remote_path.clone());
            let host_id = host.id.to_string();
            let url = self.api.url(&["api", "servers", &host_id, "upload"]);
            let request = self.api.client().post(url).multipart(form);
            let _: Option<serde_json::Value> = self.api.send("upload", request).await?;

            Ok(UploadOutput { remote_path })
        })
    }
}

/// Global variables kept by the host-management service.
pub struct HttpGlobalStore {
    api: ApiClient,
}

impl HttpGlobalStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(base_url, timeout_secs)?,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout_secs)
    }
}

impl GlobalStore for HttpGlobalStore {
    fn list(&self) -> BoxFuture<'_, Result<Vec<GlobalVariable>>> {
        Box::pin(async move {
            let request = self.api.client().get(self.api.url(&["api", "globals"]));
            let vars: Option<Vec<GlobalVariable>> = self.api.send("list globals", request).await?;
            Ok(vars.unwrap_or_default())
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        description: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if key.trim().is_empty() {
                return Err(HostflowError::InvalidInput(
                    "global variable key must not be empty".into(),
                ));
            }
            let request = self
                .api
                .client()
                .post(self.api.url(&["api", "globals"]))
                .json(&json!({ "key": key, "value": value, "description": description }));
            let _: Option<serde_json::Value> = self.api.send("set global", request).await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let request = self
                .api
                .client()
                .delete(self.api.url(&["api", "globals", key]));
            let _: Option<serde_json::Value> = self.api.send("delete global", request).await?;
            Ok(())
        })
    }
}
