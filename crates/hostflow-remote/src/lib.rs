//! Gateways that perform workflow actions on managed hosts.
//!
//! - [`HttpGateway`] talks to the host-management service over HTTP.
//! - [`LocalGateway`] runs everything on this machine, for dry runs and tests.
//! - [`HttpGlobalStore`] reads and edits the service's global variables.

mod api;
pub mod http;
pub mod local;
pub mod path;

use std::sync::Arc;

use hostflow_core::config::{GatewayConfig, GatewayKind};
use hostflow_core::error::Result;
use hostflow_core::traits::RemoteGateway;

pub use http::{HttpGateway, HttpGlobalStore};
pub use local::LocalGateway;
pub use path::normalize_remote_path;

/// Build the gateway selected by `config`.
pub fn gateway_from_config(config: &GatewayConfig) -> Result<Arc<dyn RemoteGateway>> {
    let gateway: Arc<dyn RemoteGateway> = match config.kind {
        GatewayKind::Http => Arc::new(HttpGateway::from_config(config)?),
        GatewayKind::Local => Arc::new(LocalGateway::new(config.timeout_secs)),
    };
    Ok(gateway)
}
