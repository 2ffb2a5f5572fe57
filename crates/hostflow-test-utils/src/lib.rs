//! Test doubles for the Hostflow gateway and store traits.

mod gateway;
mod globals;

pub use gateway::{GatewayCall, MockGateway, Reply};
pub use globals::{FailingGlobalStore, MemoryGlobalStore};

use hostflow_core::types::{HostId, HostRef};

/// A host reference for tests.
pub fn host(id: u64, name: &str) -> HostRef {
    HostRef {
        id: HostId(id),
        name: name.to_string(),
        address: format!("10.0.0.{}", id),
    }
}

/// Write `content` to a fresh temp file and return the directory guard with the path.
pub fn temp_file(name: &str, content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}
