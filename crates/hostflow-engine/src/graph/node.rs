use hostflow_core::types::{FileHandle, HostId, HostRef, NodeId};

/// Canvas position of a node. Carried only so layouts survive persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub kind: NodeKind,
}

/// What a node does when a branch reaches it.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root of a branch: identifies the host every downstream action targets.
    Host(HostNode),
    /// Shell command template run on the branch's host.
    Command(CommandNode),
    /// File transfer to the branch's host.
    Upload(UploadNode),
    /// Display sink for the result of whatever feeds it. Never executed.
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostNode {
    pub host_id: HostId,
    pub host_name: String,
    pub host_address: String,
}

impl HostNode {
    pub fn host_ref(&self) -> HostRef {
        HostRef {
            id: self.host_id,
            name: self.host_name.clone(),
            address: self.host_address.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandNode {
    pub command: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub ref_name: Option<String>,
}

impl CommandNode {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Expose this node's result to downstream templates under `name`.
    pub fn with_ref(mut self, name: impl Into<String>) -> Self {
        self.ref_name = Some(name.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadNode {
    /// Bound local file. `None` after loading from a persisted record until
    /// the file is re-attached.
    pub source: Option<FileHandle>,
    /// Name of the file last bound, kept across persistence.
    pub file_name: Option<String>,
    /// Remote path template. Empty lets the gateway choose.
    pub remote_path: String,
    pub ref_name: Option<String>,
}

impl UploadNode {
    pub fn new(source: FileHandle, remote_path: impl Into<String>) -> Self {
        Self {
            file_name: Some(source.name.clone()),
            source: Some(source),
            remote_path: remote_path.into(),
            ref_name: None,
        }
    }

    pub fn with_ref(mut self, name: impl Into<String>) -> Self {
        self.ref_name = Some(name.into());
        self
    }

    /// Bind a local file to this node.
    pub fn attach(&mut self, source: FileHandle) {
        self.file_name = Some(source.name.clone());
        self.source = Some(source);
    }
}

impl Node {
    /// Symbolic name under which this node's result is exposed, if any.
    pub fn ref_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Command(c) => c.ref_name.as_deref(),
            NodeKind::Upload(u) => u.ref_name.as_deref(),
            NodeKind::Host(_) | NodeKind::Output => None,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host(_))
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, NodeKind::Output)
    }

    /// Whether the scheduler performs a remote action for this node.
    pub fn is_action(&self) -> bool {
        matches!(self.kind, NodeKind::Command(_) | NodeKind::Upload(_))
    }

    /// Short label for logs and listings.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Host(h) => format!("host {} ({})", h.host_name, h.host_address),
            NodeKind::Command(c) => match &c.title {
                Some(title) => format!("command \"{}\"", title),
                None => format!("command `{}`", c.command),
            },
            NodeKind::Upload(u) => format!(
                "upload {} -> {}",
                u.file_name.as_deref().unwrap_or("<no file>"),
                if u.remote_path.is_empty() { "<default>" } else { &u.remote_path }
            ),
            NodeKind::Output => "output".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_name_by_kind() {
        let cmd = Node {
            id: NodeId(2),
            position: Position::default(),
            kind: NodeKind::Command(CommandNode::new("uptime").with_ref("up")),
        };
        assert_eq!(cmd.ref_name(), Some("up"));
        assert!(cmd.is_action());

        let out = Node {
            id: NodeId(3),
            position: Position::default(),
            kind: NodeKind::Output,
        };
        assert_eq!(out.ref_name(), None);
        assert!(out.is_output());
        assert!(!out.is_action());
    }

    #[test]
    fn test_attach_updates_file_name() {
        let mut upload = UploadNode::default();
        assert!(upload.source.is_none());
        upload.attach(FileHandle::from_path("/tmp/setup.sh"));
        assert_eq!(upload.file_name.as_deref(), Some("setup.sh"));
        assert!(upload.source.is_some());
    }

    #[test]
    fn test_labels() {
        let node = Node {
            id: NodeId(1),
            position: Position::default(),
            kind: NodeKind::Command(CommandNode::new("ls").with_title("List")),
        };
        assert_eq!(node.label(), "command \"List\"");
    }
}
