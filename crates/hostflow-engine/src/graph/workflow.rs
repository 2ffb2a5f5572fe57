use std::collections::BTreeMap;

use tracing::warn;

use hostflow_core::error::{HostflowError, Result};
use hostflow_core::types::{FileHandle, NodeId};

use super::edge::{Edge, EdgeCondition};
use super::node::{CommandNode, HostNode, Node, NodeKind, Position, UploadNode};

/// Largest id a persisted record may carry. Records are written by a
/// JavaScript canvas, whose numbers are exact only up to 2^53 - 1.
pub const MAX_NODE_ID: u64 = (1 << 53) - 1;

/// A workflow graph: nodes, conditional edges, and the id allocator.
///
/// Ids come from a monotonically increasing allocator owned by the graph, so
/// an id is never handed out twice even after its node is removed. The graph
/// imposes no structural constraint: cycles and reconverging paths are legal.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    next_id: u64,
}

impl Default for WorkflowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a graph from already-identified nodes and edges.
    ///
    /// Rejects id 0, ids above [`MAX_NODE_ID`], duplicate ids, and edges
    /// whose endpoints are unknown.
    /// The allocator resumes at `next_id` or one past the largest id seen,
    /// whichever is greater.
    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>, next_id: u64) -> Result<Self> {
        let mut graph = Self::with_nodes(nodes, next_id)?;
        for edge in edges {
            if !graph.nodes.contains_key(&edge.from) || !graph.nodes.contains_key(&edge.to) {
                return Err(HostflowError::DanglingEdge {
                    from: edge.from,
                    to: edge.to,
                });
            }
            graph.push_edge(edge);
        }
        Ok(graph)
    }

    /// Like [`from_parts`](Self::from_parts), but drops dangling edges
    /// instead of rejecting the graph.
    pub fn from_parts_lenient(nodes: Vec<Node>, edges: Vec<Edge>, next_id: u64) -> Result<Self> {
        let mut graph = Self::with_nodes(nodes, next_id)?;
        for edge in edges {
            if !graph.nodes.contains_key(&edge.from) || !graph.nodes.contains_key(&edge.to) {
                warn!(from = %edge.from, to = %edge.to, "Dropping edge to unknown node");
                continue;
            }
            graph.push_edge(edge);
        }
        Ok(graph)
    }

    fn with_nodes(nodes: Vec<Node>, next_id: u64) -> Result<Self> {
        let mut map = BTreeMap::new();
        for node in nodes {
            if node.id.0 == 0 || node.id.0 > MAX_NODE_ID {
                return Err(HostflowError::InvalidNodeId(node.id.0));
            }
            if map.contains_key(&node.id) {
                return Err(HostflowError::DuplicateNode(node.id));
            }
            map.insert(node.id, node);
        }
        let max_id = map.keys().next_back().map(|id| id.0).unwrap_or(0);
        if next_id > MAX_NODE_ID + 1 {
            return Err(HostflowError::InvalidNodeId(next_id));
        }
        Ok(Self {
            nodes: map,
            edges: Vec::new(),
            next_id: next_id.max(max_id + 1),
        })
    }

    /// The id the next created node will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a node of any kind and return its freshly allocated id.
    pub fn add_node(&mut self, kind: NodeKind, position: Position) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(id, Node { id, position, kind });
        id
    }

    pub fn add_host(&mut self, host: HostNode, position: Position) -> NodeId {
        self.add_node(NodeKind::Host(host), position)
    }

    pub fn add_command(&mut self, command: CommandNode, position: Position) -> NodeId {
        self.add_node(NodeKind::Command(command), position)
    }

    pub fn add_upload(&mut self, upload: UploadNode, position: Position) -> NodeId {
        self.add_node(NodeKind::Upload(upload), position)
    }

    pub fn add_output(&mut self, position: Position) -> NodeId {
        self.add_node(NodeKind::Output, position)
    }

    /// Connect two existing nodes.
    ///
    /// Returns `Ok(false)` if an identical edge already exists.
    pub fn connect(&mut self, from: NodeId, to: NodeId, condition: EdgeCondition) -> Result<bool> {
        for id in [from, to] {
            if !self.nodes.contains_key(&id) {
                return Err(HostflowError::UnknownNode(id));
            }
        }
        Ok(self.push_edge(Edge { from, to, condition }))
    }

    fn push_edge(&mut self, edge: Edge) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Remove every edge from `from` to `to`. Returns how many were removed.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !(e.from == from && e.to == to));
        before - self.edges.len()
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let node = self.nodes.remove(&id).ok_or(HostflowError::UnknownNode(id))?;
        self.edges.retain(|e| e.from != id && e.to != id);
        Ok(node)
    }

    /// Bind a local file to an upload node.
    pub fn attach_file(&mut self, id: NodeId, file: FileHandle) -> Result<()> {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(NodeKind::Upload(upload)) => {
                upload.attach(file);
                Ok(())
            }
            Some(_) => Err(HostflowError::InvalidInput(format!(
                "node {} is not an upload node",
                id
            ))),
            None => Err(HostflowError::UnknownNode(id)),
        }
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(HostflowError::UnknownNode(id))?;
        node.position = position;
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Outgoing edges of a node, in the order they were added.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.from == id)
    }

    /// Incoming edges of a node, in the order they were added.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Host nodes in id order. Each roots one branch of a run.
    pub fn hosts(&self) -> impl Iterator<Item = (&Node, &HostNode)> + '_ {
        self.nodes.values().filter_map(|n| match &n.kind {
            NodeKind::Host(h) => Some((n, h)),
            _ => None,
        })
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostflow_core::types::HostId;

    fn host() -> HostNode {
        HostNode {
            host_id: HostId(1),
            host_name: "web-1".into(),
            host_address: "10.0.0.5".into(),
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut g = WorkflowGraph::new();
        let a = g.add_host(host(), Position::default());
        let b = g.add_command(CommandNode::new("uptime"), Position::default());
        assert_eq!(a, NodeId(1));
        assert_eq!(b, NodeId(2));

        g.remove_node(b).unwrap();
        let c = g.add_output(Position::default());
        assert_eq!(c, NodeId(3));
    }

    #[test]
    fn test_connect_and_outgoing_order() {
        let mut g = WorkflowGraph::new();
        let h = g.add_host(host(), Position::default());
        let c1 = g.add_command(CommandNode::new("a"), Position::default());
        let c2 = g.add_command(CommandNode::new("b"), Position::default());

        assert!(g.connect(h, c2, EdgeCondition::Default).unwrap());
        assert!(g.connect(h, c1, EdgeCondition::Default).unwrap());
        assert!(!g.connect(h, c1, EdgeCondition::Default).unwrap());

        let targets: Vec<NodeId> = g.outgoing(h).map(|e| e.to).collect();
        assert_eq!(targets, vec![c2, c1]);
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut g = WorkflowGraph::new();
        let h = g.add_host(host(), Position::default());
        let err = g.connect(h, NodeId(99), EdgeCondition::Default).unwrap_err();
        assert!(matches!(err, HostflowError::UnknownNode(NodeId(99))));
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut g = WorkflowGraph::new();
        let h = g.add_host(host(), Position::default());
        let c = g.add_command(CommandNode::new("a"), Position::default());
        let o = g.add_output(Position::default());
        g.connect(h, c, EdgeCondition::Default).unwrap();
        g.connect(c, o, EdgeCondition::OnFailure).unwrap();

        g.remove_node(c).unwrap();
        assert!(g.edges().is_empty());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_from_parts_restores_allocator() {
        let nodes = vec![
            Node { id: NodeId(4), position: Position::default(), kind: NodeKind::Output },
            Node { id: NodeId(9), position: Position::default(), kind: NodeKind::Output },
        ];
        let g = WorkflowGraph::from_parts(nodes.clone(), vec![], 2).unwrap();
        assert_eq!(g.next_id(), 10);

        let g = WorkflowGraph::from_parts(nodes, vec![], 42).unwrap();
        assert_eq!(g.next_id(), 42);
    }

    #[test]
    fn test_from_parts_rejects_oversized_ids() {
        let output = |id: u64| Node { id: NodeId(id), position: Position::default(), kind: NodeKind::Output };

        let err = WorkflowGraph::from_parts(vec![output(u64::MAX)], vec![], 0).unwrap_err();
        assert!(matches!(err, HostflowError::InvalidNodeId(id) if id == u64::MAX));

        let err = WorkflowGraph::from_parts(vec![output(3)], vec![], u64::MAX).unwrap_err();
        assert!(matches!(err, HostflowError::InvalidNodeId(id) if id == u64::MAX));

        let mut g = WorkflowGraph::from_parts(vec![output(MAX_NODE_ID)], vec![], 0).unwrap();
        let id = g.add_output(Position::default());
        assert_eq!(id, NodeId(MAX_NODE_ID + 1));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_from_parts_rejects_dangling_edge() {
        let nodes = vec![Node { id: NodeId(1), position: Position::default(), kind: NodeKind::Output }];
        let err = WorkflowGraph::from_parts(nodes, vec![Edge::always(NodeId(1), NodeId(2))], 0)
            .unwrap_err();
        assert!(matches!(err, HostflowError::DanglingEdge { .. }));
    }

    #[test]
    fn test_lenient_drops_dangling_edge() {
        let nodes = vec![
            Node { id: NodeId(1), position: Position::default(), kind: NodeKind::Output },
            Node { id: NodeId(2), position: Position::default(), kind: NodeKind::Output },
        ];
        let edges = vec![Edge::always(NodeId(1), NodeId(2)), Edge::always(NodeId(2), NodeId(7))];
        let g = WorkflowGraph::from_parts_lenient(nodes, edges, 0).unwrap();
        assert_eq!(g.edges().len(), 1);
    }

    #[test]
    fn test_from_parts_rejects_duplicates_and_zero() {
        let dup = vec![
            Node { id: NodeId(1), position: Position::default(), kind: NodeKind::Output },
            Node { id: NodeId(1), position: Position::default(), kind: NodeKind::Output },
        ];
        assert!(matches!(
            WorkflowGraph::from_parts(dup, vec![], 0),
            Err(HostflowError::DuplicateNode(NodeId(1)))
        ));

        let zero = vec![Node { id: NodeId(0), position: Position::default(), kind: NodeKind::Output }];
        assert!(matches!(
            WorkflowGraph::from_parts(zero, vec![], 0),
            Err(HostflowError::InvalidNodeId(0))
        ));
    }

    #[test]
    fn test_attach_file_only_on_upload() {
        let mut g = WorkflowGraph::new();
        let c = g.add_command(CommandNode::new("a"), Position::default());
        let u = g.add_upload(UploadNode::default(), Position::default());

        assert!(g.attach_file(c, FileHandle::from_path("/tmp/x")).is_err());
        g.attach_file(u, FileHandle::from_path("/tmp/x")).unwrap();
        match &g.node(u).unwrap().kind {
            NodeKind::Upload(up) => assert_eq!(up.file_name.as_deref(), Some("x")),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_cycles_are_allowed() {
        let mut g = WorkflowGraph::new();
        let a = g.add_command(CommandNode::new("a"), Position::default());
        let b = g.add_command(CommandNode::new("b"), Position::default());
        g.connect(a, b, EdgeCondition::Default).unwrap();
        g.connect(b, a, EdgeCondition::Default).unwrap();
        g.connect(a, a, EdgeCondition::OnFailure).unwrap();
        assert_eq!(g.edges().len(), 3);
    }
}
