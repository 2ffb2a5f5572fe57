use serde::{Deserialize, Serialize};

use hostflow_core::types::{NodeId, ResultStatus};

/// An edge connecting two nodes in a workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
    /// Condition that must hold to traverse this edge.
    pub condition: EdgeCondition,
}

/// Condition for traversing an edge.
///
/// Serialized with the names the persisted record uses for connection types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeCondition {
    /// Always traverse this edge.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Traverse only if the source node succeeded.
    #[serde(rename = "success")]
    OnSuccess,
    /// Traverse only if the source node failed.
    #[serde(rename = "failure")]
    OnFailure,
}

impl EdgeCondition {
    /// Whether an edge with this condition fires for the given outcome.
    pub fn admits(&self, outcome: ResultStatus) -> bool {
        match self {
            Self::Default => true,
            Self::OnSuccess => outcome == ResultStatus::Success,
            Self::OnFailure => outcome == ResultStatus::Failure,
        }
    }
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            condition: EdgeCondition::Default,
        }
    }

    /// Create an edge that fires on success.
    pub fn on_success(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            condition: EdgeCondition::OnSuccess,
        }
    }

    /// Create an edge that fires on failure.
    pub fn on_failure(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            condition: EdgeCondition::OnFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_builders() {
        let e = Edge::always(NodeId(1), NodeId(2));
        assert_eq!(e.from, NodeId(1));
        assert_eq!(e.to, NodeId(2));
        assert_eq!(e.condition, EdgeCondition::Default);

        let e = Edge::on_success(NodeId(1), NodeId(3));
        assert_eq!(e.condition, EdgeCondition::OnSuccess);

        let e = Edge::on_failure(NodeId(1), NodeId(4));
        assert_eq!(e.condition, EdgeCondition::OnFailure);
    }

    #[test]
    fn test_admits() {
        use ResultStatus::*;
        assert!(EdgeCondition::Default.admits(Success));
        assert!(EdgeCondition::Default.admits(Failure));
        assert!(EdgeCondition::OnSuccess.admits(Success));
        assert!(!EdgeCondition::OnSuccess.admits(Failure));
        assert!(EdgeCondition::OnFailure.admits(Failure));
        assert!(!EdgeCondition::OnFailure.admits(Success));
    }

    #[test]
    fn test_condition_wire_names() {
        assert_eq!(serde_json::to_string(&EdgeCondition::OnSuccess).unwrap(), "\"success\"");
        let parsed: EdgeCondition = serde_json::from_str("\"failure\"").unwrap();
        assert_eq!(parsed, EdgeCondition::OnFailure);
    }
}
