//! Workflow — a definition whose control flow is a node graph.
//!
//! Structure is validated once, when the graph is parsed: exactly one
//! trigger node, at least one end node, unique ids, and every `next` id
//! resolving. Unreachable nodes are reported as warnings only.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::automation::{ActionConfig, ConditionGroup};
use crate::error::{FlowHubError, ValidationError};
use crate::execution::{ExecutionContext, ExecutionStatus};
use crate::id::{ExecutionId, WorkflowId};
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

/// Type-specific node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Trigger {
        #[serde(default)]
        config: Value,
    },
    Action {
        action: ActionConfig,
    },
    Condition {
        conditions: ConditionGroup,
    },
    End,
}

impl NodeKind {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Trigger { .. } => "trigger",
            Self::Action { .. } => "action",
            Self::Condition { .. } => "condition",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Successors; for condition nodes `[0]` is the true branch, `[1]` the false one.
    #[serde(default)]
    pub next: Vec<String>,
}

impl WorkflowNode {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind, next: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            next,
        }
    }

    #[must_use]
    pub fn is_condition(&self) -> bool {
        matches!(self.kind, NodeKind::Condition { .. })
    }
}

/// Serialized workflow definition as stored by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub nodes: Vec<WorkflowNode>,
}

/// A structurally valid workflow, indexed for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWorkflow {
    pub id: WorkflowId,
    pub name: String,
    pub status: WorkflowStatus,
    pub nodes: HashMap<String, WorkflowNode>,
    pub start_node_id: String,
}

impl ParsedWorkflow {
    /// Validate and index a definition.
    ///
    /// Returns the parsed workflow and the ids of nodes unreachable from the
    /// trigger node (sorted).
    ///
    /// # Errors
    ///
    /// Returns [`FlowHubError::Validation`] when the trigger count is not one,
    /// no end node exists, an id is duplicated, or a `next` id is unknown.
    pub fn parse(definition: WorkflowDefinition) -> Result<(Self, Vec<String>), FlowHubError> {
        if definition.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }

        let triggers: Vec<&WorkflowNode> = definition
            .nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::Trigger { .. }))
            .collect();
        if triggers.len() != 1 {
            return Err(ValidationError::TriggerNodeCount(triggers.len()).into());
        }
        let start_node_id = triggers[0].id.clone();

        if !definition
            .nodes
            .iter()
            .any(|node| matches!(node.kind, NodeKind::End))
        {
            return Err(ValidationError::NoEndNode.into());
        }

        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        for node in definition.nodes {
            if nodes.contains_key(&node.id) {
                return Err(ValidationError::DuplicateNode(node.id).into());
            }
            nodes.insert(node.id.clone(), node);
        }

        for node in nodes.values() {
            if let Some(missing) = node.next.iter().find(|next| !nodes.contains_key(*next)) {
                return Err(ValidationError::UnknownNextNode {
                    node: node.id.clone(),
                    next: missing.clone(),
                }
                .into());
            }
        }

        let workflow = Self {
            id: definition.id,
            name: definition.name,
            status: definition.status,
            nodes,
            start_node_id,
        };
        let unreachable = workflow.unreachable_nodes();
        Ok((workflow, unreachable))
    }

    /// Ids of nodes that no path from the trigger node reaches, sorted.
    #[must_use]
    pub fn unreachable_nodes(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([self.start_node_id.as_str()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                queue.extend(node.next.iter().map(String::as_str));
            }
        }
        let mut unreachable: Vec<String> = self
            .nodes
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .cloned()
            .collect();
        unreachable.sort();
        unreachable
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }
}

/// In-memory state of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    /// Visited node ids in visit order (condition nodes may repeat).
    pub history: Vec<String>,
    pub node_results: Map<String, Value>,
    pub context: ExecutionContext,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// A `RUNNING` execution positioned on the workflow's trigger node.
    #[must_use]
    pub fn start(workflow: &ParsedWorkflow, context: ExecutionContext) -> Self {
        Self {
            workflow_id: workflow.id,
            execution_id: ExecutionId::new(),
            status: ExecutionStatus::Running,
            current_node_id: Some(workflow.start_node_id.clone()),
            history: Vec::new(),
            node_results: Map::new(),
            context,
            started_at: now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(now());
    }

    /// Durable summary written once the run is terminal.
    #[must_use]
    pub fn to_log(&self) -> WorkflowExecutionLog {
        WorkflowExecutionLog {
            workflow_id: self.workflow_id,
            execution_id: self.execution_id,
            status: self.status,
            user_id: self.context.user_id.clone(),
            history: self.history.clone(),
            node_results: self.node_results.clone(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionLog {
    pub workflow_id: WorkflowId,
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub user_id: String,
    pub history: Vec<String>,
    pub node_results: Map<String, Value>,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::ActionKind;
    use serde_json::json;

    fn node(id: &str, kind: NodeKind, next: &[&str]) -> WorkflowNode {
        WorkflowNode::new(id, kind, next.iter().map(ToString::to_string).collect())
    }

    fn trigger() -> NodeKind {
        NodeKind::Trigger { config: json!({}) }
    }

    fn delay() -> NodeKind {
        NodeKind::Action {
            action: ActionKind::Delay { delay_ms: 1 }.into(),
        }
    }

    fn definition(nodes: Vec<WorkflowNode>) -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new(),
            name: "Flow".to_string(),
            status: WorkflowStatus::Active,
            nodes,
        }
    }

    #[test]
    fn should_parse_valid_graph_with_start_node() {
        let (workflow, unreachable) = ParsedWorkflow::parse(definition(vec![
            node("start", trigger(), &["a"]),
            node("a", delay(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]))
        .unwrap();
        assert_eq!(workflow.start_node_id, "start");
        assert_eq!(workflow.nodes.len(), 3);
        assert!(unreachable.is_empty());
        assert!(workflow.is_active());
    }

    #[test]
    fn should_reject_missing_or_duplicate_trigger() {
        let none = ParsedWorkflow::parse(definition(vec![node("end", NodeKind::End, &[])]));
        assert!(matches!(
            none,
            Err(FlowHubError::Validation(ValidationError::TriggerNodeCount(0)))
        ));
        let two = ParsedWorkflow::parse(definition(vec![
            node("t1", trigger(), &["end"]),
            node("t2", trigger(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]));
        assert!(matches!(
            two,
            Err(FlowHubError::Validation(ValidationError::TriggerNodeCount(2)))
        ));
    }

    #[test]
    fn should_reject_graph_without_end_node() {
        let result = ParsedWorkflow::parse(definition(vec![node("start", trigger(), &[])]));
        assert!(matches!(
            result,
            Err(FlowHubError::Validation(ValidationError::NoEndNode))
        ));
    }

    #[test]
    fn should_reject_unknown_next_id() {
        let result = ParsedWorkflow::parse(definition(vec![
            node("start", trigger(), &["ghost"]),
            node("end", NodeKind::End, &[]),
        ]));
        assert!(matches!(
            result,
            Err(FlowHubError::Validation(ValidationError::UnknownNextNode { next, .. }))
                if next == "ghost"
        ));
    }

    #[test]
    fn should_reject_duplicate_node_ids() {
        let result = ParsedWorkflow::parse(definition(vec![
            node("start", trigger(), &["end"]),
            node("end", NodeKind::End, &[]),
            node("end", NodeKind::End, &[]),
        ]));
        assert!(matches!(
            result,
            Err(FlowHubError::Validation(ValidationError::DuplicateNode(id))) if id == "end"
        ));
    }

    #[test]
    fn should_report_unreachable_nodes_as_warnings() {
        let (_, unreachable) = ParsedWorkflow::parse(definition(vec![
            node("start", trigger(), &["end"]),
            node("orphan", delay(), &["end"]),
            node("end", NodeKind::End, &[]),
        ]))
        .unwrap();
        assert_eq!(unreachable, vec!["orphan".to_string()]);
    }

    #[test]
    fn should_deserialize_nodes_from_json() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": WorkflowId::new(),
            "name": "Json flow",
            "status": "ACTIVE",
            "nodes": [
                {"id": "start", "type": "trigger", "next": ["check"]},
                {"id": "check", "type": "condition",
                 "conditions": {"conditions": [{"left": "$ok", "operator": "IS_TRUE"}]},
                 "next": ["end"]},
                {"id": "end", "type": "end"}
            ]
        }))
        .unwrap();
        let (workflow, _) = ParsedWorkflow::parse(def).unwrap();
        assert!(workflow.nodes["check"].is_condition());
        assert_eq!(workflow.nodes["end"].kind.type_name(), "end");
    }
}
