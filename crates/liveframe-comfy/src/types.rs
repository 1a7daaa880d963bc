//! ComfyUI's loosely-typed WebSocket progress events, as a tagged-union enum
//! with typed parsers for each `type` we care about. Unknown types are
//! tolerated by ignoring them, never by failing.

use std::collections::HashMap;

use serde::Deserialize;

/// A single message from the `/ws?clientId=` stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    ExecutionCached { data: ExecutionCachedData },
    Executed { data: ExecutedData },
    Progress { data: ProgressData },
    ProgressState { data: ProgressStateData },
    ExecutionSuccess { data: TerminalData },
    ExecutionError { data: TerminalData },
    ExecutionInterrupted { data: TerminalData },
    Executing { data: ExecutingData },
    /// Any other `type` this client doesn't need to act on (`status`,
    /// `execution_start`, vendor extensions, …).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminalData {
    #[serde(default)]
    pub prompt_id: Option<String>,
}

/// `progress` payload: sub-progress for a single named node.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub max: f64,
}

/// `progress_state` payload: a snapshot of every node's state.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressStateData {
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub nodes: HashMap<String, NodeState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeState {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub max: f64,
}

impl ProgressEvent {
    /// The `prompt_id` this event concerns, when the message type carries one.
    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::ExecutionCached { data } => data.prompt_id.as_deref(),
            ProgressEvent::Executed { data } => data.prompt_id.as_deref(),
            ProgressEvent::Progress { data } => data.prompt_id.as_deref(),
            ProgressEvent::ProgressState { data } => data.prompt_id.as_deref(),
            ProgressEvent::ExecutionSuccess { data } => data.prompt_id.as_deref(),
            ProgressEvent::ExecutionError { data } => data.prompt_id.as_deref(),
            ProgressEvent::ExecutionInterrupted { data } => data.prompt_id.as_deref(),
            ProgressEvent::Executing { data } => data.prompt_id.as_deref(),
            ProgressEvent::Unknown => None,
        }
    }

    /// Whether this event ends the progress stream for its prompt: the three
    /// explicit terminal types, or the legacy `executing` with `node = null`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::ExecutionSuccess { .. }
                | ProgressEvent::ExecutionError { .. }
                | ProgressEvent::ExecutionInterrupted { .. }
        ) || matches!(self, ProgressEvent::Executing { data } if data.node.is_none())
    }

    /// Dominant-node sampling ratio extraction (the chosen strategy, per the
    /// design notes): for `progress`, `value/max` directly when `max > 1`;
    /// for `progress_state`, the node with the largest `max`, preferring
    /// `running` over `finished` over `pending` on ties. `None` when the
    /// event carries no meaningful sub-progress.
    pub fn sampling_ratio(&self) -> Option<f64> {
        match self {
            ProgressEvent::Progress { data } => {
                if data.max > 1.0 {
                    Some(clamp_ratio(data.value / data.max))
                } else {
                    None
                }
            }
            ProgressEvent::ProgressState { data } => dominant_node_ratio(&data.nodes),
            _ => None,
        }
    }
}

fn dominant_node_ratio(nodes: &HashMap<String, NodeState>) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None; // (rank, ratio)
    for node in nodes.values() {
        if node.max <= 1.0 {
            continue;
        }
        let state_rank = match node.state.as_str() {
            "running" => 2.0,
            "finished" => 1.0,
            _ => 0.0,
        };
        let rank = state_rank * 1_000_000.0 + node.max;
        let ratio = clamp_ratio(node.value / node.max);
        if best.map(|(best_rank, _)| rank > best_rank).unwrap_or(true) {
            best = Some((rank, ratio));
        }
    }
    best.map(|(_, ratio)| ratio)
}

fn clamp_ratio(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_requires_max_greater_than_one() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"progress","data":{"value":1,"max":1,"prompt_id":"p"}}"#).unwrap();
        assert_eq!(event.sampling_ratio(), None);

        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"progress","data":{"value":5,"max":20,"prompt_id":"p"}}"#).unwrap();
        assert_eq!(event.sampling_ratio(), Some(0.25));
    }

    #[test]
    fn progress_state_prefers_running_node_on_tie() {
        let raw = r#"{
            "type": "progress_state",
            "data": {
                "prompt_id": "p",
                "nodes": {
                    "10": {"state": "finished", "value": 20, "max": 20},
                    "11": {"state": "running", "value": 5, "max": 20}
                }
            }
        }"#;
        let event: ProgressEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.sampling_ratio(), Some(0.25));
    }

    #[test]
    fn progress_state_prefers_running_state_over_larger_max() {
        let raw = r#"{
            "type": "progress_state",
            "data": {
                "prompt_id": "p",
                "nodes": {
                    "10": {"state": "running", "value": 1, "max": 2},
                    "11": {"state": "pending", "value": 10, "max": 40}
                }
            }
        }"#;
        let event: ProgressEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.sampling_ratio(), Some(0.5));
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let event: ProgressEvent = serde_json::from_str(r#"{"type":"status","data":{}}"#).unwrap();
        assert!(matches!(event, ProgressEvent::Unknown));
        assert_eq!(event.sampling_ratio(), None);
        assert!(!event.is_terminal());
    }

    #[test]
    fn terminal_types_detected() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"execution_success","data":{"prompt_id":"p"}}"#).unwrap();
        assert!(event.is_terminal());

        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"executing","data":{"prompt_id":"p","node":null}}"#).unwrap();
        assert!(event.is_terminal());

        let event: ProgressEvent =
            serde_json::from_str(r#"{"type":"executing","data":{"prompt_id":"p","node":"12"}}"#).unwrap();
        assert!(!event.is_terminal());
    }
}
