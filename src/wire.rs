//! Transport-agnostic JSON shape exchanged with the serving layer.
//!
//! Every field is optional at this level so that missing required fields can
//! be reported by the validator instead of failing deserialization.

use crate::model::{Edge, Node};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Node as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Edge as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fraud: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Whole network snapshot: `{ nodes: [...], edges: [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

impl NetworkData {
    /// Parse a snapshot from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&Node> for RawNode {
    fn from(node: &Node) -> Self {
        let data = node.attributes.to_json_map();
        Self {
            id: Some(node.id.clone()),
            label: Some(node.label.clone()),
            kind: node.kind.wire_type(),
            data: (!data.is_empty()).then_some(data),
        }
    }
}

impl From<&Edge> for RawEdge {
    fn from(edge: &Edge) -> Self {
        let data = edge.attributes.to_json_map();
        Self {
            id: Some(edge.id.clone()),
            source: Some(edge.source.clone()),
            target: Some(edge.target.clone()),
            label: edge.label.clone(),
            amount: Some(edge.amount),
            weight: Some(edge.weight),
            kind: Some(edge.kind.as_str().to_string()),
            is_fraud: edge.is_fraud,
            data: (!data.is_empty()).then_some(data),
        }
    }
}

fn money_regex() -> &'static Regex {
    static MONEY: OnceLock<Regex> = OnceLock::new();
    MONEY.get_or_init(|| {
        Regex::new(r"^\s*-?\s*[$€£¥]?\s*(-?[0-9][0-9,]*(?:\.[0-9]+)?)\s*$")
            .expect("money pattern is a valid regex")
    })
}

/// Parse a display money label such as `"$1,250.00"`.
///
/// Returns `None` when the label is not a plain money amount. A leading minus
/// is preserved so the validator can reject negative values.
pub fn parse_money_label(label: &str) -> Option<f64> {
    let captures = money_regex().captures(label)?;
    let digits: String = captures[1].chars().filter(|c| *c != ',').collect();
    let value: f64 = digits.parse().ok()?;
    let negative = label.trim_start().starts_with('-') && value >= 0.0;
    Some(if negative { -value } else { value })
}

/// Resolve an edge's money value: explicit `amount`, then `data.amount`,
/// then the display label. Defaults to 0.
pub fn resolve_amount(raw: &RawEdge) -> f64 {
    raw.amount
        .or_else(|| {
            raw.data
                .as_ref()
                .and_then(|d| d.get("amount"))
                .and_then(|v| match v {
                    Value::String(s) => parse_money_label(s),
                    other => other.as_f64(),
                })
        })
        .or_else(|| raw.label.as_deref().and_then(parse_money_label))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_label() {
        assert_eq!(parse_money_label("$1,250.00"), Some(1250.0));
        assert_eq!(parse_money_label("$0.50"), Some(0.5));
        assert_eq!(parse_money_label("42"), Some(42.0));
        assert_eq!(parse_money_label("-$10.00"), Some(-10.0));
        assert_eq!(parse_money_label("payment"), None);
        assert_eq!(parse_money_label(""), None);
    }

    #[test]
    fn test_resolve_amount_precedence() {
        let mut edge = RawEdge {
            label: Some("$5,000.00".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_amount(&edge), 5000.0);

        let mut data = Map::new();
        data.insert("amount".to_string(), Value::from(12.5));
        edge.data = Some(data);
        assert_eq!(resolve_amount(&edge), 12.5);

        edge.amount = Some(99.0);
        assert_eq!(resolve_amount(&edge), 99.0);

        assert_eq!(resolve_amount(&RawEdge::default()), 0.0);
    }

    #[test]
    fn test_network_data_wire_names() {
        let json = r#"{
            "nodes": [{"id": "u1", "label": "User 1", "type": "user"}],
            "edges": [{"id": "e1", "source": "u1", "target": "u1",
                       "label": "$1.00", "weight": 5.2, "type": "p2p", "isFraud": true}]
        }"#;
        let data = NetworkData::from_json(json).unwrap();
        assert_eq!(data.nodes[0].kind.as_deref(), Some("user"));
        assert_eq!(data.edges[0].is_fraud, Some(true));
        assert_eq!(data.edges[0].kind.as_deref(), Some("p2p"));

        let out = data.to_json().unwrap();
        assert!(out.contains("\"isFraud\":true"));
        assert!(out.contains("\"type\":\"p2p\""));
    }
}
