//! Core graph entities: accounts/merchants and the money movements between them.
//!
//! Nodes and edges are created only by ingestion (see [`crate::validator`]) and
//! are immutable afterwards. Open-ended per-record data from the wire is split
//! into typed known fields plus a bounded side-table of scalar extras.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum number of extra scalar attributes kept per node or edge.
pub const MAX_EXTRA_ATTRIBUTES: usize = 32;

/// Kind of account a node represents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Merchant,
    User,
    /// No type was supplied
    Unspecified,
    /// Any other caller-defined kind
    Other(String),
}

impl NodeKind {
    /// Parse the wire `type` field. Matching is case-insensitive.
    pub fn from_type(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => NodeKind::Unspecified,
            Some(s) if s.eq_ignore_ascii_case("merchant") => NodeKind::Merchant,
            Some(s) if s.eq_ignore_ascii_case("user") => NodeKind::User,
            Some(s) if s.eq_ignore_ascii_case("default") => NodeKind::Unspecified,
            Some(s) => NodeKind::Other(s.to_string()),
        }
    }

    /// Name used in histograms and on the wire
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Merchant => "merchant",
            NodeKind::User => "user",
            NodeKind::Unspecified => "default",
            NodeKind::Other(name) => name,
        }
    }

    /// Wire `type` value; `None` for [`NodeKind::Unspecified`]
    pub fn wire_type(&self) -> Option<String> {
        match self {
            NodeKind::Unspecified => None,
            other => Some(other.as_str().to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        NodeKind::from_type(Some(&value))
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of money movement an edge represents
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    /// Card or account payment to a merchant
    Transaction,
    /// Peer-to-peer transfer between users
    PeerToPeer,
    Other(String),
}

impl EdgeKind {
    /// Parse the wire `type` field. A missing type means a plain transaction.
    pub fn from_type(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => EdgeKind::Transaction,
            Some(s) if s.eq_ignore_ascii_case("transaction") => EdgeKind::Transaction,
            Some(s)
                if s.eq_ignore_ascii_case("p2p")
                    || s.eq_ignore_ascii_case("peer_to_peer")
                    || s.eq_ignore_ascii_case("peertopeer") =>
            {
                EdgeKind::PeerToPeer
            }
            Some(s) => EdgeKind::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EdgeKind::Transaction => "transaction",
            EdgeKind::PeerToPeer => "p2p",
            EdgeKind::Other(name) => name,
        }
    }
}

impl From<String> for EdgeKind {
    fn from(value: String) -> Self {
        EdgeKind::from_type(Some(&value))
    }
}

impl From<EdgeKind> for String {
    fn from(kind: EdgeKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Scalar attribute value kept in the side-table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Why an attribute was not kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Null, array or object value
    NotScalar,
    /// A known field carried a value of the wrong type
    WrongType,
    /// The side-table was already full
    SideTableFull,
}

/// Bounded side-table of extra scalar attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraAttributes(BTreeMap<String, Scalar>);

impl ExtraAttributes {
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn insert(&mut self, key: String, value: &Value) -> Result<(), DropReason> {
        let scalar = Scalar::from_json(value).ok_or(DropReason::NotScalar)?;
        if self.0.len() >= MAX_EXTRA_ATTRIBUTES && !self.0.contains_key(&key) {
            return Err(DropReason::SideTableFull);
        }
        self.0.insert(key, scalar);
        Ok(())
    }

    fn write_into(&self, map: &mut Map<String, Value>) {
        for (key, value) in &self.0 {
            map.insert(key.clone(), value.to_json());
        }
    }
}

/// Typed node attributes with a side-table for anything else
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Trust/risk score shown by the dashboard (`value` on the wire)
    pub score: Option<f64>,
    pub category: Option<String>,
    pub status: Option<String>,
    /// Account age in days
    pub account_age_days: Option<u64>,
    pub transaction_count: Option<u64>,
    pub transaction_volume: Option<f64>,
    pub extra: ExtraAttributes,
}

impl NodeAttributes {
    /// Split a wire `data` object into typed fields and extras.
    ///
    /// Returns the attributes plus every key that was dropped and why.
    pub fn from_json_map(map: &Map<String, Value>) -> (Self, Vec<(String, DropReason)>) {
        let mut attrs = NodeAttributes::default();
        let mut dropped = Vec::new();

        for (key, value) in map {
            let outcome = match key.as_str() {
                "value" | "score" => value
                    .as_f64()
                    .map(|v| attrs.score = Some(v))
                    .ok_or(DropReason::WrongType),
                "category" => value
                    .as_str()
                    .map(|v| attrs.category = Some(v.to_string()))
                    .ok_or(DropReason::WrongType),
                "status" => value
                    .as_str()
                    .map(|v| attrs.status = Some(v.to_string()))
                    .ok_or(DropReason::WrongType),
                "accountAge" => value
                    .as_u64()
                    .map(|v| attrs.account_age_days = Some(v))
                    .ok_or(DropReason::WrongType),
                "transactionCount" => value
                    .as_u64()
                    .map(|v| attrs.transaction_count = Some(v))
                    .ok_or(DropReason::WrongType),
                "transactionVolume" => value
                    .as_f64()
                    .map(|v| attrs.transaction_volume = Some(v))
                    .ok_or(DropReason::WrongType),
                _ => attrs.extra.insert(key.clone(), value),
            };
            if let Err(reason) = outcome {
                dropped.push((key.clone(), reason));
            }
        }

        (attrs, dropped)
    }

    /// Render back to the wire `data` object
    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(score) = self.score {
            insert_f64(&mut map, "value", score);
        }
        if let Some(ref category) = self.category {
            map.insert("category".to_string(), Value::String(category.clone()));
        }
        if let Some(ref status) = self.status {
            map.insert("status".to_string(), Value::String(status.clone()));
        }
        if let Some(age) = self.account_age_days {
            map.insert("accountAge".to_string(), Value::from(age));
        }
        if let Some(count) = self.transaction_count {
            map.insert("transactionCount".to_string(), Value::from(count));
        }
        if let Some(volume) = self.transaction_volume {
            insert_f64(&mut map, "transactionVolume", volume);
        }
        self.extra.write_into(&mut map);
        map
    }
}

/// Edge attributes: everything is an extra
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    pub extra: ExtraAttributes,
}

impl EdgeAttributes {
    /// `amount` is consumed by ingestion and never lands in the side-table.
    pub fn from_json_map(map: &Map<String, Value>) -> (Self, Vec<(String, DropReason)>) {
        let mut attrs = EdgeAttributes::default();
        let mut dropped = Vec::new();
        for (key, value) in map.iter().filter(|(k, _)| k.as_str() != "amount") {
            if let Err(reason) = attrs.extra.insert(key.clone(), value) {
                dropped.push((key.clone(), reason));
            }
        }
        (attrs, dropped)
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        self.extra.write_into(&mut map);
        map
    }
}

fn insert_f64(map: &mut Map<String, Value>, key: &str, value: f64) {
    if let Some(n) = serde_json::Number::from_f64(value) {
        map.insert(key.to_string(), Value::Number(n));
    }
}

/// Account or merchant in the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub attributes: NodeAttributes,
}

/// Directed money movement between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Display label, kept verbatim
    pub label: Option<String>,
    /// Non-negative money value
    pub amount: f64,
    /// Derived risk/strength score
    pub weight: f64,
    pub kind: EdgeKind,
    /// Ground-truth fraud label; `None` when unknown
    pub is_fraud: Option<bool>,
    pub attributes: EdgeAttributes,
}

impl Edge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    /// True only for an explicit `isFraud = true` label
    pub fn is_labeled_fraud(&self) -> bool {
        self.is_fraud == Some(true)
    }
}
