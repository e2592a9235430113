use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Id of the synthetic label node anchored to a group.
    pub fn label_for(group: &NodeId) -> Self {
        Self(format!("{}::label", group.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Element,
    Group,
    Label,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn is_finite(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 0.0 && self.height >= 0.0
    }
}

/// One upstream record, tagged by its `component` discriminant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "component", rename_all = "snake_case")]
pub enum Record {
    Element(ElementRecord),
    GroupComponent(GroupRecord),
    Connection(ConnectionRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementRecord {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub group: Option<NodeId>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub explorable: bool,
    #[serde(default)]
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupRecord {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub group: Option<NodeId>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionRecord {
    pub id: NodeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub fields: serde_json::Value,
}

impl Record {
    pub fn id(&self) -> &NodeId {
        match self {
            Record::Element(r) => &r.id,
            Record::GroupComponent(r) => &r.id,
            Record::Connection(r) => &r.id,
        }
    }

    /// Owning group, for records that can live inside one.
    pub fn group(&self) -> Option<&NodeId> {
        match self {
            Record::Element(r) => r.group.as_ref(),
            Record::GroupComponent(r) => r.group.as_ref(),
            Record::Connection(_) => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        match self {
            Record::Element(r) => r.hidden,
            Record::GroupComponent(r) => r.hidden,
            Record::Connection(_) => false,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Record::Element(r) => Some(r.title.as_str()),
            Record::GroupComponent(r) => Some(r.title.as_str()),
            Record::Connection(_) => None,
        }
    }

    /// Groups and explorable elements both become containers.
    pub fn is_container(&self) -> bool {
        match self {
            Record::GroupComponent(_) => true,
            Record::Element(r) => r.explorable,
            Record::Connection(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_decode_by_component_tag() {
        let raw = r#"[
            {"component": "group_component", "id": "g1", "title": "Payments"},
            {"component": "element", "id": "n1", "title": "api", "group": "g1"},
            {"component": "connection", "id": "e1", "from": "n1", "to": "n2"}
        ]"#;
        let records: Vec<Record> = serde_json::from_str(raw).expect("decode records");

        assert_eq!(records.len(), 3);
        assert!(records[0].is_container());
        assert_eq!(records[1].group(), Some(&NodeId::from("g1")));
        assert!(!records[1].is_hidden());
        match &records[2] {
            Record::Connection(c) => {
                assert_eq!(c.from.as_str(), "n1");
                assert_eq!(c.to.as_str(), "n2");
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[test]
    fn unknown_component_is_rejected() {
        let raw = r#"{"component": "dashboard", "id": "x"}"#;
        let decoded: Result<Record, _> = serde_json::from_str(raw);
        assert!(decoded.is_err());
    }

    #[test]
    fn label_ids_derive_from_group() {
        assert_eq!(NodeId::label_for(&NodeId::from("g1")).as_str(), "g1::label");
    }

    #[test]
    fn owned_and_borrowed_strings_make_the_same_id() {
        let owned: NodeId = format!("{}-{}", "a", "b").into();
        assert_eq!(owned, NodeId::from("a-b"));
    }
}
