use serde::Serialize;
use std::collections::HashSet;
use topology_core::{NodeId, NodeKind, Point, Size};

/// Size hints handed to the renderer. Layout writes these for groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NodeStyle {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl NodeStyle {
    pub fn sized(size: Size) -> Self {
        Self {
            width: Some(size.width),
            height: Some(size.height),
        }
    }

    pub fn size(&self) -> Option<Size> {
        Some(Size::new(self.width?, self.height?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node<D> {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// Filled in once the renderer has drawn the node.
    pub measured: Option<Size>,
    /// Relative to the parent group when `parent` is set.
    pub position: Point,
    pub style: NodeStyle,
    pub data: D,
}

impl<D> Node<D> {
    pub fn new(id: NodeId, kind: NodeKind, data: D) -> Self {
        Self {
            id,
            kind,
            parent: None,
            measured: None,
            position: Point::ZERO,
            style: NodeStyle::default(),
            data,
        }
    }

    pub fn with_parent(mut self, parent: Option<NodeId>) -> Self {
        self.parent = parent;
        self
    }

    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn is_label(&self) -> bool {
        self.kind == NodeKind::Label
    }

    /// Measured size, else whatever size hint layout left on the style.
    pub fn size(&self) -> Option<Size> {
        self.measured.or_else(|| self.style.size())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<E> {
    pub id: NodeId,
    pub source: NodeId,
    pub target: NodeId,
    pub data: E,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph<D, E> {
    pub nodes: Vec<Node<D>>,
    pub edges: Vec<Edge<E>>,
}

impl<D, E> Default for Graph<D, E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<D, E> Graph<D, E> {
    pub fn node(&self, id: &NodeId) -> Option<&Node<D>> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node<D>> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    pub fn node_ids(&self) -> HashSet<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn edge_ids(&self) -> HashSet<NodeId> {
        self.edges.iter().map(|e| e.id.clone()).collect()
    }

    /// Element nodes the renderer has not measured yet.
    pub fn unmeasured_elements(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Element && n.measured.is_none())
            .count()
    }

    pub fn children_of<'a>(&'a self, group: &'a NodeId) -> impl Iterator<Item = &'a Node<D>> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent.as_ref() == Some(group))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Display payload the builder attaches to nodes. Never read by layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeData {
    pub title: String,
    pub fields: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeData {
    pub source_title: String,
    pub target_title: String,
    pub fields: serde_json::Value,
}

pub type TopologyGraph = Graph<NodeData, EdgeData>;
