//! Layout strategies.
//!
//! Strategies only ever see a payload-free [`LayoutInput`]: ids, kinds,
//! containment and sizes. They answer with a [`LayoutOutcome`] that the
//! reconciler applies by id, so nodes a strategy did not place keep their
//! current position.

pub mod force;
pub mod grid;
pub mod scope;
pub mod tree;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use topology_core::{NodeId, NodeKind, Point, Size};

use crate::error::{LayoutError, Result};
use crate::graph::model::{Graph, NodeStyle};
use crate::util::config::EngineConfig;

pub use force::ForceLayout;
pub use grid::GridLayout;
pub use tree::TreeLayout;

/// Where a group's label sits, relative to the group's top-left corner.
pub const LABEL_OFFSET: Point = Point { x: 12.0, y: 8.0 };

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Force,
    Grid,
    Tree,
}

impl LayoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Grid => "grid",
            Self::Tree => "tree",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "force" => Ok(Self::Force),
            "grid" => Ok(Self::Grid),
            "tree" => Ok(Self::Tree),
            _ => Err(LayoutError::UnknownKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    /// `None` until the renderer measured the node (groups are sized by layout).
    pub size: Option<Size>,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEdge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutInput {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub default_size: Size,
    pub group_padding: f64,
}

impl LayoutInput {
    pub fn from_graph<D, E>(graph: &Graph<D, E>, default_size: Size, group_padding: f64) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|n| LayoutNode {
                id: n.id.clone(),
                kind: n.kind,
                parent: n.parent.clone(),
                size: if n.is_group() { None } else { n.measured },
                position: n.position,
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|e| LayoutEdge {
                source: e.source.clone(),
                target: e.target.clone(),
            })
            .collect();
        Self {
            nodes,
            edges,
            default_size,
            group_padding,
        }
    }

    pub(crate) fn size_of(&self, node: &LayoutNode) -> Size {
        node.size.unwrap_or(self.default_size)
    }
}

/// Positions (and group sizes) a strategy settled on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub positions: HashMap<NodeId, Point>,
    pub sizes: HashMap<NodeId, Size>,
}

impl Placement {
    pub fn apply<D, E>(&self, graph: &mut Graph<D, E>) {
        for node in graph.nodes.iter_mut() {
            if let Some(p) = self.positions.get(&node.id) {
                node.position = *p;
            }
            if let Some(s) = self.sizes.get(&node.id) {
                node.style = NodeStyle::sized(*s);
            }
        }
    }

    fn check_finite(&self) -> Result<()> {
        let bad = self
            .positions
            .iter()
            .find(|(_, p)| !p.x.is_finite() || !p.y.is_finite())
            .map(|(id, _)| id.clone())
            .or_else(|| {
                self.sizes
                    .iter()
                    .find(|(_, s)| !s.is_finite())
                    .map(|(id, _)| id.clone())
            });
        match bad {
            Some(id) => Err(LayoutError::NonFinite { id }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    Placed(Placement),
    /// The strategy gave up; the caller keeps the input as it was.
    Unchanged { reason: String },
}

/// One in-flight layout pass. Polled by the reconciler from the host's
/// frame loop; never awaited on a runtime.
pub type LayoutTask = Pin<Box<dyn Future<Output = LayoutOutcome> + Send + Sync + 'static>>;

pub trait LayoutStrategy {
    fn kind(&self) -> LayoutKind;
    fn run(&self, input: LayoutInput) -> LayoutTask;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Force(ForceLayout),
    Grid(GridLayout),
    Tree(TreeLayout),
}

impl Strategy {
    pub fn new(kind: LayoutKind, cfg: &EngineConfig) -> Self {
        match kind {
            LayoutKind::Force => Self::Force(ForceLayout::new(cfg.force.clone())),
            LayoutKind::Grid => Self::Grid(GridLayout::new(cfg.grid.clone())),
            LayoutKind::Tree => Self::Tree(TreeLayout::new(cfg.tree.clone())),
        }
    }
}

impl LayoutStrategy for Strategy {
    fn kind(&self) -> LayoutKind {
        match self {
            Self::Force(s) => s.kind(),
            Self::Grid(s) => s.kind(),
            Self::Tree(s) => s.kind(),
        }
    }

    fn run(&self, input: LayoutInput) -> LayoutTask {
        match self {
            Self::Force(s) => s.run(input),
            Self::Grid(s) => s.run(input),
            Self::Tree(s) => s.run(input),
        }
    }
}

/// Strategy boundary: failures become `Unchanged` and are logged, never
/// propagated to the host.
pub(crate) fn settle(kind: LayoutKind, nodes: usize, result: Result<Placement>) -> LayoutOutcome {
    match result.and_then(|p| p.check_finite().map(|_| p)) {
        Ok(placement) => {
            tracing::info!(
                strategy = kind.as_str(),
                nodes,
                placed = placement.positions.len(),
                "layout pass complete"
            );
            LayoutOutcome::Placed(placement)
        }
        Err(err) => {
            tracing::warn!(
                strategy = kind.as_str(),
                nodes,
                error = %err,
                "layout failed; keeping input positions"
            );
            LayoutOutcome::Unchanged {
                reason: err.to_string(),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::graph::model::Node;

    #[test]
    fn layout_kind_parses_and_prints() {
        for kind in [LayoutKind::Force, LayoutKind::Grid, LayoutKind::Tree] {
            assert_eq!(kind.as_str().parse::<LayoutKind>(), Ok(kind));
        }
        assert_eq!(
            "radial".parse::<LayoutKind>(),
            Err(LayoutError::UnknownKind("radial".to_string()))
        );
    }

    #[test]
    fn strategy_follows_configured_kind() {
        let cfg = EngineConfig::default();
        for kind in [LayoutKind::Force, LayoutKind::Grid, LayoutKind::Tree] {
            assert_eq!(Strategy::new(kind, &cfg).kind(), kind);
        }
    }

    #[test]
    fn placement_only_touches_listed_nodes() {
        let mut graph: Graph<(), ()> = Graph::default();
        graph.nodes.push(Node::new("a".into(), NodeKind::Element, ()));
        graph.nodes.push(Node::new("g".into(), NodeKind::Group, ()));
        let mut untouched = Node::new("b".into(), NodeKind::Element, ());
        untouched.position = Point::new(5.0, 6.0);
        graph.nodes.push(untouched);

        let mut placement = Placement::default();
        placement.positions.insert("a".into(), Point::new(1.0, 2.0));
        placement.sizes.insert("g".into(), Size::new(300.0, 200.0));
        placement.apply(&mut graph);

        assert_eq!(graph.nodes[0].position, Point::new(1.0, 2.0));
        assert_eq!(graph.nodes[1].style.size(), Some(Size::new(300.0, 200.0)));
        assert_eq!(graph.nodes[2].position, Point::new(5.0, 6.0));
    }

    #[test]
    fn non_finite_results_are_reported_unchanged() {
        let mut placement = Placement::default();
        placement.positions.insert("a".into(), Point::new(f64::NAN, 0.0));
        let outcome = settle(LayoutKind::Force, 1, Ok(placement));
        assert!(matches!(outcome, LayoutOutcome::Unchanged { .. }));
    }

    #[test]
    fn every_strategy_handles_an_empty_graph() {
        let cfg = EngineConfig::default();
        for kind in [LayoutKind::Force, LayoutKind::Grid, LayoutKind::Tree] {
            let (outcome, _) = drive(Strategy::new(kind, &cfg).run(input(vec![], vec![])));
            assert_eq!(placed(outcome), Placement::default());
        }
    }

    #[test]
    fn from_graph_strips_payloads_and_group_sizes() {
        let mut graph: Graph<String, u8> = Graph::default();
        let mut group = Node::new("g".into(), NodeKind::Group, "secret".to_string());
        group.style = NodeStyle::sized(Size::new(10.0, 10.0));
        graph.nodes.push(group);
        let mut el = Node::new("a".into(), NodeKind::Element, "payload".to_string())
            .with_parent(Some("g".into()));
        el.measured = Some(Size::new(50.0, 20.0));
        graph.nodes.push(el);

        let input = LayoutInput::from_graph(&graph, Size::new(1.0, 1.0), 8.0);
        assert_eq!(input.nodes[0].size, None);
        assert_eq!(input.nodes[1].size, Some(Size::new(50.0, 20.0)));
        assert_eq!(input.nodes[1].parent, Some("g".into()));
        assert_eq!(input.group_padding, 8.0);
    }
}
