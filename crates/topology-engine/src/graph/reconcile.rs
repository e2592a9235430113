use futures_util::task::noop_waker_ref;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::task::{Context, Poll};
use topology_core::{NodeId, Point, Size};

use crate::graph::model::{Graph, Node, NodeStyle};
use crate::layout::{LayoutInput, LayoutOutcome, LayoutStrategy, LayoutTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutPhase {
    /// Positions are placeholders; the next tick lays the graph out.
    #[default]
    Unlayouted,
    Layouted,
}

/// What a rebuild changed, as far as layout is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The node id set differs: positions are reset and layout runs again.
    Structural,
    /// Same nodes, new values: on-screen positions are kept.
    ValueOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do.
    Idle,
    /// Waiting for the renderer to measure these elements.
    Deferred { unmeasured: usize },
    /// A pass is in flight and needs more ticks.
    Pending,
    /// A placement was applied.
    Applied,
    /// The strategy gave up; the graph keeps its current positions.
    Kept,
}

/// Owns the rendered graph and decides when it gets laid out.
pub struct Reconciler<D, E> {
    graph: Graph<D, E>,
    phase: LayoutPhase,
    generation: u64,
    in_flight: Option<LayoutTask>,
    fit_pending: bool,
    default_size: Size,
    group_padding: f64,
}

impl<D, E> Reconciler<D, E> {
    pub fn new(default_size: Size, group_padding: f64) -> Self {
        Self {
            graph: Graph::default(),
            phase: LayoutPhase::Unlayouted,
            generation: 0,
            in_flight: None,
            fit_pending: false,
            default_size,
            group_padding,
        }
    }

    pub fn graph(&self) -> &Graph<D, E> {
        &self.graph
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    /// Bumped whenever pending layout work is thrown away.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Settings that only matter for passes started after this call.
    pub fn set_layout_defaults(&mut self, default_size: Size, group_padding: f64) {
        self.default_size = default_size;
        self.group_padding = group_padding;
    }

    /// Swaps in a freshly built graph.
    pub fn reconcile(&mut self, mut next: Graph<D, E>) -> Reconciliation {
        let structural = next.node_ids() != self.graph.node_ids();

        let previous: HashMap<&NodeId, (Option<Size>, Point, NodeStyle)> = self
            .graph
            .nodes
            .iter()
            .map(|n| (&n.id, (n.measured, n.position, n.style)))
            .collect();

        for node in next.nodes.iter_mut() {
            let Some((measured, position, style)) = previous.get(&node.id) else {
                continue;
            };
            if node.measured.is_none() {
                node.measured = *measured;
            }
            if structural {
                node.position = Point::ZERO;
                node.style = NodeStyle::default();
            } else {
                node.position = *position;
                node.style = *style;
            }
        }

        let decision = if structural {
            if self.in_flight.take().is_some() {
                tracing::debug!(generation = self.generation, "superseding in-flight layout");
            }
            self.generation += 1;
            self.phase = LayoutPhase::Unlayouted;
            Reconciliation::Structural
        } else {
            Reconciliation::ValueOnly
        };

        tracing::debug!(
            ?decision,
            nodes = next.nodes.len(),
            edges = next.edges.len(),
            generation = self.generation,
            "graph reconciled"
        );
        self.graph = next;
        if decision == Reconciliation::ValueOnly {
            self.regrow_groups();
        }
        decision
    }

    /// Records a renderer measurement. Returns false for unknown ids or
    /// when nothing changed.
    pub fn record_measurement(&mut self, id: &NodeId, size: Size) -> bool {
        match self.graph.node_mut(id) {
            Some(node) if node.measured != Some(size) => {
                node.measured = Some(size);
            }
            _ => return false,
        }
        self.regrow_groups();
        true
    }

    /// Moves a node without triggering layout, e.g. after a drag. Groups
    /// grow to keep holding the node.
    pub fn set_position(&mut self, id: &NodeId, position: Point) -> bool {
        let Some(node) = self.graph.node_mut(id) else {
            return false;
        };
        node.position = position;
        self.regrow_groups();
        true
    }

    /// Forces a fresh layout of the current graph.
    pub fn invalidate(&mut self) {
        self.in_flight = None;
        self.generation += 1;
        self.phase = LayoutPhase::Unlayouted;
    }

    /// True exactly once after each finished pass.
    pub fn take_fit_request(&mut self) -> bool {
        std::mem::take(&mut self.fit_pending)
    }

    /// Advances layout by at most one poll. Never blocks.
    pub fn tick<S: LayoutStrategy + ?Sized>(&mut self, strategy: &S) -> TickOutcome {
        if self.in_flight.is_none() {
            if self.phase == LayoutPhase::Layouted {
                return TickOutcome::Idle;
            }
            let unmeasured = self.graph.unmeasured_elements();
            if unmeasured > 0 {
                tracing::debug!(unmeasured, "layout deferred until nodes are measured");
                return TickOutcome::Deferred { unmeasured };
            }
            let input = LayoutInput::from_graph(&self.graph, self.default_size, self.group_padding);
            tracing::debug!(
                strategy = strategy.kind().as_str(),
                generation = self.generation,
                "starting layout pass"
            );
            self.in_flight = Some(strategy.run(input));
        }

        let Some(task) = self.in_flight.as_mut() else {
            return TickOutcome::Idle;
        };
        let mut cx = Context::from_waker(noop_waker_ref());
        let outcome = match task.poll_unpin(&mut cx) {
            Poll::Pending => return TickOutcome::Pending,
            Poll::Ready(outcome) => outcome,
        };
        self.in_flight = None;
        self.phase = LayoutPhase::Layouted;
        self.fit_pending = true;

        match outcome {
            LayoutOutcome::Placed(placement) => {
                placement.apply(&mut self.graph);
                self.regrow_groups();
                TickOutcome::Applied
            }
            LayoutOutcome::Unchanged { .. } => TickOutcome::Kept,
        }
    }

    fn regrow_groups(&mut self) {
        let grown = self.enforce_group_bounds();
        if grown > 0 {
            tracing::debug!(grown, "groups grown to fit their children");
        }
    }

    /// Grows every group whose size hint cannot hold its children plus
    /// padding. Nested groups are handled before their parents. Returns the
    /// number of groups that grew.
    pub fn enforce_group_bounds(&mut self) -> usize {
        let parent: HashMap<NodeId, NodeId> = self
            .graph
            .nodes
            .iter()
            .filter_map(|n| Some((n.id.clone(), n.parent.clone()?)))
            .collect();
        let depth = |id: &NodeId| {
            let mut d = 0usize;
            let mut cur = parent.get(id);
            while let Some(p) = cur {
                d += 1;
                if d > parent.len() {
                    break;
                }
                cur = parent.get(p);
            }
            d
        };
        let mut groups: Vec<(usize, NodeId)> = self
            .graph
            .nodes
            .iter()
            .filter(|n| n.is_group())
            .map(|n| (depth(&n.id), n.id.clone()))
            .collect();
        groups.sort_by(|a, b| b.0.cmp(&a.0));

        let mut grown = 0;
        for (_, id) in groups {
            let need = self
                .graph
                .children_of(&id)
                .map(|c| {
                    let size = outer_size(c).unwrap_or(self.default_size);
                    (c.position.x + size.width, c.position.y + size.height)
                })
                .fold(None, |acc: Option<(f64, f64)>, (r, b)| {
                    Some(acc.map_or((r, b), |(ar, ab)| (ar.max(r), ab.max(b))))
                });
            let Some((right, bottom)) = need else {
                continue;
            };
            let want = Size::new(right + self.group_padding, bottom + self.group_padding);
            let Some(group) = self.graph.node_mut(&id) else {
                continue;
            };
            let have = group.style.size().unwrap_or_default();
            if want.width > have.width || want.height > have.height {
                group.style = NodeStyle::sized(Size::new(
                    have.width.max(want.width),
                    have.height.max(want.height),
                ));
                grown += 1;
            }
        }
        grown
    }
}

/// Box a node occupies inside its parent. Groups are as large as layout
/// made them, whatever the renderer measured.
fn outer_size<D>(node: &Node<D>) -> Option<Size> {
    if node.is_group() {
        node.style.size().or(node.measured)
    } else {
        node.size()
    }
}
