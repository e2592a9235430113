use bevy::prelude::Resource;
use std::collections::BTreeSet;
use topology_core::{NodeId, Record, Size};

use crate::graph::builder::build_graph;
use crate::graph::model::{EdgeData, NodeData, TopologyGraph};
use crate::graph::neighborhood::filter_records;
use crate::graph::reconcile::{Reconciler, Reconciliation, TickOutcome};
use crate::layout::{LayoutKind, Strategy};
use crate::util::config::EngineConfig;
use crate::view::ViewContext;

/// Everything the host needs between frames: the latest records, the view,
/// the active strategy and the rendered graph.
#[derive(Resource)]
pub struct TopologyState {
    records: Vec<Record>,
    view: ViewContext,
    config: EngineConfig,
    strategy: Strategy,
    reconciler: Reconciler<NodeData, EdgeData>,
    dirty: bool,
}

impl Default for TopologyState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TopologyState {
    pub fn new(config: EngineConfig) -> Self {
        let kind = config.layout_type;
        Self {
            records: Vec::new(),
            view: ViewContext::new(kind),
            strategy: Strategy::new(kind, &config),
            reconciler: Reconciler::new(config.default_node_size, config.group_padding),
            config,
            dirty: true,
        }
    }

    pub fn graph(&self) -> &TopologyGraph {
        self.reconciler.graph()
    }

    pub fn view(&self) -> &ViewContext {
        &self.view
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler<NodeData, EdgeData> {
        &self.reconciler
    }

    /// Replaces the record snapshot. The graph is rebuilt on the next
    /// [`rebuild`](Self::rebuild).
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.dirty = true;
    }

    pub fn select(&mut self, selected: Option<NodeId>) {
        if self.view.selected() != selected.as_ref() {
            self.view = self.view.with_selected(selected);
            self.dirty = true;
        }
    }

    pub fn set_explore(&mut self, explore: BTreeSet<NodeId>) {
        if self.view.explore() != &explore {
            self.view = self.view.with_explore(explore);
            self.dirty = true;
        }
    }

    /// Switches strategy and lays the current graph out again.
    pub fn set_layout_kind(&mut self, kind: LayoutKind) {
        if self.view.layout() == kind {
            return;
        }
        tracing::info!(from = %self.view.layout(), to = %kind, "layout type changed");
        self.view = self.view.with_layout(kind);
        self.config.layout_type = kind;
        self.strategy = Strategy::new(kind, &self.config);
        self.reconciler.invalidate();
    }

    /// Takes a new configuration. Strategy tunables apply to the next pass,
    /// which is started right away.
    pub fn apply_config(&mut self, config: EngineConfig) {
        let config = config.sanitized();
        self.view = self.view.with_layout(config.layout_type);
        self.strategy = Strategy::new(config.layout_type, &config);
        self.reconciler
            .set_layout_defaults(config.default_node_size, config.group_padding);
        self.config = config;
        self.reconciler.invalidate();
    }

    pub fn record_measurement(&mut self, id: &NodeId, size: Size) -> bool {
        self.reconciler.record_measurement(id, size)
    }

    /// Filters and rebuilds the graph if records or view changed since the
    /// last call.
    pub fn rebuild(&mut self) -> Option<Reconciliation> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        let visible = filter_records(&self.records, &self.view);
        let graph = build_graph(&visible);
        Some(self.reconciler.reconcile(graph))
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.reconciler.tick(&self.strategy)
    }

    pub fn take_fit_request(&mut self) -> bool {
        self.reconciler.take_fit_request()
    }
}
