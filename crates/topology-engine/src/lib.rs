//! Topology layout engine: builds a typed node/edge graph from flat records,
//! filters it to a selection's neighborhood, reconciles rebuilt graphs
//! against what is on screen and lays it out with one of three strategies.

pub mod app;
pub mod error;
pub mod graph;
pub mod layout;
pub mod util;
pub mod view;

pub use app::{
    ExploreChanged, FitViewRequested, LayoutKindChanged, NodeMeasured, RecordFeed,
    SelectionChanged, TopologyPlugin,
};
pub use error::{LayoutError, Result};
pub use graph::{
    build_graph, filter_records, EdgeData, Graph, LayoutPhase, NodeData, Reconciler,
    Reconciliation, TickOutcome, TopologyGraph, TopologyState,
};
pub use layout::{LayoutKind, LayoutOutcome, LayoutStrategy, Strategy};
pub use util::config::EngineConfig;
pub use view::ViewContext;
