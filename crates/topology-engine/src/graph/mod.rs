pub mod builder;
pub mod model;
pub mod neighborhood;
pub mod reconcile;
pub mod state;

pub use builder::build_graph;
pub use model::{Edge, EdgeData, Graph, Node, NodeData, NodeStyle, TopologyGraph};
pub use neighborhood::filter_records;
pub use reconcile::{LayoutPhase, Reconciler, Reconciliation, TickOutcome};
pub use state::TopologyState;
