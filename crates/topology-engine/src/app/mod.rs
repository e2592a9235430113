use bevy::prelude::*;

use crate::graph::{TickOutcome, TopologyState};
use crate::util::config::{self, EngineConfig};

pub mod events;
pub mod resources;

pub use events::{ExploreChanged, FitViewRequested, LayoutKindChanged, NodeMeasured, SelectionChanged};
pub use resources::RecordFeed;

/// Headless host integration: owns [`TopologyState`] and drives rebuilds and
/// layout from the frame loop. Rendering is up to the embedding app.
#[derive(Default)]
pub struct TopologyPlugin {
    config: Option<EngineConfig>,
}

impl TopologyPlugin {
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: Some(config),
        }
    }
}

impl Plugin for TopologyPlugin {
    fn build(&self, app: &mut App) {
        let cfg = self
            .config
            .clone()
            .map(EngineConfig::sanitized)
            .unwrap_or_else(config::load_or_default);
        app.add_event::<SelectionChanged>()
            .add_event::<ExploreChanged>()
            .add_event::<LayoutKindChanged>()
            .add_event::<NodeMeasured>()
            .add_event::<FitViewRequested>()
            .insert_resource(TopologyState::new(cfg))
            .add_systems(
                Update,
                (
                    pump_records,
                    apply_view_events,
                    rebuild_graph,
                    apply_measurements,
                    drive_layout,
                )
                    .chain(),
            );
    }
}

fn pump_records(mut st: ResMut<TopologyState>, feed: Option<Res<RecordFeed>>) {
    let Some(feed) = feed else {
        return;
    };
    if let Some(latest) = feed.0.try_iter().last() {
        st.set_records(latest);
    }
}

fn apply_view_events(
    mut st: ResMut<TopologyState>,
    mut selections: EventReader<SelectionChanged>,
    mut explore: EventReader<ExploreChanged>,
    mut kinds: EventReader<LayoutKindChanged>,
) {
    for ev in selections.read() {
        st.select(ev.0.clone());
    }
    for ev in explore.read() {
        st.set_explore(ev.0.clone());
    }
    for ev in kinds.read() {
        st.set_layout_kind(ev.0);
    }
}

fn rebuild_graph(mut st: ResMut<TopologyState>) {
    st.rebuild();
}

fn apply_measurements(mut st: ResMut<TopologyState>, mut measured: EventReader<NodeMeasured>) {
    for ev in measured.read() {
        st.record_measurement(&ev.id, ev.size);
    }
}

fn drive_layout(mut st: ResMut<TopologyState>, mut fit: EventWriter<FitViewRequested>) {
    if let TickOutcome::Kept = st.tick() {
        tracing::debug!("layout kept previous positions");
    }
    if st.take_fit_request() {
        fit.send(FitViewRequested);
    }
}
