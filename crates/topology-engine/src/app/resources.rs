use bevy::prelude::Resource;
use crossbeam_channel::Receiver;
use topology_core::Record;

/// Record snapshots pushed by whatever binds data to the view. Only the
/// newest snapshot per frame is used.
#[derive(Resource)]
pub struct RecordFeed(pub Receiver<Vec<Record>>);
