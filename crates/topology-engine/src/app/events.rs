use bevy::prelude::Event;
use std::collections::BTreeSet;
use topology_core::{NodeId, Size};

use crate::layout::LayoutKind;

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct SelectionChanged(pub Option<NodeId>);

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct ExploreChanged(pub BTreeSet<NodeId>);

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutKindChanged(pub LayoutKind);

/// Reported by the renderer once a node has a real size on screen.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct NodeMeasured {
    pub id: NodeId,
    pub size: Size,
}

/// Sent once after every finished layout pass.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitViewRequested;
