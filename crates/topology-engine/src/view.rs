use std::collections::BTreeSet;
use topology_core::NodeId;

use crate::layout::LayoutKind;

/// Immutable snapshot of what the user is looking at. Changes produce a new
/// value; filtering and layout read it, never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewContext {
    selected: Option<NodeId>,
    explore: BTreeSet<NodeId>,
    layout: LayoutKind,
}

impl ViewContext {
    pub fn new(layout: LayoutKind) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    /// Ids forced visible even when their record is hidden by default.
    pub fn explore(&self) -> &BTreeSet<NodeId> {
        &self.explore
    }

    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    pub fn with_selected(&self, selected: Option<NodeId>) -> Self {
        Self {
            selected,
            ..self.clone()
        }
    }

    pub fn with_explore(&self, explore: BTreeSet<NodeId>) -> Self {
        Self {
            explore,
            ..self.clone()
        }
    }

    pub fn with_layout(&self, layout: LayoutKind) -> Self {
        Self {
            layout,
            ..self.clone()
        }
    }
}
