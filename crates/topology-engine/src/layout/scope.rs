use std::collections::{HashMap, HashSet};
use topology_core::{NodeId, NodeKind, Point, Size};

use super::{LayoutEdge, LayoutInput, LayoutNode, Placement, LABEL_OFFSET};
use crate::error::{LayoutError, Result};

/// The independent sub-problems of one layout pass: the top level plus one
/// scope per group. Labels belong to no scope.
pub struct Scopes<'a> {
    pub top: Vec<&'a LayoutNode>,
    children: HashMap<&'a NodeId, Vec<&'a LayoutNode>>,
    /// Deepest groups first, so a group's size is known before its parent
    /// scope is laid out.
    pub groups: Vec<&'a LayoutNode>,
    parent: HashMap<&'a NodeId, &'a NodeId>,
}

impl<'a> Scopes<'a> {
    pub fn partition(input: &'a LayoutInput) -> Self {
        let group_ids: HashSet<&NodeId> = input
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Group)
            .map(|n| &n.id)
            .collect();

        let mut parent: HashMap<&NodeId, &NodeId> = HashMap::new();
        for n in &input.nodes {
            if let Some(p) = n.parent.as_ref() {
                if group_ids.contains(p) && p != &n.id {
                    parent.insert(&n.id, p);
                }
            }
        }
        break_cycles(&mut parent);

        let mut top = Vec::new();
        let mut children: HashMap<&NodeId, Vec<&LayoutNode>> = HashMap::new();
        for n in input.nodes.iter().filter(|n| n.kind != NodeKind::Label) {
            match parent.get(&n.id) {
                Some(p) => children.entry(*p).or_default().push(n),
                None => top.push(n),
            }
        }

        let mut groups: Vec<&LayoutNode> = input
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Group)
            .collect();
        let depth = |id: &NodeId| {
            let mut d = 0usize;
            let mut cur = parent.get(id);
            while let Some(p) = cur {
                d += 1;
                cur = parent.get(*p);
            }
            d
        };
        groups.sort_by_cached_key(|g| std::cmp::Reverse(depth(&g.id)));

        Self {
            top,
            children,
            groups,
            parent,
        }
    }

    pub fn children(&self, group: &NodeId) -> &[&'a LayoutNode] {
        self.children.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The group a node effectively belongs to, after dropping orphaned and
    /// cyclic references.
    pub fn parent_of(&self, id: &NodeId) -> Option<&'a NodeId> {
        self.parent.get(id).copied()
    }

    /// Walks up to the node's top-level container (or the node itself).
    pub fn top_level_of(&self, id: &'a NodeId) -> &'a NodeId {
        let mut cur = id;
        while let Some(p) = self.parent.get(cur) {
            cur = *p;
        }
        cur
    }
}

fn break_cycles(parent: &mut HashMap<&NodeId, &NodeId>) {
    let cyclic: Vec<&NodeId> = parent
        .keys()
        .copied()
        .filter(|start| {
            let mut seen: HashSet<&NodeId> = HashSet::new();
            let mut cur = parent.get(*start);
            while let Some(p) = cur {
                if p == start {
                    return true;
                }
                if !seen.insert(*p) {
                    return false;
                }
                cur = parent.get(*p);
            }
            false
        })
        .collect();
    for id in cyclic {
        parent.remove(id);
    }
}

/// Rejects sizes no strategy can place.
pub fn validate_sizes(input: &LayoutInput) -> Result<()> {
    for n in &input.nodes {
        if let Some(size) = n.size {
            if !size.is_finite() {
                return Err(LayoutError::Degenerate { id: n.id.clone() });
            }
        }
    }
    if !input.default_size.is_finite() {
        let id = input
            .nodes
            .first()
            .map(|n| n.id.clone())
            .unwrap_or_else(|| NodeId::new("<default>"));
        return Err(LayoutError::Degenerate { id });
    }
    Ok(())
}

/// Smallest box a group may have: one default node plus padding.
pub fn empty_group_size(input: &LayoutInput) -> Size {
    Size::new(
        input.default_size.width + 2.0 * input.group_padding,
        input.default_size.height + 2.0 * input.group_padding,
    )
}

/// Far corner of a set of placed boxes.
pub fn far_corner(items: impl IntoIterator<Item = (Point, Size)>) -> Option<Point> {
    items.into_iter().fold(None, |acc, (p, s)| {
        let right = p.x + s.width;
        let bottom = p.y + s.height;
        Some(match acc {
            None => Point::new(right, bottom),
            Some(c) => Point::new(c.x.max(right), c.y.max(bottom)),
        })
    })
}

/// Edges whose endpoints both sit in `members`, as index pairs. Self loops
/// are skipped.
pub fn scope_edges(members: &[&LayoutNode], edges: &[LayoutEdge]) -> Vec<(usize, usize)> {
    let index: HashMap<&NodeId, usize> = members
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .collect();
    edges
        .iter()
        .filter_map(|e| {
            let s = *index.get(&e.source)?;
            let t = *index.get(&e.target)?;
            (s != t).then_some((s, t))
        })
        .collect()
}

/// Pins every parented label to its group's corner. Labels without a group
/// in this input are left where they are.
pub fn pin_labels(input: &LayoutInput, placement: &mut Placement) {
    let groups: HashSet<&NodeId> = input
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Group)
        .map(|n| &n.id)
        .collect();
    for n in input.nodes.iter().filter(|n| n.kind == NodeKind::Label) {
        if n.parent.as_ref().is_some_and(|p| groups.contains(p)) {
            placement.positions.insert(n.id.clone(), LABEL_OFFSET);
        }
    }
}
