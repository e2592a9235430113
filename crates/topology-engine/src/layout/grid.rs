use serde::{Deserialize, Serialize};
use topology_core::{NodeId, Point, Size};

use super::scope::{self, Scopes};
use super::{settle, LayoutInput, LayoutKind, LayoutNode, LayoutStrategy, LayoutTask, Placement};
use crate::error::{LayoutError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Gap between neighboring boxes, horizontally and vertically.
    pub spacing: f64,
    /// Target width / height of each packed scope.
    pub aspect_ratio: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: 20.0,
            aspect_ratio: 1.6,
        }
    }
}

/// Edge-agnostic shelf packing, one scope at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    cfg: GridConfig,
}

impl GridLayout {
    pub fn new(cfg: GridConfig) -> Self {
        Self { cfg }
    }
}

impl LayoutStrategy for GridLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Grid
    }

    fn run(&self, input: LayoutInput) -> LayoutTask {
        let cfg = self.cfg.clone();
        Box::pin(async move {
            let nodes = input.nodes.len();
            let result = pack_all(&cfg, &input).await;
            settle(LayoutKind::Grid, nodes, result)
        })
    }
}

async fn pack_all(cfg: &GridConfig, input: &LayoutInput) -> Result<Placement> {
    scope::validate_sizes(input)?;
    let scopes = Scopes::partition(input);
    let mut placement = Placement::default();

    for group in &scopes.groups {
        let members = scopes.children(&group.id);
        let size = match pack_scope(cfg, input, members, &mut placement)? {
            Some(corner) => Size::new(
                corner.x + input.group_padding,
                corner.y + input.group_padding,
            ),
            None => scope::empty_group_size(input),
        };
        placement.sizes.insert(group.id.clone(), size);
        futures_util::pending!();
    }
    pack_scope(cfg, input, &scopes.top, &mut placement)?;

    scope::pin_labels(input, &mut placement);
    Ok(placement)
}

/// Shelf-packs one scope at the padding origin and returns the far corner.
fn pack_scope(
    cfg: &GridConfig,
    input: &LayoutInput,
    members: &[&LayoutNode],
    placement: &mut Placement,
) -> Result<Option<Point>> {
    if members.is_empty() {
        return Ok(None);
    }

    let mut boxes: Vec<(&NodeId, Size)> = members
        .iter()
        .map(|n| {
            let size = placement
                .sizes
                .get(&n.id)
                .copied()
                .unwrap_or_else(|| input.size_of(n));
            (&n.id, size)
        })
        .collect();
    boxes.sort_by(|(a_id, a), (b_id, b)| {
        b.area()
            .total_cmp(&a.area())
            .then_with(|| a_id.cmp(b_id))
    });

    let gap = cfg.spacing;
    let total: f64 = boxes
        .iter()
        .map(|(_, s)| (s.width + gap) * (s.height + gap))
        .sum();
    let widest = boxes.iter().map(|(_, s)| s.width).fold(0.0, f64::max);
    let limit = (total * cfg.aspect_ratio).sqrt().max(widest);
    if !limit.is_finite() || limit <= 0.0 {
        return Err(LayoutError::PackingWidth { width: limit });
    }

    let pad = input.group_padding;
    let mut x = 0.0;
    let mut y = 0.0;
    let mut shelf = 0.0f64;
    let mut placed = Vec::with_capacity(boxes.len());
    for (id, size) in boxes {
        if x > 0.0 && x + size.width > limit {
            x = 0.0;
            y += shelf + gap;
            shelf = 0.0;
        }
        let at = Point::new(pad + x, pad + y);
        placement.positions.insert(id.clone(), at);
        placed.push((at, size));
        x += size.width + gap;
        shelf = shelf.max(size.height);
    }

    Ok(scope::far_corner(placed))
}
