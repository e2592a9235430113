use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use topology_core::{NodeId, NodeKind, Point, Size};

use super::scope::{self, Scopes};
use super::{settle, LayoutInput, LayoutKind, LayoutNode, LayoutStrategy, LayoutTask, Placement};
use crate::error::Result;
use crate::util::ids::stable_u64;

const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;
const CENTER_STRENGTH: f64 = 0.1;
const JIGGLE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    /// Gap kept around every node; links aim for `spacing * 1.5`.
    pub spacing: f64,
    /// Fixed number of simulation steps. There is no convergence exit.
    pub iterations: usize,
    pub seed: u64,
    /// Many-body strength; negative repels.
    pub charge: f64,
    /// Horizontal gap between sibling groups.
    pub group_spacing: f64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            spacing: 40.0,
            iterations: 500,
            seed: 42,
            charge: -30.0,
            group_spacing: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForceLayout {
    cfg: ForceConfig,
}

impl ForceLayout {
    pub fn new(cfg: ForceConfig) -> Self {
        Self { cfg }
    }

    pub fn place(&self, input: &LayoutInput) -> Result<Placement> {
        scope::validate_sizes(input)?;
        let scopes = Scopes::partition(input);
        let mut placement = Placement::default();

        for group in &scopes.groups {
            let members = scopes.children(&group.id);
            let size = match self.place_scope(input, members, &mut placement) {
                Some(corner) => Size::new(
                    corner.x + input.group_padding,
                    corner.y + input.group_padding,
                ),
                None => scope::empty_group_size(input),
            };
            placement.sizes.insert(group.id.clone(), size);
        }
        self.place_scope(input, &scopes.top, &mut placement);

        scope::pin_labels(input, &mut placement);
        Ok(placement)
    }

    /// Lays out one scope starting at the padding origin; returns the far
    /// corner of what it placed.
    fn place_scope(
        &self,
        input: &LayoutInput,
        members: &[&LayoutNode],
        placement: &mut Placement,
    ) -> Option<Point> {
        if members.is_empty() {
            return None;
        }
        let pad = input.group_padding;

        let mut groups: Vec<&LayoutNode> = members
            .iter()
            .copied()
            .filter(|n| n.kind == NodeKind::Group)
            .collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        let mut loose: Vec<&LayoutNode> = members
            .iter()
            .copied()
            .filter(|n| n.kind != NodeKind::Group)
            .collect();
        loose.sort_by(|a, b| a.id.cmp(&b.id));

        let mut boxes: Vec<(Point, Size)> = Vec::new();

        // Groups sit out the simulation: one row, left to right.
        let mut cursor = pad;
        for g in &groups {
            let size = placement
                .sizes
                .get(&g.id)
                .copied()
                .unwrap_or_else(|| scope::empty_group_size(input));
            let at = Point::new(cursor, pad);
            placement.positions.insert(g.id.clone(), at);
            boxes.push((at, size));
            cursor += size.width + self.cfg.group_spacing;
        }

        if !loose.is_empty() {
            let sizes: Vec<Size> = loose.iter().map(|n| input.size_of(n)).collect();
            let ids: Vec<&NodeId> = loose.iter().map(|n| &n.id).collect();
            let mut links = scope::scope_edges(&loose, &input.edges);
            links.sort_unstable();
            let centers = self.simulate(&ids, &sizes, &links);

            let min_x = centers
                .iter()
                .zip(&sizes)
                .map(|(c, s)| c.x - s.width / 2.0)
                .fold(f64::INFINITY, f64::min);
            let min_y = centers
                .iter()
                .zip(&sizes)
                .map(|(c, s)| c.y - s.height / 2.0)
                .fold(f64::INFINITY, f64::min);

            for ((id, c), s) in ids.iter().zip(&centers).zip(&sizes) {
                let at = Point::new(
                    c.x - s.width / 2.0 - min_x + cursor,
                    c.y - s.height / 2.0 - min_y + pad,
                );
                placement.positions.insert((*id).clone(), at);
                boxes.push((at, *s));
            }
        }

        scope::far_corner(boxes)
    }

    /// d3-style velocity Verlet with collide, link, x/y centering and
    /// many-body forces. Returns node centers.
    fn simulate(&self, ids: &[&NodeId], sizes: &[Size], links: &[(usize, usize)]) -> Vec<Point> {
        let n = ids.len();
        let mut x = vec![0.0; n];
        let mut y = vec![0.0; n];
        let mut vx = vec![0.0; n];
        let mut vy = vec![0.0; n];

        for (i, id) in ids.iter().enumerate() {
            let mut rng = StdRng::seed_from_u64(self.cfg.seed ^ stable_u64(id.as_str()));
            let angle = rng.random::<f64>() * std::f64::consts::TAU;
            let radius = 100.0 + rng.random::<f64>() * 200.0;
            x[i] = radius * angle.cos();
            y[i] = radius * angle.sin();
        }

        let radii: Vec<f64> = sizes
            .iter()
            .map(|s| s.width.hypot(s.height) / 2.0 + self.cfg.spacing)
            .collect();

        let mut degree = vec![0usize; n];
        for &(s, t) in links {
            degree[s] += 1;
            degree[t] += 1;
        }
        let link_distance = self.cfg.spacing * 1.5;

        let mut jiggle = StdRng::seed_from_u64(self.cfg.seed);
        let iterations = self.cfg.iterations.max(1);
        let alpha_decay = 1.0 - ALPHA_MIN.powf(1.0 / iterations as f64);
        let mut alpha = 1.0;

        for _ in 0..iterations {
            alpha += -alpha * alpha_decay;

            // collide
            for i in 0..n {
                for j in (i + 1)..n {
                    let r = radii[i] + radii[j];
                    let mut dx = (x[i] + vx[i]) - (x[j] + vx[j]);
                    let mut dy = (y[i] + vy[i]) - (y[j] + vy[j]);
                    let mut l = dx * dx + dy * dy;
                    if l >= r * r {
                        continue;
                    }
                    if dx == 0.0 {
                        dx = jitter(&mut jiggle);
                        l += dx * dx;
                    }
                    if dy == 0.0 {
                        dy = jitter(&mut jiggle);
                        l += dy * dy;
                    }
                    let l_sqrt = l.sqrt();
                    let k = (r - l_sqrt) / l_sqrt;
                    dx *= k;
                    dy *= k;
                    let ri2 = radii[i] * radii[i];
                    let rj2 = radii[j] * radii[j];
                    let w = rj2 / (ri2 + rj2);
                    vx[i] += dx * w;
                    vy[i] += dy * w;
                    vx[j] -= dx * (1.0 - w);
                    vy[j] -= dy * (1.0 - w);
                }
            }

            // link
            for &(s, t) in links {
                let strength = 1.0 / degree[s].min(degree[t]).max(1) as f64;
                let bias = degree[s] as f64 / (degree[s] + degree[t]) as f64;
                let mut dx = x[t] + vx[t] - x[s] - vx[s];
                let mut dy = y[t] + vy[t] - y[s] - vy[s];
                if dx == 0.0 {
                    dx = jitter(&mut jiggle);
                }
                if dy == 0.0 {
                    dy = jitter(&mut jiggle);
                }
                let l = (dx * dx + dy * dy).sqrt();
                let k = (l - link_distance) / l * alpha * strength;
                dx *= k;
                dy *= k;
                vx[t] -= dx * bias;
                vy[t] -= dy * bias;
                vx[s] += dx * (1.0 - bias);
                vy[s] += dy * (1.0 - bias);
            }

            // x / y centering
            for i in 0..n {
                vx[i] -= x[i] * CENTER_STRENGTH * alpha;
                vy[i] -= y[i] * CENTER_STRENGTH * alpha;
            }

            // many-body
            let mut dvx = vec![0.0; n];
            let mut dvy = vec![0.0; n];
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let mut dx = x[j] - x[i];
                    let mut dy = y[j] - y[i];
                    if dx == 0.0 {
                        dx = jitter(&mut jiggle);
                    }
                    if dy == 0.0 {
                        dy = jitter(&mut jiggle);
                    }
                    let mut l = dx * dx + dy * dy;
                    if l < 1.0 {
                        l = l.sqrt();
                    }
                    dvx[i] += dx * self.cfg.charge * alpha / l;
                    dvy[i] += dy * self.cfg.charge * alpha / l;
                }
            }

            for i in 0..n {
                vx[i] = (vx[i] + dvx[i]) * (1.0 - VELOCITY_DECAY);
                vy[i] = (vy[i] + dvy[i]) * (1.0 - VELOCITY_DECAY);
                x[i] += vx[i];
                y[i] += vy[i];
            }
        }

        x.into_iter().zip(y).map(|(x, y)| Point::new(x, y)).collect()
    }
}

fn jitter(rng: &mut StdRng) -> f64 {
    (rng.random::<f64>() - 0.5) * JIGGLE
}

impl LayoutStrategy for ForceLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Force
    }

    /// Runs to completion before returning; the task is already resolved.
    fn run(&self, input: LayoutInput) -> LayoutTask {
        let outcome = settle(self.kind(), input.nodes.len(), self.place(&input));
        Box::pin(futures_util::future::ready(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::testing::{drive, edge, input, node, placed};
    use crate::layout::LABEL_OFFSET;
    use std::collections::HashMap;

    /// Bit patterns keyed by id, so comparisons are exact.
    fn positions_by_id(placement: &Placement) -> HashMap<&str, (u64, u64)> {
        placement
            .positions
            .iter()
            .map(|(id, p)| (id.as_str(), (p.x.to_bits(), p.y.to_bits())))
            .collect()
    }

    fn chain_input() -> LayoutInput {
        input(
            vec![
                node("g1", NodeKind::Group, None),
                node("g1::label", NodeKind::Label, Some("g1")),
                node("n1", NodeKind::Element, Some("g1")),
                node("n2", NodeKind::Element, Some("g1")),
                node("n3", NodeKind::Element, Some("g1")),
                node("solo", NodeKind::Element, None),
            ],
            vec![edge("n1", "n2"), edge("n2", "n3"), edge("n3", "solo")],
        )
    }

    fn small() -> ForceLayout {
        ForceLayout::new(ForceConfig {
            iterations: 120,
            ..ForceConfig::default()
        })
    }

    #[test]
    fn identical_inputs_give_bit_identical_positions() {
        let a = small().place(&chain_input()).expect("first run");
        let b = small().place(&chain_input()).expect("second run");
        assert_eq!(positions_by_id(&a), positions_by_id(&b));
    }

    #[test]
    fn input_order_does_not_change_the_result() {
        let forward = chain_input();
        let mut reversed = chain_input();
        reversed.nodes.reverse();
        reversed.edges.reverse();

        let a = small().place(&forward).expect("forward");
        let b = small().place(&reversed).expect("reversed");
        assert_eq!(positions_by_id(&a), positions_by_id(&b));
    }

    #[test]
    fn a_different_seed_moves_nodes() {
        let other = ForceLayout::new(ForceConfig {
            iterations: 120,
            seed: 7,
            ..ForceConfig::default()
        });
        let a = small().place(&chain_input()).expect("seed 42");
        let b = other.place(&chain_input()).expect("seed 7");
        assert_ne!(positions_by_id(&a), positions_by_id(&b));
    }

    #[test]
    fn children_start_at_padding_and_fit_inside_group() {
        let input = chain_input();
        let placement = small().place(&input).expect("layout");
        let pad = input.group_padding;
        let group = placement.sizes[&NodeId::from("g1")];

        let kids = ["n1", "n2", "n3"].map(|id| placement.positions[&NodeId::from(id)]);
        let min_x = kids.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = kids.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        assert!((min_x - pad).abs() < 1e-9);
        assert!((min_y - pad).abs() < 1e-9);
        for p in kids {
            assert!(p.x + 100.0 + pad <= group.width + 1e-9);
            assert!(p.y + 40.0 + pad <= group.height + 1e-9);
        }
        assert_eq!(placement.positions[&NodeId::from("g1::label")], LABEL_OFFSET);
    }

    #[test]
    fn sibling_groups_form_a_row_left_of_loose_nodes() {
        let input = input(
            vec![
                node("b", NodeKind::Group, None),
                node("a", NodeKind::Group, None),
                node("x", NodeKind::Element, Some("a")),
                node("y", NodeKind::Element, Some("b")),
                node("free", NodeKind::Element, None),
            ],
            vec![],
        );
        let placement = small().place(&input).expect("layout");
        let pad = input.group_padding;
        let a = placement.positions[&NodeId::from("a")];
        let b = placement.positions[&NodeId::from("b")];
        let a_size = placement.sizes[&NodeId::from("a")];

        assert_eq!(a, Point::new(pad, pad));
        assert_eq!(b.y, pad);
        assert_eq!(b.x, pad + a_size.width + ForceConfig::default().group_spacing);
        let free = placement.positions[&NodeId::from("free")];
        assert!(free.x > b.x);
    }

    #[test]
    fn edgeless_scope_still_separates_nodes() {
        let input = input(
            vec![
                node("p", NodeKind::Element, None),
                node("q", NodeKind::Element, None),
            ],
            vec![],
        );
        let placement = small().place(&input).expect("layout");
        assert_ne!(
            placement.positions[&NodeId::from("p")],
            placement.positions[&NodeId::from("q")]
        );
    }

    #[test]
    fn run_resolves_on_first_poll() {
        let (outcome, ticks) = drive(small().run(chain_input()));
        assert_eq!(ticks, 1);
        assert_eq!(placed(outcome).positions.len(), 6);
    }
}
