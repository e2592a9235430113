use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};
use topology_core::{NodeId, NodeKind, Point, Size};

use super::scope::{self, Scopes};
use super::{settle, LayoutInput, LayoutKind, LayoutNode, LayoutStrategy, LayoutTask, Placement};
use crate::error::Result;

const SWEEPS: usize = 12;

type Adjacency = Vec<SmallVec<[usize; 4]>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Vertical gap between nodes sharing a rank.
    pub node_separation: f64,
    /// Horizontal gap between consecutive ranks.
    pub rank_separation: f64,
    /// Extra room added to each grid cell inside a group.
    pub cell_gap: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            node_separation: 200.0,
            rank_separation: 300.0,
            cell_gap: 24.0,
        }
    }
}

/// Layered left-to-right layout over collapsed groups, with a square grid
/// inside every group.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeLayout {
    cfg: TreeConfig,
}

impl TreeLayout {
    pub fn new(cfg: TreeConfig) -> Self {
        Self { cfg }
    }
}

impl LayoutStrategy for TreeLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Tree
    }

    fn run(&self, input: LayoutInput) -> LayoutTask {
        let cfg = self.cfg.clone();
        Box::pin(async move {
            let nodes = input.nodes.len();
            let result = layered(&cfg, &input).await;
            settle(LayoutKind::Tree, nodes, result)
        })
    }
}

async fn layered(cfg: &TreeConfig, input: &LayoutInput) -> Result<Placement> {
    scope::validate_sizes(input)?;
    let scopes = Scopes::partition(input);
    let mut placement = Placement::default();

    // Sizes first: a group's box comes from the grid its children need.
    for group in &scopes.groups {
        let kids = placeable(scopes.children(&group.id), &placement);
        let size = if kids.is_empty() {
            scope::empty_group_size(input)
        } else {
            let (cols, rows) = grid_dims(kids.len());
            let cell_w = kids.iter().map(|n| size_in(n, &placement).width).fold(0.0, f64::max);
            let cell_h = kids.iter().map(|n| size_in(n, &placement).height).fold(0.0, f64::max);
            Size::new(
                cols as f64 * (cell_w + cfg.cell_gap) + 2.0 * input.group_padding,
                rows as f64 * (cell_h + cfg.cell_gap) + 2.0 * input.group_padding,
            )
        };
        placement.sizes.insert(group.id.clone(), size);
    }
    futures_util::pending!();

    let top = placeable(&scopes.top, &placement);
    let index: HashMap<&NodeId, usize> = top.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();
    let mut links: Vec<(usize, usize)> = Vec::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for e in &input.edges {
        let s = index.get(scopes.top_level_of(&e.source));
        let t = index.get(scopes.top_level_of(&e.target));
        if let (Some(&s), Some(&t)) = (s, t) {
            if s != t && seen.insert((s, t)) {
                links.push((s, t));
            }
        }
    }
    let sizes: Vec<Size> = top.iter().map(|n| size_in(n, &placement)).collect();

    let links = remove_cycles(top.len(), &links);
    let ranks = rank(top.len(), &links);
    futures_util::pending!();
    let layers = order(&ranks, &links);
    futures_util::pending!();
    let coords = assign_coordinates(cfg, &layers, &sizes);
    for (n, at) in top.iter().zip(coords) {
        placement.positions.insert(n.id.clone(), at);
    }

    for group in &scopes.groups {
        let kids = placeable(scopes.children(&group.id), &placement);
        if kids.is_empty() {
            continue;
        }
        let Some(size) = placement.sizes.get(&group.id).copied() else {
            continue;
        };
        let pad = input.group_padding;
        let (cols, rows) = grid_dims(kids.len());
        let cell_w = (size.width - 2.0 * pad) / cols as f64;
        let cell_h = (size.height - 2.0 * pad) / rows as f64;
        for (i, n) in kids.iter().enumerate() {
            let s = size_in(n, &placement);
            let col = (i % cols) as f64;
            let row = (i / cols) as f64;
            let at = Point::new(
                pad + col * cell_w + (cell_w - s.width) / 2.0,
                pad + row * cell_h + (cell_h - s.height) / 2.0,
            );
            placement.positions.insert(n.id.clone(), at);
        }
    }

    scope::pin_labels(input, &mut placement);
    Ok(placement)
}

/// Members that can take part in the pass: groups (sized above) and
/// measured nodes. The rest keep their position.
fn placeable<'a>(members: &[&'a LayoutNode], placement: &Placement) -> Vec<&'a LayoutNode> {
    members
        .iter()
        .copied()
        .filter(|n| n.size.is_some() || placement.sizes.contains_key(&n.id))
        .collect()
}

fn size_in(node: &LayoutNode, placement: &Placement) -> Size {
    if node.kind == NodeKind::Group {
        if let Some(s) = placement.sizes.get(&node.id) {
            return *s;
        }
    }
    node.size.unwrap_or_default()
}

fn grid_dims(n: usize) -> (usize, usize) {
    let cols = (n as f64).sqrt().ceil().max(1.0) as usize;
    (cols, n.div_ceil(cols))
}

/// Reverses DFS back edges so the graph is acyclic.
fn remove_cycles(n: usize, links: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut succ: Adjacency = vec![SmallVec::new(); n];
    for &(s, t) in links {
        succ[s].push(t);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }
    let mut mark = vec![Mark::New; n];
    let mut back: HashSet<(usize, usize)> = HashSet::new();

    for root in 0..n {
        if mark[root] != Mark::New {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        mark[root] = Mark::Active;
        while let Some(frame) = stack.last_mut() {
            let (v, next) = *frame;
            if let Some(&w) = succ[v].get(next) {
                frame.1 += 1;
                match mark[w] {
                    Mark::New => {
                        mark[w] = Mark::Active;
                        stack.push((w, 0));
                    }
                    Mark::Active => {
                        back.insert((v, w));
                    }
                    Mark::Done => {}
                }
            } else {
                mark[v] = Mark::Done;
                stack.pop();
            }
        }
    }

    let mut out: Vec<(usize, usize)> = Vec::with_capacity(links.len());
    let mut kept: HashSet<(usize, usize)> = HashSet::new();
    for &(s, t) in links {
        let e = if back.contains(&(s, t)) { (t, s) } else { (s, t) };
        if kept.insert(e) {
            out.push(e);
        }
    }
    out
}

/// Longest-path ranking: sources sit in rank 0.
fn rank(n: usize, links: &[(usize, usize)]) -> Vec<usize> {
    let mut succ: Adjacency = vec![SmallVec::new(); n];
    let mut indegree = vec![0usize; n];
    for &(s, t) in links {
        succ[s].push(t);
        indegree[t] += 1;
    }
    let mut ranks = vec![0usize; n];
    let mut queue: VecDeque<usize> = (0..n).filter(|&v| indegree[v] == 0).collect();
    while let Some(v) = queue.pop_front() {
        for &w in &succ[v] {
            ranks[w] = ranks[w].max(ranks[v] + 1);
            indegree[w] -= 1;
            if indegree[w] == 0 {
                queue.push_back(w);
            }
        }
    }
    ranks
}

/// Groups nodes by rank and reduces crossings with alternating barycenter
/// sweeps.
fn order(ranks: &[usize], links: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().map_or(0, |r| r + 1);
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (v, &r) in ranks.iter().enumerate() {
        layers[r].push(v);
    }

    let mut pred: Adjacency = vec![SmallVec::new(); ranks.len()];
    let mut succ: Adjacency = vec![SmallVec::new(); ranks.len()];
    for &(s, t) in links {
        pred[t].push(s);
        succ[s].push(t);
    }

    let mut slot = vec![0usize; ranks.len()];
    for layer in &layers {
        for (i, &v) in layer.iter().enumerate() {
            slot[v] = i;
        }
    }

    for sweep in 0..SWEEPS {
        let down = sweep % 2 == 0;
        let visit: Vec<usize> = if down {
            (1..depth).collect()
        } else {
            (0..depth.saturating_sub(1)).rev().collect()
        };
        for r in visit {
            let neighbors = if down { &pred } else { &succ };
            let mut keyed: Vec<(f64, usize)> = layers[r]
                .iter()
                .map(|&v| {
                    let adj = &neighbors[v];
                    let key = if adj.is_empty() {
                        slot[v] as f64
                    } else {
                        adj.iter().map(|&u| slot[u] as f64).sum::<f64>() / adj.len() as f64
                    };
                    (key, v)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            layers[r] = keyed.into_iter().map(|(_, v)| v).collect();
            for (i, &v) in layers[r].iter().enumerate() {
                slot[v] = i;
            }
        }
    }
    layers
}

/// Ranks advance left to right; each rank is stacked top to bottom and
/// centered against the tallest rank. The drawing starts at (0, 0).
fn assign_coordinates(cfg: &TreeConfig, layers: &[Vec<usize>], sizes: &[Size]) -> Vec<Point> {
    let mut coords = vec![Point::ZERO; sizes.len()];
    let extent = |layer: &[usize]| {
        let total: f64 = layer.iter().map(|&v| sizes[v].height).sum();
        total + cfg.node_separation * layer.len().saturating_sub(1) as f64
    };
    let tallest = layers.iter().map(|l| extent(l)).fold(0.0, f64::max);

    let mut x = 0.0;
    for layer in layers {
        let mut y = (tallest - extent(layer)) / 2.0;
        let mut widest = 0.0f64;
        for &v in layer {
            coords[v] = Point::new(x, y);
            y += sizes[v].height + cfg.node_separation;
            widest = widest.max(sizes[v].width);
        }
        x += widest + cfg.rank_separation;
    }

    let min_x = coords.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = coords.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    if min_x.is_finite() && min_y.is_finite() {
        for p in &mut coords {
            p.x -= min_x;
            p.y -= min_y;
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::testing::{drive, edge, input, node, placed};
    use crate::layout::LABEL_OFFSET;

    fn at(p: &Placement, id: &str) -> Point {
        p.positions[&NodeId::from(id)]
    }

    #[test]
    fn single_group_sits_at_origin_with_children_in_a_square_grid() {
        let input = input(
            vec![
                node("g1", NodeKind::Group, None),
                node("g1::label", NodeKind::Label, Some("g1")),
                node("n1", NodeKind::Element, Some("g1")),
                node("n2", NodeKind::Element, Some("g1")),
                node("n3", NodeKind::Element, Some("g1")),
            ],
            vec![edge("n1", "n2"), edge("n2", "n3")],
        );
        let (outcome, ticks) = drive(TreeLayout::new(TreeConfig::default()).run(input));
        assert!(ticks > 1);
        let p = placed(outcome);

        assert_eq!(at(&p, "g1"), Point::ZERO);
        // 2x2 cells of (100 + 24) x (40 + 24) inside 20 padding.
        assert_eq!(p.sizes[&NodeId::from("g1")], Size::new(288.0, 168.0));
        assert_eq!(at(&p, "n1"), Point::new(32.0, 32.0));
        assert_eq!(at(&p, "n2"), Point::new(156.0, 32.0));
        assert_eq!(at(&p, "n3"), Point::new(32.0, 96.0));
        assert_eq!(at(&p, "g1::label"), LABEL_OFFSET);
    }

    #[test]
    fn edges_between_groups_run_left_to_right() {
        let input = input(
            vec![
                node("sink", NodeKind::Group, None),
                node("source", NodeKind::Group, None),
                node("a", NodeKind::Element, Some("source")),
                node("b", NodeKind::Element, Some("sink")),
                node("c", NodeKind::Element, Some("sink")),
                node("free", NodeKind::Element, None),
            ],
            vec![edge("a", "b"), edge("a", "c"), edge("b", "free")],
        );
        let (outcome, _) = drive(TreeLayout::new(TreeConfig::default()).run(input));
        let p = placed(outcome);

        let source = at(&p, "source");
        let sink = at(&p, "sink");
        let source_w = p.sizes[&NodeId::from("source")].width;
        assert!(sink.x >= source.x + source_w + 300.0);
        assert!(at(&p, "free").x > sink.x);
        assert_eq!(source.x, 0.0);
    }

    #[test]
    fn cycles_still_produce_a_finite_layout() {
        let input = input(
            vec![
                node("a", NodeKind::Element, None),
                node("b", NodeKind::Element, None),
                node("c", NodeKind::Element, None),
            ],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        );
        let (outcome, _) = drive(TreeLayout::new(TreeConfig::default()).run(input));
        let p = placed(outcome);
        let xs: HashSet<u64> = ["a", "b", "c"].iter().map(|id| at(&p, id).x.to_bits()).collect();
        assert_eq!(xs.len(), 3);
    }

    #[test]
    fn unmeasured_nodes_pass_through() {
        let mut ghost = node("ghost", NodeKind::Element, None);
        ghost.size = None;
        let input = input(vec![node("a", NodeKind::Element, None), ghost], vec![edge("a", "ghost")]);
        let (outcome, _) = drive(TreeLayout::new(TreeConfig::default()).run(input));
        let p = placed(outcome);
        assert!(p.positions.contains_key(&NodeId::from("a")));
        assert!(!p.positions.contains_key(&NodeId::from("ghost")));
    }

    #[test]
    fn crossing_reduction_untangles_a_swapped_pair() {
        let layers = order(&[0, 0, 1, 1], &[(0, 3), (1, 2)]);
        assert_eq!(layers[1], vec![3, 2]);
    }
}
