use std::collections::{HashMap, HashSet};
use topology_core::{NodeId, NodeKind, Record};

use crate::graph::model::{Edge, EdgeData, Node, NodeData, TopologyGraph};

/// Turns a flat record list into nodes, edges and containment.
///
/// Groups (and explorable elements) come first, each followed in the
/// non-group section by its synthetic label. Connections whose endpoints are
/// not emitted are dropped without error.
pub fn build_graph(records: &[Record]) -> TopologyGraph {
    let records = dedupe(records);

    let titles: HashMap<&NodeId, &str> = records
        .iter()
        .filter_map(|r| r.title().map(|t| (r.id(), t)))
        .collect();
    let parents = container_parents(&records);

    let mut groups: Vec<Node<NodeData>> = Vec::new();
    let mut others: Vec<Node<NodeData>> = Vec::new();

    for rec in &records {
        let title = rec.title().unwrap_or_default().to_string();
        match rec {
            Record::Connection(_) => {}
            _ if rec.is_container() => {
                let parent = parents.get(rec.id()).cloned().flatten();
                groups.push(
                    Node::new(rec.id().clone(), NodeKind::Group, node_data(rec, &title))
                        .with_parent(parent),
                );
                others.push(
                    Node::new(
                        NodeId::label_for(rec.id()),
                        NodeKind::Label,
                        NodeData {
                            title,
                            fields: serde_json::Value::Null,
                        },
                    )
                    .with_parent(Some(rec.id().clone())),
                );
            }
            _ => {
                let parent = rec
                    .group()
                    .filter(|g| parents.contains_key(*g) && *g != rec.id())
                    .cloned();
                others.push(
                    Node::new(rec.id().clone(), NodeKind::Element, node_data(rec, &title))
                        .with_parent(parent),
                );
            }
        }
    }

    sort_parents_first(&mut groups);

    let endpoints: HashSet<&NodeId> = groups
        .iter()
        .chain(others.iter())
        .filter(|n| !n.is_label())
        .map(|n| &n.id)
        .collect();

    let mut edges = Vec::new();
    let mut dropped = 0usize;
    for rec in &records {
        let Record::Connection(c) = rec else {
            continue;
        };
        if !endpoints.contains(&c.from) || !endpoints.contains(&c.to) {
            dropped += 1;
            continue;
        }
        edges.push(Edge {
            id: c.id.clone(),
            source: c.from.clone(),
            target: c.to.clone(),
            data: EdgeData {
                source_title: titles.get(&c.from).copied().unwrap_or_default().to_string(),
                target_title: titles.get(&c.to).copied().unwrap_or_default().to_string(),
                fields: c.fields.clone(),
            },
        });
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped connections with unknown endpoints");
    }

    let mut nodes = groups;
    nodes.extend(others);
    TopologyGraph { nodes, edges }
}

fn node_data(rec: &Record, title: &str) -> NodeData {
    let fields = match rec {
        Record::Element(e) => e.fields.clone(),
        Record::GroupComponent(g) => g.fields.clone(),
        Record::Connection(_) => serde_json::Value::Null,
    };
    NodeData {
        title: title.to_string(),
        fields,
    }
}

/// First occurrence of each id wins.
fn dedupe(records: &[Record]) -> Vec<&Record> {
    let mut seen: HashSet<&NodeId> = HashSet::new();
    records.iter().filter(|r| seen.insert(r.id())).collect()
}

/// Resolved parent for every container. Dangling references and
/// containment cycles both fall back to "no parent".
fn container_parents(records: &[&Record]) -> HashMap<NodeId, Option<NodeId>> {
    let containers: HashSet<&NodeId> = records
        .iter()
        .filter(|r| r.is_container())
        .map(|r| r.id())
        .collect();

    let mut parents: HashMap<NodeId, Option<NodeId>> = records
        .iter()
        .filter(|r| r.is_container())
        .map(|r| {
            let parent = r
                .group()
                .filter(|g| containers.contains(*g) && *g != r.id())
                .cloned();
            (r.id().clone(), parent)
        })
        .collect();

    let cyclic: Vec<NodeId> = parents
        .keys()
        .filter(|id| leads_back_to(&parents, id))
        .cloned()
        .collect();
    for id in cyclic {
        parents.insert(id, None);
    }
    parents
}

fn leads_back_to(parents: &HashMap<NodeId, Option<NodeId>>, start: &NodeId) -> bool {
    let mut seen: HashSet<&NodeId> = HashSet::new();
    let mut cur = parents.get(start).and_then(Option::as_ref);
    while let Some(p) = cur {
        if p == start {
            return true;
        }
        if !seen.insert(p) {
            return false;
        }
        cur = parents.get(p).and_then(Option::as_ref);
    }
    false
}

fn sort_parents_first(groups: &mut [Node<NodeData>]) {
    let parents: HashMap<NodeId, Option<NodeId>> = groups
        .iter()
        .map(|g| (g.id.clone(), g.parent.clone()))
        .collect();
    let depth = |id: &NodeId| {
        let mut d = 0usize;
        let mut cur = parents.get(id).and_then(Option::as_ref);
        while let Some(p) = cur {
            d += 1;
            if d > parents.len() {
                break;
            }
            cur = parents.get(p).and_then(Option::as_ref);
        }
        d
    };
    groups.sort_by_cached_key(|g| depth(&g.id));
}
