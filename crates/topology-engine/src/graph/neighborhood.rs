use std::collections::{HashMap, HashSet};
use topology_core::{NodeId, Record};

use crate::view::ViewContext;

/// Reduces the record set to what the view should show.
///
/// Without a selection every record stays except hidden-by-default ones,
/// and explore ids override the hidden flag. With a selection the output is
/// the selected node, its direct neighbors, the connections that link them
/// and the group chain above each kept node.
pub fn filter_records(records: &[Record], view: &ViewContext) -> Vec<Record> {
    match view.selected() {
        None => records
            .iter()
            .filter(|r| !r.is_hidden() || view.explore().contains(r.id()))
            .cloned()
            .collect(),
        Some(selected) => neighborhood(records, selected),
    }
}

fn neighborhood(records: &[Record], selected: &NodeId) -> Vec<Record> {
    let mut keep: HashSet<NodeId> = HashSet::new();
    let mut connections: HashSet<&NodeId> = HashSet::new();
    keep.insert(selected.clone());

    for rec in records {
        let Record::Connection(c) = rec else {
            continue;
        };
        if &c.from == selected {
            keep.insert(c.to.clone());
            connections.insert(&c.id);
        } else if &c.to == selected {
            keep.insert(c.from.clone());
            connections.insert(&c.id);
        }
    }

    // Only groups and explorable elements can be parents; anything else is
    // a dangling reference.
    let containers: HashSet<&NodeId> = records
        .iter()
        .filter(|r| r.is_container())
        .map(|r| r.id())
        .collect();
    let parents: HashMap<&NodeId, &NodeId> = records
        .iter()
        .filter_map(|r| r.group().map(|g| (r.id(), g)))
        .filter(|(_, g)| containers.contains(g))
        .fold(HashMap::new(), |mut acc, (id, g)| {
            acc.entry(id).or_insert(g);
            acc
        });

    let frontier: Vec<NodeId> = keep.iter().cloned().collect();
    for id in frontier {
        let mut cur = parents.get(&id).copied();
        while let Some(parent) = cur {
            if !keep.insert(parent.clone()) {
                break;
            }
            cur = parents.get(parent).copied();
        }
    }

    let mut seen: HashSet<&NodeId> = HashSet::new();
    records
        .iter()
        .filter(|r| match r {
            Record::Connection(c) => connections.contains(&c.id),
            _ => keep.contains(r.id()),
        })
        .filter(|r| seen.insert(r.id()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use topology_core::{ConnectionRecord, ElementRecord, GroupRecord};

    fn element(id: &str, group: Option<&str>, hidden: bool) -> Record {
        Record::Element(ElementRecord {
            id: id.into(),
            title: id.to_uppercase(),
            group: group.map(NodeId::from),
            hidden,
            explorable: false,
            fields: serde_json::Value::Null,
        })
    }

    fn group(id: &str, parent: Option<&str>) -> Record {
        Record::GroupComponent(GroupRecord {
            id: id.into(),
            title: id.to_uppercase(),
            group: parent.map(NodeId::from),
            hidden: false,
            fields: serde_json::Value::Null,
        })
    }

    fn connection(id: &str, from: &str, to: &str) -> Record {
        Record::Connection(ConnectionRecord {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            fields: serde_json::Value::Null,
        })
    }

    fn ids(records: &[Record]) -> BTreeSet<&str> {
        records.iter().map(|r| r.id().as_str()).collect()
    }

    fn chain() -> Vec<Record> {
        vec![
            element("a", None, false),
            element("b", None, false),
            element("c", None, false),
            element("d", None, false),
            connection("ab", "a", "b"),
            connection("bc", "b", "c"),
            connection("cd", "c", "d"),
        ]
    }

    #[test]
    fn selection_keeps_direct_neighbors_and_their_edges() {
        let view = ViewContext::default().with_selected(Some("b".into()));
        let out = filter_records(&chain(), &view);

        assert_eq!(ids(&out), BTreeSet::from(["a", "b", "c", "ab", "bc"]));
    }

    #[test]
    fn selection_pulls_in_ancestor_groups() {
        let records = vec![
            group("outer", None),
            group("inner", Some("outer")),
            element("x", Some("inner"), false),
            element("y", None, false),
            connection("xy", "x", "y"),
        ];
        let view = ViewContext::default().with_selected(Some("y".into()));
        let out = filter_records(&records, &view);

        assert_eq!(ids(&out), BTreeSet::from(["outer", "inner", "x", "y", "xy"]));
    }

    #[test]
    fn parent_references_to_plain_elements_are_not_followed() {
        let records = vec![
            element("x", Some("y"), false),
            element("y", None, false),
            element("z", None, false),
            connection("xz", "x", "z"),
        ];
        let view = ViewContext::default().with_selected(Some("z".into()));
        let out = filter_records(&records, &view);

        assert_eq!(ids(&out), BTreeSet::from(["x", "z", "xz"]));
    }

    #[test]
    fn explorable_elements_count_as_parents() {
        let mut svc = element("svc", None, false);
        if let Record::Element(e) = &mut svc {
            e.explorable = true;
        }
        let records = vec![
            svc,
            element("pod", Some("svc"), false),
            element("db", None, false),
            connection("pd", "pod", "db"),
        ];
        let view = ViewContext::default().with_selected(Some("db".into()));
        let out = filter_records(&records, &view);

        assert_eq!(ids(&out), BTreeSet::from(["svc", "pod", "db", "pd"]));
    }

    #[test]
    fn duplicates_are_emitted_once() {
        let mut records = chain();
        records.push(connection("ab", "a", "b"));
        records.push(element("a", None, false));
        let view = ViewContext::default().with_selected(Some("a".into()));
        let out = filter_records(&records, &view);

        assert_eq!(out.len(), 3);
        assert_eq!(ids(&out), BTreeSet::from(["a", "b", "ab"]));
    }

    #[test]
    fn no_selection_hides_flagged_records_unless_explored() {
        let records = vec![
            element("shown", None, false),
            element("hidden", None, true),
            element("explored", None, true),
        ];
        let view = ViewContext::default().with_explore(BTreeSet::from(["explored".into()]));
        let out = filter_records(&records, &view);

        assert_eq!(ids(&out), BTreeSet::from(["shown", "explored"]));
    }

    #[test]
    fn clearing_an_unset_selection_changes_nothing() {
        let view = ViewContext::default();
        let first = filter_records(&chain(), &view);
        let second = filter_records(&chain(), &view.with_selected(None));
        assert_eq!(first, second);
    }
}
