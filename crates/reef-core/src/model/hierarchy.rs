//! Display-order tree over a set of work items.
//!
//! The tree is an id index plus a parent-to-children adjacency map, never
//! embedded child pointers. An item whose `parent_id` is missing from the
//! visible set (or points at itself) is shown as a root; the record itself is
//! untouched, so the link heals if the parent reappears in a later merge.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::item::WorkItem;

/// Index and adjacency view over a slice of items.
pub struct Hierarchy<'a> {
    index: HashMap<&'a str, &'a WorkItem>,
    children: HashMap<&'a str, Vec<&'a str>>,
    roots: Vec<&'a str>,
}

fn sibling_order(a: &WorkItem, b: &WorkItem) -> Ordering {
    a.sort_index
        .total_cmp(&b.sort_index)
        .then_with(|| a.id.cmp(&b.id))
}

impl<'a> Hierarchy<'a> {
    /// Build the view for `items`. Siblings are ordered by `sort_index`,
    /// ties broken by id.
    #[must_use]
    pub fn build(items: &'a [WorkItem]) -> Self {
        let index: HashMap<&str, &WorkItem> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut roots: Vec<&str> = Vec::new();
        for item in items {
            match item.parent_id.as_deref() {
                Some(parent) if parent != item.id && index.contains_key(parent) => {
                    children.entry(parent).or_default().push(item.id.as_str());
                }
                _ => roots.push(item.id.as_str()),
            }
        }

        let by_order = |ids: &mut Vec<&str>| {
            ids.sort_by(|a, b| match (index.get(a), index.get(b)) {
                (Some(a), Some(b)) => sibling_order(a, b),
                _ => a.cmp(b),
            });
        };
        by_order(&mut roots);
        for ids in children.values_mut() {
            by_order(ids);
        }

        Self {
            index,
            children,
            roots,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a WorkItem> {
        self.index.get(id).copied()
    }

    /// Direct children of `id` in sibling order.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &'a WorkItem> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.get(child))
    }

    /// Depth-first walk in display order, yielding `(depth, item)` pairs.
    ///
    /// Every item appears exactly once. Items trapped in a parent cycle are
    /// unreachable from any root; they are emitted at depth zero after the
    /// regular walk, in sibling order.
    #[must_use]
    pub fn walk(&self) -> Vec<(usize, &'a WorkItem)> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut visited: HashSet<&str> = HashSet::new();

        for root in &self.roots {
            self.walk_from(root, 0, &mut visited, &mut out);
        }

        let mut orphans: Vec<&WorkItem> = self
            .index
            .values()
            .filter(|item| !visited.contains(item.id.as_str()))
            .copied()
            .collect();
        orphans.sort_by(|a, b| sibling_order(a, b));
        for orphan in orphans {
            self.walk_from(orphan.id.as_str(), 0, &mut visited, &mut out);
        }

        out
    }

    fn walk_from(
        &self,
        id: &str,
        depth: usize,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<(usize, &'a WorkItem)>,
    ) {
        let Some(item) = self.get(id) else {
            return;
        };
        if !visited.insert(item.id.as_str()) {
            return;
        }
        out.push((depth, item));
        for child in self
            .children
            .get(item.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            self.walk_from(child, depth + 1, visited, out);
        }
    }
}
