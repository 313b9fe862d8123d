use std::{cmp::Ordering, collections::HashMap};

use uuid::Uuid;

use crate::models::Page;

/// PageNode
///
/// A page together with its (already ordered) children. Built in memory from a flat,
/// nested-set ordered list of pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub page: Page,
    pub children: Vec<PageNode>,
}

/// Sibling order: `sort` ascending, then tree position.
pub fn sibling_order(a: &Page, b: &Page) -> Ordering {
    a.sort
        .partial_cmp(&b.sort)
        .unwrap_or(Ordering::Equal)
        .then(a.nsleft.cmp(&b.nsleft))
}

/// build_forest
///
/// Turns a flat list of pages into root trees. Pages whose parent is not part of the
/// list are treated as roots, so a filtered list still produces a well-formed forest.
pub fn build_forest(mut pages: Vec<Page>) -> Vec<PageNode> {
    pages.sort_by(sibling_order);

    let present: std::collections::HashSet<Uuid> = pages.iter().map(|p| p.id).collect();
    let mut by_parent: HashMap<Option<Uuid>, Vec<Page>> = HashMap::new();
    for page in pages {
        let key = page.parent_id.filter(|parent| present.contains(parent));
        by_parent.entry(key).or_default().push(page);
    }

    attach(None, &mut by_parent)
}

fn attach(parent: Option<Uuid>, by_parent: &mut HashMap<Option<Uuid>, Vec<Page>>) -> Vec<PageNode> {
    let Some(level) = by_parent.remove(&parent) else {
        return Vec::new();
    };

    level
        .into_iter()
        .map(|page| {
            let children = attach(Some(page.id), by_parent);
            PageNode { page, children }
        })
        .collect()
}

/// filter_active
///
/// Drops inactive nodes together with their whole subtree.
pub fn filter_active(nodes: Vec<PageNode>) -> Vec<PageNode> {
    nodes
        .into_iter()
        .filter(|node| node.page.is_active)
        .map(|node| PageNode {
            children: filter_active(node.children),
            page: node.page,
        })
        .collect()
}

/// assign_bounds
///
/// Renumbers the whole forest with a depth-first walk and returns `(id, nsleft, nsright)`
/// for every page. Roots start at 1 and follow each other without gaps.
pub fn assign_bounds(pages: &[Page]) -> Vec<(Uuid, i32, i32)> {
    let mut children: HashMap<Option<Uuid>, Vec<&Page>> = HashMap::new();
    for page in pages {
        children.entry(page.parent_id).or_default().push(page);
    }
    for level in children.values_mut() {
        level.sort_by(|a, b| sibling_order(a, b));
    }

    let mut out = Vec::with_capacity(pages.len());
    let mut counter = 0;
    number(None, &children, &mut counter, &mut out);
    out
}

fn number(
    parent: Option<Uuid>,
    children: &HashMap<Option<Uuid>, Vec<&Page>>,
    counter: &mut i32,
    out: &mut Vec<(Uuid, i32, i32)>,
) {
    let Some(level) = children.get(&parent) else {
        return;
    };
    for page in level {
        *counter += 1;
        let left = *counter;
        let slot = out.len();
        out.push((page.id, left, 0));
        number(Some(page.id), children, counter, out);
        *counter += 1;
        out[slot].2 = *counter;
    }
}

/// Rows to skip for a 1-based page number. Saturates instead of overflowing, so an
/// absurd page simply lands past the last row.
pub fn offset(page: i64, per_page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(per_page.max(1))
}

/// Number of pages needed for `count` rows (0 when there are none).
pub fn total_pages(count: i64, per_page: i64) -> i64 {
    let per_page = per_page.max(1);
    let count = count.max(0);
    count / per_page + i64::from(count % per_page != 0)
}
