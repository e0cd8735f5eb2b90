//! Shortest link path between two pages

use crate::storage::{Database, Page, PageId, StoreResult};
use std::collections::HashMap;
use std::fmt;

/// One page on a path, with the anchor text of the link that led to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub page: Page,

    /// `None` for the starting page and for links without anchor text
    pub via: Option<String>,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.via {
            Some(via) => write!(f, "-> \"{}\" Page: {}", via, self.page),
            None => write!(f, "-> Page: {}", self.page),
        }
    }
}

/// Finds a path from `from` to `to` with the fewest links
///
/// Breadth-first over outbound edges, up to `max_depth` links. The first link
/// reaching a page is the one kept, so ties resolve to the earliest stored
/// edge of the earliest explored level.
///
/// # Returns
///
/// * `Ok(Some(steps))` - Pages from `from` to `to`, both included
/// * `Ok(None)` - `to` is not reachable within `max_depth` links
/// * `Err(StoreError::NotFound)` - One of the endpoints does not exist
pub fn shortest_path(
    db: &Database,
    from: PageId,
    to: PageId,
    max_depth: usize,
) -> StoreResult<Option<Vec<PathStep>>> {
    let pages = db.pages();
    let start = pages.get(from)?;
    pages.get(to)?;

    if from == to {
        return Ok(Some(vec![PathStep {
            page: start,
            via: None,
        }]));
    }

    let links = db.links();
    let mut first_link: HashMap<PageId, (PageId, Option<String>)> = HashMap::new();
    let mut level = vec![from];
    let mut found = false;

    for depth in 0..max_depth {
        tracing::debug!("Path search depth {} ({} pages)", depth, level.len());

        let mut next = Vec::new();
        for edge in links.outbound_batch(&level)? {
            if edge.linked == from || first_link.contains_key(&edge.linked) {
                continue;
            }
            first_link.insert(edge.linked, (edge.linker, edge.display));
            next.push(edge.linked);
        }

        if first_link.contains_key(&to) {
            found = true;
            break;
        }
        if next.is_empty() {
            break;
        }
        level = next;
    }

    if !found {
        return Ok(None);
    }

    let mut backwards = Vec::new();
    let mut current = to;
    while current != from {
        let Some((linker, via)) = first_link.get(&current) else {
            break;
        };
        backwards.push((current, via.clone()));
        current = *linker;
    }

    let mut steps = Vec::with_capacity(backwards.len() + 1);
    steps.push(PathStep {
        page: start,
        via: None,
    });
    for (id, via) in backwards.into_iter().rev() {
        steps.push(PathStep {
            page: pages.get(id)?,
            via,
        });
    }

    Ok(Some(steps))
}
