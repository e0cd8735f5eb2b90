//! Directed link graph between pages

use crate::config::EdgeIdentity;
use crate::storage::pages::page_exists;
use crate::storage::error::is_constraint_violation;
use crate::storage::{Database, PageId, StoreError, StoreResult};
use rusqlite::{params, params_from_iter, Row, TransactionBehavior};
use std::collections::VecDeque;

/// Rows fetched per round trip by an [`EdgeCursor`]
const CURSOR_PAGE_SIZE: usize = 256;

/// Max ids bound into one `IN (...)` list
const BATCH_CHUNK_SIZE: usize = 500;

/// One stored link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Insertion order, unique across the graph
    pub seq: i64,
    pub linker: PageId,
    pub linked: PageId,
    pub display: Option<String>,
}

/// Result of adding an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Inserted,

    /// An edge with the same identity already existed
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Edges whose linker is the page
    Outbound,

    /// Edges whose linked page is the page
    Inbound,
}

impl Direction {
    fn anchor_column(self) -> &'static str {
        match self {
            Self::Outbound => "linker",
            Self::Inbound => "linked",
        }
    }
}

/// Stores links between pages
#[derive(Debug, Clone)]
pub struct LinkGraph {
    db: Database,
}

impl LinkGraph {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records a link from `linker` to `linked`
    ///
    /// # Arguments
    ///
    /// * `linker` - Page containing the link
    /// * `linked` - Page the link points to
    /// * `display` - Anchor text; blank text counts as absent
    ///
    /// # Returns
    ///
    /// * `Ok(EdgeOutcome::Inserted)` - New edge stored
    /// * `Ok(EdgeOutcome::Duplicate)` - An equal edge exists under the database's edge identity
    /// * `Err(StoreError::DanglingReference)` - One of the endpoints is not a stored page
    pub fn add_edge(
        &self,
        linker: PageId,
        linked: PageId,
        display: Option<&str>,
    ) -> StoreResult<EdgeOutcome> {
        let display = display.map(str::trim).unwrap_or("");

        let outcome = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            for endpoint in [linker, linked] {
                if !page_exists(&tx, endpoint)? {
                    return Err(StoreError::DanglingReference(endpoint));
                }
            }

            let inserted = match tx.execute(
                "INSERT OR IGNORE INTO links (linker, linked, display) VALUES (?1, ?2, ?3)",
                params![linker, linked, display],
            ) {
                Ok(n) => n,
                Err(err) if is_constraint_violation(&err) => 0,
                Err(err) => return Err(err.into()),
            };

            if inserted == 1 && !display.is_empty() {
                tx.execute(
                    "INSERT INTO links_fts (display, linker, linked) VALUES (?1, ?2, ?3)",
                    params![display, linker, linked],
                )?;
            }

            tx.commit()?;
            Ok(if inserted == 1 {
                EdgeOutcome::Inserted
            } else {
                EdgeOutcome::Duplicate
            })
        })?;

        tracing::trace!("Edge {} -> {}: {:?}", linker, linked, outcome);
        Ok(outcome)
    }

    /// Iterates the links leaving `page`, in insertion order
    pub fn outbound(&self, page: PageId) -> EdgeCursor {
        EdgeCursor::new(self.db.clone(), Direction::Outbound, page)
    }

    /// Iterates the links pointing at `page`, in insertion order
    pub fn inbound(&self, page: PageId) -> EdgeCursor {
        EdgeCursor::new(self.db.clone(), Direction::Inbound, page)
    }

    /// Collects outbound edges of many pages at once
    ///
    /// Edges come back grouped by chunk and ordered by `seq` within a chunk.
    pub fn outbound_batch(&self, pages: &[PageId]) -> StoreResult<Vec<Edge>> {
        let mut edges = Vec::new();

        for chunk in pages.chunks(BATCH_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT seq, linker, linked, display FROM links WHERE linker IN ({}) ORDER BY seq",
                placeholders
            );

            let found = self.db.with_conn(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(chunk.iter()), edge_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })?;
            edges.extend(found);
        }

        Ok(edges)
    }

    /// Counts the total number of links
    pub fn count(&self) -> StoreResult<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    pub fn edge_identity(&self) -> EdgeIdentity {
        self.db.edge_identity()
    }
}

/// Lazy iterator over the edges of one page
///
/// Pages through the store by `seq`, so edges added while iterating past the
/// current position are picked up. The sequence ends once a fetch comes back
/// empty; [`restart`](Self::restart) rewinds to the first edge.
#[derive(Debug)]
pub struct EdgeCursor {
    db: Database,
    direction: Direction,
    page: PageId,
    after_seq: i64,
    buffer: VecDeque<Edge>,
    exhausted: bool,
}

impl EdgeCursor {
    fn new(db: Database, direction: Direction, page: PageId) -> Self {
        Self {
            db,
            direction,
            page,
            after_seq: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn restart(&mut self) {
        self.after_seq = 0;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) -> StoreResult<()> {
        let sql = format!(
            "SELECT seq, linker, linked, display FROM links
             WHERE {} = ?1 AND seq > ?2
             ORDER BY seq ASC LIMIT ?3",
            self.direction.anchor_column()
        );

        let (page, after) = (self.page, self.after_seq);
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params![page, after, CURSOR_PAGE_SIZE as i64], edge_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        if rows.len() < CURSOR_PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.after_seq = last.seq;
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl Iterator for EdgeCursor {
    type Item = StoreResult<Edge>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let display: String = row.get(3)?;
    Ok(Edge {
        seq: row.get(0)?,
        linker: row.get(1)?,
        linked: row.get(2)?,
        display: if display.is_empty() {
            None
        } else {
            Some(display)
        },
    })
}
