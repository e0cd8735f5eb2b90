//! Full-text search over keys, aliases and link text

use crate::storage::pages::page_from_row;
use crate::storage::{Database, Page, PageId, StoreResult};
use rusqlite::params;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    /// A page whose canonical key matches
    Page(Page),

    /// An alias that matches, with the page it names
    Alias { alias: String, page: PageId },

    /// A link whose anchor text matches
    Link {
        display: String,
        linker: PageId,
        linked: PageId,
    },
}

/// Searches page keys, then aliases, then link text
///
/// `text` is matched as a phrase, so FTS5 operators in it have no effect.
/// Within each group hits are ordered by relevance. Returns at most `limit`
/// hits; blank text returns nothing.
pub fn search(db: &Database, text: &str, limit: usize) -> StoreResult<Vec<SearchHit>> {
    let text = text.trim();
    if text.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let phrase = format!("\"{}\"", text.replace('"', "\"\""));
    let limit_sql = limit as i64;

    db.with_conn(|conn| {
        let mut hits = Vec::new();

        let mut stmt = conn.prepare_cached(
            "SELECT p.id, p.canonical_key, p.explored, p.bugged, p.discovered_at
             FROM pages_fts JOIN pages p ON p.id = pages_fts.rowid
             WHERE pages_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        for page in stmt.query_map(params![phrase, limit_sql], page_from_row)? {
            hits.push(SearchHit::Page(page?));
        }

        let mut stmt = conn.prepare_cached(
            "SELECT alias_key, page_id FROM aliases_fts
             WHERE aliases_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let aliases = stmt.query_map(params![phrase, limit_sql], |row| {
            Ok(SearchHit::Alias {
                alias: row.get(0)?,
                page: row.get(1)?,
            })
        })?;
        for hit in aliases {
            hits.push(hit?);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT display, linker, linked FROM links_fts
             WHERE links_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let links = stmt.query_map(params![phrase, limit_sql], |row| {
            Ok(SearchHit::Link {
                display: row.get(0)?,
                linker: row.get(1)?,
                linked: row.get(2)?,
            })
        })?;
        for hit in links {
            hits.push(hit?);
        }

        hits.truncate(limit);
        Ok(hits)
    })
}
