//! State module for tracking crawl progress
//!
//! Pages persist two flags, `explored` and `bugged`; [`CrawlStatus`] is the
//! typed view over that pair.

mod crawl_status;

pub use crawl_status::CrawlStatus;
