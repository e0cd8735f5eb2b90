use crate::common::{key, open_db};
use std::collections::HashSet;
use std::time::Duration;
use tempfile::TempDir;
use wikicrawl::config::{load_config, EdgeIdentity, FrontierConfig, StoreConfig};
use wikicrawl::crawler::bootstrap;
use wikicrawl::query::{load_statistics, search, shortest_path, SearchHit};
use wikicrawl::storage::{EdgeOutcome, StoreError};
use wikicrawl::{CrawlStatus, Database, PageId};

#[test]
fn test_config_file_drives_store() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("crawl.db");
    let config_path = dir.path().join("wikicrawl.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[store]
database-path = '{}'
edge-identity = "pair-plus-display"

[driver]
workers = 2

[[seed]]
key = "France"
id = 1095
"#,
            db_path.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.driver.workers, 2);

    let db = Database::open_with_config(&config).unwrap();
    assert_eq!(db.edge_identity(), EdgeIdentity::PairPlusDisplay);

    let seeds = bootstrap(&db, &config.seed).unwrap();
    assert_eq!(seeds, vec![PageId(1095)]);

    let paris = db.pages().upsert(&key("Paris")).unwrap().id;
    db.links().add_edge(seeds[0], paris, Some("Paris")).unwrap();
    db.links().add_edge(seeds[0], paris, Some("capitale")).unwrap();
    assert_eq!(db.links().count().unwrap(), 2);
    drop(db);

    let mut pair_only = config.clone();
    pair_only.store.edge_identity = EdgeIdentity::PairOnly;
    assert!(matches!(
        Database::open_with_config(&pair_only),
        Err(StoreError::SchemaMismatch(_))
    ));
}

#[test]
fn test_france_scenario() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);

    let france = db.pages().upsert_with_id(&key("France"), PageId(1095)).unwrap();
    assert!(france.created);
    assert_eq!(db.frontier().list(10).unwrap()[0].id, PageId(1095));

    db.aliases()
        .add_alias(&key("French Republic"), PageId(1095))
        .unwrap();
    assert_eq!(
        db.aliases().resolve(&key("French Republic")).unwrap(),
        PageId(1095)
    );

    let paris = db.pages().upsert(&key("Paris")).unwrap().id;
    assert!(matches!(
        db.aliases().add_alias(&key("French Republic"), paris),
        Err(StoreError::Conflict { .. })
    ));

    assert_eq!(
        db.links().add_edge(PageId(1095), paris, Some("Paris")).unwrap(),
        EdgeOutcome::Inserted
    );
    assert!(matches!(
        db.links().add_edge(PageId(1095), PageId(5), None),
        Err(StoreError::DanglingReference(PageId(5)))
    ));
    assert_eq!(db.links().count().unwrap(), 1);

    db.pages().mark_explored(PageId(1095)).unwrap();
    let listed: Vec<_> = db.frontier().list(10).unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(listed, vec![paris]);

    let path = shortest_path(&db, PageId(1095), paris, 3).unwrap().unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path[1].via.as_deref(), Some("Paris"));

    let hits = search(&db, "french republic", 5).unwrap();
    assert_eq!(
        hits,
        vec![SearchHit::Alias {
            alias: "french republic".to_string(),
            page: PageId(1095),
        }]
    );

    let stats = load_statistics(&db).unwrap();
    assert_eq!(stats.total_pages, 2);
    assert_eq!(stats.explored, 1);
    assert_eq!(stats.frontier, 1);

    db.frontier().mark_bugged(PageId(1095)).unwrap();
    assert_eq!(
        db.pages().get(PageId(1095)).unwrap().status(),
        CrawlStatus::Recovered
    );
    let listed: Vec<_> = db.frontier().list(10).unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(listed, vec![paris]);
    assert!(db.frontier().next_bugged(10).unwrap().is_empty());
    let claimed: Vec<_> = db.frontier().next(10).unwrap().into_iter().map(|c| c.page_id).collect();
    assert_eq!(claimed, vec![paris]);
}

#[test]
fn test_concurrent_upserts_across_handles() {
    let dir = TempDir::new().unwrap();
    let handles: Vec<Database> = (0..4).map(|_| open_db(&dir)).collect();

    let threads: Vec<_> = handles
        .iter()
        .cloned()
        .map(|db| {
            std::thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        db.pages()
                            .upsert(&key(&format!("page {}", i)))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<PageId>>()
            })
        })
        .collect();

    let results: Vec<Vec<PageId>> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    assert!(results.iter().all(|ids| ids == &results[0]));
    assert_eq!(handles[0].pages().count().unwrap(), 50);
}

#[test]
fn test_no_double_dispatch_across_handles() {
    let dir = TempDir::new().unwrap();
    let seed_db = open_db(&dir);
    for i in 0..100 {
        seed_db.pages().upsert(&key(&format!("page {}", i))).unwrap();
    }

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let db = open_db(&dir);
            std::thread::spawn(move || {
                let frontier = db.frontier();
                let mut claimed = Vec::new();
                loop {
                    let batch = frontier.next(3).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch.into_iter().map(|c| c.page_id));
                }
                claimed
            })
        })
        .collect();

    let all: Vec<PageId> = threads
        .into_iter()
        .flat_map(|t| t.join().unwrap())
        .collect();
    let unique: HashSet<PageId> = all.iter().copied().collect();

    assert_eq!(all.len(), 100);
    assert_eq!(unique.len(), 100);
}

#[test]
fn test_expired_claims_recovered_after_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crawl.db");
    let frontier_config = FrontierConfig {
        claim_lease_secs: 1,
    };

    let page = {
        let db = Database::open(&path, &StoreConfig::default(), &frontier_config).unwrap();
        db.pages().upsert(&key("Orphan")).unwrap();
        db.frontier().next(1).unwrap().remove(0).page_id
    };

    let db = Database::open(&path, &StoreConfig::default(), &frontier_config).unwrap();
    assert!(db.frontier().next(1).unwrap().is_empty());

    std::thread::sleep(Duration::from_millis(1100));
    assert_eq!(db.frontier().release_expired().unwrap(), 1);

    let claims = db.frontier().next(1).unwrap();
    assert_eq!(claims[0].page_id, page);
}
