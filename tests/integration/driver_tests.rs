use crate::common::{driver_config, key, open_db, Behavior, MockSource};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wikicrawl::config::{KeyConfig, SeedEntry};
use wikicrawl::crawler::{bootstrap, DiscoveredLink, Driver, DriverReport};
use wikicrawl::storage::Edge;
use wikicrawl::{CrawlStatus, KeyRules, PageId};

fn france_seed() -> Vec<SeedEntry> {
    vec![SeedEntry {
        key: "France".to_string(),
        id: Some(1095),
    }]
}

fn rules() -> KeyRules {
    KeyRules::new(&KeyConfig::default())
}

#[tokio::test]
async fn test_crawl_explores_graph() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(&db, &france_seed()).unwrap();

    let source = MockSource::new()
        .page("France", &["Paris", "Lyon", "Catégorie:Pays"])
        .page("Paris", &["France", "Lyon"])
        .page("Lyon", &["Rhône"])
        .page("Rhône", &[])
        .alias("France", "French Republic");
    let driver = Driver::new(db.clone(), source, rules(), driver_config(4));

    let (_tx, rx) = watch::channel(false);
    let report = driver.run(rx).await.unwrap();

    assert_eq!(
        report,
        DriverReport {
            explored: 4,
            bugged: 0,
            released: 0,
            pages_created: 3,
            links_added: 5,
        }
    );

    assert!(db.frontier().is_empty().unwrap());
    assert_eq!(db.pages().count().unwrap(), 4);
    assert!(db.pages().find(&key("Catégorie:Pays")).unwrap().is_none());
    assert_eq!(
        db.aliases().resolve(&key("French Republic")).unwrap(),
        PageId(1095)
    );

    let lyon = db.pages().find(&key("Lyon")).unwrap().unwrap();
    let inbound: Vec<Edge> = db.links().inbound(lyon.id).map(|e| e.unwrap()).collect();
    assert_eq!(inbound.len(), 2);
    assert!(inbound.iter().all(|e| e.display.as_deref() == Some("Lyon")));
}

#[tokio::test]
async fn test_links_through_alias_reach_existing_page() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(&db, &france_seed()).unwrap();

    let source = MockSource::new()
        .page("France", &["Paris"])
        .page("Paris", &["French Republic"])
        .alias("France", "French Republic");
    let driver = Driver::new(db.clone(), source, rules(), driver_config(1));

    let (_tx, rx) = watch::channel(false);
    driver.run(rx).await.unwrap();

    assert_eq!(db.pages().count().unwrap(), 2);

    let paris = db.pages().find(&key("Paris")).unwrap().unwrap();
    let outbound: Vec<Edge> = db.links().outbound(paris.id).map(|e| e.unwrap()).collect();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].linked, PageId(1095));
    assert_eq!(outbound[0].display.as_deref(), Some("French Republic"));
}

#[tokio::test]
async fn test_bugged_page_recovers_on_retry() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(&db, &france_seed()).unwrap();

    let source = MockSource::new()
        .page("France", &["Lyon"])
        .behavior("Lyon", Behavior::FailTimes(1, Vec::new()));
    let driver = Driver::new(db.clone(), source, rules(), driver_config(2));

    let (_tx, rx) = watch::channel(false);
    let report = driver.run(rx.clone()).await.unwrap();
    assert_eq!(report.explored, 1);
    assert_eq!(report.bugged, 1);

    let lyon = db.pages().find(&key("Lyon")).unwrap().unwrap();
    assert_eq!(lyon.status(), CrawlStatus::Bugged);
    assert!(db.frontier().is_empty().unwrap());

    let retry = driver.retry_bugged(rx).await.unwrap();
    assert_eq!(retry.explored, 1);
    assert_eq!(retry.bugged, 0);
    assert_eq!(
        db.pages().get(lyon.id).unwrap().status(),
        CrawlStatus::Recovered
    );
}

#[tokio::test]
async fn test_pages_found_by_recovered_page_are_crawled() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(&db, &france_seed()).unwrap();

    let source = MockSource::new()
        .page("France", &["Lyon"])
        .behavior(
            "Lyon",
            Behavior::FailTimes(1, vec![DiscoveredLink::with_display("/wiki/Rhône", "Rhône")]),
        )
        .page("Rhône", &[]);
    let mut config = driver_config(2);
    config.retry_bugged = true;
    let driver = Driver::new(db.clone(), source, rules(), config);

    let (_tx, rx) = watch::channel(false);
    let report = driver.run(rx).await.unwrap();

    assert_eq!(
        report,
        DriverReport {
            explored: 3,
            bugged: 1,
            released: 0,
            pages_created: 2,
            links_added: 2,
        }
    );
    assert!(db.frontier().is_empty().unwrap());

    let rhone = db.pages().find(&key("Rhône")).unwrap().unwrap();
    assert_eq!(rhone.status(), CrawlStatus::Explored);
}

#[tokio::test]
async fn test_retry_pass_attempts_each_page_once() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(&db, &france_seed()).unwrap();

    let source = MockSource::new()
        .page("France", &["Lyon", "Nice"])
        .behavior("Lyon", Behavior::FailTimes(10, Vec::new()))
        .behavior("Nice", Behavior::FailTimes(10, Vec::new()));
    let mut config = driver_config(3);
    config.retry_bugged = true;
    let driver = Driver::new(db.clone(), source, rules(), config);

    let (_tx, rx) = watch::channel(false);
    let report = driver.run(rx).await.unwrap();

    assert_eq!(report.explored, 1);
    assert_eq!(report.bugged, 4);
    assert_eq!(db.pages().count_bugged().unwrap(), 2);
}

#[tokio::test]
async fn test_timeout_gives_page_back() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    bootstrap(
        &db,
        &[SeedEntry {
            key: "Slow".to_string(),
            id: None,
        }],
    )
    .unwrap();

    let source = MockSource::new().behavior("Slow", Behavior::Hang);
    let mut config = driver_config(1);
    config.fetch_timeout_secs = 1;
    let driver = Driver::new(db.clone(), source, rules(), config);

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let _ = tx.send(true);
    });

    let report = driver.run(rx).await.unwrap();

    assert!(report.released >= 1);
    assert_eq!(report.bugged, 0);
    assert_eq!(db.frontier().len().unwrap(), 1);
    assert_eq!(db.frontier().claimed_count().unwrap(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_in_flight_claims() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let seeds: Vec<SeedEntry> = ["a", "b", "c"]
        .iter()
        .map(|k| SeedEntry {
            key: k.to_string(),
            id: None,
        })
        .collect();
    bootstrap(&db, &seeds).unwrap();

    let source = MockSource::new()
        .behavior("a", Behavior::Hang)
        .behavior("b", Behavior::Hang)
        .behavior("c", Behavior::Hang);
    let driver = Driver::new(db.clone(), source, rules(), driver_config(2));

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = tx.send(true);
    });

    let report = driver.run(rx).await.unwrap();

    assert_eq!(report.explored, 0);
    assert_eq!(report.released, 2);
    assert_eq!(db.frontier().len().unwrap(), 3);
    assert_eq!(db.frontier().claimed_count().unwrap(), 0);
}

fn tree_source(size: usize) -> MockSource {
    let mut source = MockSource::new();
    for i in 1..=size {
        let children: Vec<String> = [2 * i, 2 * i + 1]
            .iter()
            .filter(|c| **c <= size)
            .map(|c| format!("node {}", c))
            .collect();
        let refs: Vec<&str> = children.iter().map(String::as_str).collect();
        source = source.page(&format!("node {}", i), &refs);
    }
    source
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_processes_share_one_database() {
    const SIZE: usize = 63;

    let dir = TempDir::new().unwrap();
    let first = open_db(&dir);
    let second = open_db(&dir);
    bootstrap(
        &first,
        &[SeedEntry {
            key: "node 1".to_string(),
            id: None,
        }],
    )
    .unwrap();

    let a = Driver::new(first.clone(), tree_source(SIZE), rules(), driver_config(3));
    let b = Driver::new(second.clone(), tree_source(SIZE), rules(), driver_config(3));

    let (_tx, rx) = watch::channel(false);
    let (ra, rb) = tokio::join!(a.run(rx.clone()), b.run(rx));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.explored + rb.explored, SIZE as u64);
    assert_eq!(ra.pages_created + rb.pages_created, SIZE as u64 - 1);
    assert_eq!(ra.links_added + rb.links_added, SIZE as u64 - 1);
    assert_eq!(first.pages().count_explored().unwrap(), SIZE as u64);
    assert_eq!(second.links().count().unwrap(), SIZE as u64 - 1);
}
