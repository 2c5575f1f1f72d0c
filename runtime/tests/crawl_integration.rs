//! End-to-end crawl runs against the simulated renderer.

use std::path::Path;
use std::sync::Arc;

use shelfcrawl::{
    load_tasks, Catalog, CandidateMode, CrawlError, FlattenPolicy, JsonFileStore, ProgressLedger,
    Record, RecordStore, Task, GENERIC_SUBCATEGORY,
};
use shelfcrawl_runtime::config::{CrawlConfig, SiteProfile};
use shelfcrawl_runtime::crawl::{Harvester, Orchestrator};
use shelfcrawl_runtime::progress::{self, CrawlEventKind};
use shelfcrawl_runtime::renderer::simulated::{SimulatedLauncher, SimulatedPage, SimulatedSite};
use shelfcrawl_runtime::renderer::{Launcher, NoopLauncher};

const FRUTAS: &str = "https://shop.test/frutas";
const CITRICOS: &str = "https://shop.test/frutas/citricos";
const LACTEOS: &str = "https://shop.test/lacteos";

fn config(dir: &Path) -> CrawlConfig {
    CrawlConfig {
        structure_file: dir.join("structure.json"),
        store_file: dir.join("products.json"),
        ledger_file: dir.join("done.json"),
        log_file: dir.join("crawl.log"),
        ..CrawlConfig::default()
    }
    .without_delays()
}

fn site() -> SimulatedSite {
    SimulatedSite::new()
        .page(FRUTAS, SimulatedPage::new("Frutas", 5))
        .page(CITRICOS, SimulatedPage::new("Citricos", 5))
        .page(LACTEOS, SimulatedPage::new("Lacteos", 3))
}

fn two_tasks() -> Vec<Task> {
    vec![
        Task::new("Frutas", GENERIC_SUBCATEGORY, FRUTAS),
        Task::new("Frutas", "Citricos", CITRICOS),
    ]
}

fn orchestrator(
    config: &CrawlConfig,
    launcher: Arc<dyn Launcher>,
) -> Orchestrator<JsonFileStore> {
    let catalog = Catalog::open(JsonFileStore::new(&config.store_file)).unwrap();
    let ledger = ProgressLedger::open(&config.ledger_file);
    let harvester = Harvester::new(SiteProfile::default(), CandidateMode::Lenient).unwrap();
    Orchestrator::new(config.clone(), harvester, launcher, ledger, catalog)
}

fn stored(config: &CrawlConfig) -> Vec<Record> {
    JsonFileStore::new(&config.store_file).load().unwrap()
}

fn ledger_urls(config: &CrawlConfig) -> Vec<String> {
    let raw = std::fs::read_to_string(&config.ledger_file).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_full_run_persists_records_and_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let launcher = Arc::new(SimulatedLauncher::new(site()));

    let mut orch = orchestrator(&config, launcher.clone());
    let report = orch.run(&two_tasks()).await.unwrap();

    assert_eq!(report.total_tasks, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(report.skipped, 0);
    assert!(report.failed.is_empty());
    assert_eq!(report.total_records, 10);

    let records = stored(&config);
    assert_eq!(records.len(), 10);
    let citrico = records
        .iter()
        .find(|r| r.link == "https://shop.test/citricos-1/p")
        .unwrap();
    assert_eq!(citrico.category, "Frutas");
    assert_eq!(citrico.subcategory, "Citricos");
    assert_eq!(citrico.name, "Citricos 1");
    assert!((citrico.price - 1.90).abs() < 1e-9);

    assert_eq!(ledger_urls(&config), vec![FRUTAS.to_string(), CITRICOS.to_string()]);
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(launcher.shutdown_count(), 1);
}

#[tokio::test]
async fn test_structure_file_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let structure = serde_json::json!([
        {
            "name": "Frutas",
            "url": FRUTAS,
            "subcategories": [{ "name": "Citricos", "url": CITRICOS }]
        }
    ]);
    std::fs::write(&config.structure_file, structure.to_string()).unwrap();

    let tasks = load_tasks(&config.structure_file, FlattenPolicy::AlwaysIncludeCategoryPage).unwrap();
    assert_eq!(tasks, two_tasks());

    let launcher = Arc::new(SimulatedLauncher::new(site()));
    let report = orchestrator(&config, launcher).run(&tasks).await.unwrap();

    assert_eq!(report.total_tasks, 2);
    assert_eq!(report.completed, 2);
    assert_eq!(stored(&config).len(), 10);
    assert_eq!(ledger_urls(&config), vec![FRUTAS.to_string(), CITRICOS.to_string()]);
}

#[tokio::test]
async fn test_resume_skips_done_subcategories_and_rechecks_general() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let first = Arc::new(SimulatedLauncher::new(site()));
    orchestrator(&config, first).run(&two_tasks()).await.unwrap();

    let second = Arc::new(SimulatedLauncher::new(site()));
    let mut orch = orchestrator(&config, second.clone());
    let report = orch.run(&two_tasks()).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(second.visits(), vec![FRUTAS.to_string()]);

    // Re-extracting identical products changes nothing.
    assert_eq!(report.total_records, 10);
    assert_eq!(stored(&config).len(), 10);
    assert_eq!(ledger_urls(&config).len(), 2);
}

#[tokio::test]
async fn test_navigation_failure_is_not_marked_done() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let site = site().unreachable(CITRICOS);
    let launcher = Arc::new(SimulatedLauncher::new(site));

    let mut tasks = two_tasks();
    tasks.push(Task::new("Lacteos", GENERIC_SUBCATEGORY, LACTEOS));

    let mut orch = orchestrator(&config, launcher.clone());
    let report = orch.run(&tasks).await.unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, CITRICOS);
    assert_eq!(report.total_records, 8);

    let urls = ledger_urls(&config);
    assert!(!urls.contains(&CITRICOS.to_string()));
    assert_eq!(urls, vec![FRUTAS.to_string(), LACTEOS.to_string()]);
    assert!(!orch.ledger().is_done(CITRICOS));
}

#[tokio::test]
async fn test_launch_failure_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let mut orch = orchestrator(&config, Arc::new(NoopLauncher));
    let err = orch.run(&two_tasks()).await.unwrap_err();

    assert!(matches!(err, CrawlError::Launch(_)));
    assert!(err.is_fatal());
    assert!(!config.ledger_file.exists());
}

#[tokio::test]
async fn test_engine_recycled_every_n_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig {
        recycle_every: 2,
        ..config(dir.path())
    };
    let launcher = Arc::new(SimulatedLauncher::new(site()));

    let mut tasks = two_tasks();
    tasks.push(Task::new("Lacteos", GENERIC_SUBCATEGORY, LACTEOS));

    let (tx, mut rx) = progress::channel();
    let mut orch = orchestrator(&config, launcher.clone()).with_progress("run-test", tx);
    let report = orch.run(&tasks).await.unwrap();
    drop(orch);

    assert_eq!(report.completed, 3);
    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(launcher.shutdown_count(), 2);

    let mut recycled = 0;
    let mut finished = false;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.run_id, "run-test");
        match event.event {
            CrawlEventKind::EngineRecycled { launches } => {
                recycled += 1;
                assert_eq!(launches, 1);
            }
            CrawlEventKind::RunComplete { completed, .. } => {
                finished = true;
                assert_eq!(completed, 3);
            }
            _ => {}
        }
    }
    assert_eq!(recycled, 1);
    assert!(finished);
}

#[tokio::test]
async fn test_existing_store_entries_are_updated_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let stale = serde_json::json!([
        {
            "categoria": "Frutas",
            "subcategory": "General",
            "descripcion": "Frutas 1",
            "precio": 0.5,
            "imagen": "",
            "link": "https://shop.test/frutas-1/p"
        },
        {
            "category": "Otros",
            "subcategory": "General",
            "name": "Hand-entered item",
            "price": 3.0,
            "image": "",
            "link": ""
        }
    ]);
    std::fs::write(&config.store_file, stale.to_string()).unwrap();

    let launcher = Arc::new(SimulatedLauncher::new(site()));
    let tasks = vec![Task::new("Frutas", GENERIC_SUBCATEGORY, FRUTAS)];
    let report = orchestrator(&config, launcher).run(&tasks).await.unwrap();

    assert_eq!(report.total_records, 6);
    let records = stored(&config);
    assert_eq!(records.len(), 6);
    assert_eq!(records[0].link, "https://shop.test/frutas-1/p");
    assert!((records[0].price - 1.90).abs() < 1e-9);
    assert_eq!(records[1].name, "Hand-entered item");
}
