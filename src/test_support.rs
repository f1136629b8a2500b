//! Shared fixtures for in-crate tests: an in-memory SQLite database seeded
//! with a small content catalogue, and a fully wired application over the
//! in-process counter store and a movable clock.

use crate::archive::ArchiveReader;
use crate::clock::FixedClock;
use crate::config::Config;
use crate::memory_store::MemoryCounterStore;
use crate::metrics::MetricsState;
use crate::overview::OverviewAssembler;
use crate::recorder::ViewRecorder;
use crate::rollup::RollupJobs;
use crate::sqlite_store::SqliteStore;
use crate::AppState;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;

// Stand-in for the content service's tables.
const CONTENT_FIXTURE: &[&str] = &[
    r#"CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        view_count INTEGER DEFAULT 0,
        deleted_at TEXT NULL
    )"#,
    r#"CREATE TABLE comments (
        id INTEGER PRIMARY KEY,
        post_id INTEGER NOT NULL,
        status TEXT NOT NULL
    )"#,
    r#"INSERT INTO posts (id, title, slug, status, view_count, deleted_at) VALUES
        (1, 'Hello World', 'hello-world', 'published', 10, NULL),
        (2, 'Second Post', 'second-post', 'published', 0, NULL),
        (3, 'Removed Post', 'removed-post', 'published', 5, '2024-01-01 00:00:00'),
        (4, 'Draft Post', 'draft-post', 'draft', 0, NULL)"#,
    r#"INSERT INTO comments (id, post_id, status) VALUES
        (1, 1, 'pending'),
        (2, 1, 'approved')"#,
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Every pooled connection to `sqlite::memory:` is its own database, so the
/// pool is pinned to one connection that never idles out.
pub async fn seeded_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::from_pool(pool);
    store.run_migrations().await.unwrap();

    for statement in CONTENT_FIXTURE {
        sqlx::query(statement).execute(store.pool()).await.unwrap();
    }
    store
}

pub struct Harness {
    pub counters: Arc<MemoryCounterStore>,
    pub store: SqliteStore,
    pub clock: Arc<FixedClock>,
    pub metrics: MetricsState,
    pub recorder: ViewRecorder,
    pub overview: Arc<OverviewAssembler>,
    pub rollup: Arc<RollupJobs>,
    pub archive: ArchiveReader,
    pub state: AppState,
}

impl Harness {
    pub async fn new(today: NaiveDate) -> Self {
        let counters = Arc::new(MemoryCounterStore::new());
        let store = seeded_store().await;
        let clock = Arc::new(FixedClock::new(today));
        let metrics = MetricsState::new();

        let state = AppState::new(
            &Config::test_config(),
            counters.clone(),
            store.clone(),
            clock.clone(),
            metrics.clone(),
        );

        Self {
            counters,
            store,
            clock,
            metrics,
            recorder: state.recorder.clone(),
            overview: state.overview.clone(),
            rollup: state.rollup.clone(),
            archive: state.archive.clone(),
            state,
        }
    }

    pub fn today(&self) -> NaiveDate {
        use crate::clock::Clock;
        self.clock.today()
    }
}
