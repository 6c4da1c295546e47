//! End-to-end tests against a real PostgreSQL database.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL and run with `--ignored`.

use chrono::Utc;
use lumina_client::{
    HttpRemoteStore, LocalStore, ProfileStore, RemoteStore, RetryPolicy, SyncCoordinator,
};
use lumina_engine::{ConflictPolicy, Document};
use lumina_server::config::Config;
use lumina_server::{app, db, AppState};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &str = "live-test-secret";

/// Start the server on a random port; returns its base URL.
async fn spawn_server() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = Config {
        auth_secret: Some(SECRET.into()),
        ..Config::new(database_url)
    };
    let pool = db::create_pool(&config).await.expect("database");
    db::run_migrations(&pool).await.expect("migrations");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(AppState {
        pool,
        config: Arc::new(config),
    });
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn remote(base: &str) -> HttpRemoteStore {
    HttpRemoteStore::new(
        base,
        Some(SECRET.into()),
        Duration::from_secs(5),
        RetryPolicy::default(),
    )
    .unwrap()
}

fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn upsert_then_fetch() {
    let base = spawn_server().await;
    let store = remote(&base);
    let id = unique("ada");

    let mut doc = Document::new(Utc::now());
    doc.create_profile(&id, "Ada", Some("9753".into()), Utc::now())
        .unwrap();
    doc.add_xp(&id, 650).unwrap();
    let record = doc.remote_records().unwrap().remove(0);

    store.upsert(&record).await.unwrap();
    let fetched = store.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(fetched.profile().unwrap().total_xp, 650);

    assert!(store.get_by_id(&unique("nobody")).await.unwrap().is_none());
    assert!(store
        .get_by_pin("9753")
        .await
        .unwrap()
        .iter()
        .any(|r| r.id == id));
    assert!(store.get_all().await.unwrap().iter().any(|r| r.id == id));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn wrong_key_is_not_retried() {
    let base = spawn_server().await;
    let store = HttpRemoteStore::new(&base, None, Duration::from_secs(5), RetryPolicy::default())
        .unwrap();
    let err = store.get_all().await.unwrap_err();
    assert!(!err.is_transient());
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn devices_sync_through_the_server() {
    let base = spawn_server().await;
    let id = unique("bo");
    let device = |base: &str| {
        let coordinator = SyncCoordinator::new(
            Some(Arc::new(remote(base)) as Arc<dyn RemoteStore>),
            ConflictPolicy::PreferNewer,
        );
        ProfileStore::new(LocalStore::memory(), coordinator)
    };

    let tablet = device(&base);
    tablet.create_profile(&id, "Bo", None).unwrap();
    tablet.add_xp(&id, 120).unwrap();
    assert!(tablet.sync().await.is_completed());

    let laptop = device(&base);
    assert!(laptop.fetch_profile(&id).await.unwrap().is_some());
    assert_eq!(laptop.profile(&id).unwrap().total_xp, 120);
}
