//! Crawl scheduler integration tests. These need a real Redis instance and
//! are skipped when REDIS_URL is not set. None of them touch the network:
//! every exercised path is classified before the dispatcher runs.

use docdex::{Package, RemoteClient};
use docdex_db::Database;
use docdex_web::crawl::{self, RequestType};
use docdex_web::{App, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

async fn test_app() -> Option<Arc<App>> {
    let url = std::env::var("REDIS_URL").ok()?;
    let db = Database::new(&url, Duration::from_secs(250), false)
        .await
        .expect("connect to REDIS_URL");
    let checkout = std::env::temp_dir().join("docdex-crawl-test");
    let client = RemoteClient::new(None, checkout);
    Some(App::new(db, client, ServerConfig::default()))
}

fn make_pkg(path: &str, root: &str, name: &str, updated: i64) -> Package {
    Package {
        import_path: path.to_string(),
        project_root: root.to_string(),
        name: name.to_string(),
        synopsis: "A test package.".to_string(),
        etag: "1-webtestetag".to_string(),
        updated,
        consts: vec![docdex::Value::default()],
        ..Default::default()
    }
}

#[tokio::test]
#[serial_test::serial]
async fn blocked_paths_are_deleted_not_fetched() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let root = "example.com/webspam";
    let path = "example.com/webspam/a/b";
    app.db.put(&make_pkg(path, root, "spam", 100)).await.unwrap();
    app.db.block(root).await.unwrap();
    // Re-create the record to prove the crawl removes it again.
    app.db.put(&make_pkg(path, root, "spam", 100)).await.unwrap();

    let got = crawl::crawl_doc(&app, "test", path, None, false)
        .await
        .unwrap();
    assert!(got.is_none());
    assert!(app.db.get(path).await.unwrap().is_none());
    assert!(app.db.is_blocked(path).await.unwrap());
}

#[tokio::test]
#[serial_test::serial]
async fn standard_tree_mirrors_are_deleted() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let path = "github.com/webtest/gofork/src/pkg/encoding/json";
    let root = "github.com/webtest/gofork";
    app.db.put(&make_pkg(path, root, "json", 100)).await.unwrap();

    let got = crawl::crawl_doc(&app, "test", path, None, false)
        .await
        .unwrap();
    assert!(got.is_none());
    assert!(app.db.get(path).await.unwrap().is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn nested_project_copies_are_deleted() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let original = "github.com/webtest/original";
    app.db
        .put(&make_pkg(original, original, "original", 100))
        .await
        .unwrap();

    let copy = "example.com/webtest/vendor/github.com/webtest/original";
    app.db
        .put(&make_pkg(copy, "example.com/webtest/vendor", "original", 100))
        .await
        .unwrap();

    let got = crawl::crawl_doc(&app, "test", copy, None, false)
        .await
        .unwrap();
    assert!(got.is_none());
    assert!(app.db.get(copy).await.unwrap().is_none());
    assert!(app.db.get(original).await.unwrap().is_some());

    app.db.delete(original).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn fresh_records_are_served_without_a_crawl() {
    let app = match test_app().await {
        Some(app) => app,
        None => return,
    };
    let path = "github.com/webtest/fresh";
    let pkg = make_pkg(path, path, "fresh", chrono::Utc::now().timestamp());
    app.db.put(&pkg).await.unwrap();

    // A fresh record serves straight from the store; no fetch happens, so
    // this completes instantly even though the path is unreachable.
    let (got, _subdirs) = crawl::get_doc(&app, path, RequestType::Human)
        .await
        .unwrap();
    assert_eq!(got.unwrap().import_path, path);

    app.db.delete(path).await.unwrap();
}
