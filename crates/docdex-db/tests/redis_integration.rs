//! Store integration tests. These need a real Redis instance and are skipped
//! when REDIS_URL is not set so local runs stay fast.

use docdex::Package;
use docdex_db::Database;
use std::time::Duration;

async fn test_db() -> Option<Database> {
    let url = match std::env::var("REDIS_URL") {
        Ok(url) => url,
        Err(_) => return None,
    };
    Some(
        Database::new(&url, Duration::from_secs(250), false)
            .await
            .expect("connect to REDIS_URL"),
    )
}

fn make_pkg(path: &str, root: &str, name: &str, synopsis: &str, updated: i64) -> Package {
    Package {
        import_path: path.to_string(),
        project_root: root.to_string(),
        project_name: root.rsplit('/').next().unwrap_or(root).to_string(),
        name: name.to_string(),
        synopsis: synopsis.to_string(),
        etag: "1-testetag".to_string(),
        updated,
        consts: vec![docdex::Value::default()],
        ..Default::default()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[tokio::test]
#[serial_test::serial]
async fn put_get_delete_roundtrip() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let path = "example.com/dbtest/roundtrip";
    let pkg = make_pkg(path, "example.com/dbtest", "roundtrip", "A test package.", now());

    db.put(&pkg).await.unwrap();
    assert!(db.exists(path).await.unwrap());

    let (got, last_crawl) = db.get(path).await.unwrap().expect("record");
    assert_eq!(got.import_path, path);
    assert_eq!(got.name, "roundtrip");
    assert_eq!(got.synopsis, "A test package.");
    assert_eq!(got.etag, "1-testetag");
    assert!(!got.truncated);
    assert!(last_crawl > 0);

    db.delete(path).await.unwrap();
    assert!(!db.exists(path).await.unwrap());
    assert!(db.get(path).await.unwrap().is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn index_membership_follows_put_and_delete() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let path = "example.com/dbtest/indexer";
    let root = "example.com/dbtest";

    let pkg = make_pkg(path, root, "zqfirstword", "First.", now());
    db.put(&pkg).await.unwrap();
    let hits = db.query("zqfirstword").await.unwrap();
    assert!(hits.iter().any(|p| p.path == path), "term should match after put");

    // Replacing the record swaps its term memberships atomically.
    let pkg = make_pkg(path, root, "zqsecondword", "Second.", now());
    db.put(&pkg).await.unwrap();
    let hits = db.query("zqfirstword").await.unwrap();
    assert!(!hits.iter().any(|p| p.path == path), "stale term survived a put");
    let hits = db.query("zqsecondword").await.unwrap();
    assert!(hits.iter().any(|p| p.path == path));

    db.delete(path).await.unwrap();
    let hits = db.query("zqsecondword").await.unwrap();
    assert!(!hits.iter().any(|p| p.path == path), "term survived a delete");
}

#[tokio::test]
#[serial_test::serial]
async fn query_intersects_all_terms() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/dbtest";
    let a = make_pkg("example.com/dbtest/aa", root, "zqshared", "One.", now());
    let mut b = make_pkg("example.com/dbtest/bb", root, "zqshared", "Two.", now());
    b.imports = vec!["example.com/dbtest/zqdep".to_string()];

    db.put(&a).await.unwrap();
    db.put(&b).await.unwrap();

    let hits = db.query("zqshared").await.unwrap();
    assert!(hits.iter().any(|p| p.path == a.import_path));
    assert!(hits.iter().any(|p| p.path == b.import_path));

    let hits = db
        .query("zqshared import:example.com/dbtest/zqdep")
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path, b.import_path);

    let hits = db.query("zqshared zqnosuchterm").await.unwrap();
    assert!(hits.is_empty());

    db.delete(&a.import_path).await.unwrap();
    db.delete(&b.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn all_query_lists_named_packages() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let named = make_pkg(
        "example.com/dbtest/named",
        "example.com/dbtest",
        "zqnamed",
        "Named.",
        now(),
    );
    let mut dir = make_pkg(
        "example.com/dbtest/dir",
        "example.com/dbtest",
        "",
        "",
        now(),
    );
    dir.consts.clear();

    db.put(&named).await.unwrap();
    db.put(&dir).await.unwrap();

    let all = db.query("all:").await.unwrap();
    assert!(all.iter().any(|p| p.path == named.import_path));
    assert!(!all.iter().any(|p| p.path == dir.import_path));

    db.delete(&named.import_path).await.unwrap();
    db.delete(&dir.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn standard_package_wins_exact_name_query() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    // Standard-library packages have an empty project root and rank 3.
    let std_pkg = make_pkg("encoding/json", "", "json", "Package json encodes JSON.", now());
    let other = make_pkg(
        "example.com/dbtest/json",
        "example.com/dbtest",
        "json",
        "Another json package.",
        now(),
    );

    db.put(&std_pkg).await.unwrap();
    db.put(&other).await.unwrap();

    let hits = db.query("json").await.unwrap();
    assert!(hits.len() >= 2);
    assert_eq!(hits[0].path, "encoding/json");

    db.delete(&std_pkg.import_path).await.unwrap();
    db.delete(&other.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn blocking_removes_root_and_descendants() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/spamtest";
    let child = make_pkg(
        "example.com/spamtest/a/b",
        root,
        "spam",
        "Spam.",
        now(),
    );
    db.put(&child).await.unwrap();

    db.block(root).await.unwrap();
    assert!(db.is_blocked("example.com/spamtest/a/b").await.unwrap());
    assert!(db.is_blocked(root).await.unwrap());
    assert!(!db.is_blocked("example.com/spamtestother").await.unwrap());
    assert!(
        db.get("example.com/spamtest/a/b").await.unwrap().is_none(),
        "descendants must be deleted by block"
    );
}

#[tokio::test]
#[serial_test::serial]
async fn background_crawl_picks_the_oldest() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/crawltest";
    let older = make_pkg("example.com/crawltest/older", root, "older", "Old.", 100);
    let newer = make_pkg("example.com/crawltest/newer", root, "newer", "New.", 200);
    db.put(&older).await.unwrap();
    db.put(&newer).await.unwrap();

    let (got, crawl) = db.get("-").await.unwrap().expect("oldest record");
    assert_eq!(got.import_path, older.import_path);
    assert_eq!(crawl, 100);

    // Touching the oldest advances the queue to the next record.
    db.touch(root, &older.import_path, "unmatched-etag").await.unwrap();
    let (got, _) = db.get("-").await.unwrap().expect("next oldest");
    assert_eq!(got.import_path, newer.import_path);

    db.delete(&older.import_path).await.unwrap();
    db.delete(&newer.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn touch_freshens_project_siblings_with_matching_etag() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/touchtest";
    let a = make_pkg("example.com/touchtest/a", root, "a", "A.", 100);
    let b = make_pkg("example.com/touchtest/b", root, "b", "B.", 101);
    let mut c = make_pkg("example.com/touchtest/c", root, "c", "C.", 102);
    c.etag = "1-otheretag".to_string();

    db.put(&a).await.unwrap();
    db.put(&b).await.unwrap();
    db.put(&c).await.unwrap();

    // a and b share the head revision; c does not and stays due.
    db.touch(root, &a.import_path, "1-testetag").await.unwrap();
    let (got, _) = db.get("-").await.unwrap().expect("record");
    assert_eq!(got.import_path, c.import_path);

    db.delete(&a.import_path).await.unwrap();
    db.delete(&b.import_path).await.unwrap();
    db.delete(&c.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn subdirs_and_listings() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/subtest/repo";
    let parent = make_pkg(root, root, "repo", "Root.", now());
    let child = make_pkg(
        "example.com/subtest/repo/child",
        root,
        "child",
        "Child.",
        now(),
    );
    db.put(&parent).await.unwrap();
    db.put(&child).await.unwrap();

    let subs = db.subdirs(root, Some(&parent)).await.unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].path, child.import_path);
    assert_eq!(subs[0].synopsis, "Child.");

    // Without a package in hand the ancestor walk still finds the project.
    let subs = db.subdirs(root, None).await.unwrap();
    assert_eq!(subs.len(), 1);

    let listing = db.project(root).await.unwrap();
    let paths: Vec<&str> = listing.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, vec![root, "example.com/subtest/repo/child"]);

    db.delete(&parent.import_path).await.unwrap();
    db.delete(&child.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn importers_are_tracked() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let dep = "example.com/imptest/dep";
    let mut user = make_pkg(
        "example.com/imptest/user",
        "example.com/imptest",
        "user",
        "Uses dep.",
        now(),
    );
    user.imports = vec![dep.to_string()];
    db.put(&user).await.unwrap();

    assert_eq!(db.importer_count(dep).await.unwrap(), 1);
    let importers = db.importers(dep).await.unwrap();
    assert_eq!(importers.len(), 1);
    assert_eq!(importers[0].path, user.import_path);

    db.delete(&user.import_path).await.unwrap();
    assert_eq!(db.importer_count(dep).await.unwrap(), 0);
}

#[tokio::test]
#[serial_test::serial]
async fn import_graph_walks_transitively() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let root = "example.com/graphtest";
    let mut a = make_pkg("example.com/graphtest/a", root, "a", "A.", now());
    let mut b = make_pkg("example.com/graphtest/b", root, "b", "B.", now());
    let c = make_pkg("example.com/graphtest/c", root, "c", "C.", now());
    a.imports = vec![b.import_path.clone()];
    b.imports = vec![c.import_path.clone()];

    db.put(&a).await.unwrap();
    db.put(&b).await.unwrap();
    db.put(&c).await.unwrap();

    let (nodes, edges) = db.import_graph(&a).await.unwrap();
    let paths: Vec<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "example.com/graphtest/a",
            "example.com/graphtest/b",
            "example.com/graphtest/c"
        ]
    );
    assert_eq!(edges, vec![(0, 1), (1, 2)]);
    assert_eq!(nodes[1].synopsis, "B.");

    db.delete(&a.import_path).await.unwrap();
    db.delete(&b.import_path).await.unwrap();
    db.delete(&c.import_path).await.unwrap();
}

#[tokio::test]
#[serial_test::serial]
async fn oversized_documents_are_truncated() {
    let db = match test_db().await {
        Some(db) => db,
        None => return,
    };
    let path = "example.com/dbtest/huge";
    let mut pkg = make_pkg(path, "example.com/dbtest", "huge", "Huge.", now());
    let big_text = "x".repeat(4_000);
    for i in 0..300 {
        pkg.funcs.push(docdex::Func {
            name: format!("F{}", i),
            decl: docdex::Code {
                text: big_text.clone(),
                ..Default::default()
            },
            ..Default::default()
        });
    }

    db.put(&pkg).await.unwrap();
    let (got, _) = db.get(path).await.unwrap().expect("record");
    assert!(got.truncated, "oversized blob should be truncated");
    assert!(got.funcs.is_empty(), "declarations are dropped when truncated");
    assert_eq!(got.name, "huge");

    db.delete(path).await.unwrap();
}
