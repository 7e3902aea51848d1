use prefork_httpd::storage::{FsBackend, RecordStoreBackend, UpsertOutcome};

#[test]
fn filesystem_write_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path().join("root"));

    let outcome = backend.write("/hello.html", b"hello").unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);
    assert_eq!(backend.read("/hello.html").unwrap(), b"hello");
}

#[test]
fn filesystem_second_write_to_same_uri_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path().join("root"));

    backend.write("/a.html", b"hello").unwrap();
    let outcome = backend.write("/a.html", b"world").unwrap();
    assert_eq!(outcome, UpsertOutcome::Overwritten);
    assert_eq!(backend.read("/a.html").unwrap(), b"world");
}

#[test]
fn filesystem_write_creates_intermediate_directories() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path().join("root"));

    backend.write("/a/b/c.html", b"deep").unwrap();
    assert_eq!(backend.read("/a/b/c.html").unwrap(), b"deep");
}

#[test]
fn filesystem_read_of_unknown_uri_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path().join("root"));
    let err = backend.read("/nope.html").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn filesystem_write_rejects_paths_escaping_the_write_root() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FsBackend::new(dir.path().join("root"));
    let result = backend.write("/../../etc/passwd", b"pwned");
    assert!(result.is_err());
}

#[test]
fn record_store_first_post_inserts_second_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStoreBackend::open(dir.path().join("store")).unwrap();

    let first = store.upsert("/k", b"v1").unwrap();
    assert_eq!(first, UpsertOutcome::Inserted);
    assert_eq!(store.fetch_body("/k").unwrap().unwrap(), b"v1");

    let second = store.upsert("/k", b"v2").unwrap();
    assert_eq!(second, UpsertOutcome::Overwritten);
    assert_eq!(store.fetch_body("/k").unwrap().unwrap(), b"v2");
}

#[test]
fn record_store_survives_separate_backend_handles_to_the_same_path() {
    // Models the real multi-worker topology: each worker builds its own
    // `RecordStoreBackend` over the same on-disk path, but no handle keeps
    // the store open across calls, so two independently-constructed
    // backends can both operate on it as long as their calls don't
    // overlap in time.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store");

    let worker_a = RecordStoreBackend::open(&path).unwrap();
    assert_eq!(worker_a.upsert("/k", b"from-a").unwrap(), UpsertOutcome::Inserted);
    drop(worker_a);

    let worker_b = RecordStoreBackend::open(&path).unwrap();
    assert_eq!(worker_b.fetch_body("/k").unwrap().unwrap(), b"from-a");
    assert_eq!(worker_b.upsert("/k", b"from-b").unwrap(), UpsertOutcome::Overwritten);
    drop(worker_b);

    let worker_c = RecordStoreBackend::open(&path).unwrap();
    assert_eq!(worker_c.fetch_body("/k").unwrap().unwrap(), b"from-b");
}

#[test]
fn record_store_fetch_of_unknown_key_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStoreBackend::open(dir.path().join("store")).unwrap();
    assert!(store.fetch_body("/nope").unwrap().is_none());
    assert!(store.last_modified("/nope").unwrap().is_none());
}

#[test]
fn record_store_last_modified_advances_across_upserts() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStoreBackend::open(dir.path().join("store")).unwrap();

    store.upsert("/k", b"v1").unwrap();
    let first_ts = store.last_modified("/k").unwrap().unwrap();

    std::thread::sleep(std::time::Duration::from_secs(1));
    store.upsert("/k", b"v2").unwrap();
    let second_ts = store.last_modified("/k").unwrap().unwrap();

    assert!(second_ts >= first_ts);
}
