mod common;

use simdeck::{
    Error,
    archive::{NewRun, ResultArchive},
    report::{BlobSummary, Outcome},
};

fn archive_one(archive: &ResultArchive, player: &str, net: f64) -> String {
    let doc = common::result_doc(player, net);
    archive
        .archive(
            "job-1",
            doc.as_bytes(),
            NewRun::from_config(&common::run_config(player)),
        )
        .unwrap()
}

#[test]
fn archive_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let archive = ResultArchive::new(dir.path().join("results"));

    let first = archive_one(&archive, "Alice", 150.0);
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = archive_one(&archive, "Bob", -40.0);
    assert_ne!(first, second);

    let listed = archive.list().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].metadata.run_id, second, "most recent first");
    assert_eq!(
        listed[0].summary,
        BlobSummary::Available {
            final_bankroll: 960.0,
            net_gain_loss: -40.0,
            outcome: Outcome::Loss
        }
    );
    assert!(matches!(
        listed[1].summary,
        BlobSummary::Available {
            outcome: Outcome::Win,
            ..
        }
    ));
    assert_eq!(listed[1].metadata.config.playing_strategy, "s17_basic_strategy");
    assert_eq!(listed[1].metadata.config.config_sha256.len(), 64);

    let stored = archive.load_result(&first).unwrap();
    assert_eq!(stored["players"]["Alice"]["Net Gain/Loss"], 150.0);

    let blob = dir
        .path()
        .join("results")
        .join(&archive.get(&first).unwrap().results_file);
    assert!(blob.exists());

    archive.delete(&first).unwrap();
    assert!(!blob.exists());
    let remaining: Vec<String> = archive
        .list()
        .unwrap()
        .into_iter()
        .map(|e| e.metadata.run_id)
        .collect();
    assert_eq!(remaining, vec![second]);

    // Second delete: the blob step is a no-op, the record is gone.
    assert!(matches!(archive.delete(&first), Err(Error::NotFound(_))));
}

#[test]
fn missing_or_corrupt_blobs_degrade_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let archive = ResultArchive::new(dir.path());

    let gone = archive_one(&archive, "Alice", 10.0);
    let meta = archive.get(&gone).unwrap();
    std::fs::remove_file(dir.path().join(&meta.results_file)).unwrap();

    let corrupt = archive_one(&archive, "Bob", 10.0);
    let meta = archive.get(&corrupt).unwrap();
    std::fs::write(dir.path().join(&meta.results_file), "{not json").unwrap();

    let listed = archive.list().unwrap();
    assert_eq!(listed.len(), 2);
    for entry in &listed {
        assert!(matches!(entry.summary, BlobSummary::Unavailable { .. }));
    }
    assert!(matches!(archive.load_result(&gone), Err(Error::NotFound(_))));

    // Deleting a run whose blob is already gone still removes the record.
    archive.delete(&gone).unwrap();
    assert_eq!(archive.list().unwrap().len(), 1);
}

#[test]
fn metadata_failure_keeps_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let archive = ResultArchive::new(dir.path());
    // A plain file where the metadata directory should be.
    std::fs::write(dir.path().join("runs"), "").unwrap();

    let doc = common::result_doc("Alice", 5.0);
    let err = archive
        .archive(
            "job-1",
            doc.as_bytes(),
            NewRun::from_config(&common::run_config("Alice")),
        )
        .unwrap_err();
    let Error::Persistence { run_id, blob, .. } = err else {
        panic!("expected persistence error, got {err:?}");
    };
    assert!(blob.exists());
    assert_eq!(std::fs::read_to_string(&blob).unwrap(), doc);
    assert!(blob.ends_with(format!("results_{run_id}.json")));
}

#[test]
fn clear_and_bad_ids() {
    let dir = tempfile::tempdir().unwrap();
    let archive = ResultArchive::new(dir.path());
    archive_one(&archive, "Alice", 1.0);
    archive_one(&archive, "Alice", 2.0);
    assert_eq!(archive.clear().unwrap(), 2);
    assert!(archive.list().unwrap().is_empty());
    assert_eq!(archive.clear().unwrap(), 0);

    assert!(matches!(archive.delete("../runs"), Err(Error::InvalidName(_))));
    assert!(matches!(
        archive.get("5f0c3c52-8d0a-4a43-9a43-0d4b1b1e2f00"),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn records_cannot_point_outside_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("results");
    let archive = ResultArchive::new(&root);
    let run_id = archive_one(&archive, "Alice", 3.0);

    let outside = dir.path().join("keep_me.json");
    std::fs::write(&outside, "{}").unwrap();
    let meta_path = root.join("runs").join(format!("{run_id}.json"));
    let mut meta: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
    meta["results_file"] = serde_json::json!("../keep_me.json");
    std::fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();

    assert!(matches!(archive.get(&run_id), Err(Error::InvalidName(_))));
    assert!(matches!(archive.load_result(&run_id), Err(Error::InvalidName(_))));
    assert!(archive.list().unwrap().is_empty());

    archive.delete(&run_id).unwrap();
    assert!(outside.exists());
    assert!(!meta_path.exists());
    assert!(!root.join(format!("results_{run_id}.json")).exists());
}
