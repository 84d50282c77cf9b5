//! End-to-end runs against a temporary output root

mod support;

use std::fs;

use scifetch_core::ProgressContext;
use scifetch_ledger::{ControlLog, EngineConfig, Status, plan, run};
use tempfile::TempDir;

use support::{Behavior, FakeFetcher, article, doi_batch, metadata_batch};

fn hidden() -> ProgressContext {
    ProgressContext::hidden()
}

#[test]
fn second_run_makes_no_fetch_attempts() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = metadata_batch(vec![
        article(1, "First paper", 2020, Some("10.1/a")),
        article(2, "Second paper", 2021, Some("10.1/b")),
    ]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf);

    let first = run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert_eq!(first.attempted, 2);
    assert_eq!(first.downloaded(), 2);
    assert!(dir.path().join("Article/2020.First paper.pdf").is_file());
    assert!(dir.path().join("Article/2021.Second paper.pdf").is_file());

    fetcher.reset();
    let second = run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert!(fetcher.calls().is_empty());
    assert_eq!(second.attempted, 0);
    assert_eq!(second.downloaded(), 2);
}

#[test]
fn record_without_doi_is_never_fetched() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = metadata_batch(vec![
        article(1, "Has DOI", 2020, Some("10.1/a")),
        article(2, "No DOI", 2020, None),
    ]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf);

    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();

    assert_eq!(fetcher.calls(), vec!["10.1/a".to_string()]);
    assert_eq!(summary.non_existent.len(), 1);
    assert!(summary.non_existent.contains_key(&2));
    assert_eq!(summary.downloaded(), 1);
}

#[test]
fn doi_mode_repeat_failure_logged_once() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::new(dir.path());
    config.compact_control_log = false;
    let batch = doi_batch(&[Some("10.1/missing")]);
    let fetcher = FakeFetcher::new(Behavior::Fail);

    for _ in 0..2 {
        let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();
        assert_eq!(summary.not_available.len(), 1);
    }

    // NotAvailable is retried every run
    assert_eq!(fetcher.calls().len(), 2);
    let text = fs::read_to_string(config.control_log_path()).unwrap();
    assert_eq!(text, "Index\tStatus\n10.1/missing\tNot available\n");
}

#[test]
fn doi_mode_recovers_after_failure() {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::new(dir.path());
    config.compact_control_log = false;
    let batch = doi_batch(&[Some("10.1/late")]);

    run(&config, &batch, &FakeFetcher::new(Behavior::Fail), &hidden()).unwrap();
    let summary = run(&config, &batch, &FakeFetcher::new(Behavior::ValidPdf), &hidden()).unwrap();

    assert_eq!(summary.downloaded(), 1);
    assert!(dir.path().join("Papers/10.1%2Flate.pdf").is_file());
    let statuses = ControlLog::new(config.control_log_path()).read().unwrap();
    assert_eq!(statuses.get("10.1/late"), Some(Status::Ok));
}

#[test]
fn doi_mode_compacts_control_log() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let log = ControlLog::new(config.control_log_path());
    log.append("10.1/b", Status::NotAvailable).unwrap();

    let batch = doi_batch(&[Some("10.1/b"), None, Some("10.1/a")]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf);
    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();

    assert_eq!(summary.downloaded(), 2);
    assert_eq!(
        fs::read_to_string(log.path()).unwrap(),
        "Index\tStatus\n\tNon-existent\n10.1/a\tOk\n10.1/b\tOk\n"
    );

    // Second run: everything terminal, nothing fetched
    fetcher.reset();
    run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert!(fetcher.calls().is_empty());
}

#[test]
fn corrupt_download_deleted_and_not_available() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = metadata_batch(vec![article(1, "Paywalled", 2019, Some("10.1/pw"))]);
    let fetcher = FakeFetcher::new(Behavior::Garbage);

    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();

    assert_eq!(summary.not_available.len(), 1);
    assert_eq!(summary.downloaded(), 0);
    assert!(!dir.path().join("Article/2019.Paywalled.pdf").exists());

    // Nothing on disk, so the next run tries again
    fetcher.reset();
    run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert_eq!(fetcher.calls().len(), 1);
}

#[test]
fn deleted_artifact_is_fetched_again() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = metadata_batch(vec![article(1, "Fragile", 2022, Some("10.1/f"))]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf);

    run(&config, &batch, &fetcher, &hidden()).unwrap();
    let artifact = dir.path().join("Article/2022.Fragile.pdf");
    fs::remove_file(&artifact).unwrap();

    fetcher.reset();
    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert_eq!(fetcher.calls(), vec!["10.1/f".to_string()]);
    assert_eq!(summary.downloaded(), 1);
    assert!(artifact.is_file());
}

#[test]
fn orphans_from_previous_batches_pruned() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let stale = dir.path().join("Article/1999.Dropped from the batch.pdf");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"old").unwrap();
    let unrelated = dir.path().join("Notes/keep.txt");
    fs::create_dir_all(unrelated.parent().unwrap()).unwrap();
    fs::write(&unrelated, b"mine").unwrap();

    let batch = metadata_batch(vec![article(1, "Kept", 2020, Some("10.1/k"))]);
    run(&config, &batch, &FakeFetcher::new(Behavior::ValidPdf), &hidden()).unwrap();

    assert!(!stale.exists());
    assert!(unrelated.is_file());
    assert!(dir.path().join("Article/2020.Kept.pdf").is_file());
}

#[test]
fn per_record_failures_do_not_abort_the_run() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = doi_batch(&[Some("10.1/a"), Some("10.1/b"), Some("10.1/c")]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf)
        .with("10.1/b", Behavior::Fail)
        .with("10.1/c", Behavior::Garbage);

    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();

    assert_eq!(summary.analyzed(), 3);
    assert_eq!(summary.downloaded(), 1);
    assert_eq!(summary.not_available.len(), 2);
    assert!(!summary.interrupted);
}

#[test]
fn summary_artifacts_written() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = doi_batch(&[Some("10.1/a"), None]);

    run(&config, &batch, &FakeFetcher::new(Behavior::ValidPdf), &hidden()).unwrap();

    assert_eq!(
        fs::read_to_string(config.summary_path()).unwrap(),
        "Item,DOI,Download\n1,10.1/a,Ok\n2,,Non-existent\n"
    );
    assert!(config.summary_xlsx_path().is_file());
}

#[test]
fn plan_reflects_previous_run() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = metadata_batch(vec![
        article(1, "Got it", 2020, Some("10.1/a")),
        article(2, "Missing", 2020, Some("10.1/b")),
    ]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf).with("10.1/b", Behavior::Fail);
    run(&config, &batch, &fetcher, &hidden()).unwrap();

    let plan = plan(&config, &batch).unwrap();
    assert_eq!(plan.ok, 1);
    // Metadata mode keeps no failure record: the file is simply absent
    assert_eq!(plan.pending, 1);
    assert_eq!(plan.to_fetch(), 1);
}

#[test]
fn similar_dois_keep_separate_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let batch = doi_batch(&[Some("10.1/a:b"), Some("10.1/a/b")]);
    let fetcher = FakeFetcher::new(Behavior::ValidPdf).with("10.1/a/b", Behavior::Fail);

    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();

    assert_eq!(summary.downloaded(), 1);
    assert!(dir.path().join("Papers/10.1%2Fa%3Ab.pdf").is_file());
    assert!(!dir.path().join("Papers/10.1%2Fa%2Fb.pdf").exists());
    let statuses = ControlLog::new(config.control_log_path()).read().unwrap();
    assert_eq!(statuses.get("10.1/a:b"), Some(Status::Ok));
    assert_eq!(statuses.get("10.1/a/b"), Some(Status::NotAvailable));

    // The failed DOI succeeds later without touching the other file
    let summary = run(&config, &batch, &FakeFetcher::new(Behavior::ValidPdf), &hidden()).unwrap();
    assert_eq!(summary.attempted, 1);
    assert_eq!(fs::read_dir(dir.path().join("Papers")).unwrap().count(), 2);
}

#[test]
fn hostile_document_type_stays_under_output_root() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("out");
    let config = EngineConfig::new(&root);
    let mut dotted = article(1, "Dotted", 2020, Some("10.1/a"));
    dotted.document_type = Some("..".to_string());
    let mut staged = article(2, "Staged", 2020, Some("10.1/b"));
    staged.document_type = Some(".staging".to_string());
    let mut absolute = article(3, "Absolute", 2020, Some("10.1/c"));
    absolute.document_type = Some("/tmp".to_string());
    let batch = metadata_batch(vec![dotted, staged, absolute]);

    let fetcher = FakeFetcher::new(Behavior::ValidPdf);
    let summary = run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert_eq!(summary.downloaded(), 3);
    assert!(root.join("Unknown Type/2020.Dotted.pdf").is_file());
    assert!(root.join("staging/2020.Staged.pdf").is_file());
    assert!(root.join("tmp/2020.Absolute.pdf").is_file());

    fetcher.reset();
    let again = run(&config, &batch, &fetcher, &hidden()).unwrap();
    assert!(fetcher.calls().is_empty());
    assert_eq!(again.downloaded(), 3);
}
