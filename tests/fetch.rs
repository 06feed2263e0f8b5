//! Fetch engine behaviour through the public `Fetcher` operations.

mod common;

use common::{DOCS_URL, MemoryHost, REPO, TestEnv, list_files};
use gitslice::{ChannelReporter, FetchError, FinishState, ProgressEvent, ResumeOptions};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_fetches_exactly_the_subpath() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));

    let result = env.fetcher(&host).fetch_folder(DOCS_URL, &env.dest).unwrap();

    assert_eq!(result.succeeded, 3);
    assert_eq!(result.failed, 0);
    assert!(!result.is_empty);
    assert_eq!(
        list_files(&env.dest),
        vec!["guide/deep/more.md", "guide/start.md", "index.md"]
    );
    assert_eq!(
        std::fs::read_to_string(env.dest.join("guide/start.md")).unwrap(),
        "start here"
    );
    assert_eq!(
        host.file_requests(),
        vec!["docs/guide/deep/more.md", "docs/guide/start.md", "docs/index.md"]
    );
}

#[test]
fn test_whole_repository_when_no_subpath() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));

    let result = env
        .fetcher(&host)
        .fetch_folder("https://github.com/o/r", &env.dest)
        .unwrap();

    assert_eq!(result.succeeded, REPO.len());
    assert!(env.dest.join("docs2/readme").is_file());
    assert!(env.dest.join("src/lib.rs").is_file());
}

#[test]
fn test_empty_repository_is_empty_success() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(&[]));

    let result = env
        .fetcher(&host)
        .fetch_folder_resumable("https://github.com/o/r", &env.dest, ResumeOptions::default())
        .unwrap();

    assert!(result.is_empty);
    assert!(result.is_success());
    assert_eq!(result.succeeded, 0);
    assert!(list_files(&env.dest).is_empty());
    assert_eq!(env.record_count(), 0);
}

#[test]
fn test_partial_failure_is_reported_not_hidden() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));
    host.fail_path("docs/guide/start.md");

    let result = env.fetcher(&host).fetch_folder(DOCS_URL, &env.dest).unwrap();

    assert_eq!(result.succeeded, 2);
    assert_eq!(result.failed, 1);
    assert!(!result.is_success());
    assert_eq!(result.failures[0].relative_path, "guide/start.md");
    assert!(result.failures[0].error.contains("502"));
    assert!(!env.dest.join("guide/start.md").exists());
    assert!(matches!(
        result.ensure_complete(),
        Err(FetchError::PartialFailure {
            succeeded: 2,
            failed: 1
        })
    ));
}

#[test]
fn test_nothing_succeeding_is_total_failure() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));
    for (path, _) in REPO {
        host.fail_path(path);
    }

    let result = env.fetcher(&host).fetch_folder(DOCS_URL, &env.dest);
    assert!(matches!(result, Err(FetchError::TotalFailure { attempted: 3 })));
}

#[test]
fn test_missing_subpath_is_not_found() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));

    let result = env
        .fetcher(&host)
        .fetch_folder("https://github.com/o/r/tree/main/nope", &env.dest);
    assert!(matches!(result, Err(FetchError::NotFound(_))));
    assert!(!env.dest.exists());
}

#[test]
fn test_invalid_location_makes_no_calls() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));

    let result = env
        .fetcher(&host)
        .fetch_folder_resumable("https://github.com/only-owner", &env.dest, ResumeOptions::default());
    assert!(matches!(result, Err(FetchError::InvalidLocation { .. })));
    assert_eq!(host.total_requests(), 0);
    assert_eq!(env.record_count(), 0);
}

#[test]
fn test_worker_pool_respects_configured_width() {
    let env = TestEnv::new();
    let names: Vec<String> = (0..30).map(|i| format!("bulk/f{i:02}.txt")).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "x")).collect();
    let host = Arc::new(MemoryHost::new(&files).with_delay(Duration::from_millis(10)));

    let fetcher = gitslice::Fetcher::with_host(env.settings().with_concurrency(4), host.clone());
    let result = fetcher
        .fetch_folder("https://github.com/o/r/tree/main/bulk", &env.dest)
        .unwrap();

    assert_eq!(result.succeeded, 30);
    assert!(host.peak_in_flight() <= 4, "peak {}", host.peak_in_flight());
    assert!(host.peak_in_flight() > 1);
}

#[test]
fn test_reporter_sees_every_file_then_finish() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));
    host.fail_path("docs/index.md");
    let (tx, rx) = mpsc::channel();

    let fetcher = env
        .fetcher(&host)
        .with_reporter(Arc::new(ChannelReporter::new(tx)));
    fetcher.fetch_folder(DOCS_URL, &env.dest).unwrap();
    drop(fetcher);

    let events: Vec<ProgressEvent> = rx.iter().collect();
    assert_eq!(events.len(), 4);
    let completed: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Update(u) => Some(u.completed),
            ProgressEvent::Finish(_) => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Finish(FinishState::CompletedWithErrors {
            succeeded: 2,
            failed: 1
        }))
    );
}

#[test]
fn test_archive_scratch_removed_after_success() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));
    let out_dir = env.dir.path().join("archives");

    let archive = env
        .fetcher(&host)
        .fetch_and_archive(DOCS_URL, &out_dir, Some("docs.tar.gz"))
        .unwrap();

    assert!(archive.is_file());
    assert!(env.scratch_leftovers().is_empty());
}

#[test]
fn test_archive_scratch_removed_when_every_file_fails() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(REPO));
    for (path, _) in REPO {
        host.fail_path(path);
    }
    let out_dir = env.dir.path().join("archives");

    let result = env.fetcher(&host).fetch_and_archive(DOCS_URL, &out_dir, None);

    assert!(matches!(result, Err(FetchError::TotalFailure { attempted: 3 })));
    assert!(env.scratch.is_dir());
    assert!(env.scratch_leftovers().is_empty());
    assert!(!out_dir.exists());
}

#[test]
fn test_archive_scratch_removed_when_source_is_empty() {
    let env = TestEnv::new();
    let host = Arc::new(MemoryHost::new(&[]));
    let out_dir = env.dir.path().join("archives");

    let result = env
        .fetcher(&host)
        .fetch_and_archive("https://github.com/o/r", &out_dir, None);

    assert!(matches!(result, Err(FetchError::ArchiveEmptySource(_))));
    assert!(env.scratch.is_dir());
    assert!(env.scratch_leftovers().is_empty());
}
