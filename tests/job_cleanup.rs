use burst_doe::cleanup::{cleanup_job, CleanupOutcome, DEFAULT_EXTENSIONS};

#[test]
fn removes_present_and_skips_missing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("job_0.abq"), b"x").unwrap();
    std::fs::write(dir.path().join("job_0.sim"), b"x").unwrap();
    std::fs::write(dir.path().join("job_0.odb"), b"x").unwrap();

    let entries = cleanup_job(dir.path(), "job_0", &DEFAULT_EXTENSIONS);
    assert_eq!(entries.len(), DEFAULT_EXTENSIONS.len());
    for e in &entries {
        let expected = if e.extension == "abq" || e.extension == "sim" {
            CleanupOutcome::Removed
        } else {
            CleanupOutcome::Missing
        };
        assert_eq!(e.outcome, expected, "{}", e.extension);
    }
    assert!(!dir.path().join("job_0.abq").exists());
    // Outside the fixed set.
    assert!(dir.path().join("job_0.odb").exists());
}

#[test]
fn cleanup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    for ext in DEFAULT_EXTENSIONS {
        std::fs::write(dir.path().join(format!("job_1.{ext}")), b"x").unwrap();
    }

    let first = cleanup_job(dir.path(), "job_1", &DEFAULT_EXTENSIONS);
    assert!(first.iter().all(|e| e.outcome == CleanupOutcome::Removed));

    let second = cleanup_job(dir.path(), "job_1", &DEFAULT_EXTENSIONS);
    assert!(second.iter().all(|e| e.outcome == CleanupOutcome::Missing));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn other_failures_do_not_stop_remaining_extensions() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where a file is expected cannot be removed with remove_file.
    std::fs::create_dir(dir.path().join("job_2.abq")).unwrap();
    std::fs::write(dir.path().join("job_2.dat"), b"x").unwrap();

    let entries = cleanup_job(dir.path(), "job_2", &DEFAULT_EXTENSIONS);
    assert!(matches!(entries[0].outcome, CleanupOutcome::Failed(_)));
    let dat = entries.iter().find(|e| e.extension == "dat").unwrap();
    assert_eq!(dat.outcome, CleanupOutcome::Removed);
}
