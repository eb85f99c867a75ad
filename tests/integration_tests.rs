use std::collections::BTreeMap;
/// Integration tests for tidytree
///
/// These tests drive the public API the way the command-line front end does,
/// against real temporary directory trees.
///
/// Test categories:
/// 1. Organize workflows (type, date, size, destination, backup)
/// 2. Dry-run guarantees
/// 3. Duplicate detection
/// 4. Empty-directory cleanup
/// 5. Batch renaming
/// 6. Concurrency: busy guard, cancellation, background worker
/// 7. Configuration
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;
use tidytree::bucket::date_bucket;
use tidytree::config::DEFAULT_RENAME_TEMPLATE;
use tidytree::{
    CancelToken, CategoryTable, DuplicateStrategy, Event, FileDescriptor, Mode, OrganizeError,
    OrganizeOptions, Organizer, SkipReason, TidyConfig, TreeGuard, worker,
};

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary directory with helpers for building and checking file trees.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file (and any missing parents) with content.
    fn create_file(&self, name: &str, content: &[u8]) {
        let file_path = self.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    fn create_text_file(&self, name: &str, content: &str) {
        self.create_file(name, content.as_bytes());
    }

    fn create_sized_file(&self, name: &str, size: usize) {
        self.create_file(name, &vec![b'x'; size]);
    }

    fn create_subdir(&self, name: &str) {
        fs::create_dir_all(self.path().join(name)).expect("Failed to create subdirectory");
    }

    fn assert_dir_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_dir(), "Directory should exist: {}", path.display());
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "Path should not exist: {}", path.display());
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }

    /// Every path below the root with its size and mtime.
    fn snapshot(&self) -> BTreeMap<PathBuf, (u64, SystemTime)> {
        walkdir::WalkDir::new(self.path())
            .min_depth(1)
            .into_iter()
            .map(|e| e.expect("walk"))
            .map(|e| {
                let meta = e.metadata().expect("metadata");
                (
                    e.path().to_path_buf(),
                    (meta.len(), meta.modified().expect("mtime")),
                )
            })
            .collect()
    }
}

fn organizer() -> Organizer {
    Organizer::new(CategoryTable::default())
}

fn options(mode: Mode) -> OrganizeOptions {
    OrganizeOptions {
        mode,
        ..Default::default()
    }
}

fn dry_run(mode: Mode) -> OrganizeOptions {
    OrganizeOptions {
        mode,
        dry_run: true,
        ..Default::default()
    }
}

// ============================================================================
// Organize workflows
// ============================================================================

#[test]
fn test_organize_by_type_end_to_end() {
    let fixture = TestFixture::new();
    fixture.create_sized_file("x.jpg", 2000);
    fixture.create_sized_file("y.pdf", 2000);
    fixture.create_sized_file("z.unknownext", 10);

    let stats = organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize should succeed");

    fixture.assert_file_exists("images/x.jpg");
    fixture.assert_file_exists("documents/y.pdf");
    fixture.assert_file_exists("other/z.unknownext");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.moved, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.categories["images"].bytes, 2000);
    assert!(!stats.cancelled);
}

#[test]
fn test_organize_handles_uppercase_extensions() {
    let fixture = TestFixture::new();
    fixture.create_text_file("REPORT.PDF", "pdf");
    fixture.create_text_file("Song.Mp3", "mp3");

    organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize should succeed");

    fixture.assert_file_exists("documents/REPORT.PDF");
    fixture.assert_file_exists("audio/Song.Mp3");
}

#[test]
fn test_organize_flattens_nested_files_with_collisions() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a/notes.txt", "first");
    fixture.create_text_file("b/notes.txt", "second");
    fixture.create_text_file("c/notes.txt", "third");

    let stats = organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize should succeed");

    assert_eq!(stats.moved, 3);
    assert_eq!(fixture.read("documents/notes.txt"), "first");
    assert_eq!(fixture.read("documents/notes_1.txt"), "second");
    assert_eq!(fixture.read("documents/notes_2.txt"), "third");
}

#[test]
fn test_second_run_is_a_no_op() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "a");
    fixture.create_text_file("b.png", "b");

    organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("first run");
    let before = fixture.snapshot();
    let stats = organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("second run");

    assert_eq!(stats.moved, 0);
    assert_eq!(stats.skipped, 2);
    assert!(
        stats
            .skipped_files
            .iter()
            .all(|s| s.reason == SkipReason::AlreadyInPlace)
    );
    assert_eq!(fixture.snapshot(), before);
}

#[test]
fn test_organize_by_size_buckets() {
    let fixture = TestFixture::new();
    fixture.create_sized_file("tiny.bin", 10);
    fixture.create_sized_file("edge.bin", 1_048_576);

    organizer()
        .organize(fixture.path(), &options(Mode::Size))
        .expect("organize should succeed");

    fixture.assert_file_exists("<1MB/tiny.bin");
    fixture.assert_file_exists("1MB-10MB/edge.bin");
}

#[test]
fn test_organize_by_date() {
    let fixture = TestFixture::new();
    fixture.create_text_file("diary.txt", "entry");
    let descriptor = FileDescriptor::from_path(&fixture.path().join("diary.txt")).unwrap();
    let month = date_bucket(descriptor.modified_at);

    organizer()
        .organize(fixture.path(), &options(Mode::Date))
        .expect("organize should succeed");

    fixture.assert_file_exists(&format!("{month}/diary.txt"));
}

#[test]
fn test_organize_into_nested_destination() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/a.txt", "a");
    fixture.create_subdir("inbox/sorted");
    fixture.create_text_file("inbox/sorted/documents/old.txt", "old");

    let opts = OrganizeOptions {
        destination: Some(fixture.path().join("inbox/sorted")),
        ..options(Mode::Type)
    };
    let stats = organizer()
        .organize(&fixture.path().join("inbox"), &opts)
        .expect("organize should succeed");

    // Files already under the destination are not rescanned
    assert_eq!(stats.total, 1);
    fixture.assert_file_exists("inbox/sorted/documents/a.txt");
    fixture.assert_file_exists("inbox/sorted/documents/old.txt");
}

#[test]
fn test_organize_with_backup() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/photo.jpg", "jpg");
    fixture.create_text_file("inbox/deep/letter.pdf", "pdf");

    let opts = OrganizeOptions {
        backup: true,
        ..options(Mode::Type)
    };
    let stats = organizer()
        .organize(&fixture.path().join("inbox"), &opts)
        .expect("organize should succeed");

    let backup = stats.backup.expect("backup path reported");
    assert!(
        backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("backup_")
    );
    assert_eq!(fs::read_to_string(backup.join("photo.jpg")).unwrap(), "jpg");
    assert_eq!(fs::read_to_string(backup.join("deep/letter.pdf")).unwrap(), "pdf");
    fixture.assert_file_exists("inbox/images/photo.jpg");
}

#[test]
fn test_dry_run_backup_is_only_reported() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/a.txt", "a");

    let opts = OrganizeOptions {
        backup: true,
        ..dry_run(Mode::Type)
    };
    let (sink, receiver) = tidytree::EventSink::channel(64);
    let stats = organizer()
        .with_events(sink)
        .organize(&fixture.path().join("inbox"), &opts)
        .expect("dry run should succeed");

    assert!(stats.backup.is_none());
    assert!(
        receiver
            .try_iter()
            .any(|e| matches!(e, Event::Backup { dry_run: true, .. }))
    );
    let entries: Vec<_> = fs::read_dir(fixture.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "no backup directory should be created");
}

#[test]
fn test_organize_missing_directory() {
    let result = organizer().organize(Path::new("/non/existent/path"), &options(Mode::Type));
    assert!(matches!(
        result,
        Err(OrganizeError::DirectoryNotFound { .. })
    ));
}

#[test]
fn test_conservation_holds_with_skips() {
    let fixture = TestFixture::new();
    fixture.create_text_file("documents/kept.txt", "k");
    fixture.create_text_file("new.txt", "n");
    fixture.create_text_file("pic.gif", "g");
    fixture.create_text_file(".hidden", "h");

    let stats = organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize should succeed");

    assert_eq!(stats.total, 3);
    assert_eq!(stats.total, stats.moved + stats.skipped);
    assert_eq!(stats.moves.len(), stats.moved);
    assert_eq!(stats.skipped_files.len(), stats.skipped);
    fixture.assert_file_exists(".hidden");
}

#[test]
fn test_organize_failure_skips_file_and_continues() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/a.jpg", "a");
    fixture.create_text_file("inbox/b.txt", "b");
    // A plain file where the images folder should go
    fixture.create_text_file("sorted/images", "blocker");

    let opts = OrganizeOptions {
        destination: Some(fixture.path().join("sorted")),
        ..options(Mode::Type)
    };
    let stats = organizer()
        .organize(&fixture.path().join("inbox"), &opts)
        .expect("run should finish despite the failure");

    assert_eq!(stats.total, 2);
    assert_eq!(stats.moved, 1);
    assert_eq!(stats.skipped, 1);
    assert!(!stats.is_clean());
    assert!(stats.skipped_files[0].path.ends_with("a.jpg"));
    assert!(matches!(
        stats.skipped_files[0].reason,
        SkipReason::CreateDir { .. }
    ));

    fixture.assert_file_exists("inbox/a.jpg");
    fixture.assert_file_exists("sorted/documents/b.txt");
    assert_eq!(fixture.read("sorted/images"), "blocker");
}

// ============================================================================
// Dry-run guarantees
// ============================================================================

#[test]
fn test_dry_run_changes_nothing_and_is_repeatable() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a/report.pdf", "1");
    fixture.create_text_file("b/report.pdf", "2");
    fixture.create_text_file("documents/report.pdf", "3");
    fixture.create_text_file("song.mp3", "4");

    let before = fixture.snapshot();
    let first = organizer()
        .organize(fixture.path(), &dry_run(Mode::Type))
        .expect("dry run");
    let second = organizer()
        .organize(fixture.path(), &dry_run(Mode::Type))
        .expect("dry run");

    assert_eq!(fixture.snapshot(), before);
    assert_eq!(first.moves, second.moves);
    assert!(first.dry_run);

    let targets: Vec<_> = first.moves.iter().map(|m| m.to.clone()).collect();
    let unique: std::collections::HashSet<_> = targets.iter().collect();
    assert_eq!(unique.len(), targets.len(), "planned targets must be distinct");
    assert!(targets.iter().all(|t| !t.exists()));
}

// ============================================================================
// Duplicates
// ============================================================================

#[test]
fn test_duplicates_by_name_and_size() {
    let fixture = TestFixture::new();
    fixture.create_text_file("one/a.txt", "0123456789");
    fixture.create_text_file("two/a.txt", "abcdefghij");
    fixture.create_text_file("two/A.TXT.bak/ignored.txt", "x");
    fixture.create_text_file("three/A.TXT", "ABCDEFGHIJ");

    let report = organizer()
        .find_duplicates_in(fixture.path(), DuplicateStrategy::NameSize)
        .expect("search should succeed");

    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.canonical, fixture.path().join("one/a.txt"));
    assert_eq!(
        group.duplicates,
        vec![
            fixture.path().join("three/A.TXT"),
            fixture.path().join("two/a.txt")
        ]
    );
}

#[test]
fn test_duplicates_by_content() {
    let fixture = TestFixture::new();
    fixture.create_text_file("holiday.jpg", "same pixels");
    fixture.create_text_file("copy of holiday.jpeg", "same pixels");
    fixture.create_text_file("other.jpg", "diff pixels");

    let report = organizer()
        .find_duplicates_in(fixture.path(), DuplicateStrategy::Content)
        .expect("search should succeed");

    assert_eq!(report.groups.len(), 1);
    assert_eq!(
        report.groups[0].canonical,
        fixture.path().join("copy of holiday.jpeg")
    );
    assert_eq!(
        report.groups[0].duplicates,
        vec![fixture.path().join("holiday.jpg")]
    );
    assert!(report.failures.is_empty());
}

// ============================================================================
// Empty-directory cleanup
// ============================================================================

#[test]
fn test_prune_nested_chain() {
    let fixture = TestFixture::new();
    fixture.create_subdir("a/b/c");
    fixture.create_text_file("keep/file.txt", "x");

    let report = organizer()
        .prune(fixture.path(), false)
        .expect("prune should succeed");

    assert_eq!(report.removed.len(), 3);
    fixture.assert_not_exists("a");
    fixture.assert_dir_exists("keep");
    assert!(fixture.path().is_dir());
}

#[test]
fn test_prune_preview_leaves_tree() {
    let fixture = TestFixture::new();
    fixture.create_subdir("a/b/c");

    let report = organizer()
        .prune(fixture.path(), true)
        .expect("preview should succeed");

    assert_eq!(report.empty_dirs.len(), 3);
    assert!(report.removed.is_empty());
    fixture.assert_dir_exists("a/b/c");
}

#[test]
fn test_organize_then_prune_leaves_no_empty_source_dirs() {
    let fixture = TestFixture::new();
    fixture.create_text_file("old/nested/photo.png", "png");

    organizer()
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize");
    organizer().prune(fixture.path(), false).expect("prune");

    fixture.assert_not_exists("old");
    fixture.assert_file_exists("images/photo.png");
}

// ============================================================================
// Renaming
// ============================================================================

#[test]
fn test_rename_directory_with_default_template() {
    let fixture = TestFixture::new();
    fixture.create_text_file("c.jpg", "c");
    fixture.create_text_file("a.jpg", "a");
    fixture.create_text_file("b.png", "b");
    fixture.create_text_file("sub/nested.txt", "n");

    let report = organizer()
        .rename_in(fixture.path(), DEFAULT_RENAME_TEMPLATE, 1, false)
        .expect("rename should succeed");

    assert_eq!(report.renamed.len(), 4);
    assert_eq!(fixture.read("file_001.jpg"), "a");
    assert_eq!(fixture.read("file_002.png"), "b");
    assert_eq!(fixture.read("file_003.jpg"), "c");
    // Nested files share the counter but stay in their folder
    assert_eq!(fixture.read("sub/file_004.txt"), "n");
    fixture.assert_not_exists("file_004.txt");
}

#[test]
fn test_rename_dry_run_and_start_number() {
    let fixture = TestFixture::new();
    fixture.create_text_file("photo.jpg", "p");

    let report = organizer()
        .rename_in(fixture.path(), "{name}_{num:04d}{ext}", 42, true)
        .expect("dry run should succeed");

    assert_eq!(
        report.renamed[0].to,
        fixture.path().join("photo_0042.jpg")
    );
    fixture.assert_file_exists("photo.jpg");
    fixture.assert_not_exists("photo_0042.jpg");
}

#[test]
fn test_rename_rejects_bad_template() {
    let fixture = TestFixture::new();
    fixture.create_text_file("photo.jpg", "p");

    let result = organizer().rename_in(fixture.path(), "{date}{ext}", 1, false);
    assert!(matches!(
        result,
        Err(OrganizeError::InvalidTemplate { .. })
    ));
    fixture.assert_file_exists("photo.jpg");
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_busy_guard_rejects_overlapping_tree() {
    let fixture = TestFixture::new();
    fixture.create_text_file("inbox/a.txt", "a");

    let _held = TreeGuard::acquire(fixture.path()).expect("guard");
    let result = organizer().organize(&fixture.path().join("inbox"), &options(Mode::Type));

    assert!(matches!(result, Err(OrganizeError::Busy { .. })));
    fixture.assert_file_exists("inbox/a.txt");

    // Read-only operations are still allowed
    assert!(
        organizer()
            .organize(&fixture.path().join("inbox"), &dry_run(Mode::Type))
            .is_ok()
    );
    assert!(organizer().prune(fixture.path(), true).is_ok());
}

#[test]
fn test_cancelled_organize_leaves_files_whole() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "aaa");
    fixture.create_text_file("b.txt", "bbb");

    let cancel = CancelToken::new();
    cancel.cancel();
    let stats = organizer()
        .with_cancel(cancel)
        .organize(fixture.path(), &options(Mode::Type))
        .expect("cancelled run still returns stats");

    assert!(stats.cancelled);
    assert_eq!(stats.total, stats.moved + stats.skipped);
    assert_eq!(fixture.read("a.txt"), "aaa");
    assert_eq!(fixture.read("b.txt"), "bbb");
}

#[test]
fn test_background_worker_streams_events() {
    let fixture = TestFixture::new();
    fixture.create_text_file("a.txt", "a");
    fixture.create_text_file("b.jpg", "b");
    let root = fixture.path().to_path_buf();

    let task = worker::spawn(64, move |sink, cancel| {
        organizer()
            .with_events(sink)
            .with_cancel(cancel)
            .organize(&root, &OrganizeOptions::default())
    });
    let events: Vec<Event> = task.events().collect();
    let stats = task.join().expect("worker thread").expect("organize");

    assert_eq!(stats.moved, 2);
    assert!(matches!(events.first(), Some(Event::RunStarted { total: 2, .. })));
    let moved = events
        .iter()
        .filter(|e| matches!(e, Event::Moved { .. }))
        .count();
    assert_eq!(moved, 2);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_drives_categories_and_filters() {
    let fixture = TestFixture::new();
    fixture.create_text_file("readme.md", "md");
    fixture.create_text_file("draft.tmp", "tmp");
    fixture.create_text_file("data.xyz", "xyz");

    let config = TidyConfig::from_toml_str(
        r#"
        [categories]
        fallback = "misc"

        [categories.map]
        notes = ["md"]

        [filters.exclude]
        extensions = ["tmp"]
        "#,
    )
    .expect("config should parse");
    let organizer = Organizer::new(config.categories.build_table().unwrap())
        .with_filters(config.compile_filters().unwrap());

    let stats = organizer
        .organize(fixture.path(), &options(Mode::Type))
        .expect("organize should succeed");

    assert_eq!(stats.total, 2);
    fixture.assert_file_exists("notes/readme.md");
    fixture.assert_file_exists("misc/data.xyz");
    fixture.assert_file_exists("draft.tmp");
}

#[test]
fn test_stats_summary() {
    let fixture = TestFixture::new();
    fixture.create_sized_file("a.jpg", 100);
    fixture.create_sized_file("nested/b.png", 50);
    fixture.create_sized_file("c.pdf", 10);

    let summary = organizer()
        .summarize(fixture.path())
        .expect("summary should succeed");

    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.total_bytes, 160);
    assert_eq!(summary.categories["images"].files, 2);
    assert_eq!(summary.by_count()[0].0, "images");
}
