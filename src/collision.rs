//! Conflict-free target naming.
//!
//! A target that already exists is never overwritten. Instead the stem gets a
//! numeric suffix (`report.pdf` -> `report_1.pdf`). A stem that already ends
//! in `_<digits>` has that suffix stripped first, so re-running over
//! previously suffixed files yields `report_2.pdf` rather than
//! `report_1_1.pdf`.
//!
//! The check is made against the filesystem as observed at call time. Two
//! processes writing into the same directory concurrently can still race.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Returns a path inside `target_dir` that does not exist right now.
///
/// The name is handled as an `OsStr`, so bytes that are not valid UTF-8
/// survive into the result untouched.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tidytree::collision::resolve;
///
/// let path = resolve(Path::new("/data/images"), "holiday.jpg");
/// assert!(!path.exists());
/// ```
pub fn resolve(target_dir: &Path, desired_name: impl AsRef<OsStr>) -> PathBuf {
    resolve_with(target_dir, desired_name, path_taken)
}

/// Same as [`resolve`], but asks `is_taken` whether a candidate is free.
///
/// Dry runs use this to treat earlier planned targets as occupied.
pub fn resolve_with<F>(target_dir: &Path, desired_name: impl AsRef<OsStr>, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let desired_name = desired_name.as_ref();
    let candidate = target_dir.join(desired_name);
    if !is_taken(&candidate) {
        return candidate;
    }

    let desired = Path::new(desired_name);
    let stem = desired.file_stem().unwrap_or(desired_name);
    // Only a UTF-8 stem can carry a counter we wrote earlier.
    let base = match stem.to_str() {
        Some(text) => OsStr::new(strip_counter(text)),
        None => stem,
    };

    let mut counter: u64 = 1;
    loop {
        let mut name = OsString::from(base);
        name.push(format!("_{counter}"));
        if let Some(ext) = desired.extension() {
            name.push(".");
            name.push(ext);
        }
        let candidate = target_dir.join(name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// True if anything (including a dangling symlink) occupies `path`.
pub fn path_taken(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Removes a trailing `_<digits>` from a stem, keeping at least one char.
fn strip_counter(stem: &str) -> &str {
    match stem.rsplit_once('_') {
        Some((base, digits))
            if !base.is_empty()
                && !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_free_name_is_returned_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = resolve(temp_dir.path(), "photo.jpg");
        assert_eq!(path, temp_dir.path().join("photo.jpg"));
    }

    #[test]
    fn test_taken_name_gets_counter() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("photo.jpg"), "a").unwrap();
        fs::write(temp_dir.path().join("photo_1.jpg"), "b").unwrap();

        let path = resolve(temp_dir.path(), "photo.jpg");
        assert_eq!(path, temp_dir.path().join("photo_2.jpg"));
    }

    #[test]
    fn test_existing_suffix_is_not_chained() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("photo_1.jpg"), "a").unwrap();

        let path = resolve(temp_dir.path(), "photo_1.jpg");
        assert_eq!(path, temp_dir.path().join("photo_2.jpg"));
        assert!(!path.to_string_lossy().contains("_1_1"));
    }

    #[test]
    fn test_sequence_of_identical_names_stays_distinct() {
        let dir = Path::new("/virtual");
        let mut taken: HashSet<PathBuf> = HashSet::new();

        for _ in 0..5 {
            let path = resolve_with(dir, "a.txt", |p| taken.contains(p));
            assert!(taken.insert(path), "resolver returned a duplicate path");
        }

        let mut names: Vec<_> = taken
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "a_1.txt", "a_2.txt", "a_3.txt", "a_4.txt"]);
    }

    #[test]
    fn test_names_without_extension_and_dotfiles() {
        let dir = Path::new("/virtual");
        let always_first = |p: &Path| p == dir.join("README") || p == dir.join(".env");

        assert_eq!(resolve_with(dir, "README", always_first), dir.join("README_1"));
        assert_eq!(resolve_with(dir, ".env", always_first), dir.join(".env_1"));
    }

    #[test]
    fn test_multi_dot_name_keeps_last_extension() {
        let dir = Path::new("/virtual");
        let path = resolve_with(dir, "backup.tar.gz", |p| p == dir.join("backup.tar.gz"));
        assert_eq!(path, dir.join("backup.tar_1.gz"));
    }

    #[test]
    fn test_strip_counter() {
        assert_eq!(strip_counter("photo_12"), "photo");
        assert_eq!(strip_counter("my_photo"), "my_photo");
        assert_eq!(strip_counter("_5"), "_5");
        assert_eq!(strip_counter("photo_"), "photo_");
        assert_eq!(strip_counter("a_b_3"), "a_b");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_counts_as_taken() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let link = temp_dir.path().join("ghost.txt");
        std::os::unix::fs::symlink(temp_dir.path().join("missing"), &link).unwrap();

        let path = resolve(temp_dir.path(), "ghost.txt");
        assert_eq!(path, temp_dir.path().join("ghost_1.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_keeps_its_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let dir = Path::new("/virtual");
        let name = OsStr::from_bytes(b"caf\xe9.txt");

        let free = resolve_with(dir, name, |_| false);
        assert_eq!(free.file_name(), Some(name));

        let bumped = resolve_with(dir, name, |p| p == dir.join(name));
        assert_eq!(
            bumped.file_name().map(|n| n.as_bytes()),
            Some(&b"caf\xe9_1.txt"[..])
        );
    }
}
