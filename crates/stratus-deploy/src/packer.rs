//! Source packaging into deployable artifacts.
//!
//! Turns a local directory (or a single compiled file, for runtimes that
//! require it) into the base64 zip payload the platform's code-upload
//! parameter expects. Archives are deterministic: entries are sorted by
//! relative path and written with fixed metadata, so the same file set
//! always produces byte-identical bytes.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tempfile::NamedTempFile;
use tokio::task::spawn_blocking;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

/// How source code is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    /// Archive a directory tree, honouring ignore globs.
    Directory,
    /// Upload one compiled file as-is (e.g. a Java jar). Ignore globs do
    /// not apply.
    SingleFile,
}

/// A packaged artifact: base64-encoded archive bytes.
///
/// Ephemeral - produced and consumed within one deployment call.
#[derive(Debug, Clone)]
pub struct PackedArtifact {
    encoded: String,
}

impl PackedArtifact {
    /// Wrap already-encoded artifact bytes.
    #[must_use]
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }

    /// The base64 payload sent to the platform.
    #[must_use]
    pub fn as_base64(&self) -> &str {
        &self.encoded
    }

    /// Encoded size in bytes. Size limits are enforced remotely, not here.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

/// Errors that can occur while packaging.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// No deployable source at the given path.
    ///
    /// A recoverable condition distinct from I/O failure: callers treat
    /// "no code to package" as a logical validation problem.
    #[error("no deployable source found at {0}")]
    SourceNotFound(PathBuf),

    /// An ignore glob failed to compile.
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parse failure.
        #[source]
        source: glob::PatternError,
    },

    /// Archive construction failed.
    #[error("archive error: {0}")]
    Archive(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Package the source at `root` into a deployable artifact.
///
/// Directory mode walks the tree, drops paths matching any ignore glob
/// (matched against the relative path; a glob matching a directory excludes
/// its whole subtree), sorts the remainder and zips it. The archive is
/// staged in a collision-resistant temp file that is removed on every exit
/// path.
pub async fn pack(
    root: &Path,
    code_type: CodeType,
    ignore: &[String],
) -> Result<PackedArtifact, PackError> {
    let root = root.to_owned();
    let ignore = ignore.to_vec();
    spawn_blocking(move || pack_sync(&root, code_type, &ignore))
        .await
        .map_err(|e| PackError::Archive(e.to_string()))?
}

/// Package only the files under `add` (relative to `root`) for an
/// incremental code update.
///
/// Entry names stay relative to `root`, so the archive overlays the
/// existing remote artifact in place. Ignore globs apply as in directory
/// mode; a missing or fully-ignored `add` path is a
/// [`PackError::SourceNotFound`].
pub async fn pack_incremental(
    root: &Path,
    add: &Path,
    ignore: &[String],
) -> Result<PackedArtifact, PackError> {
    let root = root.to_owned();
    let add = add.to_owned();
    let ignore = ignore.to_vec();
    spawn_blocking(move || pack_incremental_sync(&root, &add, &ignore))
        .await
        .map_err(|e| PackError::Archive(e.to_string()))?
}

fn pack_sync(root: &Path, code_type: CodeType, ignore: &[String]) -> Result<PackedArtifact, PackError> {
    match code_type {
        CodeType::SingleFile => pack_single_file(root),
        CodeType::Directory => pack_directory(root, ignore),
    }
}

fn pack_single_file(path: &Path) -> Result<PackedArtifact, PackError> {
    if !path.is_file() {
        return Err(PackError::SourceNotFound(path.to_owned()));
    }
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), size = bytes.len(), "packaged single file");
    Ok(PackedArtifact {
        encoded: BASE64.encode(bytes),
    })
}

fn pack_directory(root: &Path, ignore: &[String]) -> Result<PackedArtifact, PackError> {
    if !root.is_dir() {
        return Err(PackError::SourceNotFound(root.to_owned()));
    }

    let patterns = compile_patterns(ignore)?;
    let entries = collect_entries(root, root, &patterns)?;
    if entries.is_empty() {
        return Err(PackError::SourceNotFound(root.to_owned()));
    }

    let artifact = archive(root, &entries)?;
    debug!(
        root = %root.display(),
        files = entries.len(),
        size = artifact.encoded_len(),
        "packaged directory"
    );
    Ok(artifact)
}

fn pack_incremental_sync(
    root: &Path,
    add: &Path,
    ignore: &[String],
) -> Result<PackedArtifact, PackError> {
    if !root.is_dir() {
        return Err(PackError::SourceNotFound(root.to_owned()));
    }
    let full = root.join(add);
    let patterns = compile_patterns(ignore)?;

    let entries = if full.is_file() {
        let relative = add.to_owned();
        if is_ignored(&relative, &patterns) {
            Vec::new()
        } else {
            vec![relative]
        }
    } else if full.is_dir() {
        collect_entries(root, &full, &patterns)?
    } else {
        return Err(PackError::SourceNotFound(full));
    };

    if entries.is_empty() {
        return Err(PackError::SourceNotFound(full));
    }

    let artifact = archive(root, &entries)?;
    debug!(
        root = %root.display(),
        add = %add.display(),
        files = entries.len(),
        size = artifact.encoded_len(),
        "packaged incremental addition"
    );
    Ok(artifact)
}

fn compile_patterns(ignore: &[String]) -> Result<Vec<glob::Pattern>, PackError> {
    ignore
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|source| PackError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Walk `dir` collecting file paths relative to `root`, filtered by the
/// ignore globs and sorted: the archive must be independent of filesystem
/// iteration order.
fn collect_entries(
    root: &Path,
    dir: &Path,
    patterns: &[glob::Pattern],
) -> Result<Vec<PathBuf>, PackError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| PackError::Archive(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PackError::Archive(e.to_string()))?
            .to_owned();
        if is_ignored(&relative, patterns) {
            continue;
        }
        entries.push(relative);
    }
    entries.sort();
    Ok(entries)
}

fn archive(root: &Path, entries: &[PathBuf]) -> Result<PackedArtifact, PackError> {
    // Staged through a temp file; drop removes it on success and failure.
    let mut staging = NamedTempFile::new()?;
    write_zip(root, entries, staging.as_file_mut())?;
    let bytes = std::fs::read(staging.path())?;
    Ok(PackedArtifact {
        encoded: BASE64.encode(bytes),
    })
}

fn write_zip(
    root: &Path,
    entries: &[PathBuf],
    out: &mut std::fs::File,
) -> Result<(), PackError> {
    // Fixed timestamp and permissions keep identical file sets
    // byte-identical across runs.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(out);
    for relative in entries {
        let name = relative_name(relative);
        writer
            .start_file(name, options)
            .map_err(|e| PackError::Archive(e.to_string()))?;
        let bytes = std::fs::read(root.join(relative))?;
        writer.write_all(&bytes)?;
    }
    writer
        .finish()
        .map_err(|e| PackError::Archive(e.to_string()))?;
    Ok(())
}

/// Archive entry name: relative path with forward slashes.
fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A path is ignored when any glob matches it or any of its ancestor
/// directories, so a directory glob excludes its entire subtree.
fn is_ignored(relative: &Path, patterns: &[glob::Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let mut prefix = PathBuf::new();
    for component in relative.components() {
        prefix.push(component);
        let candidate = relative_name(&prefix);
        if patterns.iter().any(|p| p.matches(&candidate)) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, relative: &str, contents: &str) {
        let path = dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn identical_trees_produce_identical_archives() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "exports.main = () => {};");
        write(&dir, "lib/util.js", "module.exports = {};");

        let a = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        let b = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        assert_eq!(a.as_base64(), b.as_base64());
    }

    #[tokio::test]
    async fn ignored_files_never_appear() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        write(&dir, "debug.log", "noise");

        let with_log = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        let without_log = pack(dir.path(), CodeType::Directory, &["*.log".to_owned()])
            .await
            .unwrap();
        assert_ne!(with_log.as_base64(), without_log.as_base64());

        // Removing the ignored file changes nothing against the filtered archive.
        std::fs::remove_file(dir.path().join("debug.log")).unwrap();
        let log_deleted = pack(dir.path(), CodeType::Directory, &["*.log".to_owned()])
            .await
            .unwrap();
        assert_eq!(without_log.as_base64(), log_deleted.as_base64());
    }

    #[tokio::test]
    async fn directory_glob_excludes_subtree() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        write(&dir, "node_modules/a/deep/file.js", "dep");

        let filtered = pack(
            dir.path(),
            CodeType::Directory,
            &["node_modules".to_owned()],
        )
        .await
        .unwrap();

        std::fs::remove_dir_all(dir.path().join("node_modules")).unwrap();
        let removed = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        assert_eq!(filtered.as_base64(), removed.as_base64());
    }

    #[tokio::test]
    async fn missing_source_is_a_distinct_signal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = pack(&missing, CodeType::Directory, &[]).await.unwrap_err();
        assert!(matches!(err, PackError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn empty_directory_has_no_deployable_source() {
        let dir = TempDir::new().unwrap();
        let err = pack(dir.path(), CodeType::Directory, &[]).await.unwrap_err();
        assert!(matches!(err, PackError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn single_file_mode_bypasses_ignore_globs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app.jar", "binary-ish");
        let jar = dir.path().join("app.jar");

        let artifact = pack(&jar, CodeType::SingleFile, &["*.jar".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            artifact.as_base64(),
            BASE64.encode("binary-ish".as_bytes())
        );
    }

    #[tokio::test]
    async fn single_file_mode_rejects_directories() {
        let dir = TempDir::new().unwrap();
        let err = pack(dir.path(), CodeType::SingleFile, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn incremental_pack_keeps_paths_relative_to_root() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        write(&dir, "lib/util.js", "util");
        write(&dir, "lib/deep/extra.js", "extra");

        let incremental = pack_incremental(dir.path(), Path::new("lib"), &[])
            .await
            .unwrap();

        // An archive of the addition subtree equals a full pack of a tree
        // holding only that subtree.
        std::fs::remove_file(dir.path().join("index.js")).unwrap();
        let pruned = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        assert_eq!(incremental.as_base64(), pruned.as_base64());
    }

    #[tokio::test]
    async fn incremental_pack_accepts_a_single_added_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        write(&dir, "lib/util.js", "util");

        let incremental = pack_incremental(dir.path(), Path::new("lib/util.js"), &[])
            .await
            .unwrap();

        std::fs::remove_file(dir.path().join("index.js")).unwrap();
        let pruned = pack(dir.path(), CodeType::Directory, &[]).await.unwrap();
        assert_eq!(incremental.as_base64(), pruned.as_base64());
    }

    #[tokio::test]
    async fn incremental_pack_honours_ignore_globs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "lib/util.js", "util");
        write(&dir, "lib/debug.log", "noise");

        let filtered = pack_incremental(dir.path(), Path::new("lib"), &["*.log".to_owned()])
            .await
            .unwrap();

        std::fs::remove_file(dir.path().join("lib/debug.log")).unwrap();
        let removed = pack_incremental(dir.path(), Path::new("lib"), &[])
            .await
            .unwrap();
        assert_eq!(filtered.as_base64(), removed.as_base64());

        // An addition that the globs fully exclude is no source at all.
        write(&dir, "lib/debug.log", "noise");
        let err = pack_incremental(
            dir.path(),
            Path::new("lib/debug.log"),
            &["*.log".to_owned()],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PackError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn incremental_pack_rejects_missing_addition_path() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        let err = pack_incremental(dir.path(), Path::new("nope"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_pattern_is_reported() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.js", "code");
        let err = pack(dir.path(), CodeType::Directory, &["[".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidPattern { .. }));
    }
}
