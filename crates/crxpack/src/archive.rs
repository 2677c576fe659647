#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime as ZipDateTime, ZipWriter};

use crate::error::{PackError, Result};

/// Deflate level applied to every file entry.
pub const COMPRESSION_LEVEL: i64 = 9;

const STAGING_NAME: &str = "payload.zip";

/// Zips the contents of `source_dir` and returns the finished archive bytes.
///
/// Entry names are relative to `source_dir`, so the directory's own name
/// never appears in the archive. The archive is staged inside a private
/// temporary directory that is removed when this function returns, on
/// success and on every error path.
pub fn produce_zip(source_dir: &Path) -> Result<Vec<u8>> {
    produce_zip_in(&std::env::temp_dir(), source_dir)
}

pub(crate) fn produce_zip_in(scratch_root: &Path, source_dir: &Path) -> Result<Vec<u8>> {
    let staging = tempfile::Builder::new()
        .prefix("crxpack-")
        .tempdir_in(scratch_root)
        .map_err(|err| PackError::Packaging {
            path: source_dir.to_path_buf(),
            message: format!("failed to create staging directory: {err}"),
        })?;
    let archive_path = staging.path().join(STAGING_NAME);

    let entries = collect_entries(source_dir)?;
    write_zip(source_dir, &archive_path, &entries)?;

    let bytes = fs::read(&archive_path).map_err(|err| PackError::Packaging {
        path: source_dir.to_path_buf(),
        message: format!("failed to read staged archive: {err}"),
    })?;
    close_staging(staging);

    debug!(
        source = %source_dir.display(),
        entries = entries.len(),
        len = bytes.len(),
        "produced zip payload"
    );
    Ok(bytes)
}

fn close_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(err) = staging.close() {
        debug!(path = %path.display(), error = %err, "failed to remove staging directory");
    }
}

struct ArchiveEntry {
    abs_path: PathBuf,
    name: String,
    is_dir: bool,
}

fn collect_entries(source_dir: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(source_dir)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1);

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_dir.to_path_buf());
            PackError::source_read(path, io::Error::other(err))
        })?;

        let abs_path = entry.path();
        let rel_path = abs_path
            .strip_prefix(source_dir)
            .map_err(|err| PackError::source_read(abs_path, io::Error::other(err)))?;
        let name = normalize_path(rel_path).ok_or_else(|| {
            PackError::source_read(
                abs_path,
                io::Error::new(io::ErrorKind::InvalidData, "path is not valid UTF-8"),
            )
        })?;

        // Pipes, sockets and devices would block or never end when read.
        let file_type = entry.file_type();
        if !file_type.is_dir() && !file_type.is_file() {
            return Err(PackError::source_read(
                abs_path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "not a regular file or directory",
                ),
            ));
        }

        entries.push(ArchiveEntry {
            abs_path: abs_path.to_path_buf(),
            name,
            is_dir: file_type.is_dir(),
        });
    }

    Ok(entries)
}

fn write_zip(source_dir: &Path, out_path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let packaging = |message: String| PackError::Packaging {
        path: source_dir.to_path_buf(),
        message,
    };

    let file = File::create(out_path)
        .map_err(|err| packaging(format!("failed to create {}: {err}", out_path.display())))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let timestamp = zip_timestamp();

    for entry in entries {
        if entry.is_dir {
            let options = SimpleFileOptions::default()
                .last_modified_time(timestamp)
                .unix_permissions(0o755);
            writer
                .add_directory(entry.name.as_str(), options)
                .map_err(|err| packaging(format!("failed to add {}: {err}", entry.name)))?;
            continue;
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL))
            .last_modified_time(timestamp)
            .unix_permissions(0o644)
            .large_file(is_large(&entry.abs_path)?);

        let mut source = File::open(&entry.abs_path)
            .map_err(|err| PackError::source_read(&entry.abs_path, err))?;
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|err| packaging(format!("failed to add {}: {err}", entry.name)))?;
        io::copy(&mut source, &mut writer)
            .map_err(|err| PackError::source_read(&entry.abs_path, err))?;
    }

    let mut inner = writer
        .finish()
        .map_err(|err| packaging(format!("failed to finish archive: {err}")))?;
    io::Write::flush(&mut inner)
        .map_err(|err| packaging(format!("failed to flush archive: {err}")))?;
    Ok(())
}

fn is_large(path: &Path) -> Result<bool> {
    let len = fs::metadata(path)
        .map_err(|err| PackError::source_read(path, err))?
        .len();
    Ok(len >= u64::from(u32::MAX))
}

fn zip_timestamp() -> ZipDateTime {
    ZipDateTime::from_date_and_time(1980, 1, 1, 0, 0, 0).unwrap_or_default()
}

fn normalize_path(path: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(seg) => segments.push(seg.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => return None,
        }
    }

    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn write_file(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn entries_are_relative_to_source() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("my-extension");
        write_file(&src.join("manifest.json"), "{}");
        write_file(&src.join("js/background.js"), "console.log(1);");

        let bytes = produce_zip(&src).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, ["js/", "js/background.js", "manifest.json"]);
        assert!(names.iter().all(|name| !name.contains("my-extension")));

        let mut file = archive.by_name("js/background.js").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "console.log(1);");
    }

    #[test]
    fn same_tree_gives_same_bytes() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("ext");
        write_file(&src.join("b.txt"), "bbb");
        write_file(&src.join("a/c.txt"), "ccc");

        assert_eq!(produce_zip(&src).unwrap(), produce_zip(&src).unwrap());
    }

    #[test]
    fn empty_directory_gives_empty_archive() {
        let temp = tempdir().unwrap();
        let bytes = produce_zip(temp.path()).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn missing_source_is_read_error() {
        let temp = tempdir().unwrap();
        let err = produce_zip(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, PackError::SourceRead { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_read_error() {
        use std::os::unix::fs::PermissionsExt as _;

        let temp = tempdir().unwrap();
        let src = temp.path().join("ext");
        let locked = src.join("locked.txt");
        write_file(&locked, "secret");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits; nothing to assert in that case.
        if File::open(&locked).is_ok() {
            return;
        }

        let err = produce_zip(&src).unwrap_err();
        assert!(matches!(err, PackError::SourceRead { .. }));
    }

    #[cfg(unix)]
    fn make_fifo(path: &Path) -> bool {
        std::process::Command::new("mkfifo")
            .arg(path)
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[cfg(unix)]
    #[test]
    fn fifo_entry_is_read_error() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("ext");
        write_file(&src.join("a.txt"), "hello");
        if !make_fifo(&src.join("pipe")) {
            return;
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let worker_src = src.clone();
        std::thread::spawn(move || {
            let _ = tx.send(produce_zip(&worker_src));
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(10))
            .expect("zip of a directory holding a fifo must not block");

        match result.unwrap_err() {
            PackError::SourceRead { path, .. } => assert!(path.ends_with("pipe")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn staging_is_removed_after_success() {
        let scratch = tempdir().unwrap();
        let temp = tempdir().unwrap();
        let src = temp.path().join("ext");
        write_file(&src.join("a.txt"), "hello");

        produce_zip_in(scratch.path(), &src).unwrap();
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn staging_is_removed_after_read_error() {
        let scratch = tempdir().unwrap();
        let temp = tempdir().unwrap();
        let src = temp.path().join("ext");
        write_file(&src.join("a.txt"), "hello");
        if !make_fifo(&src.join("pipe")) {
            return;
        }

        let err = produce_zip_in(scratch.path(), &src).unwrap_err();
        assert!(matches!(err, PackError::SourceRead { .. }));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn staging_is_removed_when_source_is_missing() {
        let scratch = tempdir().unwrap();
        let temp = tempdir().unwrap();

        let err = produce_zip_in(scratch.path(), &temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, PackError::SourceRead { .. }));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn normalize_rejects_parent_components() {
        assert_eq!(normalize_path(Path::new("a/./b")), Some("a/b".to_string()));
        assert_eq!(normalize_path(Path::new("../a")), None);
    }
}
