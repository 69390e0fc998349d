// ABOUTME: Secure host↔container file transfer over tar archives
// ABOUTME: Every destination path is validated against a root before any write

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tar::{Archive, Builder, EntryType};
use tracing::{debug, info};

use crate::engine::{ContainerEngine, ContainerHandle};
use crate::error::{Result, SandboxError};

/// Lexically normalize a path: drop `.` components and resolve `..`
/// against the components seen so far. No filesystem access.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

/// Validate that `candidate` (absolute, or relative to `root`) resolves to
/// a descendant of `root`. Returns the normalized absolute path. This is
/// the host boundary: it runs before any transfer I/O.
pub fn resolve_within_root(candidate: &Path, root: &Path) -> Result<PathBuf> {
    let root = normalize(root);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    let resolved = normalize(&joined);

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(SandboxError::PathEscape {
            path: candidate.display().to_string(),
            root: root.display().to_string(),
        })
    }
}

/// Validate one archive entry path against the destination root. Entries
/// must be relative and must stay under the root once resolved.
fn entry_destination(entry_path: &Path, dest_root: &Path) -> Result<PathBuf> {
    if entry_path.is_absolute() {
        return Err(SandboxError::PathEscape {
            path: entry_path.display().to_string(),
            root: dest_root.display().to_string(),
        });
    }

    let resolved = normalize(&dest_root.join(entry_path));
    if resolved.starts_with(dest_root) {
        Ok(resolved)
    } else {
        Err(SandboxError::PathEscape {
            path: entry_path.display().to_string(),
            root: dest_root.display().to_string(),
        })
    }
}

/// Pack a host file or directory into a tar archive. Directories are
/// walked recursively; directory entries are emitted too, so empty
/// directories survive a round trip.
pub fn pack_archive(host_path: &Path) -> Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());

    if host_path.is_file() {
        let name = host_path.file_name().ok_or_else(|| {
            SandboxError::Archive(format!("source has no file name: {}", host_path.display()))
        })?;
        let mut file = File::open(host_path)?;
        builder.append_file(Path::new(name), &mut file)?;
    } else {
        append_dir_entries(&mut builder, host_path, Path::new(""))?;
    }

    Ok(builder.into_inner()?)
}

fn append_dir_entries(
    builder: &mut Builder<Vec<u8>>,
    dir: &Path,
    relative: &Path,
) -> Result<()> {
    if !relative.as_os_str().is_empty() {
        builder.append_dir(relative, dir)?;
    }

    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        let entry_relative = relative.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            append_dir_entries(builder, &path, &entry_relative)?;
        } else if file_type.is_file() {
            let mut file = File::open(&path)?;
            builder.append_file(&entry_relative, &mut file)?;
        } else {
            debug!("Skipping special file {}", path.display());
        }
    }

    Ok(())
}

/// Streaming extraction: decode entries one at a time, validating each
/// resolved destination BEFORE creating any directory or file. The first
/// entry that fails validation aborts the whole extraction.
pub fn extract_archive(data: &[u8], dest_root: &Path) -> Result<Vec<PathBuf>> {
    let dest_root = normalize(dest_root);
    let mut archive = Archive::new(data);
    let mut written = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry
            .path()
            .map_err(|e| SandboxError::Archive(e.to_string()))?
            .into_owned();
        let dest = entry_destination(&entry_path, &dest_root)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dest)?;
            }
            EntryType::Regular => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&dest)?;
                io::copy(&mut entry, &mut out)?;
                written.push(dest);
            }
            other => {
                debug!("Skipping archive entry {:?} of type {:?}", entry_path, other);
            }
        }
    }

    Ok(written)
}

/// File entry names in an archive, without writing anything to disk
pub fn list_archive_files(data: &[u8]) -> Result<Vec<String>> {
    let mut archive = Archive::new(data);
    let mut names = Vec::new();

    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type().is_file() {
            let path = entry
                .path()
                .map_err(|e| SandboxError::Archive(e.to_string()))?;
            names.push(path.display().to_string());
        }
    }

    Ok(names)
}

/// Copy a host file or directory into a container at `container_path`
pub async fn copy_to_container(
    engine: &dyn ContainerEngine,
    handle: &ContainerHandle,
    host_path: &Path,
    container_path: &str,
    project_root: &Path,
) -> Result<()> {
    let source = resolve_within_root(host_path, project_root)?;
    if !source.exists() {
        return Err(SandboxError::Archive(format!(
            "source path does not exist: {}",
            source.display()
        )));
    }

    info!(
        "Copying {} to container {}:{}",
        source.display(),
        handle.id,
        container_path
    );

    let archive = pack_archive(&source)?;
    engine.put_archive(handle, container_path, archive).await?;
    Ok(())
}

/// Copy `container_path` out of a container into a host directory,
/// validating every archive entry against the destination before writing
pub async fn copy_from_container(
    engine: &dyn ContainerEngine,
    handle: &ContainerHandle,
    container_path: &str,
    host_path: &Path,
    project_root: &Path,
) -> Result<Vec<PathBuf>> {
    let dest = resolve_within_root(host_path, project_root)?;

    info!(
        "Copying container {}:{} to {}",
        handle.id,
        container_path,
        dest.display()
    );

    let data = engine.get_archive(handle, container_path).await?;
    fs::create_dir_all(&dest)?;
    extract_archive(&data, &dest)
}

/// Preview a container-to-host transfer: the file names the archive would
/// extract, with stream payloads discarded
pub async fn list_files_in_container_archive(
    engine: &dyn ContainerEngine,
    handle: &ContainerHandle,
    container_path: &str,
) -> Result<Vec<String>> {
    let data = engine.get_archive(handle, container_path).await?;
    list_archive_files(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("b"));
    }

    #[test]
    fn test_resolve_within_root_accepts_descendants() {
        let root = Path::new("/project");
        let resolved = resolve_within_root(Path::new("src/main.rs"), root).unwrap();
        assert_eq!(resolved, PathBuf::from("/project/src/main.rs"));

        let resolved = resolve_within_root(Path::new("/project/out"), root).unwrap();
        assert_eq!(resolved, PathBuf::from("/project/out"));
    }

    #[test]
    fn test_resolve_within_root_rejects_escapes() {
        let root = Path::new("/project");
        assert!(resolve_within_root(Path::new("../outside"), root).is_err());
        assert!(resolve_within_root(Path::new("/etc/passwd"), root).is_err());
        assert!(resolve_within_root(Path::new("src/../../outside"), root).is_err());
    }

    #[test]
    fn test_entry_destination_rejects_absolute_and_traversal() {
        let root = Path::new("/dest");
        assert!(entry_destination(Path::new("/etc/passwd"), root).is_err());
        assert!(entry_destination(Path::new("../../etc/passwd"), root).is_err());
        assert!(entry_destination(Path::new("ok/../../../etc"), root).is_err());
        assert!(entry_destination(Path::new("nested/file.txt"), root).is_ok());
    }

    #[test]
    fn test_pack_and_extract_round_trip_with_empty_dir() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("root.txt"), b"root contents").unwrap();
        fs::create_dir(source.path().join("nested")).unwrap();
        fs::write(source.path().join("nested/nested.txt"), b"nested contents").unwrap();
        fs::create_dir(source.path().join("empty")).unwrap();

        let archive = pack_archive(source.path()).unwrap();

        let dest = tempdir().unwrap();
        let written = extract_archive(&archive, dest.path()).unwrap();
        assert_eq!(written.len(), 2);

        assert_eq!(
            fs::read(dest.path().join("root.txt")).unwrap(),
            b"root contents"
        );
        assert_eq!(
            fs::read(dest.path().join("nested/nested.txt")).unwrap(),
            b"nested contents"
        );
        assert!(dest.path().join("empty").is_dir());
    }

    #[test]
    fn test_pack_single_file() {
        let source = tempdir().unwrap();
        let file = source.path().join("single.txt");
        fs::write(&file, b"one file").unwrap();

        let archive = pack_archive(&file).unwrap();
        let names = list_archive_files(&archive).unwrap();
        assert_eq!(names, vec!["single.txt"]);
    }

    #[test]
    fn test_traversal_entry_aborts_before_any_write() {
        // Craft an archive whose only entry tries to climb out of the root
        let mut builder = Builder::new(Vec::new());
        let payload = b"malicious";
        let mut header = tar::Header::new_gnu();
        let name = b"../../etc/passwd";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &payload[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let dest = tempdir().unwrap();
        let result = extract_archive(&archive, dest.path());
        assert!(matches!(result, Err(SandboxError::PathEscape { .. })));

        // Nothing was written inside the destination
        assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_list_archive_files_reports_files_only() {
        let source = tempdir().unwrap();
        fs::write(source.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(source.path().join("dir")).unwrap();
        fs::write(source.path().join("dir/b.txt"), b"b").unwrap();

        let archive = pack_archive(source.path()).unwrap();
        let mut names = list_archive_files(&archive).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.txt", "dir/b.txt"]);
    }
}
