//! Shapefile archive extraction
//!
//! Uploads arrive as a zip holding at least the `.shp`, `.shx` and `.dbf`
//! members of one shapefile, optionally with a `.prj` and a same-named `.sld`.
//! Everything is unpacked into a per-upload directory that is removed when
//! the [`ExtractionWorkspace`] guard drops.

use crate::core::error::PublishError;
use crate::core::naming::sanitize_layer_name;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Temporary extraction directory, deleted on drop
#[derive(Debug)]
pub struct ExtractionWorkspace {
    path: PathBuf,
}

impl ExtractionWorkspace {
    /// Create `<temp_root>/upload_<uuid>`
    pub fn create(temp_root: &Path) -> Result<Self, PublishError> {
        let path = temp_root.join(format!("upload_{}", Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        tracing::debug!(path = %path.display(), "created extraction workspace");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExtractionWorkspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove extraction workspace"
            );
        }
    }
}

/// A shapefile unpacked from an upload
///
/// The files live as long as this value does.
#[derive(Debug)]
pub struct ExtractedShapefile {
    pub layer_name: String,
    pub shp_path: PathBuf,
    pub sld_body: Option<String>,
    workspace: ExtractionWorkspace,
}

impl ExtractedShapefile {
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }
}

/// Reject anything that is not a `.zip` by name
pub fn ensure_zip_extension(path: &Path) -> Result<(), PublishError> {
    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    if is_zip {
        Ok(())
    } else {
        Err(PublishError::archive(format!(
            "expected a .zip file containing the shapefile, got {}",
            path.display()
        )))
    }
}

/// Unpack `archive` under `temp_root` and locate its shapefile
pub fn prepare_upload(
    archive: &Path,
    temp_root: &Path,
) -> Result<ExtractedShapefile, PublishError> {
    ensure_zip_extension(archive)?;

    let workspace = ExtractionWorkspace::create(temp_root)?;
    let written = extract_archive(archive, workspace.path())?;
    tracing::debug!(archive = %archive.display(), files = written, "archive extracted");

    let shp_path = find_shapefile(workspace.path())?;
    let stem = shp_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let layer_name = sanitize_layer_name(&stem);
    let sld_body = read_companion_style(&shp_path)?;

    tracing::info!(
        layer = %layer_name,
        shapefile = %shp_path.display(),
        has_style = sld_body.is_some(),
        "shapefile located"
    );

    Ok(ExtractedShapefile {
        layer_name,
        shp_path,
        sld_body,
        workspace,
    })
}

/// Extract every regular entry of `archive` into `target_dir` with lowercased names
///
/// Returns the number of files written.
pub fn extract_archive(archive: &Path, target_dir: &Path) -> Result<usize, PublishError> {
    let file = fs::File::open(archive)?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| PublishError::archive(format!("failed to read archive: {}", e)))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| PublishError::archive(format!("failed to read archive entry: {}", e)))?;
        if entry.is_dir() {
            continue;
        }

        let rel_path = sanitize_relative_path(entry.name())?;
        if has_hidden_component(&rel_path) {
            continue;
        }

        let out_path = target_dir.join(lowercase_path(&rel_path));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = fs::File::create(&out_path)?;
        std::io::copy(&mut entry, &mut outfile)?;
        written += 1;
    }

    Ok(written)
}

/// First `.shp` under `root`, walking in name order
pub fn find_shapefile(root: &Path) -> Result<PathBuf, PublishError> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
        })
        .ok_or_else(|| PublishError::archive("archive does not contain a .shp file"))
}

/// Style body from a `.sld` next to `shp_path` with the same basename
pub fn read_companion_style(shp_path: &Path) -> Result<Option<String>, PublishError> {
    let sld_path = shp_path.with_extension("sld");
    if !sld_path.is_file() {
        return Ok(None);
    }

    let bytes = fs::read(&sld_path)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn sanitize_relative_path(path: &str) -> Result<PathBuf, PublishError> {
    let candidate = Path::new(path);
    if candidate.is_absolute()
        || candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(PublishError::archive(format!(
            "invalid path component in archive entry: {}",
            path
        )));
    }
    Ok(candidate.components().collect())
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || part.eq_ignore_ascii_case("__MACOSX")
        }
        _ => false,
    })
}

fn lowercase_path(path: &Path) -> PathBuf {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join(name);
        let mut writer = ZipWriter::new(fs::File::create(&path).unwrap());
        for (entry, content) in entries {
            writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_zip_extension_is_case_insensitive() {
        assert!(ensure_zip_extension(Path::new("/tmp/Rios.ZIP")).is_ok());
        assert!(ensure_zip_extension(Path::new("rios.zip")).is_ok());
        assert!(matches!(
            ensure_zip_extension(Path::new("rios.shp")),
            Err(PublishError::Archive { .. })
        ));
        assert!(ensure_zip_extension(Path::new("zip")).is_err());
    }

    #[test]
    fn test_prepare_upload_locates_shapefile_and_style() {
        let source = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let sld = "<StyledLayerDescriptor><Name>custom</Name></StyledLayerDescriptor>";
        let archive = write_zip(
            source.path(),
            "Rio Grande.zip",
            &[
                ("Rio Grande.SHP", b"shp"),
                ("Rio Grande.SHX", b"shx"),
                ("Rio Grande.DBF", b"dbf"),
                ("Rio Grande.prj", b"prj"),
                ("Rio Grande.sld", sld.as_bytes()),
            ],
        );

        let extracted = prepare_upload(&archive, temp_root.path()).unwrap();

        assert_eq!(extracted.layer_name, "rio_grande");
        assert_eq!(
            extracted.shp_path.file_name().unwrap().to_str(),
            Some("rio grande.shp")
        );
        assert_eq!(extracted.sld_body.as_deref(), Some(sld));
        assert!(extracted.workspace_path().join("rio grande.dbf").is_file());
        assert!(extracted.workspace_path().starts_with(temp_root.path()));
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let source = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let archive = write_zip(source.path(), "rios.zip", &[("rios.shp", b"shp")]);

        let extracted = prepare_upload(&archive, temp_root.path()).unwrap();
        let workspace = extracted.workspace_path().to_path_buf();
        assert!(workspace.is_dir());
        assert!(extracted.sld_body.is_none());

        drop(extracted);
        assert!(!workspace.exists());
    }

    #[test]
    fn test_missing_shapefile_is_archive_error_and_cleans_up() {
        let source = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let archive = write_zip(
            source.path(),
            "docs.zip",
            &[("readme.txt", b"no geometry here")],
        );

        let result = prepare_upload(&archive, temp_root.path());

        match result {
            Err(PublishError::Archive { message }) => {
                assert_eq!(message, "archive does not contain a .shp file")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fs::read_dir(temp_root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let source = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let archive = write_zip(
            source.path(),
            "evil.zip",
            &[("../escape.shp", b"shp"), ("ok.shp", b"shp")],
        );

        let result = prepare_upload(&archive, temp_root.path());

        assert!(matches!(result, Err(PublishError::Archive { .. })));
        assert!(!temp_root.path().join("escape.shp").exists());
    }

    #[test]
    fn test_hidden_entries_are_skipped() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let archive = write_zip(
            source.path(),
            "mac.zip",
            &[
                ("__MACOSX/._rios.shp", b"resource fork"),
                (".hidden.shp", b"shp"),
                ("data/Rios.shp", b"shp"),
            ],
        );

        let written = extract_archive(&archive, target.path()).unwrap();

        assert_eq!(written, 1);
        assert!(!target.path().join("__macosx").exists());
        assert_eq!(
            find_shapefile(target.path()).unwrap(),
            target.path().join("data").join("rios.shp")
        );
    }

    #[test]
    fn test_macosx_folder_is_skipped_in_any_case() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let archive = write_zip(
            source.path(),
            "mac.zip",
            &[
                ("__macosx/aaa.shp", b"shp"),
                ("__MacOSX/data/aab.shp", b"shp"),
                ("rios.shp", b"shp"),
            ],
        );

        let written = extract_archive(&archive, target.path()).unwrap();

        assert_eq!(written, 1);
        assert!(!target.path().join("__macosx").exists());
        assert_eq!(
            find_shapefile(target.path()).unwrap(),
            target.path().join("rios.shp")
        );
    }

    #[test]
    fn test_first_shapefile_in_name_order_wins() {
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("zonas.shp"), b"shp").unwrap();
        fs::write(target.path().join("bacias.shp"), b"shp").unwrap();

        assert_eq!(
            find_shapefile(target.path()).unwrap(),
            target.path().join("bacias.shp")
        );
    }

    #[test]
    fn test_corrupt_archive_is_archive_error() {
        let source = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let path = source.path().join("broken.zip");
        fs::write(&path, b"not a zip at all").unwrap();

        assert!(matches!(
            prepare_upload(&path, temp_root.path()),
            Err(PublishError::Archive { .. })
        ));
    }
}
