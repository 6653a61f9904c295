//! Local file trees that get uploaded by the deployer.
//!
//! At declaration time an asset is just a path and two template parameters.
//! The deployer uploads the tree, then fills `{id}S3Bucket` / `{id}S3Key`
//! with where it put it. The tree is only read during synthesis, where it is
//! fingerprinted so the deployer can tell whether anything changed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Result, SiteError};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    pub id: String,
    pub path: PathBuf,
    pub bucket_parameter: String,
    pub key_parameter: String,
}

impl AssetSource {
    pub fn new<P: Into<PathBuf>>(id: &str, path: P) -> Self {
        Self {
            id: id.to_string(),
            path: path.into(),
            bucket_parameter: format!("{id}S3Bucket"),
            key_parameter: format!("{id}S3Key"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifestEntry {
    pub id: String,
    pub path: String,
    pub fingerprint: String,
    pub file_count: usize,
    pub total_bytes: u64,
    pub bucket_parameter: String,
    pub key_parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub version: u32,
    pub assets: Vec<AssetManifestEntry>,
}

/// every regular file under `root`, symlinks followed. A single file
/// yields itself.
fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SiteError::io(&path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Adler-32 over every file's relative path and contents, in path order.
/// Paths and contents are each prefixed with their length.
pub fn fingerprint(asset: &AssetSource) -> Result<AssetManifestEntry> {
    let root = &asset.path;
    let mut entries: Vec<(String, PathBuf)> = list_files(root)?
        .into_iter()
        .map(|p| {
            let rel = p.strip_prefix(root).unwrap_or(&p);
            let rel = rel.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            (rel, p)
        })
        .collect();
    entries.sort();

    let mut hasher = adler::Adler32::new();
    let mut total_bytes = 0u64;
    for (rel, path) in entries.iter() {
        let contents = std::fs::read(path).map_err(|e| SiteError::io(path, e))?;
        hasher.write_slice(&(rel.len() as u64).to_le_bytes());
        hasher.write_slice(rel.as_bytes());
        hasher.write_slice(&(contents.len() as u64).to_le_bytes());
        hasher.write_slice(&contents);
        total_bytes += contents.len() as u64;
    }

    Ok(AssetManifestEntry {
        id: asset.id.clone(),
        path: root.to_string_lossy().to_string(),
        fingerprint: format!("{:08x}", hasher.checksum()),
        file_count: entries.len(),
        total_bytes,
        bucket_parameter: asset.bucket_parameter.clone(),
        key_parameter: asset.key_parameter.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn parameters_are_named_after_the_asset() {
        let asset = AssetSource::new("SiteAsset1234", "./public");
        assert_eq!(asset.bucket_parameter, "SiteAsset1234S3Bucket");
        assert_eq!(asset.key_parameter, "SiteAsset1234S3Key");
    }

    #[test]
    fn fingerprints_nested_trees() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "<h1>hi</h1>");
        write(dir.path(), "error.html", "oops");
        write(dir.path(), "css/site.css", "body {}");
        let asset = AssetSource::new("A", dir.path());
        let entry = fingerprint(&asset).unwrap();
        assert_eq!(entry.file_count, 3);
        assert_eq!(entry.total_bytes, 11 + 4 + 7);
        assert_eq!(entry.fingerprint.len(), 8);
        assert_eq!(entry, fingerprint(&asset).unwrap());
    }

    #[test]
    fn fingerprint_tracks_content_and_names() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "v1");
        let asset = AssetSource::new("A", dir.path());
        let first = fingerprint(&asset).unwrap().fingerprint;

        write(dir.path(), "index.html", "v2");
        let second = fingerprint(&asset).unwrap().fingerprint;
        assert_ne!(first, second);

        std::fs::rename(dir.path().join("index.html"), dir.path().join("main.html")).unwrap();
        let third = fingerprint(&asset).unwrap().fingerprint;
        assert_ne!(second, third);
    }

    #[test]
    fn single_file_assets() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "site.zip", "zipzip");
        let entry = fingerprint(&AssetSource::new("A", dir.path().join("site.zip"))).unwrap();
        assert_eq!(entry.file_count, 1);
        assert_eq!(entry.total_bytes, 6);
    }

    #[test]
    fn missing_asset_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fingerprint(&AssetSource::new("A", dir.path().join("dist"))).unwrap_err();
        assert!(matches!(err, SiteError::Io { path, .. } if path.ends_with("dist")));
    }

    #[test]
    fn moving_bytes_between_files_changes_the_fingerprint() {
        let one = tempfile::tempdir().unwrap();
        write(one.path(), "a", "b\0c");
        let two = tempfile::tempdir().unwrap();
        write(two.path(), "a", "");
        write(two.path(), "b", "c");
        let one = fingerprint(&AssetSource::new("A", one.path())).unwrap();
        let two = fingerprint(&AssetSource::new("A", two.path())).unwrap();
        assert_ne!(one.fingerprint, two.fingerprint);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_followed() {
        let images = tempfile::tempdir().unwrap();
        write(images.path(), "logo.svg", "<svg/>");
        let site = tempfile::tempdir().unwrap();
        write(site.path(), "index.html", "<img src=img/logo.svg>");
        std::os::unix::fs::symlink(images.path(), site.path().join("img")).unwrap();

        let linked = fingerprint(&AssetSource::new("A", site.path())).unwrap();
        assert_eq!(linked.file_count, 2);
        assert_eq!(linked.total_bytes, 22 + 6);

        // same tree with a real directory in place of the link
        let copied = tempfile::tempdir().unwrap();
        write(copied.path(), "index.html", "<img src=img/logo.svg>");
        write(copied.path(), "img/logo.svg", "<svg/>");
        assert_eq!(linked.fingerprint, fingerprint(&AssetSource::new("A", copied.path())).unwrap().fingerprint);
    }
}
