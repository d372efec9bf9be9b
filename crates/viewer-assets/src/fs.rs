//! Filesystem-backed loader and probe.
//!
//! URLs are treated as paths under a public root directory, the way a static
//! file server would map them.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use viewer_core::AssetError;

use crate::loader::{AssetLoader, AssetProbe, ModelAsset};

/// Loads GLB files from a public directory.
#[derive(Debug, Clone)]
pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetLoader for FsAssetLoader {
    async fn load(&self, url: &str) -> Result<ModelAsset, AssetError> {
        let path = map_url(&self.root, url)?;
        tracing::debug!(url, path = %path.display(), "loading asset from disk");

        let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound {
                url: url.to_string(),
            },
            _ => AssetError::Network(format!("{}: {}", path.display(), e)),
        })?;

        ModelAsset::from_glb(data)
    }
}

/// Checks file existence under a public directory.
#[derive(Debug, Clone)]
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetProbe for FsProbe {
    async fn exists(&self, url: &str) -> Result<bool, AssetError> {
        let path = map_url(&self.root, url)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AssetError::Network(e.to_string())),
        }
    }
}

/// Map a URL path onto `root`, refusing anything that escapes it.
fn map_url(root: &Path, url: &str) -> Result<PathBuf, AssetError> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let relative = Path::new(path.trim_start_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(AssetError::NotFound {
            url: url.to_string(),
        });
    }

    Ok(root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb::encode_glb;

    fn public_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(
            dir.path().join("models/rings-walnut.glb"),
            encode_glb(r#"{"asset":{"version":"2.0"},"meshes":[{}]}"#, None),
        )
        .unwrap();
        std::fs::write(dir.path().join("models/rings-broken.glb"), b"garbage").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_existing_model() {
        let dir = public_dir();
        let loader = FsAssetLoader::new(dir.path());
        let model = loader.load("/models/rings-walnut.glb").await.unwrap();
        assert_eq!(model.summary.mesh_count, 1);
    }

    #[tokio::test]
    async fn test_missing_model_is_not_found() {
        let dir = public_dir();
        let loader = FsAssetLoader::new(dir.path());
        let err = loader.load("/models/rings-steel.glb").await.unwrap_err();
        assert_eq!(
            err,
            AssetError::NotFound {
                url: "/models/rings-steel.glb".into()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_model_is_decode_error() {
        let dir = public_dir();
        let loader = FsAssetLoader::new(dir.path());
        let err = loader.load("/models/rings-broken.glb").await.unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[tokio::test]
    async fn test_probe() {
        let dir = public_dir();
        let probe = FsProbe::new(dir.path());
        assert!(probe.exists("/models/rings-walnut.glb").await.unwrap());
        assert!(!probe.exists("/models/rings-steel.glb").await.unwrap());
    }

    #[test]
    fn test_map_url_rejects_traversal() {
        let root = Path::new("/srv/public");
        assert!(map_url(root, "/../etc/passwd").is_err());
        assert_eq!(
            map_url(root, "/models/a.glb?v=2").unwrap(),
            PathBuf::from("/srv/public/models/a.glb")
        );
    }
}
