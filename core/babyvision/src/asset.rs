use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};

use crate::error::BabyVisionError;

/// Raw bytes of the face detection model.
///
/// Fetched once per session and shared by every detection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierBytes(Arc<[u8]>);

impl ClassifierBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for ClassifierBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

/// Where the classifier stands for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierState {
    /// No fetch has completed yet.
    Pending,
    /// The model bytes are available.
    Loaded(ClassifierBytes),
    /// The fetch failed; detection stays disabled for the session.
    Failed(String),
}

impl ClassifierState {
    pub fn bytes(&self) -> Option<&ClassifierBytes> {
        match self {
            ClassifierState::Loaded(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Source of static assets such as the classifier file.
#[async_trait(?Send)]
pub trait AssetSource {
    /// Fetch the asset at `path` as raw bytes.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BabyVisionError>;
}

/// Serves assets from a directory on the local filesystem.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsAssetSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait(?Send)]
impl AssetSource for FsAssetSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, BabyVisionError> {
        let full = self.root.join(path.trim_start_matches('/'));
        tokio::fs::read(&full)
            .await
            .map_err(|e| BabyVisionError::AssetFetch {
                path: full.display().to_string(),
                reason: e.to_string(),
            })
    }
}

/// Issue exactly one fetch for the classifier asset.
///
/// An empty body is treated as a failed fetch.
pub async fn fetch_classifier(source: &dyn AssetSource, path: &str) -> ClassifierState {
    match source.fetch(path).await {
        Ok(bytes) if bytes.is_empty() => {
            error!("classifier asset {path} is empty");
            ClassifierState::Failed(format!("{path} is empty"))
        }
        Ok(bytes) => {
            info!("loaded classifier asset {path} ({} bytes)", bytes.len());
            ClassifierState::Loaded(ClassifierBytes::from(bytes))
        }
        Err(e) => {
            error!("error fetching classifier asset: {e}");
            ClassifierState::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        body: Option<Vec<u8>>,
        calls: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl AssetSource for CountingSource {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, BabyVisionError> {
            self.calls.set(self.calls.get() + 1);
            self.body.clone().ok_or_else(|| BabyVisionError::AssetFetch {
                path: path.to_string(),
                reason: "404".to_string(),
            })
        }
    }

    #[test]
    fn successful_fetch_is_loaded_after_one_call() {
        let source = CountingSource {
            body: Some(vec![1, 2, 3]),
            calls: Cell::new(0),
        };
        let state = futures::executor::block_on(fetch_classifier(&source, "models/a.bin"));
        assert_eq!(state.bytes().map(|b| b.len()), Some(3));
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn failed_fetch_is_not_retried() {
        let source = CountingSource {
            body: None,
            calls: Cell::new(0),
        };
        let state = futures::executor::block_on(fetch_classifier(&source, "models/a.bin"));
        assert!(matches!(state, ClassifierState::Failed(_)));
        assert!(state.bytes().is_none());
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn empty_body_counts_as_failure() {
        let source = CountingSource {
            body: Some(Vec::new()),
            calls: Cell::new(0),
        };
        let state = futures::executor::block_on(fetch_classifier(&source, "models/a.bin"));
        assert!(matches!(state, ClassifierState::Failed(_)));
    }

    #[tokio::test]
    async fn fs_source_reports_missing_file() {
        let source = FsAssetSource::new(std::env::temp_dir().join("babyvision-missing-root"));
        let result = source.fetch("/models/none.bin").await;
        assert!(matches!(result, Err(BabyVisionError::AssetFetch { .. })));
    }

    #[tokio::test]
    async fn fs_source_reads_relative_to_root() {
        let root = std::env::temp_dir().join(format!("babyvision-assets-{}", std::process::id()));
        std::fs::create_dir_all(root.join("models")).unwrap();
        std::fs::write(root.join("models/model.bin"), [7u8, 8, 9]).unwrap();

        let source = FsAssetSource::new(&root);
        let bytes = source.fetch("/models/model.bin").await.unwrap();
        assert_eq!(bytes, vec![7, 8, 9]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
