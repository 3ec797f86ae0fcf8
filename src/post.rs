//! Final persistence of accepted images.

use crate::collaborators::PostProcessor;
use crate::util::write_atomic;
use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};

/// Writes the accepted bytes to the destination unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePostProcessor;

impl PostProcessor for FilePostProcessor {
    fn finalize<'a>(
        &'a self,
        image: Vec<u8>,
        destination: &'a Path,
    ) -> BoxFuture<'a, anyhow::Result<PathBuf>> {
        async move {
            if image.is_empty() {
                anyhow::bail!("refusing to write an empty image to {}", destination.display());
            }
            let target = destination.to_path_buf();
            let path = target.clone();
            tokio::task::spawn_blocking(move || write_atomic(&target, &image))
                .await
                .map_err(|e| anyhow::anyhow!("write task failed: {}", e))??;
            Ok(path)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_into_missing_directories() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("job1").join("job1_enhanced_1.jpg");

        let path = FilePostProcessor
            .finalize(b"jpeg".to_vec(), &destination)
            .await
            .unwrap();
        assert_eq!(path, destination);
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn empty_images_are_rejected() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("x.jpg");
        assert!(FilePostProcessor.finalize(Vec::new(), &destination).await.is_err());
        assert!(!destination.exists());
    }
}
