//! Ordered build output and its consumers.

use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::BuildError;

pub(crate) type StreamSender = mpsc::Sender<Result<String, BuildError>>;

/// Bundle chunks in dispatch order.
///
/// The engine only produces as fast as the stream is pulled. An error is
/// always the last item. Dropping the stream cancels the build.
#[derive(Debug)]
pub struct BuildStream {
    rx: mpsc::Receiver<Result<String, BuildError>>,
    driver: Option<JoinHandle<()>>,
}

impl BuildStream {
    pub(crate) fn channel() -> (StreamSender, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx, driver: None })
    }

    pub(crate) fn with_driver(mut self, driver: JoinHandle<()>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// The next chunk, or `None` once the build is over.
    pub async fn next(&mut self) -> Option<Result<String, BuildError>> {
        match self.rx.recv().await {
            Some(item) => Some(item),
            None => self.finish().await.err().map(Err),
        }
    }

    /// Surface a panic in the engine itself.
    async fn finish(&mut self) -> Result<(), BuildError> {
        if let Some(driver) = self.driver.take() {
            driver.await.map_err(|err| BuildError::task(format!("build driver failed: {}", err)))?;
        }
        Ok(())
    }

    /// The whole artifact as text.
    pub async fn collect_string(mut self) -> Result<String, BuildError> {
        let mut out = String::new();
        while let Some(chunk) = self.next().await {
            out.push_str(&chunk?);
        }
        Ok(out)
    }

    /// The whole artifact as bytes.
    pub async fn collect_bytes(self) -> Result<Vec<u8>, BuildError> {
        self.collect_string().await.map(String::into_bytes)
    }

    /// Write the artifact to `path`, returning the byte count.
    ///
    /// Parent directories are created. If the build or the write fails the
    /// partial file is removed before the error is returned.
    pub async fn write_to_file(self, path: &Path) -> Result<u64, BuildError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| BuildError::write(parent, e))?;
        }
        let file = fs::File::create(path).await.map_err(|e| BuildError::write(path, e))?;
        let mut writer = BufWriter::new(file);

        match self.pump(&mut writer, path).await {
            Ok(written) => {
                debug!(path = %path.display(), bytes = written, "wrote artifact");
                Ok(written)
            }
            Err(err) => {
                drop(writer);
                if let Err(remove) = fs::remove_file(path).await {
                    warn!(
                        path = %path.display(),
                        error = %remove,
                        "could not remove partial artifact"
                    );
                }
                Err(err)
            }
        }
    }

    async fn pump<W>(mut self, writer: &mut W, path: &Path) -> Result<u64, BuildError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        while let Some(chunk) = self.next().await {
            let chunk = chunk?;
            writer.write_all(chunk.as_bytes()).await.map_err(|e| BuildError::write(path, e))?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| BuildError::write(path, e))?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stream_of(items: Vec<Result<String, BuildError>>) -> BuildStream {
        let (tx, stream) = BuildStream::channel();
        let driver = tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });
        stream.with_driver(driver)
    }

    #[tokio::test]
    async fn test_collect_string() {
        let stream = stream_of(vec![Ok("a\n\n".into()), Ok("b\n\n".into())]);
        assert_eq!(stream.collect_string().await.unwrap(), "a\n\nb\n\n");
    }

    #[tokio::test]
    async fn test_collect_surfaces_error() {
        let stream = stream_of(vec![Ok("a".into()), Err(BuildError::task("boom"))]);
        assert!(matches!(stream.collect_bytes().await, Err(BuildError::Task(_))));
    }

    #[tokio::test]
    async fn test_write_to_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build/out/build.js");

        let written = stream_of(vec![Ok("abc".into())]).write_to_file(&path).await.unwrap();
        assert_eq!(written, 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_write_to_file_removes_partial_output() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.js");

        let stream = stream_of(vec![Ok("partial".into()), Err(BuildError::task("boom"))]);
        assert!(stream.write_to_file(&path).await.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_driver_panic_is_an_error() {
        let (tx, stream) = BuildStream::channel();
        let driver = tokio::spawn(async move {
            let _tx = tx;
            panic!("driver exploded");
        });
        let result = stream.with_driver(driver).collect_string().await;
        assert!(matches!(result, Err(BuildError::Task(_))));
    }
}
