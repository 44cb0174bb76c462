//! Fetches the dataset archive and unpacks it.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::config::DataIngestionConfig;
use crate::core::{ArtifactKind, StageArtifact};
use crate::errors::{FormatError, Result, SummarizerError};

/// What the server said about a fetched archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Bytes written.
    pub bytes: u64,
    /// `Content-Type` header.
    pub content_type: Option<String>,
    /// `Content-Length` header.
    pub content_length: Option<u64>,
    /// `ETag` header.
    pub etag: Option<String>,
}

/// Copies a remote resource to a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Streams `url` into `dest`, creating or truncating it.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport>;
}

#[async_trait]
impl<T: ArchiveFetcher + ?Sized> ArchiveFetcher for std::sync::Arc<T> {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport> {
        (**self).fetch(url, dest).await
    }
}

/// HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchReport> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SummarizerError::download(url, e))?;

        let header = |name: reqwest::header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        let mut report = FetchReport {
            bytes: 0,
            content_type: header(CONTENT_TYPE),
            content_length: header(CONTENT_LENGTH).and_then(|v| v.parse().ok()),
            etag: header(ETAG),
        };

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| SummarizerError::io(dest, e))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SummarizerError::download(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SummarizerError::io(dest, e))?;
            report.bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| SummarizerError::io(dest, e))?;

        Ok(report)
    }
}

/// Ingestion worker.
#[derive(Debug)]
pub struct DataIngestion<F = HttpFetcher> {
    config: DataIngestionConfig,
    fetcher: F,
}

impl DataIngestion<HttpFetcher> {
    /// Creates a worker that fetches over HTTP.
    #[must_use]
    pub fn new(config: DataIngestionConfig) -> Self {
        Self::with_fetcher(config, HttpFetcher::new())
    }
}

impl<F: ArchiveFetcher> DataIngestion<F> {
    /// Creates a worker with a custom fetcher.
    pub fn with_fetcher(config: DataIngestionConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    /// Fetches the archive unless it is already present.
    ///
    /// The transfer lands in `<local_data_file>.part` and is renamed on
    /// success. With a pinned digest, a present file that does not match
    /// is fetched again, and a fresh download that does not match is
    /// discarded.
    pub async fn download(&self) -> Result<StageArtifact> {
        let target = &self.config.local_data_file;
        let expected = self.config.sha256.as_deref();

        if target.exists() {
            let size = fs::metadata(target)
                .map_err(|e| SummarizerError::io(target, e))?
                .len();
            match expected {
                Some(expected) if sha256_file(target)? != expected => {
                    tracing::warn!(
                        path = %target.display(),
                        "Existing archive does not match the pinned sha256, fetching again"
                    );
                    fs::remove_file(target).map_err(|e| SummarizerError::io(target, e))?;
                }
                _ => {
                    tracing::info!(
                        path = %target.display(),
                        size,
                        "File already exists of size: {size} bytes"
                    );
                    return Ok(StageArtifact::new(ArtifactKind::Archive, target)
                        .with_metadata("bytes", serde_json::json!(size))
                        .with_metadata("downloaded", serde_json::json!(false)));
                }
            }
        }

        for dir in [Some(self.config.root_dir.as_path()), target.parent()]
            .into_iter()
            .flatten()
            .filter(|d| !d.as_os_str().is_empty())
        {
            fs::create_dir_all(dir).map_err(|e| SummarizerError::io(dir, e))?;
        }

        let partial = partial_path(target);
        let report = match self.fetcher.fetch(&self.config.source_url, &partial).await {
            Ok(report) => report,
            Err(err) => {
                let _ = fs::remove_file(&partial);
                return Err(err);
            }
        };
        tracing::info!(
            url = %self.config.source_url,
            bytes = report.bytes,
            content_type = report.content_type.as_deref().unwrap_or("-"),
            content_length = ?report.content_length,
            etag = report.etag.as_deref().unwrap_or("-"),
            "Downloaded {} with headers",
            target.display()
        );

        let mut artifact = StageArtifact::new(ArtifactKind::Archive, target)
            .with_metadata("bytes", serde_json::json!(report.bytes))
            .with_metadata("downloaded", serde_json::json!(true));

        if let Some(expected) = expected {
            let actual = sha256_file(&partial)?;
            if actual != expected {
                let _ = fs::remove_file(&partial);
                return Err(SummarizerError::Integrity {
                    path: target.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            artifact = artifact.with_metadata("sha256", serde_json::json!(actual));
        }

        fs::rename(&partial, target).map_err(|e| SummarizerError::io(target, e))?;
        Ok(artifact)
    }

    /// Extracts the archive into `unzip_dir`, creating it if needed.
    pub fn extract(&self) -> Result<StageArtifact> {
        let archive_path = &self.config.local_data_file;
        let unzip_dir = &self.config.unzip_dir;
        fs::create_dir_all(unzip_dir).map_err(|e| SummarizerError::io(unzip_dir, e))?;

        let file = File::open(archive_path).map_err(|e| SummarizerError::io(archive_path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| FormatError::Archive {
            path: archive_path.clone(),
            message: e.to_string(),
        })?;
        let entries = archive.len();
        archive.extract(unzip_dir).map_err(|e| match e {
            zip::result::ZipError::Io(source) => SummarizerError::io(unzip_dir, source),
            other => FormatError::Archive {
                path: archive_path.clone(),
                message: other.to_string(),
            }
            .into(),
        })?;

        tracing::info!(
            archive = %archive_path.display(),
            dest = %unzip_dir.display(),
            entries,
            "Extracted archive"
        );
        Ok(StageArtifact::new(ArtifactKind::Corpus, unzip_dir)
            .with_metadata("entries", serde_json::json!(entries)))
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Lowercase hex sha256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| SummarizerError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| SummarizerError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_zip;
    use pretty_assertions::assert_eq;

    fn config(root: &Path) -> DataIngestionConfig {
        DataIngestionConfig {
            root_dir: root.join("data_ingestion"),
            source_url: "https://example.com/summarizer-data.zip".to_string(),
            local_data_file: root.join("data_ingestion/data.zip"),
            unzip_dir: root.join("data_ingestion"),
            sha256: None,
        }
    }

    fn dataset_entries() -> Vec<(&'static str, &'static str)> {
        vec![
            ("samsum_dataset/train.jsonl", "{\"dialogue\":\"a\",\"summary\":\"b\"}\n"),
            ("samsum_dataset/test.jsonl", "{\"dialogue\":\"a\",\"summary\":\"b\"}\n"),
            ("samsum_dataset/validation.jsonl", "{\"dialogue\":\"a\",\"summary\":\"b\"}\n"),
        ]
    }

    fn zip_writing_fetcher(times: usize) -> MockArchiveFetcher {
        let mut fetcher = MockArchiveFetcher::new();
        fetcher
            .expect_fetch()
            .times(times)
            .returning(|_, dest| {
                write_zip(dest, &dataset_entries());
                Ok(FetchReport {
                    bytes: std::fs::metadata(dest).unwrap().len(),
                    content_type: Some("application/zip".to_string()),
                    ..FetchReport::default()
                })
            });
        fetcher
    }

    #[tokio::test]
    async fn test_download_then_extract_populates_unzip_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        assert!(!config.local_data_file.exists());

        let ingestion = DataIngestion::with_fetcher(config.clone(), zip_writing_fetcher(1));
        let archive = ingestion.download().await.unwrap();
        assert_eq!(archive.path, config.local_data_file);
        assert_eq!(archive.metadata["downloaded"], serde_json::json!(true));
        assert!(config.local_data_file.is_file());
        assert!(!partial_path(&config.local_data_file).exists());

        let corpus = ingestion.extract().unwrap();
        assert_eq!(corpus.kind, ArtifactKind::Corpus);
        assert!(config.unzip_dir.join("samsum_dataset/train.jsonl").is_file());
        assert!(config.unzip_dir.join("samsum_dataset/validation.jsonl").is_file());
    }

    #[tokio::test]
    async fn test_present_file_is_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.root_dir).unwrap();
        std::fs::write(&config.local_data_file, b"cached").unwrap();

        let ingestion = DataIngestion::with_fetcher(config.clone(), zip_writing_fetcher(0));
        let first = ingestion.download().await.unwrap();
        let second = ingestion.download().await.unwrap();

        assert_eq!(first.metadata["downloaded"], serde_json::json!(false));
        assert_eq!(second.metadata["bytes"], serde_json::json!(6));
        assert_eq!(std::fs::read(&config.local_data_file).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_any_existing_path_counts_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.local_data_file).unwrap();

        let ingestion = DataIngestion::with_fetcher(config.clone(), zip_writing_fetcher(0));
        let archive = ingestion.download().await.unwrap();

        assert_eq!(archive.metadata["downloaded"], serde_json::json!(false));
        assert!(config.local_data_file.is_dir());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let mut fetcher = MockArchiveFetcher::new();
        fetcher.expect_fetch().times(1).returning(|url, dest| {
            std::fs::write(dest, b"half").unwrap();
            Err(SummarizerError::download(url, "connection reset"))
        });

        let err = DataIngestion::with_fetcher(config.clone(), fetcher)
            .download()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "download");
        assert!(!config.local_data_file.exists());
        assert!(!partial_path(&config.local_data_file).exists());
    }

    #[tokio::test]
    async fn test_digest_mismatch_on_fresh_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.sha256 = Some("0".repeat(64));

        let err = DataIngestion::with_fetcher(config.clone(), zip_writing_fetcher(1))
            .download()
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Integrity { .. }));
        assert!(!config.local_data_file.exists());
    }

    #[tokio::test]
    async fn test_stale_file_with_wrong_digest_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());

        // Build the archive once to learn its digest.
        let reference = dir.path().join("reference.zip");
        write_zip(&reference, &dataset_entries());
        config.sha256 = Some(sha256_file(&reference).unwrap());

        std::fs::create_dir_all(&config.root_dir).unwrap();
        std::fs::write(&config.local_data_file, b"stale").unwrap();

        let artifact = DataIngestion::with_fetcher(config.clone(), zip_writing_fetcher(1))
            .download()
            .await
            .unwrap();
        assert_eq!(artifact.metadata["downloaded"], serde_json::json!(true));
        assert_eq!(
            sha256_file(&config.local_data_file).unwrap(),
            config.sha256.clone().unwrap()
        );
    }

    #[test]
    fn test_malformed_archive_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.root_dir).unwrap();
        std::fs::write(&config.local_data_file, b"not a zip").unwrap();

        let err = DataIngestion::with_fetcher(config, MockArchiveFetcher::new())
            .extract()
            .unwrap_err();
        assert!(matches!(
            err,
            SummarizerError::Format(FormatError::Archive { .. })
        ));
    }

    #[test]
    fn test_sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_http_fetcher_streams_body_and_reads_headers() {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new()
            .route(
                "/data.zip",
                get(|| async { ([("content-type", "application/zip"), ("etag", "\"v1\"")], "zipbytes") }),
            )
            .route("/missing.zip", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("data.zip");
        let fetcher = HttpFetcher::new();

        let report = fetcher
            .fetch(&format!("http://{addr}/data.zip"), &dest)
            .await
            .unwrap();
        assert_eq!(report.bytes, 8);
        assert_eq!(report.content_length, Some(8));
        assert_eq!(report.content_type.as_deref(), Some("application/zip"));
        assert_eq!(report.etag.as_deref(), Some("\"v1\""));
        assert_eq!(std::fs::read(&dest).unwrap(), b"zipbytes");

        let err = fetcher
            .fetch(&format!("http://{addr}/missing.zip"), &dir.path().join("m.zip"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "download");
    }
}
