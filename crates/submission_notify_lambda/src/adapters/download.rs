use std::path::Path;

use tokio::io::AsyncWriteExt;

use super::block_on;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub bytes_written: u64,
    pub content_type: Option<String>,
}

pub trait SubmissionDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<DownloadedFile, String>;
}

#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SubmissionDownloader for HttpDownloader {
    fn download(&self, url: &str, destination: &Path) -> Result<DownloadedFile, String> {
        if url.trim().is_empty() {
            return Err("submission URL is empty".to_string());
        }

        block_on(async {
            let mut response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|error| format!("failed to request submission: {error}"))?
                .error_for_status()
                .map_err(|error| format!("submission download was rejected: {error}"))?;

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            let mut file = tokio::fs::File::create(destination)
                .await
                .map_err(|error| format!("failed to create local submission file: {error}"))?;

            let mut bytes_written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|error| format!("failed to read submission body: {error}"))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|error| format!("failed to write local submission file: {error}"))?;
                bytes_written += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|error| format!("failed to flush local submission file: {error}"))?;

            Ok(DownloadedFile {
                bytes_written,
                content_type,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_response_body_to_destination() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/releases/report.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.7 sample")
            .create_async()
            .await;

        let workspace = tempfile::tempdir().expect("tempdir should be created");
        let destination = workspace.path().join("report.pdf");
        let downloader = HttpDownloader::new(reqwest::Client::new());

        let downloaded = downloader
            .download(&format!("{}/releases/report.pdf", server.url()), &destination)
            .expect("download should succeed");

        mock.assert_async().await;
        assert_eq!(downloaded.bytes_written, 15);
        assert_eq!(downloaded.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(
            std::fs::read(&destination).expect("file should exist"),
            b"%PDF-1.7 sample"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn error_status_is_a_download_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.zip")
            .with_status(404)
            .create_async()
            .await;

        let workspace = tempfile::tempdir().expect("tempdir should be created");
        let downloader = HttpDownloader::new(reqwest::Client::new());

        let error = downloader
            .download(
                &format!("{}/missing.zip", server.url()),
                &workspace.path().join("missing.zip"),
            )
            .expect_err("404 should fail");

        assert!(error.starts_with("submission download was rejected"));
        assert!(error.contains("404"));
        assert!(!workspace.path().join("missing.zip").exists());
    }

    #[test]
    fn empty_url_fails_without_request() {
        let downloader = HttpDownloader::new(reqwest::Client::new());
        let error = downloader
            .download("", Path::new("/tmp/unused"))
            .expect_err("empty url should fail");
        assert_eq!(error, "submission URL is empty");
    }
}
