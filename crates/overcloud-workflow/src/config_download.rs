//! Download of the generated playbook bundle
//!
//! Used when ansible runs locally instead of through the workflow engine.

use crate::error::{Result, WorkflowError};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::info;

/// Fetches `{stack}-config.tar.gz` from the object store and unpacks it
#[derive(Debug, Clone)]
pub struct ConfigDownloader {
    http: Client,
    object_store_url: String,
    auth_token: Option<String>,
}

impl ConfigDownloader {
    pub fn new(object_store_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            object_store_url: object_store_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn url_for(&self, stack_name: &str) -> String {
        format!(
            "{}/{stack}-config/{stack}-config.tar.gz",
            self.object_store_url,
            stack = stack_name
        )
    }

    /// Download the bundle for `stack_name` into `work_dir/tripleo-{stack}-config`
    pub async fn download(&self, stack_name: &str, work_dir: &Path) -> Result<PathBuf> {
        let url = self.url_for(stack_name);
        info!(url = %url, "Downloading playbook bundle");

        let mut request = self.http.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Auth-Token", token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WorkflowError::Transport(format!(
                "playbook bundle download failed: HTTP {}",
                response.status()
            )));
        }
        let bytes = response.bytes().await?;

        let dest = work_dir.join(format!("tripleo-{}-config", stack_name));
        let target = dest.clone();
        tokio::task::spawn_blocking(move || unpack(&bytes, &target))
            .await
            .map_err(|e| WorkflowError::io(&dest, std::io::Error::other(e)))??;
        info!(dir = %dest.display(), "Playbook bundle extracted");
        Ok(dest)
    }
}

/// Unpack a gzipped tarball into `dest`.
///
/// Anything already in `dest` is removed first, so only the new bundle's
/// playbooks are present afterwards.
pub fn unpack(tarball: &[u8], dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|e| WorkflowError::io(dest, e))?;
    }
    std::fs::create_dir_all(dest).map_err(|e| WorkflowError::io(dest, e))?;
    let decoder = flate2::read::GzDecoder::new(tarball);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest).map_err(|e| WorkflowError::io(dest, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn bundle_with(name: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let content = b"- hosts: overcloud\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, &content[..]).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn bundle() -> Vec<u8> {
        bundle_with("fast_forward_upgrade_playbook.yaml")
    }

    #[test]
    fn test_url_for() {
        let downloader = ConfigDownloader::new("http://192.168.24.1:8080/v1/AUTH_admin/");
        assert_eq!(
            downloader.url_for("overcloud"),
            "http://192.168.24.1:8080/v1/AUTH_admin/overcloud-config/overcloud-config.tar.gz"
        );
    }

    #[test]
    fn test_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tripleo-overcloud-config");

        unpack(&bundle(), &dest).unwrap();

        let playbook =
            std::fs::read_to_string(dest.join("fast_forward_upgrade_playbook.yaml")).unwrap();
        assert_eq!(playbook, "- hosts: overcloud\n");
    }

    #[test]
    fn test_unpack_replaces_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tripleo-overcloud-config");

        unpack(&bundle_with("old_playbook.yaml"), &dest).unwrap();
        unpack(&bundle_with("new_playbook.yaml"), &dest).unwrap();

        assert!(dest.join("new_playbook.yaml").exists());
        assert!(!dest.join("old_playbook.yaml").exists());
    }

    /// Serve `body` once as the response to any request
    async fn serve_once(body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/AUTH_admin", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
        });
        url
    }

    #[tokio::test]
    async fn test_download_extracts_into_work_dir() {
        let url = serve_once(bundle()).await;
        let work_dir = tempfile::tempdir().unwrap();

        let dest = ConfigDownloader::new(url)
            .download("overcloud", work_dir.path())
            .await
            .unwrap();

        assert_eq!(dest, work_dir.path().join("tripleo-overcloud-config"));
        assert!(dest.join("fast_forward_upgrade_playbook.yaml").exists());
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            unpack(b"not a tarball", dir.path()),
            Err(WorkflowError::Io { .. })
        ));
    }
}
