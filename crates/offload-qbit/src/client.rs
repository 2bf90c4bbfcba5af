//! Cookie-session client for the qBittorrent Web API v2.
//!
//! # Design
//! - Logins are serialised behind an async mutex so concurrent callers
//!   share one session instead of racing for cookies.
//! - A `403 Forbidden` means the session expired; the client logs in again
//!   and replays the request exactly once.
//! - Content paths come from the listing when they exist on disk; the file
//!   list of a torrent is only fetched when neither listed path does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use offload_core::{AdapterResult, Item, ItemFilter, SourceAdapter};
use reqwest::cookie::Jar;
use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{QbitError, QbitResult};
use crate::model::{TorrentFile, TorrentInfo};

const LOGIN_OK: &str = "Ok.";

/// Connection settings for the qBittorrent Web UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QbitConfig {
    /// Host name, optionally with an explicit `http://` or `https://` scheme.
    pub host: String,
    /// Web UI port.
    pub port: u16,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl QbitConfig {
    /// Base URL of the Web UI without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.contains("://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }
}

impl Default for QbitConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// qBittorrent Web API client implementing [`SourceAdapter`].
#[derive(Debug)]
pub struct QbitClient {
    http: Client,
    jar: Arc<Jar>,
    base_url: String,
    username: String,
    password: String,
    authenticated: Mutex<bool>,
}

impl QbitClient {
    /// Build a client; no request is sent until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: &QbitConfig) -> QbitResult<Self> {
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| QbitError::ClientBuild { source })?;
        Ok(Self {
            http,
            jar,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            authenticated: Mutex::new(false),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Start a fresh session, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`QbitError::LoginRejected`] for bad credentials and a request
    /// or status error when the Web UI is unreachable.
    pub async fn login(&self) -> QbitResult<()> {
        let mut authenticated = self.authenticated.lock().await;
        *authenticated = false;
        self.authenticate(&mut authenticated).await
    }

    async fn ensure_session(&self) -> QbitResult<()> {
        let mut authenticated = self.authenticated.lock().await;
        if *authenticated {
            return Ok(());
        }
        self.authenticate(&mut authenticated).await
    }

    async fn authenticate(&self, authenticated: &mut bool) -> QbitResult<()> {
        let response = self
            .http
            .post(self.url("/api/v2/auth/login"))
            .header(REFERER, &self.base_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|source| QbitError::request("qbit.login", source))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(QbitError::Status {
                operation: "qbit.login",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|source| QbitError::request("qbit.login", source))?;
        if status != StatusCode::OK || body.trim() != LOGIN_OK {
            return Err(QbitError::LoginRejected {
                status: status.as_u16(),
                body,
            });
        }

        *authenticated = true;
        info!(url = %self.base_url, "logged in to qBittorrent");
        Ok(())
    }

    /// Send an authenticated request, logging in again once on `403`.
    async fn send<F>(&self, operation: &'static str, build: F) -> QbitResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.ensure_session().await?;
        let response = build(&self.http)
            .send()
            .await
            .map_err(|source| QbitError::request(operation, source))?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }

        debug!(operation, "session rejected; logging in again");
        self.login().await?;
        build(&self.http)
            .send()
            .await
            .map_err(|source| QbitError::request(operation, source))
    }

    async fn expect_success(operation: &'static str, response: Response) -> QbitResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(QbitError::Status {
            operation,
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }

    /// List torrents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the body is not a torrent list.
    pub async fn torrents(&self, filter: &ItemFilter) -> QbitResult<Vec<TorrentInfo>> {
        const OPERATION: &str = "qbit.list";
        let url = self.url("/api/v2/torrents/info");
        let response = self
            .send(OPERATION, |http| {
                let request = http.get(&url).query(&[("filter", filter.status.as_str())]);
                match filter.category.as_deref() {
                    Some(category) => request.query(&[("category", category)]),
                    None => request,
                }
            })
            .await?;
        Self::expect_success(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|source| QbitError::Decode {
                operation: OPERATION,
                source,
            })
    }

    /// Files of the torrent `hash`, in the order qBittorrent reports them.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the body is not a file list.
    pub async fn torrent_files(&self, hash: &str) -> QbitResult<Vec<TorrentFile>> {
        const OPERATION: &str = "qbit.files";
        let url = self.url("/api/v2/torrents/files");
        let response = self
            .send(OPERATION, |http| http.get(&url).query(&[("hash", hash)]))
            .await?;
        Self::expect_success(OPERATION, response)
            .await?
            .json()
            .await
            .map_err(|source| QbitError::Decode {
                operation: OPERATION,
                source,
            })
    }

    async fn content_dir_from_files(&self, torrent: &TorrentInfo) -> Option<PathBuf> {
        if torrent.hash.is_empty() || torrent.save_path.is_empty() {
            return None;
        }
        match self.torrent_files(&torrent.hash).await {
            Ok(files) => torrent.content_dir_from_files(&files),
            Err(err) => {
                warn!(hash = %torrent.hash, error = %err, "cannot list torrent files");
                None
            }
        }
    }

    /// Delete the torrent `hash`, optionally with its downloaded files.
    ///
    /// Returns `false` when the server refuses the request with a client
    /// error status.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures and server errors.
    pub async fn delete_torrent(&self, hash: &str, delete_files: bool) -> QbitResult<bool> {
        const OPERATION: &str = "qbit.delete";
        let url = self.url("/api/v2/torrents/delete");
        let delete_files = if delete_files { "true" } else { "false" };
        let response = self
            .send(OPERATION, |http| {
                http.post(&url)
                    .form(&[("hashes", hash), ("deleteFiles", delete_files)])
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(hash, "deleted torrent");
            return Ok(true);
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(hash, status = status.as_u16(), body = %body.trim(), "torrent deletion refused");
            return Ok(false);
        }
        Self::expect_success(OPERATION, response).await.map(|_| true)
    }

    /// Version string reported by the Web UI.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    pub async fn app_version(&self) -> QbitResult<String> {
        const OPERATION: &str = "qbit.version";
        let url = self.url("/api/v2/app/version");
        let response = self.send(OPERATION, |http| http.get(&url)).await?;
        Self::expect_success(OPERATION, response)
            .await?
            .text()
            .await
            .map_err(|source| QbitError::request(OPERATION, source))
    }
}

#[async_trait]
impl SourceAdapter for QbitClient {
    async fn list_eligible(&self, filter: &ItemFilter) -> AdapterResult<Vec<Item>> {
        let torrents = self.torrents(filter).await?;
        let total = torrents.len();
        let mut items = Vec::with_capacity(total);
        for torrent in torrents {
            let path = match torrent.existing_content_path() {
                Some(path) => Some(path),
                None => self
                    .content_dir_from_files(&torrent)
                    .await
                    .or_else(|| torrent.declared_content_path()),
            };
            match path {
                Some(path) => items.push(torrent.into_item_at(path)),
                None => warn!(hash = %torrent.hash, "cannot determine content path; skipping torrent"),
            }
        }
        debug!(total, usable = items.len(), "listed torrents");
        Ok(items)
    }

    async fn delete_record(&self, id: &str, delete_files: bool) -> AdapterResult<bool> {
        Ok(self.delete_torrent(id, delete_files).await?)
    }

    async fn health_check(&self) -> AdapterResult<()> {
        self.login().await?;
        let version = self.app_version().await?;
        info!(version = %version.trim(), "qBittorrent reachable");
        Ok(())
    }
}
