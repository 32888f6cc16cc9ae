//! Listing and downloading item documents from the game data repository on GitHub.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, warn};
use ts_rs::TS;

use super::{config::ItemSourceConfig, item_parser::ItemDocument};

const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemCategory {
    Armor,
    Artefact,
    Containers,
}

impl ItemCategory {
    /// Sync order.
    pub const ALL: [ItemCategory; 3] = [
        ItemCategory::Armor,
        ItemCategory::Artefact,
        ItemCategory::Containers,
    ];
}

/// One item file, with `path` relative to the region's `items` folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub id: String,
    pub path: String,
}

impl ItemRef {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let id = path
            .rsplit('/')
            .next()
            .unwrap_or(&path)
            .trim_end_matches(".json")
            .to_string();
        Self { id, path }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ItemSourceError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("rate limited by {url}")]
    RateLimited { url: String },
    #[error("GET {url} returned {status}")]
    Http { url: String, status: u16 },
    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ItemSourceError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            Self::Decode { .. } => false,
        }
    }
}

#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn list_items(&self, category: ItemCategory) -> Result<Vec<ItemRef>, ItemSourceError>;

    async fn fetch_item(&self, item: &ItemRef) -> Result<ItemDocument, ItemSourceError>;

    fn icon_url(&self, item: &ItemRef) -> String;
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone)]
pub struct GithubItemSource {
    http: Client,
    config: ItemSourceConfig,
    api_url: String,
    raw_url: String,
}

impl GithubItemSource {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: ItemSourceConfig) -> Result<Self, ItemSourceError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("loadout-builder/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ItemSourceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            config,
            api_url: GITHUB_API_URL.to_string(),
            raw_url: GITHUB_RAW_URL.to_string(),
        })
    }

    /// Point the client at other hosts, e.g. a local mirror of the repository.
    pub fn with_base_urls(mut self, api_url: impl Into<String>, raw_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.raw_url = raw_url.into();
        self
    }

    fn items_root(&self) -> String {
        format!("{}/items", self.config.region)
    }

    fn contents_url(&self, dir: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_url.trim_end_matches('/'),
            self.config.repo,
            dir
        )
    }

    fn raw_file_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.raw_url.trim_end_matches('/'),
            self.config.repo,
            self.config.branch,
            path
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.github_token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<ContentEntry>, ItemSourceError> {
        let url = self.contents_url(dir);

        (|| async { self.get_listing(&url).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ItemSourceError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "GitHub listing failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn get_listing(&self, url: &str) -> Result<Vec<ContentEntry>, ItemSourceError> {
        let request = self
            .http
            .get(url)
            .header("accept", "application/vnd.github+json");
        let res = self
            .authorized(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let res = check_status(res, url)?;

        res.json::<Vec<ContentEntry>>()
            .await
            .map_err(|e| ItemSourceError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Path of a repository entry relative to the items folder.
    fn relative_path(&self, entry: &ContentEntry) -> String {
        let prefix = format!("{}/", self.items_root());
        entry
            .path
            .strip_prefix(&prefix)
            .unwrap_or(&entry.path)
            .to_string()
    }
}

#[async_trait]
impl ItemSource for GithubItemSource {
    async fn list_items(&self, category: ItemCategory) -> Result<Vec<ItemRef>, ItemSourceError> {
        let root = format!("{}/{}", self.items_root(), category);
        let mut items = Vec::new();

        for entry in self.list_dir(&root).await? {
            match entry.kind.as_str() {
                "file" if entry.name.ends_with(".json") => {
                    items.push(ItemRef::new(self.relative_path(&entry)));
                }
                "dir" => {
                    let sub_dir = format!("{root}/{}", entry.name);
                    for nested in self.list_dir(&sub_dir).await? {
                        if nested.kind == "file" && nested.name.ends_with(".json") {
                            items.push(ItemRef::new(self.relative_path(&nested)));
                        }
                    }
                }
                _ => {}
            }
        }

        items.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(category = %category, count = items.len(), "Listed item files");
        Ok(items)
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<ItemDocument, ItemSourceError> {
        let url = self.raw_file_url(&format!("{}/{}", self.items_root(), item.path));
        let res = self
            .authorized(self.http.get(&url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let res = check_status(res, &url)?;

        res.json::<ItemDocument>()
            .await
            .map_err(|e| ItemSourceError::Decode {
                url,
                message: e.to_string(),
            })
    }

    fn icon_url(&self, item: &ItemRef) -> String {
        let icon_path = item.path.trim_end_matches(".json");
        self.raw_file_url(&format!("{}/icons/{icon_path}.png", self.config.region))
    }
}

fn check_status(res: reqwest::Response, url: &str) -> Result<reqwest::Response, ItemSourceError> {
    match res.status() {
        s if s.is_success() => Ok(res),
        StatusCode::TOO_MANY_REQUESTS => Err(ItemSourceError::RateLimited {
            url: url.to_string(),
        }),
        s => Err(ItemSourceError::Http {
            url: url.to_string(),
            status: s.as_u16(),
        }),
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ItemSourceError {
    if e.is_timeout() {
        ItemSourceError::Timeout
    } else {
        ItemSourceError::Transport(e.to_string())
    }
}
