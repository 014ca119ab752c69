//! HTTP client for the dashboard server

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::alert::DashboardAlertConfig;
use crate::dashboard::{Dashboard, title_to_slug};
use crate::source::{FetchError, MonitoringSource, ObjectState};
use crate::types::ObjectType;

#[derive(Debug, Deserialize)]
struct SlugResponse {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Talks to the dashboard server's REST API
#[derive(Debug, Clone)]
pub struct MeerkatClient {
    base_url: String,
    http: reqwest::Client,
    /// Per-request limit for state polls; uploads and saves are unbounded
    poll_timeout: Duration,
}

impl MeerkatClient {
    pub fn new(base_url: &str, poll_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(poll_timeout)
            .user_agent(concat!("wallboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            poll_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn poll_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.get(self.url(path)).timeout(self.poll_timeout)
    }

    /// Every dashboard on the server, optionally only those carrying `tag`
    pub async fn list_dashboards(&self, tag: Option<&str>) -> Result<Vec<Dashboard>> {
        let mut request = self.http.get(self.url("dashboard"));
        if let Some(tag) = tag {
            request = request.query(&[("tag", tag)]);
        }
        let response = request.send().await.context("Failed to request dashboard list")?;
        let mut dashboards: Vec<Dashboard> = read_json(response)
            .await
            .context("Failed to load dashboard list")?;
        for dashboard in &mut dashboards {
            if dashboard.slug.is_empty() {
                dashboard.slug = title_to_slug(&dashboard.title);
            }
        }
        debug!(count = dashboards.len(), ?tag, "Listed dashboards");
        Ok(dashboards)
    }

    pub async fn get_dashboard(&self, slug: &str) -> Result<Dashboard> {
        let url = self.url(&format!("dashboard/{slug}"));
        debug!(%url, "Fetching dashboard");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request dashboard '{slug}'"))?;
        let mut dashboard: Dashboard = read_json(response)
            .await
            .with_context(|| format!("Failed to load dashboard '{slug}'"))?;
        if dashboard.slug.is_empty() {
            dashboard.slug = slug.to_string();
        }
        Ok(dashboard)
    }

    /// Overwrite an existing dashboard; returns the slug the server stored it under
    pub async fn save_dashboard(&self, slug: &str, dashboard: &Dashboard) -> Result<String> {
        let response = self
            .http
            .post(self.url(&format!("dashboard/{slug}")))
            .json(dashboard)
            .send()
            .await
            .with_context(|| format!("Failed to save dashboard '{slug}'"))?;
        let saved: SlugResponse = read_json(response).await.context("Dashboard save rejected")?;
        info!(slug = %saved.slug, elements = dashboard.elements.len(), "Saved dashboard");
        Ok(saved.slug)
    }

    pub async fn create_dashboard(&self, dashboard: &Dashboard) -> Result<String> {
        let response = self
            .http
            .post(self.url("dashboard"))
            .json(dashboard)
            .send()
            .await
            .context("Failed to create dashboard")?;
        let created: SlugResponse = read_json(response).await.context("Dashboard creation rejected")?;
        info!(slug = %created.slug, title = %dashboard.title, "Created dashboard");
        Ok(created.slug)
    }

    pub async fn delete_dashboard(&self, slug: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("dashboard/{slug}")))
            .send()
            .await
            .with_context(|| format!("Failed to delete dashboard '{slug}'"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Server refused to delete '{slug}' ({status}): {}", body.trim());
        }
        info!(%slug, "Deleted dashboard");
        Ok(())
    }

    /// Upload a file; returns the URL it is served from
    pub async fn upload_file(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        let uploaded: UploadResponse = read_json(response).await.context("Upload rejected")?;
        info!(path = %path.display(), url = %uploaded.url, "Uploaded file");
        Ok(uploaded.url)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Server answered {status}: {}", body.trim());
    }
    response.json().await.context("Failed to decode response body")
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl MonitoringSource for MeerkatClient {
    async fn object_state(&self, object_type: ObjectType, filter: &str) -> Result<ObjectState, FetchError> {
        let response = self
            .poll_request(&format!("icinga/{object_type}/state"))
            .query(&[("filter", filter)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                object_type,
                filter: filter.to_string(),
            }),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(FetchError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn alert_config(&self, dashboard: &str) -> Result<DashboardAlertConfig, FetchError> {
        let response = self.poll_request(&format!("dashboard/{dashboard}")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let dashboard: Dashboard = response.json().await?;
        Ok(dashboard.alert_config())
    }
}
