//! Catalog client: the course-management platform boundary.
//!
//! Defines the [`CatalogSource`] trait and the production [`LmsCatalog`]
//! implementation, which talks to a Canvas-compatible REST API. All listing
//! calls fetch a single bounded page (`per_page`), carry the bearer token,
//! and apply the configured request timeout.
//!
//! # Configuration
//!
//! The bearer token comes from the `SCOUT_LMS_TOKEN` environment variable.
//! A missing token is an explicit unconfigured error at construction time;
//! the client never fabricates catalog data.
//!
//! # Failure semantics
//!
//! Network errors, timeouts, and non-2xx responses surface as `Err`. The
//! pipeline maps a failed course listing to its "no courses" empty state
//! and failed module/item listings to the corresponding skip behavior —
//! callers decide, the client just reports.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::models::{Course, CourseList, Item, Module};

/// Environment variable holding the platform bearer token.
pub const TOKEN_ENV: &str = "SCOUT_LMS_TOKEN";

/// Read access to the platform's course → module → item hierarchy.
///
/// Implemented by [`LmsCatalog`] in production and by in-memory fakes in
/// tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List the user's courses as an ordered name → id mapping.
    async fn list_courses(&self) -> Result<CourseList>;

    /// List the modules of a course.
    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>>;

    /// List the items of a module.
    async fn list_module_items(&self, course_id: i64, module_id: i64) -> Result<Vec<Item>>;

    /// Resolve the download URL for a file item, if the platform has one.
    async fn resolve_file_url(&self, course_id: i64, file_id: i64) -> Result<Option<String>>;
}

/// Production catalog client over a Canvas-compatible REST API.
pub struct LmsCatalog {
    base_url: String,
    page_size: u32,
    token: String,
    client: reqwest::Client,
}

impl LmsCatalog {
    /// Create a catalog client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `SCOUT_LMS_TOKEN` is not set (unconfigured) or
    /// the HTTP client cannot be built.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV).map_err(|_| {
            anyhow::anyhow!(
                "{} environment variable not set — catalog client is unconfigured",
                TOKEN_ENV
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            token,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .with_context(|| format!("catalog request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("catalog API error {} for {}: {}", status, url, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid catalog response from {}", url))
    }
}

/// Course row as returned by the platform; rows missing id or name are
/// skipped during normalization.
#[derive(Deserialize)]
struct CourseRow {
    id: Option<i64>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct FileRow {
    url: Option<String>,
}

#[async_trait]
impl CatalogSource for LmsCatalog {
    async fn list_courses(&self) -> Result<CourseList> {
        let url = format!(
            "{}/api/v1/courses?page=1&per_page={}",
            self.base_url, self.page_size
        );
        let rows: Vec<CourseRow> = self.get_json(&url).await?;
        let list: CourseList = rows
            .into_iter()
            .filter_map(|row| {
                Some(Course {
                    id: row.id?,
                    name: row.name?,
                })
            })
            .collect();
        debug!(count = list.len(), "fetched course catalog");
        Ok(list)
    }

    async fn list_modules(&self, course_id: i64) -> Result<Vec<Module>> {
        let url = format!("{}/api/v1/courses/{}/modules", self.base_url, course_id);
        let modules: Vec<Module> = self.get_json(&url).await?;
        debug!(course_id, count = modules.len(), "fetched modules");
        Ok(modules)
    }

    async fn list_module_items(&self, course_id: i64, module_id: i64) -> Result<Vec<Item>> {
        let url = format!(
            "{}/api/v1/courses/{}/modules/{}/items?per_page={}",
            self.base_url, course_id, module_id, self.page_size
        );
        let items: Vec<Item> = self.get_json(&url).await?;
        debug!(course_id, module_id, count = items.len(), "fetched module items");
        Ok(items)
    }

    async fn resolve_file_url(&self, course_id: i64, file_id: i64) -> Result<Option<String>> {
        let url = format!(
            "{}/api/v1/courses/{}/files/{}",
            self.base_url, course_id, file_id
        );
        let row: FileRow = self.get_json(&url).await?;
        Ok(row.url)
    }
}
