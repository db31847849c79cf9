//! Remote course store boundary: typed reads over the hosted REST API,
//! idempotent progress upserts, and object-storage signing/listing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::config::Config;
use crate::model::{Course, LessonResource, Module, ProgressUpsert, Video, VideoProgress};

pub mod model;

use model::{
    CourseRow, ModuleRow, ProgressRow, ResourceRow, SignedUrlResponse, StorageObjectRow, VideoRow,
};

/// File extensions the player treats as playable when listing the bucket.
const PLAYABLE_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v"];

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn course_by_slug(&self, slug: &str) -> Result<Option<Course>>;

    /// Modules for a course, ordered by sort key ascending.
    async fn modules_for_course(&self, course_id: Uuid) -> Result<Vec<Module>>;

    /// Videos for a course, ordered by sort key ascending.
    async fn videos_for_course(&self, course_id: Uuid) -> Result<Vec<Video>>;

    async fn resources_for_video(&self, video_id: Uuid) -> Result<Vec<LessonResource>>;

    /// All progress rows for one user.
    async fn progress_for_user(&self, user_id: Uuid) -> Result<Vec<VideoProgress>>;

    /// Insert-or-update keyed on (user_id, video_id).
    async fn upsert_progress(&self, update: &ProgressUpsert) -> Result<()>;

    /// Time-limited capability URL for a private storage object.
    async fn signed_url(&self, path: &str, expires_in_seconds: u64) -> Result<String>;

    /// Paths of playable objects in the configured bucket.
    async fn list_storage_videos(&self) -> Result<Vec<String>>;
}

/// reqwest implementation speaking the hosted backend's REST dialect:
/// `{base}/rest/v1/<table>` with query-string filters, and
/// `{base}/storage/v1/object/...` for signing and listing.
#[derive(Clone)]
pub struct RestCourseStore {
    http: Client,
    base_url: Url,
    project_key: String,
    bucket: String,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for RestCourseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestCourseStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl RestCourseStore {
    pub fn from_config(cfg: &Config, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let base_url = Url::parse(&cfg.remote.base_url).context("invalid remote.base_url")?;
        Ok(Self::with_base_url(
            base_url,
            cfg.remote.project_key.clone(),
            cfg.remote.storage.bucket.clone(),
            tokens,
        ))
    }

    pub fn with_base_url(
        base_url: Url,
        project_key: String,
        bucket: String,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let http = Client::builder()
            .user_agent("nutriplay/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            project_key,
            bucket,
            tokens,
        }
    }

    fn base_str(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_str(), table)
    }

    /// Attach the project key plus the caller's bearer token. Anonymous
    /// requests fall back to the project key as bearer, which the backend
    /// scopes to public rows.
    async fn authorize(&self, rb: RequestBuilder) -> Result<RequestBuilder> {
        let rb = rb.header("apikey", &self.project_key);
        Ok(match self.tokens.identity().await? {
            Some(identity) => rb.bearer_auth(identity.access_token),
            None => rb.bearer_auth(&self.project_key),
        })
    }

    async fn expect_success(res: Response, what: &str) -> Result<Response> {
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed {}: {}", what, status, body));
        }
        Ok(res)
    }

    /// First `limit` courses by title, for the CLI tools.
    pub async fn list_courses(&self, limit: usize) -> Result<Vec<Course>> {
        let limit_s = limit.to_string();
        let rows: Vec<CourseRow> = self
            .fetch_rows(
                "courses",
                &[("select", "*"), ("order", "title.asc"), ("limit", &limit_s)],
                "course listing",
            )
            .await?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<Vec<T>> {
        let rb = self.http.get(self.rest_endpoint(table)).query(query);
        let rb = self.authorize(rb).await?;
        let res = rb
            .send()
            .await
            .with_context(|| format!("failed to reach course store ({what})"))?;
        let res = Self::expect_success(res, what).await?;
        res.json::<Vec<T>>()
            .await
            .with_context(|| format!("invalid response JSON ({what})"))
    }
}

#[async_trait]
impl CourseStore for RestCourseStore {
    async fn course_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let filter = format!("eq.{}", slug);
        let rows: Vec<CourseRow> = self
            .fetch_rows(
                "courses",
                &[("select", "*"), ("slug", &filter), ("limit", "1")],
                "course lookup",
            )
            .await?;
        Ok(rows.into_iter().next().map(Course::from))
    }

    async fn modules_for_course(&self, course_id: Uuid) -> Result<Vec<Module>> {
        let filter = format!("eq.{}", course_id);
        let rows: Vec<ModuleRow> = self
            .fetch_rows(
                "modules",
                &[
                    ("select", "*"),
                    ("course_id", &filter),
                    ("order", "sort_order.asc"),
                ],
                "module listing",
            )
            .await?;
        Ok(rows.into_iter().map(Module::from).collect())
    }

    async fn videos_for_course(&self, course_id: Uuid) -> Result<Vec<Video>> {
        let filter = format!("eq.{}", course_id);
        let rows: Vec<VideoRow> = self
            .fetch_rows(
                "videos",
                &[
                    ("select", "*"),
                    ("course_id", &filter),
                    ("order", "sort_order.asc"),
                ],
                "video listing",
            )
            .await?;

        let mut videos = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            let kind = row.source_kind.clone();
            match row.into_video() {
                Some(video) => videos.push(video),
                None => warn!(%id, kind, "skipping video with unknown source kind"),
            }
        }
        Ok(videos)
    }

    async fn resources_for_video(&self, video_id: Uuid) -> Result<Vec<LessonResource>> {
        let filter = format!("eq.{}", video_id);
        let rows: Vec<ResourceRow> = self
            .fetch_rows(
                "lesson_resources",
                &[("select", "*"), ("video_id", &filter)],
                "resource listing",
            )
            .await?;
        Ok(rows.into_iter().map(LessonResource::from).collect())
    }

    async fn progress_for_user(&self, user_id: Uuid) -> Result<Vec<VideoProgress>> {
        let filter = format!("eq.{}", user_id);
        let rows: Vec<ProgressRow> = self
            .fetch_rows(
                "video_progress",
                &[("select", "*"), ("user_id", &filter)],
                "progress listing",
            )
            .await?;
        Ok(rows.into_iter().map(VideoProgress::from).collect())
    }

    async fn upsert_progress(&self, update: &ProgressUpsert) -> Result<()> {
        let mut body = Map::new();
        body.insert("user_id".into(), json!(update.user_id));
        body.insert("video_id".into(), json!(update.video_id));
        body.insert("updated_at".into(), json!(update.updated_at));
        if let Some(completed) = update.is_completed {
            body.insert("is_completed".into(), json!(completed));
        }
        if let Some(seconds) = update.last_position_seconds {
            body.insert("last_position_seconds".into(), json!(seconds));
        }

        let rb = self
            .http
            .post(self.rest_endpoint("video_progress"))
            .query(&[("on_conflict", "user_id,video_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&Value::Object(body));
        let rb = self.authorize(rb).await?;
        let res = rb
            .send()
            .await
            .context("failed to reach course store (progress upsert)")?;
        Self::expect_success(res, "progress upsert").await?;
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_seconds: u64) -> Result<String> {
        let endpoint = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_str(),
            self.bucket,
            path.trim_start_matches('/')
        );
        let rb = self
            .http
            .post(endpoint)
            .json(&json!({ "expiresIn": expires_in_seconds }));
        let rb = self.authorize(rb).await?;
        let res = rb
            .send()
            .await
            .context("failed to reach storage (sign)")?;
        let res = Self::expect_success(res, "url signing").await?;
        let payload: SignedUrlResponse = res
            .json()
            .await
            .context("invalid response JSON (url signing)")?;

        // The backend answers with a path relative to the storage API root.
        let relative = payload.signed_url;
        if relative.starts_with("http://") || relative.starts_with("https://") {
            Ok(relative)
        } else {
            Ok(format!(
                "{}/storage/v1/{}",
                self.base_str(),
                relative.trim_start_matches('/')
            ))
        }
    }

    async fn list_storage_videos(&self) -> Result<Vec<String>> {
        let endpoint = format!(
            "{}/storage/v1/object/list/{}",
            self.base_str(),
            self.bucket
        );
        let rb = self
            .http
            .post(endpoint)
            .json(&json!({ "prefix": "", "limit": 1000, "sortBy": { "column": "name", "order": "asc" } }));
        let rb = self.authorize(rb).await?;
        let res = rb
            .send()
            .await
            .context("failed to reach storage (list)")?;
        let res = Self::expect_success(res, "storage listing").await?;
        let rows: Vec<StorageObjectRow> = res
            .json()
            .await
            .context("invalid response JSON (storage listing)")?;

        Ok(rows
            .into_iter()
            .map(|row| row.name)
            .filter(|name| {
                std::path::Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| PLAYABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect())
    }
}
