//! Wire-level rows returned by the remote course store, separate from the
//! domain types so schema quirks stay at the boundary.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::model::{Course, LessonResource, Module, Video, VideoProgress, VideoSource};

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRow {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub featured: bool,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            price_cents: row.price_cents,
            featured: row.featured,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRow {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub sort_order: i64,
}

impl From<ModuleRow> for Module {
    fn from(row: ModuleRow) -> Self {
        Module {
            id: row.id,
            course_id: row.course_id,
            title: row.title,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoRow {
    pub id: Uuid,
    pub course_id: Uuid,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub sort_order: i64,
    pub source_kind: String,
    pub source_ref: String,
    /// The admin console writes whatever the video's origin reported:
    /// numeric seconds for uploads, ISO-8601 text for YouTube imports.
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub free_preview: bool,
}

impl VideoRow {
    /// Convert to the domain type. Returns None when the source
    /// discriminator is unknown; the caller logs and skips the row.
    pub fn into_video(self) -> Option<Video> {
        let source = VideoSource::from_parts(&self.source_kind, &self.source_ref)?;
        Some(Video {
            id: self.id,
            course_id: self.course_id,
            module_id: self.module_id,
            title: self.title,
            sort_order: self.sort_order,
            source,
            duration_seconds: self.duration.as_ref().and_then(parse_duration_value),
            free_preview: self.free_preview,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressRow {
    pub user_id: Uuid,
    pub video_id: Uuid,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub last_position_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

impl From<ProgressRow> for VideoProgress {
    fn from(row: ProgressRow) -> Self {
        VideoProgress {
            user_id: row.user_id,
            video_id: row.video_id,
            is_completed: row.is_completed,
            last_position_seconds: row.last_position_seconds,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub title: String,
    pub file_url: String,
    #[serde(default)]
    pub resource_type: String,
}

impl From<ResourceRow> for LessonResource {
    fn from(row: ResourceRow) -> Self {
        LessonResource {
            id: row.id,
            video_id: row.video_id,
            title: row.title,
            file_url: row.file_url,
            resource_type: row.resource_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrlResponse {
    #[serde(alias = "signedURL", alias = "signedUrl")]
    pub signed_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageObjectRow {
    pub name: String,
}

static ISO8601_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?$").expect("valid duration regex")
});

/// Normalize a stored duration to seconds. Accepts a JSON number, a
/// numeric string, or an ISO-8601 `PT#H#M#S` string; anything else is
/// treated as unknown.
pub fn parse_duration_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|s| *s >= 0.0),
        Value::String(s) => parse_duration_text(s),
        _ => None,
    }
}

fn parse_duration_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(seconds) = text.parse::<f64>() {
        return Some(seconds).filter(|s| *s >= 0.0);
    }

    let caps = ISO8601_DURATION.captures(text)?;
    let hours: f64 = caps.get(1).map_or(Ok(0.0), |m| m.as_str().parse()).ok()?;
    let minutes: f64 = caps.get(2).map_or(Ok(0.0), |m| m.as_str().parse()).ok()?;
    let seconds: f64 = caps.get(3).map_or(Ok(0.0), |m| m.as_str().parse()).ok()?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        // Bare "PT" carries no information.
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
