use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a video's bytes come from. Exactly one representation per video;
/// the catalog loader maps each variant to a playable URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum VideoSource {
    /// Path inside the private storage bucket; playable only via signed URL.
    Storage { path: String },
    /// YouTube video id, embedded directly.
    YouTube { video_id: String },
    /// Google Drive file id, played through the Drive preview endpoint.
    Drive { file_id: String },
    /// Third-party embed URL stored verbatim.
    Embed { url: String },
}

impl VideoSource {
    pub fn kind_str(&self) -> &'static str {
        match self {
            VideoSource::Storage { .. } => "storage",
            VideoSource::YouTube { .. } => "youtube",
            VideoSource::Drive { .. } => "drive",
            VideoSource::Embed { .. } => "embed",
        }
    }

    /// Rebuild a source from its stored discriminator and reference value.
    /// Unknown discriminators yield None; the caller skips the row.
    pub fn from_parts(kind: &str, reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        match kind {
            "storage" => Some(VideoSource::Storage {
                path: reference.to_string(),
            }),
            "youtube" => Some(VideoSource::YouTube {
                video_id: reference.to_string(),
            }),
            "drive" => Some(VideoSource::Drive {
                file_id: reference.to_string(),
            }),
            "embed" => Some(VideoSource::Embed {
                url: reference.to_string(),
            }),
            _ => None,
        }
    }

    /// Playable URL for sources that need no signing. Storage paths return
    /// None here; they go through the signed-URL flow instead.
    pub fn direct_url(&self) -> Option<String> {
        match self {
            VideoSource::Storage { .. } => None,
            VideoSource::YouTube { video_id } => {
                Some(format!("https://www.youtube.com/embed/{}", video_id))
            }
            VideoSource::Drive { file_id } => Some(format!(
                "https://drive.google.com/file/d/{}/preview",
                file_id
            )),
            VideoSource::Embed { url } => Some(url.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub featured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub course_id: Uuid,
    /// None puts the video in the "unassigned" bucket below all modules.
    pub module_id: Option<Uuid>,
    pub title: String,
    pub sort_order: i64,
    pub source: VideoSource,
    pub duration_seconds: Option<f64>,
    pub free_preview: bool,
}

/// One user's watch state for one video. Logically unique per
/// (user, video); the store enforces that with upsert-on-conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoProgress {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub is_completed: bool,
    pub last_position_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

impl VideoProgress {
    /// State assumed before any row exists: position 0, not completed.
    pub fn fresh(user_id: Uuid, video_id: Uuid) -> Self {
        Self {
            user_id,
            video_id,
            is_completed: false,
            last_position_seconds: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// Downloadable material attached to a video (worksheets, recipes, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonResource {
    pub id: Uuid,
    pub video_id: Uuid,
    pub title: String,
    pub file_url: String,
    pub resource_type: String,
}

/// Partial progress write. Only the set fields are written; the store
/// merges on the (user_id, video_id) conflict target.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpsert {
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub is_completed: Option<bool>,
    pub last_position_seconds: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressUpsert {
    pub fn completion(user_id: Uuid, video_id: Uuid, completed: bool) -> Self {
        Self {
            user_id,
            video_id,
            is_completed: Some(completed),
            last_position_seconds: None,
            updated_at: Utc::now(),
        }
    }

    pub fn position(user_id: Uuid, video_id: Uuid, seconds: f64) -> Self {
        Self {
            user_id,
            video_id,
            is_completed: None,
            last_position_seconds: Some(seconds),
            updated_at: Utc::now(),
        }
    }
}

/// An authenticated user as seen by the remote store: the row-level
/// authorization subject plus the bearer token that proves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub access_token: String,
}
