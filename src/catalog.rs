//! Catalog loader: a course slug in, an ordered playable catalog out.
//!
//! The loader never fails: any error while resolving the course, its
//! modules or its videos degrades to an unscoped listing of the storage
//! bucket, so the player always has something to offer if any video
//! exists anywhere.

use std::collections::HashMap;

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::model::{Course, Module, Video, VideoProgress, VideoSource};
use crate::store::CourseStore;

/// A video plus its resolved playable URL. `None` renders as
/// unselectable rather than erroring.
#[derive(Debug, Clone)]
pub struct VideoEntry {
    pub video: Video,
    pub playable_url: Option<String>,
}

/// Whole-load snapshot for one course (or the degraded bucket listing).
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub course: Option<Course>,
    pub modules: Vec<Module>,
    pub videos: Vec<VideoEntry>,
    pub progress: HashMap<Uuid, VideoProgress>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn progress_for(&self, video_id: Uuid) -> Option<&VideoProgress> {
        self.progress.get(&video_id)
    }

    /// Index of the first video with a playable URL.
    pub fn first_playable(&self) -> Option<usize> {
        self.videos.iter().position(|e| e.playable_url.is_some())
    }

    /// Completed videos over all videos, 0–100. An empty catalog is 0%.
    pub fn completion_percent(&self) -> f64 {
        if self.videos.is_empty() {
            return 0.0;
        }
        let completed = self
            .videos
            .iter()
            .filter(|e| {
                self.progress
                    .get(&e.video.id)
                    .map(|p| p.is_completed)
                    .unwrap_or(false)
            })
            .count();
        completed as f64 / self.videos.len() as f64 * 100.0
    }

    /// Videos grouped by module in display order, with an unassigned
    /// bucket (module None) last when any video has no module.
    pub fn grouped(&self) -> Vec<(Option<&Module>, Vec<&VideoEntry>)> {
        let mut groups: Vec<(Option<&Module>, Vec<&VideoEntry>)> = Vec::new();
        for module in &self.modules {
            let entries: Vec<&VideoEntry> = self
                .videos
                .iter()
                .filter(|e| e.video.module_id == Some(module.id))
                .collect();
            groups.push((Some(module), entries));
        }
        let unassigned: Vec<&VideoEntry> = self
            .videos
            .iter()
            .filter(|e| {
                e.video.module_id.is_none()
                    || !self.modules.iter().any(|m| Some(m.id) == e.video.module_id)
            })
            .collect();
        if !unassigned.is_empty() {
            groups.push((None, unassigned));
        }
        groups
    }
}

/// Resolve the catalog for `slug`, with `user` selecting whose progress
/// rows to join in. `signed_url_ttl` is the expiry, in seconds, requested
/// for storage-backed videos.
#[instrument(skip_all, fields(slug = %slug))]
pub async fn load_catalog(
    store: &dyn CourseStore,
    slug: &str,
    user: Option<Uuid>,
    signed_url_ttl: u64,
) -> Catalog {
    let mut catalog = match load_course_catalog(store, slug, signed_url_ttl).await {
        Ok(Some(catalog)) => catalog,
        Ok(None) => {
            warn!(slug, "course not found; falling back to storage listing");
            fallback_catalog(store, signed_url_ttl).await
        }
        Err(err) => {
            warn!(?err, slug, "catalog load failed; falling back to storage listing");
            fallback_catalog(store, signed_url_ttl).await
        }
    };

    if let Some(user_id) = user {
        match store.progress_for_user(user_id).await {
            Ok(rows) => {
                catalog.progress = rows.into_iter().map(|p| (p.video_id, p)).collect();
            }
            Err(err) => {
                warn!(?err, %user_id, "progress fetch failed; starting without saved progress");
            }
        }
    }

    catalog
}

async fn load_course_catalog(
    store: &dyn CourseStore,
    slug: &str,
    signed_url_ttl: u64,
) -> anyhow::Result<Option<Catalog>> {
    let Some(course) = store.course_by_slug(slug).await? else {
        return Ok(None);
    };

    let modules = store.modules_for_course(course.id).await?;
    let videos = store.videos_for_course(course.id).await?;

    let mut entries = Vec::with_capacity(videos.len());
    for video in videos {
        let playable_url = resolve_playable_url(store, &video, signed_url_ttl).await;
        entries.push(VideoEntry {
            video,
            playable_url,
        });
    }

    Ok(Some(Catalog {
        course: Some(course),
        modules,
        videos: entries,
        progress: HashMap::new(),
    }))
}

/// Map a video source to its playable URL. Storage paths need a signed
/// URL; a signing failure leaves the video unselectable, not broken.
async fn resolve_playable_url(
    store: &dyn CourseStore,
    video: &Video,
    signed_url_ttl: u64,
) -> Option<String> {
    if let Some(url) = video.source.direct_url() {
        return Some(url);
    }
    let VideoSource::Storage { path } = &video.source else {
        return None;
    };
    match store.signed_url(path, signed_url_ttl).await {
        Ok(url) => Some(url),
        Err(err) => {
            warn!(?err, video = %video.id, path, "signed URL request failed; video unselectable");
            None
        }
    }
}

/// Degraded-but-functional path: every playable object in the bucket
/// becomes a synthetic video with a deterministic id, no course row and
/// no modules.
async fn fallback_catalog(store: &dyn CourseStore, signed_url_ttl: u64) -> Catalog {
    let paths = match store.list_storage_videos().await {
        Ok(paths) => paths,
        Err(err) => {
            warn!(?err, "storage listing failed; catalog is empty");
            return Catalog::default();
        }
    };

    let mut entries = Vec::with_capacity(paths.len());
    for (index, path) in paths.into_iter().enumerate() {
        let video = Video {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, path.as_bytes()),
            course_id: Uuid::nil(),
            module_id: None,
            title: title_from_path(&path),
            sort_order: index as i64,
            source: VideoSource::Storage { path: path.clone() },
            duration_seconds: None,
            free_preview: false,
        };
        let playable_url = resolve_playable_url(store, &video, signed_url_ttl).await;
        entries.push(VideoEntry {
            video,
            playable_url,
        });
    }

    Catalog {
        course: None,
        modules: Vec::new(),
        videos: entries,
        progress: HashMap::new(),
    }
}

fn title_from_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .replace(['-', '_'], " ")
}
