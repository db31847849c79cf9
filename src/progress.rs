//! Progress persistence adapter: completion toggles and position saves
//! become idempotent upserts keyed on (user, video).
//!
//! The local map is updated from the event itself, before the remote
//! outcome is known. A failed write is logged and dropped: playback never
//! blocks on persistence, and the next triggering event re-writes the row
//! anyway. There is no retry queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::model::{Identity, ProgressUpsert, VideoProgress};
use crate::store::CourseStore;

pub struct ProgressTracker {
    store: Arc<dyn CourseStore>,
    tokens: Arc<dyn TokenProvider>,
    local: HashMap<Uuid, VideoProgress>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn CourseStore>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            store,
            tokens,
            local: HashMap::new(),
        }
    }

    /// Take over the progress snapshot the catalog loaded.
    pub fn seed(&mut self, rows: HashMap<Uuid, VideoProgress>) {
        self.local = rows;
    }

    pub fn get(&self, video_id: Uuid) -> Option<&VideoProgress> {
        self.local.get(&video_id)
    }

    pub fn is_completed(&self, video_id: Uuid) -> bool {
        self.local
            .get(&video_id)
            .map(|p| p.is_completed)
            .unwrap_or(false)
    }

    /// Set or clear a video's completion flag. No-op when nobody is
    /// signed in.
    #[instrument(skip_all, fields(video = %video_id, completed = completed))]
    pub async fn mark_completed(&mut self, video_id: Uuid, completed: bool) {
        let Some(identity) = self.current_identity().await else {
            debug!("not signed in; skipping completion write");
            return;
        };

        let entry = self
            .local
            .entry(video_id)
            .or_insert_with(|| VideoProgress::fresh(identity.user_id, video_id));
        entry.is_completed = completed;
        entry.updated_at = Utc::now();

        let update = ProgressUpsert::completion(identity.user_id, video_id, completed);
        if let Err(err) = self.store.upsert_progress(&update).await {
            warn!(?err, "completion write failed; keeping local state");
        }
    }

    /// Save the last watched position. Callers throttle; this imposes no
    /// rate limit of its own.
    #[instrument(skip_all, fields(video = %video_id, seconds = seconds))]
    pub async fn update_position(&mut self, video_id: Uuid, seconds: f64) {
        let Some(identity) = self.current_identity().await else {
            debug!("not signed in; skipping position write");
            return;
        };

        let entry = self
            .local
            .entry(video_id)
            .or_insert_with(|| VideoProgress::fresh(identity.user_id, video_id));
        entry.last_position_seconds = seconds.max(0.0);
        entry.updated_at = Utc::now();

        let update = ProgressUpsert::position(identity.user_id, video_id, seconds.max(0.0));
        if let Err(err) = self.store.upsert_progress(&update).await {
            warn!(?err, "position write failed; keeping local state");
        }
    }

    async fn current_identity(&self) -> Option<Identity> {
        match self.tokens.identity().await {
            Ok(identity) => identity,
            Err(err) => {
                warn!(?err, "identity lookup failed; treating as signed out");
                None
            }
        }
    }
}
