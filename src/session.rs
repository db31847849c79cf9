//! Playback session controller: one "current video" slot and the state
//! machine the player UI drives. The machine is synchronous and performs
//! no I/O; completion crossings come back to the caller, which forwards
//! them to the progress tracker. That keeps writes fire-and-forget
//! relative to selection state: switching videos never cancels a signal
//! already handed out.

use uuid::Uuid;

use crate::model::{Video, VideoProgress};

/// Watch fraction at which a video auto-completes.
pub const COMPLETION_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Selected,
    Playing,
    Paused,
    Ended,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Idle => "idle",
            PlayerState::Selected => "selected",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone)]
struct CurrentVideo {
    video_id: Uuid,
    duration_seconds: Option<f64>,
    position_seconds: f64,
    /// Completion fires at most once per video per session; the latch is
    /// armed up front for videos already completed.
    completion_fired: bool,
    completed: bool,
}

#[derive(Debug, Default)]
pub struct PlaybackSession {
    state: PlayerState,
    current: Option<CurrentVideo>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_video(&self) -> Option<Uuid> {
        self.current.as_ref().map(|c| c.video_id)
    }

    pub fn position_seconds(&self) -> f64 {
        self.current
            .as_ref()
            .map(|c| c.position_seconds)
            .unwrap_or(0.0)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.current.as_ref().and_then(|c| c.duration_seconds)
    }

    /// Elapsed/duration in 0..=1, None while the duration is unknown.
    pub fn fraction(&self) -> Option<f64> {
        let current = self.current.as_ref()?;
        let duration = current.duration_seconds.filter(|d| *d > 0.0)?;
        Some((current.position_seconds / duration).clamp(0.0, 1.0))
    }

    pub fn is_completed(&self) -> bool {
        self.current.as_ref().map(|c| c.completed).unwrap_or(false)
    }

    /// Make `video` current, from any state. Seeks to the stored last
    /// position when a progress row is known, else 0.
    pub fn select(&mut self, video: &Video, progress: Option<&VideoProgress>) {
        let position = progress
            .map(|p| p.last_position_seconds.max(0.0))
            .unwrap_or(0.0);
        let completed = progress.map(|p| p.is_completed).unwrap_or(false);
        self.current = Some(CurrentVideo {
            video_id: video.id,
            duration_seconds: video.duration_seconds,
            position_seconds: position,
            completion_fired: completed,
            completed,
        });
        self.state = PlayerState::Selected;
    }

    /// Native play event. No-op while nothing is selected.
    pub fn play(&mut self) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.state = PlayerState::Playing;
        true
    }

    /// Native pause event.
    pub fn pause(&mut self) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.state = PlayerState::Paused;
        true
    }

    /// Jump to an absolute position, clamped to the known duration.
    pub fn seek(&mut self, seconds: f64) -> bool {
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        let mut target = seconds.max(0.0);
        if let Some(duration) = current.duration_seconds {
            target = target.min(duration);
        }
        current.position_seconds = target;
        true
    }

    /// `timeupdate` counterpart: the player reports the new position.
    /// Returns the video id when the watch fraction first crosses the
    /// completion threshold for a not-yet-completed video; the caller
    /// persists that crossing exactly once.
    pub fn tick(&mut self, position_seconds: f64) -> Option<Uuid> {
        if self.state != PlayerState::Playing {
            return None;
        }
        let current = self.current.as_mut()?;
        current.position_seconds = position_seconds.max(0.0);

        let duration = current.duration_seconds.filter(|d| *d > 0.0)?;
        let fraction = current.position_seconds / duration;
        if fraction >= COMPLETION_THRESHOLD && !current.completion_fired && !current.completed {
            current.completion_fired = true;
            current.completed = true;
            return Some(current.video_id);
        }
        None
    }

    /// Native ended event. Completion still fires here for videos whose
    /// duration was unknown and therefore never crossed a fraction.
    pub fn ended(&mut self) -> Option<Uuid> {
        let current = self.current.as_mut()?;
        if let Some(duration) = current.duration_seconds {
            current.position_seconds = duration;
        }
        self.state = PlayerState::Ended;
        if !current.completion_fired && !current.completed {
            current.completion_fired = true;
            current.completed = true;
            return Some(current.video_id);
        }
        None
    }

    /// Keep the session's view in line with a manual completion toggle.
    /// The once-per-session latch stays armed either way.
    pub fn set_completed(&mut self, completed: bool) {
        if let Some(current) = self.current.as_mut() {
            current.completed = completed;
        }
    }
}
