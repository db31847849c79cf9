//! Console player: command parsing and dispatch over the playback
//! session, progress tracker and local notes.

use anyhow::Result;
use tracing::instrument;

use crate::catalog::Catalog;
use crate::notes;
use crate::progress::ProgressTracker;
use crate::session::{PlaybackSession, PlayerState};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Select(usize),
    Play,
    Pause,
    Seek(f64),
    Done,
    Undone,
    NoteShow,
    NoteSave(String),
    Notes,
    Progress,
    Help,
    Quit,
}

/// Parse one input line. None means the line is not a known command.
pub fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (trimmed, ""),
    };
    match word {
        "list" | "l" => Some(Command::List),
        "select" | "s" => rest.parse::<usize>().ok().map(Command::Select),
        "play" | "p" => Some(Command::Play),
        "pause" => Some(Command::Pause),
        "seek" => rest.parse::<f64>().ok().map(Command::Seek),
        "done" => Some(Command::Done),
        "undone" => Some(Command::Undone),
        "note" => {
            if rest.is_empty() {
                Some(Command::NoteShow)
            } else {
                Some(Command::NoteSave(rest.to_string()))
            }
        }
        "notes" => Some(Command::Notes),
        "progress" => Some(Command::Progress),
        "help" | "h" | "?" => Some(Command::Help),
        "quit" | "q" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

pub fn help_text() -> &'static str {
    "commands:\n  \
     list              show the course outline\n  \
     select N          switch to video N\n  \
     play / pause      control playback\n  \
     seek SECONDS      jump to an absolute position\n  \
     done / undone     toggle completion by hand\n  \
     note [TEXT]       save or show the note for the current video\n  \
     notes             list notes for this course\n  \
     progress          aggregate completion\n  \
     quit              save position and exit"
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Everything one open course needs: the loaded catalog snapshot, the
/// session state machine, the progress tracker and the notes store.
pub struct Player {
    catalog: Catalog,
    session: PlaybackSession,
    tracker: ProgressTracker,
    notes_pool: notes::Pool,
    course_key: String,
    position_save_interval: u64,
    ticks_since_save: u64,
}

impl Player {
    pub fn new(
        catalog: Catalog,
        mut tracker: ProgressTracker,
        notes_pool: notes::Pool,
        position_save_interval: u64,
    ) -> Self {
        tracker.seed(catalog.progress.clone());
        let course_key = catalog
            .course
            .as_ref()
            .map(|c| c.slug.clone())
            .unwrap_or_else(|| notes::FALLBACK_COURSE_KEY.to_string());

        let mut player = Self {
            catalog,
            session: PlaybackSession::new(),
            tracker,
            notes_pool,
            course_key,
            position_save_interval: position_save_interval.max(1),
            ticks_since_save: 0,
        };
        // First playable video is current from the start.
        if let Some(index) = player.catalog.first_playable() {
            player.select_index(index);
        }
        player
    }

    pub fn is_playing(&self) -> bool {
        self.session.state() == PlayerState::Playing
    }

    fn current_index(&self) -> Option<usize> {
        let current = self.session.current_video()?;
        self.catalog
            .videos
            .iter()
            .position(|e| e.video.id == current)
    }

    fn select_index(&mut self, index: usize) {
        let Some(entry) = self.catalog.videos.get(index) else {
            return;
        };
        let progress = self.tracker.get(entry.video.id).cloned();
        self.session.select(&entry.video, progress.as_ref());
        self.ticks_since_save = 0;
    }

    fn completion_percent(&self) -> f64 {
        if self.catalog.videos.is_empty() {
            return 0.0;
        }
        let completed = self
            .catalog
            .videos
            .iter()
            .filter(|e| self.tracker.is_completed(e.video.id))
            .count();
        completed as f64 / self.catalog.videos.len() as f64 * 100.0
    }

    async fn toggle_completed(&mut self, completed: bool) {
        match self.session.current_video() {
            Some(video_id) => {
                self.tracker.mark_completed(video_id, completed).await;
                self.session.set_completed(completed);
                println!(
                    "Marked {}.",
                    if completed { "complete" } else { "incomplete" }
                );
            }
            None => println!("Nothing selected."),
        }
    }

    async fn save_current_position(&mut self) {
        if let Some(video_id) = self.session.current_video() {
            self.tracker
                .update_position(video_id, self.session.position_seconds())
                .await;
        }
        self.ticks_since_save = 0;
    }

    fn print_outline(&self) {
        match self.catalog.course.as_ref() {
            Some(course) => println!("{} ({:.0}% complete)", course.title, self.completion_percent()),
            None => println!("All videos ({:.0}% complete)", self.completion_percent()),
        }
        let current = self.session.current_video();
        for (module, entries) in self.catalog.grouped() {
            match module {
                Some(m) => println!("  [{}]", m.title),
                None => {
                    if !self.catalog.modules.is_empty() {
                        println!("  [unassigned]")
                    }
                }
            }
            for entry in entries {
                let number = self
                    .catalog
                    .videos
                    .iter()
                    .position(|e| e.video.id == entry.video.id)
                    .map(|i| i + 1)
                    .unwrap_or(0);
                let mut flags = String::new();
                if self.tracker.is_completed(entry.video.id) {
                    flags.push_str(" [done]");
                }
                if entry.video.free_preview {
                    flags.push_str(" [free preview]");
                }
                if entry.playable_url.is_none() {
                    flags.push_str(" [unavailable]");
                }
                if Some(entry.video.id) == current {
                    flags.push_str(" <current>");
                }
                let duration = entry
                    .video
                    .duration_seconds
                    .map(format_duration)
                    .unwrap_or_else(|| "-".into());
                println!("    {:>2}. {} ({}){}", number, entry.video.title, duration, flags);
            }
        }
    }

    /// Dispatch one parsed command. Returns false when the player should
    /// shut down.
    #[instrument(skip_all)]
    pub async fn handle_command(&mut self, cmd: Command) -> Result<bool> {
        match cmd {
            Command::List => self.print_outline(),
            Command::Select(number) => {
                let index = number.wrapping_sub(1);
                let target = self
                    .catalog
                    .videos
                    .get(index)
                    .map(|e| (e.video.title.clone(), e.playable_url.is_some()));
                match target {
                    None => println!("No video {number}."),
                    Some((title, false)) => {
                        println!("\"{title}\" is unavailable right now.")
                    }
                    Some((title, true)) => {
                        // Flush the old video's position before switching.
                        self.save_current_position().await;
                        self.select_index(index);
                        let at = self.session.position_seconds();
                        if at > 0.0 {
                            println!("Selected \"{title}\", resuming at {}.", format_duration(at));
                        } else {
                            println!("Selected \"{title}\".");
                        }
                    }
                }
            }
            Command::Play => {
                if self.session.play() {
                    println!("Playing.");
                } else {
                    println!("Nothing selected.");
                }
            }
            Command::Pause => {
                if self.session.pause() {
                    self.save_current_position().await;
                    println!("Paused at {}.", format_duration(self.session.position_seconds()));
                } else {
                    println!("Nothing selected.");
                }
            }
            Command::Seek(seconds) => {
                if self.session.seek(seconds) {
                    println!("At {}.", format_duration(self.session.position_seconds()));
                } else {
                    println!("Nothing selected.");
                }
            }
            Command::Done => self.toggle_completed(true).await,
            Command::Undone => self.toggle_completed(false).await,
            Command::NoteSave(body) => match self.session.current_video() {
                Some(video_id) => {
                    notes::save_note(&self.notes_pool, &self.course_key, video_id, &body).await?;
                    println!("Note saved.");
                }
                None => println!("Nothing selected."),
            },
            Command::NoteShow => match self.session.current_video() {
                Some(video_id) => {
                    match notes::get_note(&self.notes_pool, &self.course_key, video_id).await? {
                        Some(body) => println!("{body}"),
                        None => println!("No note for this video."),
                    }
                }
                None => println!("Nothing selected."),
            },
            Command::Notes => {
                let all = notes::notes_for_course(&self.notes_pool, &self.course_key).await?;
                if all.is_empty() {
                    println!("No notes for this course.");
                }
                for (video_id, body) in all {
                    let title = self
                        .catalog
                        .videos
                        .iter()
                        .find(|e| e.video.id.to_string() == video_id)
                        .map(|e| e.video.title.as_str())
                        .unwrap_or(video_id.as_str());
                    println!("[{title}] {body}");
                }
            }
            Command::Progress => {
                println!("{:.0}% complete", self.completion_percent());
                if let Some(fraction) = self.session.fraction() {
                    println!(
                        "current video: {:.0}% ({} / {})",
                        fraction * 100.0,
                        format_duration(self.session.position_seconds()),
                        format_duration(self.session.duration_seconds().unwrap_or(0.0)),
                    );
                }
            }
            Command::Help => println!("{}", help_text()),
            Command::Quit => {
                self.save_current_position().await;
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// One second of wall clock while playing: advance the position,
    /// forward any completion crossing, save at the configured cadence
    /// and handle the end of the video.
    pub async fn handle_clock_tick(&mut self) {
        if !self.is_playing() {
            return;
        }

        let next = self.session.position_seconds() + 1.0;
        if let Some(video_id) = self.session.tick(next) {
            self.tracker.mark_completed(video_id, true).await;
            println!("Marked complete (90% watched).");
        }

        self.ticks_since_save += 1;
        if self.ticks_since_save >= self.position_save_interval {
            self.save_current_position().await;
        }

        if let Some(duration) = self.session.duration_seconds() {
            if self.session.position_seconds() >= duration {
                if let Some(video_id) = self.session.ended() {
                    self.tracker.mark_completed(video_id, true).await;
                }
                self.save_current_position().await;
                let index = self.current_index().map(|i| i + 1).unwrap_or(0);
                println!("Finished video {index}. `list` to pick the next one.");
            }
        }
    }
}
