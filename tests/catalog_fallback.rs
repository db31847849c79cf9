use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use nutriplay::catalog::load_catalog;
use nutriplay::model::{
    Course, LessonResource, Module, ProgressUpsert, Video, VideoProgress, VideoSource,
};
use nutriplay::session::PlaybackSession;
use nutriplay::store::CourseStore;

const TTL: u64 = 3600;

#[derive(Default)]
struct FakeStore {
    course: Option<Course>,
    modules: Vec<Module>,
    videos: Vec<Video>,
    progress: Vec<VideoProgress>,
    storage_objects: Vec<String>,
    fail_course_lookup: bool,
    fail_videos: bool,
    fail_signing: bool,
    fail_progress: bool,
    fail_listing: bool,
    sign_calls: Arc<Mutex<Vec<(String, u64)>>>,
}

#[async_trait]
impl CourseStore for FakeStore {
    async fn course_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        if self.fail_course_lookup {
            return Err(anyhow!("course lookup down"));
        }
        Ok(self
            .course
            .clone()
            .filter(|course| course.slug == slug))
    }

    async fn modules_for_course(&self, _course_id: Uuid) -> Result<Vec<Module>> {
        Ok(self.modules.clone())
    }

    async fn videos_for_course(&self, _course_id: Uuid) -> Result<Vec<Video>> {
        if self.fail_videos {
            return Err(anyhow!("video listing down"));
        }
        Ok(self.videos.clone())
    }

    async fn resources_for_video(&self, _video_id: Uuid) -> Result<Vec<LessonResource>> {
        Ok(Vec::new())
    }

    async fn progress_for_user(&self, _user_id: Uuid) -> Result<Vec<VideoProgress>> {
        if self.fail_progress {
            return Err(anyhow!("progress listing down"));
        }
        Ok(self.progress.clone())
    }

    async fn upsert_progress(&self, _update: &ProgressUpsert) -> Result<()> {
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in_seconds: u64) -> Result<String> {
        self.sign_calls
            .lock()
            .await
            .push((path.to_string(), expires_in_seconds));
        if self.fail_signing {
            return Err(anyhow!("signing down"));
        }
        Ok(format!("https://cdn.example/{path}?token=signed"))
    }

    async fn list_storage_videos(&self) -> Result<Vec<String>> {
        if self.fail_listing {
            return Err(anyhow!("storage down"));
        }
        Ok(self.storage_objects.clone())
    }
}

fn course(slug: &str) -> Course {
    Course {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        title: "Masterclass".into(),
        description: None,
        price_cents: Some(14900),
        featured: true,
    }
}

fn video(course_id: Uuid, title: &str, sort: i64, source: VideoSource) -> Video {
    Video {
        id: Uuid::new_v4(),
        course_id,
        module_id: None,
        title: title.to_string(),
        sort_order: sort,
        source,
        duration_seconds: Some(600.0),
        free_preview: false,
    }
}

#[tokio::test]
async fn unknown_slug_falls_back_to_storage_listing() {
    let store = FakeStore {
        storage_objects: vec!["01-welcome.mp4".into(), "02-macros.mp4".into()],
        ..Default::default()
    };

    let loaded = load_catalog(&store, "no-such-course", None, TTL).await;
    assert!(loaded.course.is_none());
    assert!(loaded.modules.is_empty());
    assert_eq!(loaded.videos.len(), 2);
    assert_eq!(loaded.videos[0].video.title, "01 welcome");
    assert!(loaded.videos[0].playable_url.is_some());

    // Synthetic ids are deterministic: a reload sees the same videos.
    let reloaded = load_catalog(&store, "no-such-course", None, TTL).await;
    assert_eq!(loaded.videos[0].video.id, reloaded.videos[0].video.id);
    assert_eq!(loaded.videos[1].video.id, reloaded.videos[1].video.id);
}

#[tokio::test]
async fn mid_load_failure_degrades_to_storage_listing() {
    let c = course("masterclass-nutrir-ciclo");
    let store = FakeStore {
        course: Some(c),
        fail_videos: true,
        storage_objects: vec!["fallback.mp4".into()],
        ..Default::default()
    };

    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", None, TTL).await;
    assert!(loaded.course.is_none());
    assert_eq!(loaded.videos.len(), 1);
    assert_eq!(
        loaded.videos[0].video.source,
        VideoSource::Storage {
            path: "fallback.mp4".into()
        }
    );
}

#[tokio::test]
async fn everything_down_yields_empty_catalog_not_error() {
    let store = FakeStore {
        fail_course_lookup: true,
        fail_listing: true,
        ..Default::default()
    };
    let loaded = load_catalog(&store, "anything", None, TTL).await;
    assert!(loaded.is_empty());
    assert_eq!(loaded.completion_percent(), 0.0);
}

#[tokio::test]
async fn signing_failure_makes_video_unselectable_only() {
    let c = course("masterclass-nutrir-ciclo");
    let videos = vec![
        video(
            c.id,
            "Native",
            1,
            VideoSource::Storage {
                path: "native.mp4".into(),
            },
        ),
        video(
            c.id,
            "Hosted",
            2,
            VideoSource::YouTube {
                video_id: "abc".into(),
            },
        ),
    ];
    let store = FakeStore {
        course: Some(c),
        videos,
        fail_signing: true,
        ..Default::default()
    };

    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", None, TTL).await;
    assert!(loaded.course.is_some());
    assert_eq!(loaded.videos.len(), 2);
    assert!(loaded.videos[0].playable_url.is_none());
    assert_eq!(
        loaded.videos[1].playable_url.as_deref(),
        Some("https://www.youtube.com/embed/abc")
    );
    // The first selectable video is the hosted one.
    assert_eq!(loaded.first_playable(), Some(1));
}

#[tokio::test]
async fn signed_urls_request_configured_ttl() {
    let c = course("masterclass-nutrir-ciclo");
    let videos = vec![video(
        c.id,
        "Native",
        1,
        VideoSource::Storage {
            path: "native.mp4".into(),
        },
    )];
    let sign_calls = Arc::new(Mutex::new(Vec::new()));
    let store = FakeStore {
        course: Some(c),
        videos,
        sign_calls: Arc::clone(&sign_calls),
        ..Default::default()
    };

    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", None, 900).await;
    assert!(loaded.videos[0].playable_url.is_some());
    let calls = sign_calls.lock().await;
    assert_eq!(calls.as_slice(), &[("native.mp4".to_string(), 900)]);
}

#[tokio::test]
async fn fresh_user_sees_zero_progress_and_first_video() {
    let c = course("masterclass-nutrir-ciclo");
    let videos: Vec<Video> = (1..=8)
        .map(|i| {
            video(
                c.id,
                &format!("Lesson {i}"),
                i,
                VideoSource::Embed {
                    url: format!("https://player.example/v/{i}"),
                },
            )
        })
        .collect();
    let store = FakeStore {
        course: Some(c),
        videos,
        ..Default::default()
    };

    let user = Uuid::new_v4();
    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", Some(user), TTL).await;
    assert_eq!(loaded.videos.len(), 8);
    assert_eq!(loaded.completion_percent(), 0.0);
    assert_eq!(loaded.first_playable(), Some(0));

    // First selection starts at zero, not completed, progress bar empty.
    let mut session = PlaybackSession::new();
    let first = &loaded.videos[0].video;
    session.select(first, loaded.progress_for(first.id));
    assert_eq!(session.position_seconds(), 0.0);
    assert!(!session.is_completed());
    assert_eq!(session.fraction(), Some(0.0));
}

#[tokio::test]
async fn saved_progress_joins_the_catalog() {
    let c = course("masterclass-nutrir-ciclo");
    let v1 = video(
        c.id,
        "Lesson 1",
        1,
        VideoSource::Embed {
            url: "https://player.example/v/1".into(),
        },
    );
    let v2 = video(
        c.id,
        "Lesson 2",
        2,
        VideoSource::Embed {
            url: "https://player.example/v/2".into(),
        },
    );
    let user = Uuid::new_v4();
    let store = FakeStore {
        course: Some(c),
        videos: vec![v1.clone(), v2.clone()],
        progress: vec![VideoProgress {
            user_id: user,
            video_id: v1.id,
            is_completed: true,
            last_position_seconds: 600.0,
            updated_at: Utc::now(),
        }],
        ..Default::default()
    };

    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", Some(user), TTL).await;
    assert_eq!(loaded.completion_percent(), 50.0);
    assert!(loaded.progress_for(v1.id).unwrap().is_completed);
    assert!(loaded.progress_for(v2.id).is_none());

    // Selecting the unwatched video shows its own state, not lesson 1's.
    let mut session = PlaybackSession::new();
    session.select(&v2, loaded.progress_for(v2.id));
    assert_eq!(session.position_seconds(), 0.0);
}

#[tokio::test]
async fn progress_fetch_failure_degrades_to_empty_map() {
    let c = course("masterclass-nutrir-ciclo");
    let videos = vec![video(
        c.id,
        "Lesson 1",
        1,
        VideoSource::Embed {
            url: "https://player.example/v/1".into(),
        },
    )];
    let store = FakeStore {
        course: Some(c),
        videos,
        fail_progress: true,
        ..Default::default()
    };

    let loaded = load_catalog(&store, "masterclass-nutrir-ciclo", Some(Uuid::new_v4()), TTL).await;
    assert_eq!(loaded.videos.len(), 1);
    assert!(loaded.progress.is_empty());
}
