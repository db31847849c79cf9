//! Device-local lesson notes in SQLite. One note per (course, video),
//! last write wins on the same device; there is no sync and no conflict
//! resolution across devices.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

pub type Pool = SqlitePool;

/// Course key used for notes taken against the degraded storage-listing
/// catalog, which has no course row.
pub const FALLBACK_COURSE_KEY: &str = "storage";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(tail) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), tail),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn save_note(pool: &Pool, course_key: &str, video_id: Uuid, body: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO notes (course_key, video_id, body, updated_at) \
         VALUES (?, ?, ?, datetime('now')) \
         ON CONFLICT(course_key, video_id) \
         DO UPDATE SET body = excluded.body, updated_at = datetime('now')",
    )
    .bind(course_key)
    .bind(video_id.to_string())
    .bind(body)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn get_note(pool: &Pool, course_key: &str, video_id: Uuid) -> Result<Option<String>> {
    let body: Option<String> =
        sqlx::query_scalar("SELECT body FROM notes WHERE course_key = ? AND video_id = ?")
            .bind(course_key)
            .bind(video_id.to_string())
            .fetch_optional(pool)
            .await?;
    Ok(body)
}

#[instrument(skip_all)]
pub async fn delete_note(pool: &Pool, course_key: &str, video_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM notes WHERE course_key = ? AND video_id = ?")
        .bind(course_key)
        .bind(video_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn notes_for_course(pool: &Pool, course_key: &str) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        "SELECT video_id, body FROM notes WHERE course_key = ? ORDER BY updated_at DESC",
    )
    .bind(course_key)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| (row.get("video_id"), row.get("body")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn save_is_last_write_wins() {
        let pool = setup_pool().await;
        let video = Uuid::new_v4();

        save_note(&pool, "masterclass", video, "first draft")
            .await
            .unwrap();
        save_note(&pool, "masterclass", video, "second draft")
            .await
            .unwrap();

        let body = get_note(&pool, "masterclass", video).await.unwrap();
        assert_eq!(body.as_deref(), Some("second draft"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn notes_are_scoped_by_course_and_video() {
        let pool = setup_pool().await;
        let video = Uuid::new_v4();

        save_note(&pool, "course-a", video, "a-note").await.unwrap();
        save_note(&pool, "course-b", video, "b-note").await.unwrap();

        assert_eq!(
            get_note(&pool, "course-a", video).await.unwrap().as_deref(),
            Some("a-note")
        );
        assert_eq!(
            get_note(&pool, "course-b", video).await.unwrap().as_deref(),
            Some("b-note")
        );
        assert!(get_note(&pool, "course-c", video).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_only_target() {
        let pool = setup_pool().await;
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();

        save_note(&pool, "c", keep, "keep me").await.unwrap();
        save_note(&pool, "c", drop, "drop me").await.unwrap();
        delete_note(&pool, "c", drop).await.unwrap();

        assert!(get_note(&pool, "c", drop).await.unwrap().is_none());
        assert_eq!(
            get_note(&pool, "c", keep).await.unwrap().as_deref(),
            Some("keep me")
        );

        let listed = notes_for_course(&pool, "c").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, keep.to_string());
    }
}
