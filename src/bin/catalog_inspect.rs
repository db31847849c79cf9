//! Print the resolved catalog for a course slug: modules, videos,
//! playable URLs, attached resources and (when signed in) progress.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use nutriplay::auth::{self, TokenProvider};
use nutriplay::catalog;
use nutriplay::config;
use nutriplay::store::{CourseStore, RestCourseStore};

#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Course slug to resolve
    #[arg(long)]
    course: String,

    /// Also list each video's attached resources
    #[arg(long)]
    resources: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let tokens = auth::provider_from_config(&cfg);
    let store = RestCourseStore::from_config(&cfg, Arc::clone(&tokens))?;

    let user = match tokens.identity().await {
        Ok(identity) => identity.map(|i| i.user_id),
        Err(err) => {
            warn!(?err, "sign-in failed; inspecting anonymously");
            None
        }
    };

    let loaded = catalog::load_catalog(
        &store,
        &args.course,
        user,
        cfg.remote.storage.signed_url_ttl_seconds,
    )
    .await;

    match loaded.course.as_ref() {
        Some(course) => {
            println!(
                "Course: {} ({}){}",
                course.title,
                course.slug,
                if course.featured { " [featured]" } else { "" }
            );
            if let Some(description) = course.description.as_deref() {
                println!("  {description}");
            }
            if let Some(price) = course.price_cents {
                println!("  price: {}.{:02}", price / 100, price % 100);
            }
        }
        None => println!("Course: <storage fallback listing>"),
    }
    println!("Completion: {:.0}%", loaded.completion_percent());

    for (module, entries) in loaded.grouped() {
        match module {
            Some(m) => println!("\n[{} (sort {})]", m.title, m.sort_order),
            None => println!("\n[unassigned]"),
        }
        for entry in entries {
            let progress = loaded.progress_for(entry.video.id);
            println!(
                "  {} | {} | {} | {}",
                entry.video.title,
                entry.video.source.kind_str(),
                entry
                    .playable_url
                    .as_deref()
                    .unwrap_or("<no playable url>"),
                match progress {
                    Some(p) if p.is_completed => "completed".to_string(),
                    Some(p) => format!("at {:.0}s", p.last_position_seconds),
                    None => "unwatched".to_string(),
                }
            );
            if args.resources {
                for resource in store.resources_for_video(entry.video.id).await? {
                    println!(
                        "      resource: {} [{}] {}",
                        resource.title, resource.resource_type, resource.file_url
                    );
                }
            }
        }
    }

    Ok(())
}
