use anyhow::Result;
use std::time::Duration;

use crate::config::Config;
use crate::session::{EditingSession, Services};

pub async fn run_recipes(config: &Config, refresh: bool) -> Result<()> {
    let services = Services::from_config(config)?;
    if refresh {
        services.cache.invalidate();
    }

    let snapshot = services.cache.get_snapshot(&config.coords).await?;
    let commit = &snapshot.repository;

    println!("{} ({} recipes)", config.coords, snapshot.recipes.len());
    if !commit.sha.is_empty() {
        let sha: String = commit.sha.chars().take(7).collect();
        let summary = commit.message.lines().next().unwrap_or_default();
        match commit.date {
            Some(date) => println!(
                "Latest commit {} by {} on {}: {}",
                sha,
                commit.author,
                date.format("%Y-%m-%d"),
                summary
            ),
            None => println!("Latest commit {} by {}: {}", sha, commit.author, summary),
        }
    }
    println!();

    for name in snapshot.recipe_names() {
        println!("  {}", name);
    }

    let status = services.cache.cache_status();
    if let Some(expires_at) = status.expires_at {
        let freshness = if status.is_valid { "fresh" } else { "stale" };
        println!("\nListing {} until {}", freshness, expires_at.format("%Y-%m-%d %H:%M UTC"));
    }

    Ok(())
}

pub async fn run_show(config: &Config, name: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    let mut session = EditingSession::new(services, Duration::ZERO);

    let recipe = session.load_remote(name).await?;
    print!("{}", recipe.to_yaml()?);
    Ok(())
}
