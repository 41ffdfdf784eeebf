use anyhow::Result;

use crate::cli::CacheAction;
use crate::config::Config;
use crate::session::Services;

pub async fn run_cache(config: &Config, action: CacheAction) -> Result<()> {
    let services = Services::from_config(config)?;

    match action {
        CacheAction::Status => {
            let status = services.cache.cache_status();
            match (status.coordinates, status.expires_at) {
                (Some(coords), Some(expires_at)) => {
                    let state = if status.is_valid { "✅ fresh" } else { "⚠️  stale" };
                    println!("{} listing for {}", state, coords);
                    println!("   Expires: {}", expires_at.format("%Y-%m-%d %H:%M UTC"));
                }
                _ => println!("No repository listing cached."),
            }
        }
        CacheAction::Clear => {
            services.cache.invalidate();
            println!("✅ Cleared cached repository listing.");
        }
    }

    Ok(())
}
