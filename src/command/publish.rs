use anyhow::Result;

use crate::config::Config;
use crate::remote::publish_url;
use crate::session::Services;

pub async fn run_publish_url(config: &Config, name: &str, open_browser: bool) -> Result<()> {
    let services = Services::from_config(config)?;
    let snapshot = services.cache.get_snapshot(&config.coords).await?;
    let existing = snapshot.find(name).is_some();

    let url = publish_url(&config.coords, name, existing)?;
    if existing {
        println!("'{}' is published; edit it at:", name);
    } else {
        println!("'{}' is new; create it at:", name);
    }
    println!("{}", url);

    if open_browser && open::that(url.as_str()).is_err() {
        println!("⚠️  Could not open browser automatically.");
    }
    Ok(())
}
