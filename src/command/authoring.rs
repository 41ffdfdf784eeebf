use anyhow::{Context, Result};

use crate::config::Config;
use crate::session::Services;

pub async fn run_new(config: &Config, name: &str, version: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    let template = services
        .orchestrator
        .init_new_recipe_template(name, version)
        .await?;
    print!("{}", template);
    Ok(())
}

pub async fn run_license(config: &Config, spdx: &str) -> Result<()> {
    let services = Services::from_config(config)?;
    if services.orchestrator.validate_license(spdx).await? {
        println!("✅ {} is a known license", spdx);
    } else {
        println!("❌ {} is not in the generator's license list", spdx);
    }
    Ok(())
}

pub async fn run_download(config: &Config, url: &str, check_only: bool) -> Result<()> {
    let services = Services::from_config(config)?;
    let path = services
        .orchestrator
        .download_with_cache(url, check_only)
        .await?;
    println!("{}", path);
    Ok(())
}

pub async fn run_hash(config: &Config, value: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_yaml_ng::from_str(value).context("Value is not valid YAML or JSON")?;
    let services = Services::from_config(config)?;
    println!("{}", services.orchestrator.hash(&value).await?);
    Ok(())
}
