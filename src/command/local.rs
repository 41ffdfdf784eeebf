use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::cli::LocalAction;
use crate::config::Config;
use crate::local::BUILDER_SCRIPT_PATH;
use crate::session::Services;

pub async fn run_local(config: &Config, root: PathBuf, action: LocalAction) -> Result<()> {
    let config = config.clone().with_local_root(Some(root));
    let services = Services::from_config(&config)?;
    let bridge = &services.local;

    let grant = bridge.open_root().await?;
    for warning in &grant.warnings {
        eprintln!("⚠️  {}", warning);
    }

    match action {
        LocalAction::Status => {
            let recipes = bridge.list_recipes().await?;
            let status = bridge.status().await;
            if let Some(root) = &status.root {
                println!("Root: {} (grant {})", root.display(), grant.generation);
            }
            println!("Recipes: {} ({} cached)", recipes.len(), status.cached_recipes);
            if bridge.get_builder_override_script().await.is_some() {
                println!("Builder: local {} overrides the remote one", BUILDER_SCRIPT_PATH);
            } else {
                println!("Builder: remote");
            }
        }
        LocalAction::List => {
            let handles = bridge.list_recipes().await?;
            println!("{} ({} recipes)\n", grant.root.display(), handles.len());
            for handle in handles {
                println!("  {:<32} {}", handle.name, handle.path);
            }
        }
        LocalAction::Show { name } => match bridge.read_recipe(&name).await? {
            Some(handle) => print!("{}", handle.content),
            None => bail!("No local recipe named '{}'", name),
        },
        LocalAction::Aux { name, path } => match bridge.read_auxiliary_file(&name, &path).await {
            Some(content) => print!("{}", content),
            None => bail!("Cannot read '{}' in recipes/{}", path, name),
        },
    }

    bridge.close_root().await;
    Ok(())
}
