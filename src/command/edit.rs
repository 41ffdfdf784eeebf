use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::cli::RecipeSource;
use crate::config::Config;
use crate::session::{EditingSession, RecipeOrigin, Services};

/// Parsed `edit` arguments.
pub struct EditRequest {
    pub target: String,
    pub from: RecipeSource,
    pub version: String,
    pub local_root: Option<PathBuf>,
    pub sets: Vec<(String, String)>,
    pub save_local: bool,
    pub export: Option<PathBuf>,
    pub open: bool,
}

pub async fn run_edit(config: &Config, request: EditRequest) -> Result<()> {
    let config = config.clone().with_local_root(request.local_root.clone());
    let services = Services::from_config(&config)?;

    if config.local_root.is_some() {
        let grant = services.local.open_root().await?;
        for warning in &grant.warnings {
            eprintln!("⚠️  {}", warning);
        }
    } else if request.from == RecipeSource::Local {
        bail!("--from local needs --local-root");
    }

    let mut session = EditingSession::new(services.clone(), config.autosave_debounce);
    match request.from {
        RecipeSource::Remote => {
            session.load_remote(&request.target).await?;
        }
        RecipeSource::Local => {
            session.load_local(&request.target).await?;
        }
        RecipeSource::Autosave => {
            session.load_autosave(&request.target).await?;
        }
        RecipeSource::New => session.new_recipe(&request.target, &request.version),
    }
    if let (Some(recipe), Some(origin)) = (session.recipe(), session.origin()) {
        let source = match origin {
            RecipeOrigin::Remote => "remote".to_string(),
            RecipeOrigin::Local => "local".to_string(),
            RecipeOrigin::Autosave { id } => format!("autosave {}", id),
            RecipeOrigin::New => "template".to_string(),
        };
        eprintln!("Editing {} {} ({})", recipe.name, recipe.version, source);
    }

    for (key, value) in &request.sets {
        session.set_field(key, value)?;
    }
    session.flush_autosave();
    if let Some(id) = session.autosave_id() {
        eprintln!("✅ Autosaved as {}", id);
    }

    if !session.drift().is_published() {
        eprintln!("Not published yet");
    } else if !session.drift().has_baseline() {
        eprintln!("Published, no baseline to compare against");
    } else if session.is_modified() {
        eprintln!("⚠️  Modified since it was published");
    } else {
        eprintln!("Matches the published version");
    }

    if request.save_local {
        let handle = session.save_local().await?;
        eprintln!("✅ Saved {} in {}", handle.path, handle.directory.path().display());
    }

    let (file_name, text) = session.export()?;
    match &request.export {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let target = dir.join(&file_name);
            std::fs::write(&target, &text)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            eprintln!("✅ Exported {}", target.display());
        }
        None => print!("{}", text),
    }

    let url = session.publish_url()?;
    eprintln!("Publish at: {}", url);
    if request.open && open::that(url.as_str()).is_err() {
        eprintln!("⚠️  Could not open browser automatically.");
    }

    if config.local_root.is_some() {
        services.local.close_root().await;
    }
    Ok(())
}
