use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::build::{
    Architecture, GenerateOptions, Generation, OrchestratorState, DEFAULT_OUTPUT_DIR,
};
use crate::config::Config;
use crate::session::{EditingSession, Services};

/// Parsed `generate` arguments.
pub struct GenerateRequest {
    pub name: String,
    pub local_root: Option<PathBuf>,
    pub architecture: Architecture,
    pub ignore_architecture: bool,
    pub jobs: Option<u32>,
    pub options: Vec<(String, String)>,
    pub output_dir: Option<PathBuf>,
}

pub async fn run_generate(config: &Config, request: GenerateRequest) -> Result<()> {
    let config = config.clone().with_local_root(request.local_root.clone());
    let services = Services::from_config(&config)?;
    let mut session = EditingSession::new(services.clone(), config.autosave_debounce);

    if request.local_root.is_some() {
        let grant = services.local.open_root().await?;
        for warning in &grant.warnings {
            eprintln!("⚠️  {}", warning);
        }
        session.load_local(&request.name).await?;
    } else {
        session.load_remote(&request.name).await?;
    }

    let options = GenerateOptions {
        architecture: request.architecture,
        ignore_architecture: request.ignore_architecture,
        max_parallel_jobs: request.jobs,
        options: request.options.into_iter().collect(),
    };

    eprintln!("Preparing build sandbox (first run installs packages)...");
    let generation = match session.generate(DEFAULT_OUTPUT_DIR, &options).await {
        Ok(generation) => generation,
        Err(e) => {
            if let OrchestratorState::Failed(reason) = services.orchestrator.state() {
                eprintln!("❌ Sandbox setup failed: {}", reason);
                eprintln!("   Remove {} to start it over.", config.sandbox_dir().display());
            }
            return Err(e.into());
        }
    };
    let result = match generation {
        Generation::Built(result) => result,
        Generation::Rejected { detail } => {
            bail!("'{}' cannot be built for {}:\n{}", request.name, options.architecture, detail)
        }
    };

    eprintln!(
        "✅ Generated {} {} as {} ({})",
        result.name, result.version, result.tag, result.build_directory
    );
    if let Some(toolchain) = services.orchestrator.toolchain() {
        eprintln!("   Toolchain: {}", toolchain.label());
    }
    if !result.deploy_bins.is_empty() {
        eprintln!("   Deploy binaries: {}", result.deploy_bins.join(", "));
    }
    if !result.deploy_path.is_empty() {
        eprintln!("   Deploy path: {}", result.deploy_path.join(":"));
    }

    match request.output_dir {
        Some(dir) => {
            let target = dir.join(&result.name);
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            std::fs::write(target.join("Dockerfile"), &result.dockerfile)
                .context("Failed to write Dockerfile")?;
            if let Some(readme) = &result.readme {
                std::fs::write(target.join("README.md"), readme)
                    .context("Failed to write README.md")?;
            }
            println!("{}", target.display());
        }
        None => print!("{}", result.dockerfile),
    }

    Ok(())
}
