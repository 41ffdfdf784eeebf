use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod autosave;
mod build;
mod cli;
mod clock;
mod command;
mod config;
mod drift;
mod error;
mod local;
mod recipe;
mod remote;
mod session;
mod storage;

use cli::{Cli, Commands};
use command::{EditRequest, GenerateRequest};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(&cli)?;

    let outcome = match cli.command {
        Commands::Recipes { refresh } => command::run_recipes(&config, refresh).await,
        Commands::Show { name } => command::run_show(&config, &name).await,
        Commands::Local { root, action } => command::run_local(&config, root, action).await,
        Commands::Autosave { action } => command::run_autosave(&config, action).await,
        Commands::Generate {
            name,
            local_root,
            arch,
            ignore_architecture,
            jobs,
            options,
            output_dir,
        } => {
            let request = GenerateRequest {
                name,
                local_root,
                architecture: arch,
                ignore_architecture,
                jobs,
                options,
                output_dir,
            };
            command::run_generate(&config, request).await
        }
        Commands::Edit {
            target,
            from,
            version,
            local_root,
            sets,
            save_local,
            export,
            open,
        } => {
            let request = EditRequest {
                target,
                from,
                version,
                local_root,
                sets,
                save_local,
                export,
                open,
            };
            command::run_edit(&config, request).await
        }
        Commands::New { name, version } => command::run_new(&config, &name, &version).await,
        Commands::License { spdx } => command::run_license(&config, &spdx).await,
        Commands::Download { url, check_only } => {
            command::run_download(&config, &url, check_only).await
        }
        Commands::Hash { value } => command::run_hash(&config, &value).await,
        Commands::PublishUrl { name, open } => {
            command::run_publish_url(&config, &name, open).await
        }
        Commands::Cache { action } => command::run_cache(&config, action).await,
    };

    if let Err(e) = &outcome {
        if let Some(err) = e.downcast_ref::<error::Error>() {
            if err.is_user_actionable() {
                eprintln!("❌ {}", err);
                std::process::exit(1);
            }
        }
    }
    outcome
}
