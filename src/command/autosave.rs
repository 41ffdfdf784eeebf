use anyhow::{bail, Result};
use chrono::Utc;

use crate::autosave::age_label;
use crate::cli::AutosaveAction;
use crate::config::Config;
use crate::session::Services;

pub async fn run_autosave(config: &Config, action: AutosaveAction) -> Result<()> {
    let services = Services::from_config(config)?;
    let store = &services.autosave;

    match action {
        AutosaveAction::List => {
            let entries = store.list();
            if entries.is_empty() {
                println!("No autosaved recipes.");
                return Ok(());
            }
            let now = Utc::now();
            for entry in entries {
                println!(
                    "{}  {} {}  ({})",
                    entry.id,
                    entry.name,
                    entry.version,
                    age_label(entry.last_modified, now)
                );
            }
        }
        AutosaveAction::Show { id } => match store.get(&id) {
            Some(entry) => print!("{}", entry.recipe.to_yaml()?),
            None => bail!("No autosaved recipe with id {}", id),
        },
        AutosaveAction::Delete { id } => {
            store.delete(&id);
            println!("Deleted autosave {}", id);
        }
    }

    Ok(())
}
