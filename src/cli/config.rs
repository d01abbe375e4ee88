//! Configuration commands
//!
//! docket config show     - Print the effective configuration
//! docket config validate - Check the effective configuration

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::config::AppConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show {
        /// Only print this section (e.g. controller)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate the effective configuration
    Validate,
}

impl ConfigCommands {
    pub fn run(self, config: &AppConfig) -> Result<()> {
        match self {
            Self::Show { section } => show_config(config, section.as_deref()),
            Self::Validate => validate_config(config),
        }
    }
}

fn show_config(config: &AppConfig, section: Option<&str>) -> Result<()> {
    let value = toml::Value::try_from(config)?;
    let rendered = match section {
        Some(name) => match value.get(name) {
            Some(section) => {
                let mut table = toml::map::Map::new();
                table.insert(name.to_string(), section.clone());
                toml::to_string_pretty(&toml::Value::Table(table))?
            }
            None => bail!("unknown configuration section: {name}"),
        },
        None => toml::to_string_pretty(&value)?,
    };
    println!("{rendered}");
    Ok(())
}

fn validate_config(config: &AppConfig) -> Result<()> {
    match config.validate() {
        Ok(()) => {
            println!("configuration is valid");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("  - {error}");
            }
            bail!("{} configuration error(s)", errors.len())
        }
    }
}
