use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sealed_core::application::ConnectionType;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "sealed",
    about = "Signed, selectively encrypted application records",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Round-trip a throwaway record through the database and key material.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage applications.
    #[command(subcommand)]
    App(AppCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ProjectCommand {
    /// Register a project key.
    Add { key: String, name: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Create an application in a project.
    Add {
        #[arg(long, short)]
        project: String,
        name: String,
        #[command(flatten)]
        fields: AppFields,
    },
    /// Print one application as JSON.
    Show {
        #[arg(long, short)]
        project: String,
        name: String,
        /// Include the repository password and key material.
        #[arg(long)]
        clear: bool,
    },
    /// List the applications of a project.
    List {
        #[arg(long, short)]
        project: String,
        /// Only applications defined in this repository.
        #[arg(long)]
        repository: Option<String>,
    },
    /// Change an application. Omitted flags keep their stored value.
    Update {
        #[arg(long, short)]
        project: String,
        name: String,
        #[command(flatten)]
        fields: AppFields,
    },
    /// Exit with status 1 when the application does not exist.
    Exists {
        #[arg(long, short)]
        project: String,
        name: String,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct AppFields {
    #[arg(long)]
    pub description: Option<String>,
    /// `data:image/...` URI.
    #[arg(long)]
    pub icon: Option<String>,
    /// Repository the application is defined in.
    #[arg(long)]
    pub repository: Option<String>,
    /// `https` or `ssh`.
    #[arg(long)]
    pub connection: Option<ConnectionType>,
    #[arg(long)]
    pub user: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub ssh_key: Option<String>,
    /// File holding the private key to store encrypted.
    #[arg(long)]
    pub ssh_key_file: Option<PathBuf>,
    #[arg(long)]
    pub branch: Option<String>,
    #[arg(long)]
    pub default_branch: Option<String>,
    #[arg(long)]
    pub pgp_key: Option<String>,
    /// Metadata entry as `key=value`; repeatable.
    #[arg(long = "meta", value_parser = parse_meta)]
    pub metadata: Vec<(String, String)>,
}

fn parse_meta(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
