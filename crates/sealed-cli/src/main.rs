mod apps;
mod cli;
mod config;
mod storage;

use clap::Parser;
use color_eyre::Result;
use sealed_core::{application::Application, secret::Secret};
use sealed_store::{rows, Ctx};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    cli::{Command, ConfigCommand},
    config::KeyringConfig,
    storage::Workspace,
};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let report = match cli.command {
        Command::Version => {
            print_version();
            return Ok(());
        }
        Command::Health => {
            run_health_check(&mut storage::open(&config)?)?;
            println!("Storage: ok");
            return Ok(());
        }
        Command::Config(ConfigCommand::Init) => return init_config(&config),
        Command::Project(cmd) => apps::handle_project(cmd, &mut storage::open(&config)?)?,
        Command::App(cmd) => apps::handle(cmd, &mut storage::open(&config)?)?,
    };

    println!("{}", report.text);
    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    // RUST_LOG wins; otherwise info, on stderr so command output stays parseable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("sealed {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let mut config = config.clone();
    if config.database.is_none() {
        config.database = Some(storage::default_database()?);
    }
    if config.keyring.is_none() && config.master_key.is_none() {
        config.keyring = Some(KeyringConfig::default());
    }
    let path = config::write_default_if_missing(&config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Sign, encrypt, store and read back a throwaway application, then roll back.
fn run_health_check(ws: &mut Workspace) -> Result<()> {
    let tx = ws.db.conn_mut().transaction()?;
    {
        let ctx = Ctx::new(&tx);
        let project_id = rows::insert_project(&ctx, "__health__", "health check")?;
        let mut sample = Application::new("sample");
        sample.repository_strategy.password = Secret::new("ok");
        ws.store.insert(&ctx, project_id, &mut sample)?;

        let round_trip = ws.store.load_by_id_clear(&ctx, sample.id, &[])?;
        if round_trip.repository_strategy.password != Secret::new("ok") {
            color_eyre::eyre::bail!("storage round-trip failed");
        }
    }
    tx.rollback()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_with_test_workspace_succeeds() {
        let mut ws = storage::test_workspace();
        run_health_check(&mut ws)
            .expect("health check should succeed");

        let ctx = Ctx::new(ws.db.conn());
        assert_eq!(rows::project_id_by_key(&ctx, "__health__").unwrap(), None);
    }

    #[test]
    fn health_check_can_run_twice() {
        let mut ws = storage::test_workspace();
        run_health_check(&mut ws).expect("first");
        run_health_check(&mut ws).expect("second");
    }
}
