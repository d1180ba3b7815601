use std::fs;

use color_eyre::{eyre::eyre, Result};
use sealed_app::ApplicationStore;
use sealed_core::{
    application::{Application, ConnectionType},
    secret::Secret,
};
use sealed_store::{rows, Ctx};

use crate::{
    cli::{AppCommand, AppFields, ProjectCommand},
    storage::Workspace,
};

/// What a command printed, and whether the process should exit cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    pub success: bool,
}

impl Report {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

pub fn handle_project(cmd: ProjectCommand, ws: &mut Workspace) -> Result<Report> {
    match cmd {
        ProjectCommand::Add { key, name } => {
            let id = in_transaction(ws, |ctx, _| Ok(rows::insert_project(ctx, &key, &name)?))?;
            Ok(Report::ok(format!("Created project {key} ({id})")))
        }
    }
}

/// Execute an `app` subcommand. Writes run in their own transaction.
pub fn handle(cmd: AppCommand, ws: &mut Workspace) -> Result<Report> {
    match cmd {
        AppCommand::Add {
            project,
            name,
            fields,
        } => {
            let mut app = Application::new(name);
            apply_fields(&mut app, fields)?;

            in_transaction(ws, |ctx, store| {
                let project_id = project_id(ctx, &project)?;
                Ok(store.insert(ctx, project_id, &mut app)?)
            })?;
            Ok(Report::ok(format!("Created application {} ({})", app.name, app.id)))
        }
        AppCommand::Show {
            project,
            name,
            clear,
        } => {
            let ctx = Ctx::new(ws.db.conn());
            let project_id = project_id(&ctx, &project)?;
            let app = if clear {
                ws.store
                    .load_by_project_id_and_name_clear(&ctx, project_id, &name, &[])?
            } else {
                ws.store.load_by_project_id_and_name(&ctx, project_id, &name, &[])?
            };
            Ok(Report::ok(serde_json::to_string_pretty(&app)?))
        }
        AppCommand::List {
            project,
            repository,
        } => {
            let ctx = Ctx::new(ws.db.conn());
            let project_id = project_id(&ctx, &project)?;
            let apps = match repository {
                Some(repo) => ws
                    .store
                    .load_all_by_project_id_and_repository(&ctx, project_id, &repo, &[])?,
                None => ws.store.load_all(&ctx, project_id, &[])?,
            };
            if apps.is_empty() {
                return Ok(Report::ok(format!(
                    "No applications yet. Add one with `sealed app add -p {project} <name>`."
                )));
            }
            let lines: Vec<String> = apps
                .iter()
                .map(|app| {
                    format!(
                        "{} [{}] {} {}",
                        app.id,
                        app.repository_strategy.connection_type.as_str(),
                        app.name,
                        app.description
                    )
                    .trim_end()
                    .to_string()
                })
                .collect();
            Ok(Report::ok(lines.join("\n")))
        }
        AppCommand::Update {
            project,
            name,
            fields,
        } => {
            let app = in_transaction(ws, |ctx, store| {
                let project_id = project_id(ctx, &project)?;
                // Start from stored key material; update masks again before returning.
                let mut app =
                    store.load_by_project_id_and_name_clear(ctx, project_id, &name, &[])?;
                apply_fields(&mut app, fields)?;
                store.update(ctx, &mut app)?;
                Ok(app)
            })?;
            Ok(Report::ok(format!("Updated application {} ({})", app.name, app.id)))
        }
        AppCommand::Exists { project, name } => {
            let ctx = Ctx::new(ws.db.conn());
            let found = ws.store.exists(&ctx, &project, &name)?;
            Ok(Report {
                text: if found { "yes" } else { "no" }.into(),
                success: found,
            })
        }
    }
}

/// Run `f` in a transaction that commits only when `f` succeeds.
fn in_transaction<T>(
    ws: &mut Workspace,
    f: impl FnOnce(&Ctx<'_>, &ApplicationStore) -> Result<T>,
) -> Result<T> {
    let tx = ws.db.conn_mut().transaction()?;
    let value = {
        let ctx = Ctx::new(&tx);
        f(&ctx, &ws.store)?
    };
    tx.commit()?;
    Ok(value)
}

fn project_id(ctx: &Ctx<'_>, key: &str) -> Result<i64> {
    rows::project_id_by_key(ctx, key)?.ok_or_else(|| eyre!("unknown project `{key}`"))
}

/// Copy the flags that were given onto `app`; absent flags leave fields alone,
/// so an update without `--password` keeps the stored one.
fn apply_fields(app: &mut Application, fields: AppFields) -> Result<()> {
    if let Some(description) = fields.description {
        app.description = description;
    }
    if let Some(icon) = fields.icon {
        app.icon = icon;
    }
    if let Some(repository) = fields.repository {
        app.from_repository = repository;
    }
    app.metadata.extend(fields.metadata);

    let strategy = &mut app.repository_strategy;
    if let Some(connection) = fields.connection {
        strategy.connection_type = connection;
    }
    if let Some(user) = fields.user {
        strategy.user = user;
    }
    if let Some(password) = fields.password {
        strategy.password = Secret::new(password);
    }
    if let Some(ssh_key) = fields.ssh_key {
        strategy.ssh_key = ssh_key;
    }
    if let Some(path) = fields.ssh_key_file {
        strategy.ssh_key_content = fs::read_to_string(&path)
            .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
    }
    if let Some(branch) = fields.branch {
        strategy.branch = branch;
    }
    if let Some(default_branch) = fields.default_branch {
        strategy.default_branch = default_branch;
    }
    if let Some(pgp_key) = fields.pgp_key {
        strategy.pgp_key = pgp_key;
    }
    if strategy.connection_type == ConnectionType::Ssh && strategy.ssh_key_content.is_empty() {
        tracing::warn!(name = %app.name, "ssh strategy without key material");
    }
    Ok(())
}
