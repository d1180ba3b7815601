use std::sync::Arc;

use chrono::Utc;
use sealed_core::{
    application::{Application, ConnectionType, IdName},
    canonical::SignedEntity,
    secret::{Mask, Secret},
};
use sealed_crypto::{CryptoProvider, DecryptMode, FieldCodec, Signer};
use sealed_store::{
    options::apply_all,
    rows::{self, ApplicationRow, Selector},
    Corruption, Ctx, Integrity, LoadOption, StoreError, Verification,
};
use tracing::{debug, error, instrument};

use crate::{
    error::{infra, Error},
    mapping::{self, Decoded},
};

/// Repository for applications.
///
/// Holds no per-call state: every operation runs on the caller's [`Ctx`] and
/// never opens or commits a transaction.
pub struct ApplicationStore {
    integrity: Integrity<Application>,
    codec: FieldCodec,
}

impl ApplicationStore {
    /// Fails if the application's canonical templates do not compile.
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Result<Self, Error> {
        let integrity = Integrity::new(Signer::new(crypto.clone()))
            .map_err(infra("compile canonical forms", Application::ENTITY))?;
        Ok(Self {
            integrity,
            codec: FieldCodec::new(crypto),
        })
    }

    /// Whether an application named `name` exists in the project with key `project_key`.
    #[instrument(skip_all, fields(project_key = project_key, name = name))]
    pub fn exists(&self, ctx: &Ctx<'_>, project_key: &str, name: &str) -> Result<bool, Error> {
        let count = rows::count_by_project_key_and_name(ctx, project_key, name)
            .map_err(infra("check application", format!("{project_key}/{name}")))?;
        Ok(count == 1)
    }

    #[instrument(skip_all, fields(id = id))]
    pub fn load_by_id(
        &self,
        ctx: &Ctx<'_>,
        id: i64,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        self.get(ctx, Selector::Id(id), options)
    }

    /// Like [`Self::load_by_id`] but the repository password and key material
    /// come back in clear.
    #[instrument(skip_all, fields(id = id))]
    pub fn load_by_id_clear(
        &self,
        ctx: &Ctx<'_>,
        id: i64,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        self.get_clear(ctx, Selector::Id(id), options)
    }

    #[instrument(skip_all, fields(project_id = project_id, name = name))]
    pub fn load_by_project_id_and_name(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        name: &str,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        self.get(ctx, Selector::ProjectIdAndName(project_id, name), options)
    }

    #[instrument(skip_all, fields(project_id = project_id, name = name))]
    pub fn load_by_project_id_and_name_clear(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        name: &str,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        self.get_clear(ctx, Selector::ProjectIdAndName(project_id, name), options)
    }

    /// All applications of a project, ordered by name.
    #[instrument(skip_all, fields(project_id = project_id))]
    pub fn load_all(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all(ctx, Selector::Project(project_id), options)
    }

    #[instrument(skip_all, fields(project_id = project_id))]
    pub fn load_all_clear(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all_clear(ctx, Selector::Project(project_id), options)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    pub fn load_all_by_ids(
        &self,
        ctx: &Ctx<'_>,
        ids: &[i64],
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all(ctx, Selector::Ids(ids), options)
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    pub fn load_all_by_ids_clear(
        &self,
        ctx: &Ctx<'_>,
        ids: &[i64],
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all_clear(ctx, Selector::Ids(ids), options)
    }

    /// Applications of a project whose definition comes from `repository`.
    #[instrument(skip_all, fields(project_id = project_id, repository = repository))]
    pub fn load_all_by_project_id_and_repository(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        repository: &str,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all(
            ctx,
            Selector::ProjectAndRepository(project_id, repository),
            options,
        )
    }

    #[instrument(skip_all, fields(project_id = project_id, repository = repository))]
    pub fn load_all_by_project_id_and_repository_clear(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        repository: &str,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        self.get_all_clear(
            ctx,
            Selector::ProjectAndRepository(project_id, repository),
            options,
        )
    }

    /// Id, name, description and icon of every application in a project.
    /// Read straight from plain columns; no signature is involved.
    pub fn load_all_names(&self, ctx: &Ctx<'_>, project_id: i64) -> Result<Vec<IdName>, Error> {
        rows::select_names(ctx, project_id)
            .map_err(infra("load application names", format!("project {project_id}")))
    }

    pub fn load_icon(&self, ctx: &Ctx<'_>, id: i64) -> Result<String, Error> {
        rows::select_icon(ctx, id)
            .map_err(infra("load application icon", format!("id {id}")))?
            .ok_or_else(|| not_found(format!("id {id}")))
    }

    /// Validate, stamp, encrypt, sign and persist `app` under `project_id`.
    /// On success `app` carries its new id and a masked strategy.
    #[instrument(skip_all, fields(project_id = project_id, name = %app.name))]
    pub fn insert(
        &self,
        ctx: &Ctx<'_>,
        project_id: i64,
        app: &mut Application,
    ) -> Result<(), Error> {
        app.validate()?;

        app.project_id = project_id;
        app.last_modified = Utc::now();
        if app.repository_strategy.connection_type == ConnectionType::Ssh {
            app.repository_strategy.password = Secret::empty();
        }

        let target = format!("{}({})", app.name, project_id);
        let row = self
            .seal(ctx, app)
            .map_err(infra("insert application", &target))?;
        let id = rows::insert(ctx, &row).map_err(infra("insert application", &target))?;

        app.id = id;
        app.mask();
        debug!(id, "application inserted");
        Ok(())
    }

    /// Re-sign and persist `app`. A password left as [`Secret::Unchanged`]
    /// keeps the stored one; SSH strategies never keep a password.
    #[instrument(skip_all, fields(id = app.id, name = %app.name))]
    pub fn update(&self, ctx: &Ctx<'_>, app: &mut Application) -> Result<(), Error> {
        if app.repository_strategy.connection_type == ConnectionType::Ssh {
            app.repository_strategy.password = Secret::empty();
        } else if app.repository_strategy.password.is_unchanged() {
            let current = self.load_by_id_clear(ctx, app.id, &[])?;
            app.repository_strategy.password = current.repository_strategy.password;
        }

        app.validate()?;
        app.last_modified = Utc::now();

        let target = format!("{}({})", app.name, app.id);
        let row = self
            .seal(ctx, app)
            .map_err(infra("update application", &target))?;
        let changed = rows::update(ctx, &row).map_err(infra("update application", &target))?;
        if changed == 0 {
            return Err(not_found(format!("id {}", app.id)));
        }

        app.mask();
        debug!(id = app.id, "application updated");
        Ok(())
    }

    fn seal(&self, ctx: &Ctx<'_>, app: &Application) -> Result<ApplicationRow, StoreError> {
        ctx.ensure_active()?;
        let signature = self.integrity.sign(app)?;
        ctx.ensure_active()?;
        mapping::seal(app, &self.codec, signature)
    }

    /// Decrypt and verify one row. Decryption always happens here: it is
    /// needed to rebuild the canonical form, and masking comes later.
    fn verify(
        &self,
        ctx: &Ctx<'_>,
        row: Option<ApplicationRow>,
    ) -> Result<Verification<Application>, StoreError> {
        let Some(row) = row else {
            return Ok(Verification::Absent);
        };
        ctx.ensure_active()?;
        let id = row.id;
        match mapping::open(row, &self.codec, DecryptMode::Decrypt)? {
            Decoded::Record(app, signature) => {
                ctx.ensure_active()?;
                self.integrity.check(id, app, &signature)
            }
            Decoded::Unreadable(reason) => Ok(Verification::Corrupted(Corruption {
                entity: Application::ENTITY,
                id,
                reason,
            })),
        }
    }

    fn get(
        &self,
        ctx: &Ctx<'_>,
        selector: Selector<'_>,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        let mut app = self.get_clear(ctx, selector, options)?;
        app.mask();
        Ok(app)
    }

    fn get_clear(
        &self,
        ctx: &Ctx<'_>,
        selector: Selector<'_>,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Application, Error> {
        let key = describe(selector);
        let row = rows::select_one(ctx, selector).map_err(infra("load application", &key))?;

        match self.verify(ctx, row).map_err(infra("load application", &key))? {
            Verification::Valid(app) => {
                let mut loaded = [app];
                apply_all(ctx, options, &mut loaded)
                    .map_err(Error::Decorator)?;
                let [app] = loaded;
                Ok(app)
            }
            Verification::Corrupted(corruption) => {
                report(&corruption);
                Err(not_found(key))
            }
            Verification::Absent => Err(not_found(key)),
        }
    }

    fn get_all(
        &self,
        ctx: &Ctx<'_>,
        selector: Selector<'_>,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        let mut apps = self.get_all_clear(ctx, selector, options)?;
        apps.iter_mut().for_each(Mask::mask);
        Ok(apps)
    }

    /// Corrupted rows are reported and skipped; the rest are decorated.
    fn get_all_clear(
        &self,
        ctx: &Ctx<'_>,
        selector: Selector<'_>,
        options: &[&dyn LoadOption<Application>],
    ) -> Result<Vec<Application>, Error> {
        let key = describe(selector);
        let rows = rows::select_all(ctx, selector).map_err(infra("load applications", &key))?;

        let mut verified = Vec::with_capacity(rows.len());
        for row in rows {
            match self.verify(ctx, Some(row)).map_err(infra("load applications", &key))? {
                Verification::Valid(app) => verified.push(app),
                Verification::Corrupted(corruption) => report(&corruption),
                Verification::Absent => {}
            }
        }

        apply_all(ctx, options, &mut verified)
            .map_err(Error::Decorator)?;
        Ok(verified)
    }
}

fn report(corruption: &Corruption) {
    error!(
        entity = corruption.entity,
        id = corruption.id,
        "{corruption}"
    );
}

fn not_found(key: String) -> Error {
    Error::NotFound {
        entity: Application::ENTITY,
        key,
    }
}

fn describe(selector: Selector<'_>) -> String {
    match selector {
        Selector::Id(id) => format!("id {id}"),
        Selector::ProjectIdAndName(project_id, name) => {
            format!("project {project_id}, name {name}")
        }
        Selector::Project(project_id) => format!("project {project_id}"),
        Selector::Ids(ids) => format!("ids {ids:?}"),
        Selector::ProjectAndRepository(project_id, repo) => {
            format!("project {project_id}, repository {repo}")
        }
    }
}
