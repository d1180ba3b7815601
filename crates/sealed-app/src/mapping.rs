//! Conversion between the plain `Application` and its stored row.
//!
//! Column fields map one to one; everything else travels in the JSON `data`
//! payload, where the password and the SSH key material are sealed.

use std::collections::BTreeMap;

use sealed_core::{
    application::{Application, ConnectionType, RepositoryStrategy},
    canonical::SignedEntity,
    secret::Secret,
};
use sealed_crypto::{CryptoError, DecryptMode, FieldAad, FieldCodec, SealedField, Signature};
use sealed_store::{rows::ApplicationRow, CorruptionReason, StoreError};
use serde::{Deserialize, Serialize};

const PASSWORD: &str = "password";
const SSH_KEY_CONTENT: &str = "ssh_key_content";

#[derive(Serialize, Deserialize)]
struct ApplicationData {
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    repository_strategy: SealedStrategy,
}

#[derive(Serialize, Deserialize)]
struct SealedStrategy {
    connection_type: ConnectionType,
    #[serde(default)]
    ssh_key: String,
    ssh_key_content: SealedField,
    #[serde(default)]
    user: String,
    password: SealedField,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    pgp_key: String,
}

/// A row decoded back into a record, or the reason it could not be.
pub(crate) enum Decoded {
    Record(Application, Signature),
    Unreadable(CorruptionReason),
}

fn aad(project_id: i64, field: &'static str) -> FieldAad {
    FieldAad::new(Application::ENTITY, project_id, field)
}

/// Build the row for `app`, sealing sensitive fields from the caller's clear
/// values. `Secret::Unchanged` is sealed as an empty value; callers reconcile
/// it before getting here.
pub(crate) fn seal(
    app: &Application,
    codec: &FieldCodec,
    signature: Signature,
) -> Result<ApplicationRow, StoreError> {
    let strategy = &app.repository_strategy;
    let data = ApplicationData {
        metadata: app.metadata.clone(),
        repository_strategy: SealedStrategy {
            connection_type: strategy.connection_type,
            ssh_key: strategy.ssh_key.clone(),
            ssh_key_content: codec
                .encrypt_field(&aad(app.project_id, SSH_KEY_CONTENT), &strategy.ssh_key_content)?,
            user: strategy.user.clone(),
            password: codec.encrypt_field(
                &aad(app.project_id, PASSWORD),
                strategy.password.expose().unwrap_or_default(),
            )?,
            branch: strategy.branch.clone(),
            default_branch: strategy.default_branch.clone(),
            pgp_key: strategy.pgp_key.clone(),
        },
    };

    Ok(ApplicationRow {
        id: app.id,
        project_id: app.project_id,
        name: app.name.clone(),
        description: app.description.clone(),
        icon: app.icon.clone(),
        from_repository: app.from_repository.clone(),
        last_modified: app.last_modified,
        data: serde_json::to_string(&data)?,
        signature: signature.bytes,
        signature_form: signature.form_id,
    })
}

/// Decode a stored row. Authentication failures on sealed fields and
/// undecodable payloads mean the row was tampered with; other crypto failures
/// are infrastructure errors.
pub(crate) fn open(
    row: ApplicationRow,
    codec: &FieldCodec,
    mode: DecryptMode,
) -> Result<Decoded, StoreError> {
    let data: ApplicationData = match serde_json::from_str(&row.data) {
        Ok(data) => data,
        Err(err) => {
            let reason = CorruptionReason::UnreadablePayload(err.to_string());
            return Ok(Decoded::Unreadable(reason));
        }
    };
    let sealed = data.repository_strategy;

    let password = match unseal(codec, row.project_id, PASSWORD, &sealed.password, mode) {
        Ok(Some(clear)) => Secret::Value(clear),
        Ok(None) => Secret::Unchanged,
        Err(err) if err.is_integrity() => {
            let reason = CorruptionReason::UnreadableSecret(err.to_string());
            return Ok(Decoded::Unreadable(reason));
        }
        Err(err) => return Err(err.into()),
    };
    let ssh_key_content = match unseal(
        codec,
        row.project_id,
        SSH_KEY_CONTENT,
        &sealed.ssh_key_content,
        mode,
    ) {
        Ok(clear) => clear.unwrap_or_default(),
        Err(err) if err.is_integrity() => {
            let reason = CorruptionReason::UnreadableSecret(err.to_string());
            return Ok(Decoded::Unreadable(reason));
        }
        Err(err) => return Err(err.into()),
    };

    let app = Application {
        id: row.id,
        project_id: row.project_id,
        name: row.name,
        description: row.description,
        icon: row.icon,
        from_repository: row.from_repository,
        last_modified: row.last_modified,
        metadata: data.metadata,
        repository_strategy: RepositoryStrategy {
            connection_type: sealed.connection_type,
            ssh_key: sealed.ssh_key,
            ssh_key_content,
            user: sealed.user,
            password,
            branch: sealed.branch,
            default_branch: sealed.default_branch,
            pgp_key: sealed.pgp_key,
        },
    };
    let signature = Signature {
        form_id: row.signature_form,
        bytes: row.signature,
    };
    Ok(Decoded::Record(app, signature))
}

fn unseal(
    codec: &FieldCodec,
    project_id: i64,
    field: &'static str,
    sealed: &SealedField,
    mode: DecryptMode,
) -> Result<Option<String>, CryptoError> {
    codec.decrypt_field(&aad(project_id, field), sealed, mode)
}
