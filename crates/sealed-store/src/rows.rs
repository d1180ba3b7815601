//! Parameterized queries against the `application` and `project` tables.
//!
//! Rows are returned exactly as stored: sealed fields stay sealed inside
//! `data` and nothing here checks signatures.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension, Row};
use sealed_core::application::IdName;

use crate::{Ctx, StoreError};

const COLUMNS: &str = "id, project_id, name, description, icon, from_repository, \
                       last_modified, data, signature, signature_form";

/// One `application` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub from_repository: String,
    pub last_modified: DateTime<Utc>,
    /// JSON payload of every non-column field, sensitive ones sealed.
    pub data: String,
    pub signature: Vec<u8>,
    pub signature_form: String,
}

impl ApplicationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            icon: row.get(4)?,
            from_repository: row.get(5)?,
            last_modified: row.get(6)?,
            data: row.get(7)?,
            signature: row.get(8)?,
            signature_form: row.get(9)?,
        })
    }
}

/// Which rows a select targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    Id(i64),
    ProjectIdAndName(i64, &'a str),
    Project(i64),
    Ids(&'a [i64]),
    ProjectAndRepository(i64, &'a str),
}

impl Selector<'_> {
    fn where_clause(&self) -> (String, Vec<Value>) {
        match *self {
            Selector::Id(id) => ("id = ?1".into(), vec![Value::Integer(id)]),
            Selector::ProjectIdAndName(project_id, name) => (
                "project_id = ?1 AND name = ?2".into(),
                vec![Value::Integer(project_id), Value::Text(name.to_string())],
            ),
            Selector::Project(project_id) => {
                ("project_id = ?1".into(), vec![Value::Integer(project_id)])
            }
            Selector::Ids(ids) if ids.is_empty() => ("0".into(), Vec::new()),
            Selector::Ids(ids) => {
                let placeholders = (1..=ids.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("id IN ({placeholders})"),
                    ids.iter().copied().map(Value::Integer).collect(),
                )
            }
            Selector::ProjectAndRepository(project_id, repo) => (
                "project_id = ?1 AND from_repository = ?2".into(),
                vec![Value::Integer(project_id), Value::Text(repo.to_string())],
            ),
        }
    }
}

/// Insert a row and return its new id. `row.id` is ignored.
pub fn insert(ctx: &Ctx<'_>, row: &ApplicationRow) -> Result<i64, StoreError> {
    ctx.ensure_active()?;
    ctx.conn().execute(
        "INSERT INTO application
            (project_id, name, description, icon, from_repository,
             last_modified, data, signature, signature_form)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.project_id,
            row.name,
            row.description,
            row.icon,
            row.from_repository,
            row.last_modified,
            row.data,
            row.signature,
            row.signature_form,
        ],
    )?;
    Ok(ctx.conn().last_insert_rowid())
}

/// Overwrite the row with `row.id`. Returns the number of rows touched.
pub fn update(ctx: &Ctx<'_>, row: &ApplicationRow) -> Result<usize, StoreError> {
    ctx.ensure_active()?;
    let changed = ctx.conn().execute(
        "UPDATE application SET
            project_id = ?2, name = ?3, description = ?4, icon = ?5,
            from_repository = ?6, last_modified = ?7, data = ?8,
            signature = ?9, signature_form = ?10
         WHERE id = ?1",
        params![
            row.id,
            row.project_id,
            row.name,
            row.description,
            row.icon,
            row.from_repository,
            row.last_modified,
            row.data,
            row.signature,
            row.signature_form,
        ],
    )?;
    Ok(changed)
}

pub fn select_one(
    ctx: &Ctx<'_>,
    selector: Selector<'_>,
) -> Result<Option<ApplicationRow>, StoreError> {
    ctx.ensure_active()?;
    let (clause, args) = selector.where_clause();
    let sql = format!("SELECT {COLUMNS} FROM application WHERE {clause}");
    let row = ctx
        .conn()
        .query_row(&sql, params_from_iter(args), ApplicationRow::from_row)
        .optional()?;
    Ok(row)
}

/// Matching rows ordered by name.
pub fn select_all(
    ctx: &Ctx<'_>,
    selector: Selector<'_>,
) -> Result<Vec<ApplicationRow>, StoreError> {
    ctx.ensure_active()?;
    let (clause, args) = selector.where_clause();
    let sql = format!("SELECT {COLUMNS} FROM application WHERE {clause} ORDER BY name ASC");
    let mut stmt = ctx.conn().prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), ApplicationRow::from_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn count_by_project_key_and_name(
    ctx: &Ctx<'_>,
    project_key: &str,
    name: &str,
) -> Result<i64, StoreError> {
    ctx.ensure_active()?;
    let count = ctx.conn().query_row(
        "SELECT count(1) FROM application
         JOIN project ON project.id = application.project_id
         WHERE project.projectkey = ?1 AND application.name = ?2",
        params![project_key, name],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Plain listing columns, ordered by name. Nothing here is signed.
pub fn select_names(ctx: &Ctx<'_>, project_id: i64) -> Result<Vec<IdName>, StoreError> {
    ctx.ensure_active()?;
    let mut stmt = ctx.conn().prepare(
        "SELECT id, name, description, icon FROM application
         WHERE project_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([project_id], |row| {
        Ok(IdName {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            icon: row.get(3)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn select_icon(ctx: &Ctx<'_>, id: i64) -> Result<Option<String>, StoreError> {
    ctx.ensure_active()?;
    let icon = ctx
        .conn()
        .query_row("SELECT icon FROM application WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(icon)
}

/// Create a project and return its id.
pub fn insert_project(ctx: &Ctx<'_>, key: &str, name: &str) -> Result<i64, StoreError> {
    ctx.ensure_active()?;
    ctx.conn().execute(
        "INSERT INTO project (projectkey, name) VALUES (?1, ?2)",
        params![key, name],
    )?;
    Ok(ctx.conn().last_insert_rowid())
}

pub fn project_id_by_key(ctx: &Ctx<'_>, key: &str) -> Result<Option<i64>, StoreError> {
    ctx.ensure_active()?;
    let id = ctx
        .conn()
        .query_row("SELECT id FROM project WHERE projectkey = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn row(project_id: i64, name: &str, repo: &str) -> ApplicationRow {
        ApplicationRow {
            id: 0,
            project_id,
            name: name.into(),
            description: String::new(),
            icon: String::new(),
            from_repository: repo.into(),
            last_modified: Utc::now(),
            data: "{}".into(),
            signature: vec![1, 2, 3],
            signature_form: "f".into(),
        }
    }

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let project_id = insert_project(&Ctx::new(db.conn()), "PROJ", "Project")
            .unwrap();
        (db, project_id)
    }

    #[test]
    fn insert_then_select_by_id_and_name() {
        let (db, project_id) = seeded();
        let ctx = Ctx::new(db.conn());
        let inserted = row(project_id, "api", "");
        let id = insert(&ctx, &inserted).unwrap();

        let by_id = select_one(&ctx, Selector::Id(id)).unwrap().expect("row");
        assert_eq!(by_id.id, id);
        assert_eq!(by_id.name, "api");
        assert_eq!(by_id.last_modified, inserted.last_modified);
        assert_eq!(by_id.signature, vec![1, 2, 3]);

        let by_name = select_one(&ctx, Selector::ProjectIdAndName(project_id, "api"))
            .unwrap()
            .expect("row");
        assert_eq!(by_name, by_id);

        assert!(select_one(&ctx, Selector::Id(id + 1)).unwrap().is_none());
    }

    #[test]
    fn select_all_orders_by_name_and_filters() {
        let (db, project_id) = seeded();
        let ctx = Ctx::new(db.conn());
        let b = insert(&ctx, &row(project_id, "b", "git@x:repo")).unwrap();
        let a = insert(&ctx, &row(project_id, "a", "")).unwrap();
        let c = insert(&ctx, &row(project_id, "c", "git@x:repo")).unwrap();

        let all = select_all(&ctx, Selector::Project(project_id)).unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let by_ids = select_all(&ctx, Selector::Ids(&[c, a])).unwrap();
        assert_eq!(by_ids.iter().map(|r| r.id).collect::<Vec<_>>(), [a, c]);
        assert!(select_all(&ctx, Selector::Ids(&[])).unwrap().is_empty());

        let by_repo = select_all(&ctx, Selector::ProjectAndRepository(project_id, "git@x:repo"))
            .unwrap();
        assert_eq!(by_repo.iter().map(|r| r.id).collect::<Vec<_>>(), [b, c]);
    }

    #[test]
    fn duplicate_name_in_project_is_rejected() {
        let (db, project_id) = seeded();
        let ctx = Ctx::new(db.conn());
        insert(&ctx, &row(project_id, "dup", "")).unwrap();
        assert!(insert(&ctx, &row(project_id, "dup", "")).is_err());
    }

    #[test]
    fn update_reports_missing_rows() {
        let (db, project_id) = seeded();
        let ctx = Ctx::new(db.conn());
        let mut r = row(project_id, "x", "");
        r.id = insert(&ctx, &r).unwrap();
        r.description = "changed".into();
        assert_eq!(update(&ctx, &r).unwrap(), 1);

        r.id += 100;
        assert_eq!(update(&ctx, &r).unwrap(), 0);
    }

    #[test]
    fn counts_names_and_icons() {
        let (db, project_id) = seeded();
        let ctx = Ctx::new(db.conn());
        let mut r = row(project_id, "web", "");
        r.icon = "data:image/png;base64,AA".into();
        let id = insert(&ctx, &r).unwrap();

        assert_eq!(count_by_project_key_and_name(&ctx, "PROJ", "web").unwrap(), 1);
        assert_eq!(count_by_project_key_and_name(&ctx, "OTHER", "web").unwrap(), 0);
        assert_eq!(project_id_by_key(&ctx, "PROJ").unwrap(), Some(project_id));

        let names = select_names(&ctx, project_id).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].id, id);
        assert_eq!(select_icon(&ctx, id).unwrap().as_deref(), Some(r.icon.as_str()));
        assert_eq!(select_icon(&ctx, id + 1).unwrap(), None);
    }
}
