//! SQLite-backed storage.
//!
//! Entries, templates and contexts live in normalized tables; attribution is
//! kept in the `entry_templates` and `entry_contexts` join tables and folded
//! back onto each [`Entry`] on read. Every multi-row write runs in a single
//! transaction. The database runs in WAL mode so reads proceed during writes.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::{debug, error, info, warn};
use rusqlite::{
    ffi, params, params_from_iter, types::Value, Connection, ErrorCode, OptionalExtension,
};

use crate::{
    format_timestamp, next_timestamp, normalize_refs, parse_timestamp, validate_content,
    validate_context_name, validate_id, validate_template_name, Context, ContextRef, DaybookError,
    Entry, ListFilter, Result, Storage, Template, TemplateRef,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL CHECK (length(trim(content)) > 0),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (created_at <= updated_at)
    );
    CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at);

    CREATE TABLE IF NOT EXISTS templates (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS contexts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entry_templates (
        entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        template_id TEXT NOT NULL,
        template_name TEXT NOT NULL,
        PRIMARY KEY (entry_id, template_id)
    ) WITHOUT ROWID;
    CREATE INDEX IF NOT EXISTS idx_entry_templates_name ON entry_templates(template_name);

    CREATE TABLE IF NOT EXISTS entry_contexts (
        entry_id TEXT NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
        context_id TEXT NOT NULL REFERENCES contexts(id),
        PRIMARY KEY (entry_id, context_id)
    ) WITHOUT ROWID;
";

const ENTRY_COLUMNS: &str = "e.id, e.content, e.created_at, e.updated_at";

/// Raw entry row before timestamps are parsed.
type EntryRow = (String, String, String, String);

fn read_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// True when the engine rejected a write because of a UNIQUE or PRIMARY KEY
/// constraint.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Maps a uniqueness violation to a conflict; anything else stays a
/// database error.
fn conflict_or_database(err: rusqlite::Error, what: &'static str, key: &str) -> DaybookError {
    if is_unique_violation(&err) {
        debug!("Uniqueness violation on {} {}", what, key);
        DaybookError::conflict(what, key)
    } else {
        error!("Database write for {} {} failed: {}", what, key, err);
        DaybookError::Database(err)
    }
}

fn template_refs(conn: &Connection, entry_id: &str) -> Result<Vec<TemplateRef>> {
    let mut stmt = conn.prepare_cached(
        "SELECT template_id, template_name FROM entry_templates
         WHERE entry_id = ?1 ORDER BY template_name, template_id",
    )?;
    let refs = stmt
        .query_map([entry_id], |row| {
            Ok(TemplateRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(refs)
}

fn context_refs(conn: &Connection, entry_id: &str) -> Result<Vec<ContextRef>> {
    let mut stmt = conn.prepare_cached(
        "SELECT c.id, c.name FROM entry_contexts ec
         JOIN contexts c ON c.id = ec.context_id
         WHERE ec.entry_id = ?1 ORDER BY c.name, c.id",
    )?;
    let refs = stmt
        .query_map([entry_id], |row| {
            Ok(ContextRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(refs)
}

/// Materializes a full entry, attribution lists included.
fn build_entry(conn: &Connection, (id, content, created_at, updated_at): EntryRow) -> Result<Entry> {
    Ok(Entry {
        templates: template_refs(conn, &id)?,
        contexts: context_refs(conn, &id)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        id,
        content,
    })
}

fn find_entry(conn: &Connection, id: &str) -> Result<Entry> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM entries e WHERE e.id = ?1", ENTRY_COLUMNS),
            [id],
            read_entry_row,
        )
        .optional()?;
    match row {
        Some(row) => build_entry(conn, row),
        None => {
            debug!("Entry not found: {}", id);
            Err(DaybookError::not_found("entry", id))
        }
    }
}

fn insert_template_refs(conn: &Connection, entry_id: &str, refs: &[TemplateRef]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO entry_templates (entry_id, template_id, template_name) VALUES (?1, ?2, ?3)",
    )?;
    for reference in refs {
        stmt.execute(params![entry_id, reference.id, reference.name])?;
    }
    Ok(())
}

/// Raw template or context row: id, name, content or source, timestamps.
type NamedRow = (String, String, String, String, String);

fn read_named_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NamedRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn build_template((id, name, content, created_at, updated_at): NamedRow) -> Result<Template> {
    Ok(Template {
        id,
        name,
        content,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn find_template(conn: &Connection, name: &str) -> Result<Template> {
    conn.query_row(
        "SELECT id, name, content, created_at, updated_at FROM templates WHERE name = ?1",
        [name],
        read_named_row,
    )
    .optional()?
    .map(build_template)
    .unwrap_or_else(|| Err(DaybookError::not_found("template", name)))
}

fn build_context((id, name, source, created_at, updated_at): NamedRow) -> Result<Context> {
    Ok(Context {
        id,
        name,
        source,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn find_context(conn: &Connection, column: &str, key: &str) -> Result<Context> {
    conn.query_row(
        &format!(
            "SELECT id, name, source, created_at, updated_at FROM contexts WHERE {} = ?1",
            column
        ),
        [key],
        read_named_row,
    )
    .optional()?
    .map(build_context)
    .unwrap_or_else(|| Err(DaybookError::not_found("context", key)))
}

fn entry_exists(conn: &Connection, id: &str) -> Result<()> {
    let found: Option<String> = conn
        .query_row("SELECT id FROM entries WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(DaybookError::not_found("entry", id)),
    }
}

/// Stores entries, templates and contexts in one SQLite database file.
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating database directory: {}", parent.display());
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create directory {}: {}", parent.display(), e);
                    DaybookError::DirectoryError {
                        path: parent.to_path_buf(),
                    }
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened SQLite store at {}", path.display());
        Ok(SqliteStore {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DaybookError::LockAcquisitionFailed {
                message: "Failed to acquire lock on database connection".to_string(),
            })
    }
}

impl Storage for SqliteStore {
    fn create_entry(&self, entry: Entry) -> Result<Entry> {
        let mut entry = entry.prepared_for_create()?;
        info!("Creating entry: {}", entry.id);

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let mut contexts = Vec::with_capacity(entry.contexts.len());
        for reference in &entry.contexts {
            let context = find_context(&tx, "id", &reference.id)?;
            contexts.push(ContextRef::from(&context));
        }
        entry.contexts = normalize_refs(contexts);

        tx.execute(
            "INSERT INTO entries (id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.id,
                entry.content,
                format_timestamp(&entry.created_at),
                format_timestamp(&entry.updated_at),
            ],
        )
        .map_err(|e| conflict_or_database(e, "entry", &entry.id))?;

        insert_template_refs(&tx, &entry.id, &entry.templates)?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO entry_contexts (entry_id, context_id) VALUES (?1, ?2)",
            )?;
            for reference in &entry.contexts {
                stmt.execute(params![entry.id, reference.id])?;
            }
        }

        tx.commit()?;
        info!("Entry saved successfully: {}", entry.id);
        Ok(entry)
    }

    fn get_entry(&self, id: &str) -> Result<Entry> {
        debug!("Retrieving entry by ID: {}", id);
        validate_id(id, "entry")?;
        let conn = self.lock_conn()?;
        find_entry(&conn, id)
    }

    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<Entry>> {
        let mut sql = format!("SELECT {} FROM entries e WHERE 1 = 1", ENTRY_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        let window = filter.window();
        if let Some(from) = window.from {
            sql.push_str(" AND e.created_at >= ?");
            args.push(Value::Text(format_timestamp(&from)));
        }
        if let Some(until) = window.until {
            sql.push_str(" AND e.created_at < ?");
            args.push(Value::Text(format_timestamp(&until)));
        }
        if let Some(template) = &filter.template {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM entry_templates et
                   WHERE et.entry_id = e.id AND et.template_name = ?)",
            );
            args.push(Value::Text(template.clone()));
        }
        if let Some(context) = &filter.context {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM entry_contexts ec
                   JOIN contexts c ON c.id = ec.context_id
                   WHERE ec.entry_id = e.id AND c.name = ?)",
            );
            args.push(Value::Text(context.clone()));
        }
        // paging happens below, after unreadable rows are skipped
        sql.push_str(" ORDER BY e.created_at DESC, e.id DESC");

        let conn = self.lock_conn()?;
        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(args.iter()), read_entry_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.0.clone();
            match build_entry(&conn, row) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable entry row {}: {}", id, e),
            }
        }
        debug!("Found {} entries matching filter", entries.len());
        Ok(filter.page(entries))
    }

    fn update_entry(
        &self,
        id: &str,
        content: &str,
        templates: Option<Vec<TemplateRef>>,
    ) -> Result<Entry> {
        info!("Updating entry: {}", id);
        validate_content(content, "entry")?;
        validate_id(id, "entry")?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let current = find_entry(&tx, id)?;
        let updated_at = next_timestamp(current.updated_at);
        tx.execute(
            "UPDATE entries SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![content, format_timestamp(&updated_at), id],
        )?;

        if let Some(templates) = templates {
            let templates = normalize_refs(templates);
            for reference in &templates {
                validate_id(&reference.id, "template")?;
            }
            tx.execute("DELETE FROM entry_templates WHERE entry_id = ?1", [id])?;
            insert_template_refs(&tx, id, &templates)?;
        }

        let entry = find_entry(&tx, id)?;
        tx.commit()?;
        info!("Entry {} updated successfully", id);
        Ok(entry)
    }

    fn delete_entry(&self, id: &str) -> Result<()> {
        info!("Deleting entry: {}", id);
        validate_id(id, "entry")?;
        let conn = self.lock_conn()?;
        // join rows go with it (ON DELETE CASCADE)
        let deleted = conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(DaybookError::not_found("entry", id));
        }
        info!("Entry {} successfully deleted", id);
        Ok(())
    }

    fn create_template(&self, template: Template) -> Result<Template> {
        template.validate()?;
        info!("Creating template: {}", template.name);
        let mut template = template;
        template.updated_at = template.created_at;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO templates (id, name, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                template.id,
                template.name,
                template.content,
                format_timestamp(&template.created_at),
                format_timestamp(&template.updated_at),
            ],
        )
        .map_err(|e| conflict_or_database(e, "template", &template.name))?;
        Ok(template)
    }

    fn get_template(&self, name: &str) -> Result<Template> {
        validate_template_name(name)?;
        let conn = self.lock_conn()?;
        find_template(&conn, name)
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, content, created_at, updated_at FROM templates ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], read_named_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.1.clone();
            match build_template(row) {
                Ok(template) => templates.push(template),
                Err(e) => warn!("Skipping unreadable template row {}: {}", name, e),
            }
        }
        Ok(templates)
    }

    fn update_template(&self, name: &str, content: &str) -> Result<Template> {
        validate_template_name(name)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let mut template = find_template(&tx, name)?;
        template.content = content.to_string();
        template.updated_at = next_timestamp(template.updated_at);
        tx.execute(
            "UPDATE templates SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                template.content,
                format_timestamp(&template.updated_at),
                template.id
            ],
        )?;

        tx.commit()?;
        info!("Template {} updated", name);
        Ok(template)
    }

    fn rename_template(&self, old_name: &str, new_name: &str) -> Result<Template> {
        validate_template_name(old_name)?;
        validate_template_name(new_name)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let mut template = find_template(&tx, old_name)?;
        if old_name == new_name {
            return Ok(template);
        }
        info!("Renaming template {} to {}", old_name, new_name);

        template.name = new_name.to_string();
        template.updated_at = next_timestamp(template.updated_at);
        tx.execute(
            "UPDATE templates SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                template.name,
                format_timestamp(&template.updated_at),
                template.id
            ],
        )
        .map_err(|e| conflict_or_database(e, "template", new_name))?;
        tx.execute(
            "UPDATE entry_templates SET template_name = ?1 WHERE template_id = ?2",
            params![template.name, template.id],
        )?;

        tx.commit()?;
        Ok(template)
    }

    fn delete_template(&self, name: &str) -> Result<()> {
        validate_template_name(name)?;
        let conn = self.lock_conn()?;
        // entry_templates keeps the name, so references survive
        let deleted = conn.execute("DELETE FROM templates WHERE name = ?1", [name])?;
        if deleted == 0 {
            return Err(DaybookError::not_found("template", name));
        }
        info!("Template {} deleted", name);
        Ok(())
    }

    fn create_context(&self, context: Context) -> Result<Context> {
        context.validate()?;
        info!("Creating context: {}", context.name);
        let mut context = context;
        context.updated_at = context.created_at;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO contexts (id, name, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                context.id,
                context.name,
                context.source,
                format_timestamp(&context.created_at),
                format_timestamp(&context.updated_at),
            ],
        )
        .map_err(|e| conflict_or_database(e, "context", &context.name))?;
        Ok(context)
    }

    fn get_context(&self, name: &str) -> Result<Context> {
        validate_context_name(name)?;
        let conn = self.lock_conn()?;
        find_context(&conn, "name", name)
    }

    fn list_contexts(&self) -> Result<Vec<Context>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, source, created_at, updated_at FROM contexts ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], read_named_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut contexts = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.1.clone();
            match build_context(row) {
                Ok(context) => contexts.push(context),
                Err(e) => warn!("Skipping unreadable context row {}: {}", name, e),
            }
        }
        Ok(contexts)
    }

    fn delete_context(&self, name: &str) -> Result<()> {
        validate_context_name(name)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let context = find_context(&tx, "name", name)?;
        let detached = tx.execute(
            "DELETE FROM entry_contexts WHERE context_id = ?1",
            [&context.id],
        )?;
        tx.execute("DELETE FROM contexts WHERE id = ?1", [&context.id])?;

        tx.commit()?;
        info!("Context {} deleted, detached from {} entries", name, detached);
        Ok(())
    }

    fn attach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        validate_id(entry_id, "entry")?;
        validate_id(context_id, "context")?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        entry_exists(&tx, entry_id)?;
        let context = find_context(&tx, "id", context_id)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO entry_contexts (entry_id, context_id) VALUES (?1, ?2)",
            params![entry_id, context.id],
        )?;
        let entry = find_entry(&tx, entry_id)?;

        tx.commit()?;
        if inserted > 0 {
            info!("Attached entry {} to context {}", entry_id, context.name);
        }
        Ok(entry)
    }

    fn detach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        validate_id(entry_id, "entry")?;
        validate_id(context_id, "context")?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        entry_exists(&tx, entry_id)?;
        let context = find_context(&tx, "id", context_id)?;
        let removed = tx.execute(
            "DELETE FROM entry_contexts WHERE entry_id = ?1 AND context_id = ?2",
            params![entry_id, context.id],
        )?;
        let entry = find_entry(&tx, entry_id)?;

        tx.commit()?;
        if removed > 0 {
            info!("Detached entry {} from context {}", entry_id, context.name);
        }
        Ok(entry)
    }

    fn close(self) -> Result<()> {
        debug!("Closing SQLite store at {}", self.path.display());
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| DaybookError::LockAcquisitionFailed {
                message: "Database connection lock was poisoned".to_string(),
            })?;
        conn.close().map_err(|(_, e)| DaybookError::Database(e))
    }
}
