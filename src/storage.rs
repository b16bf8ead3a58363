//! The entry storage contract and backend selection.
//!
//! [`Storage`] is the operation set every backend implements identically;
//! `tests/contract.rs` runs one test matrix against each implementation.
//! [`Store`] is the closed set of backends the application can open.
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    local_date, preview, Config, Context, DaySummary, Entry, FileStore, ListFilter, Result,
    SqliteStore, Template, TemplateRef, PREVIEW_WIDTH,
};

/// Persistence operations for entries, templates and contexts.
///
/// Failures are reported as [`crate::DaybookError`]s whose
/// [`kind`](crate::DaybookError::kind) is the same for every backend:
/// unknown ids and names are `NotFound`, duplicate ids and names are
/// `Conflict`, bad input is `Validation`, everything else is `Storage`.
pub trait Storage {
    /// Stores a new entry and returns it as it will be read back.
    ///
    /// `updated_at` is reset to `created_at` and the attribution lists are
    /// deduplicated. Every referenced context must already exist; its stored
    /// name replaces the one on the reference.
    fn create_entry(&self, entry: Entry) -> Result<Entry>;

    fn get_entry(&self, id: &str) -> Result<Entry>;

    /// Entries matching `filter`, newest first.
    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<Entry>>;

    /// Replaces an entry's content, and its template list when given.
    ///
    /// `created_at` is preserved and `updated_at` always moves forward.
    fn update_entry(
        &self,
        id: &str,
        content: &str,
        templates: Option<Vec<TemplateRef>>,
    ) -> Result<Entry>;

    fn delete_entry(&self, id: &str) -> Result<()>;

    fn create_template(&self, template: Template) -> Result<Template>;

    fn get_template(&self, name: &str) -> Result<Template>;

    /// All templates ordered by name.
    fn list_templates(&self) -> Result<Vec<Template>>;

    fn update_template(&self, name: &str, content: &str) -> Result<Template>;

    /// Changes a template's name, keeping its id. References held by
    /// entries follow the new name.
    fn rename_template(&self, old_name: &str, new_name: &str) -> Result<Template>;

    /// Removes a template. Entries keep their references to it.
    fn delete_template(&self, name: &str) -> Result<()>;

    fn create_context(&self, context: Context) -> Result<Context>;

    fn get_context(&self, name: &str) -> Result<Context>;

    /// All contexts ordered by name.
    fn list_contexts(&self) -> Result<Vec<Context>>;

    /// Removes a context and detaches it from every entry.
    fn delete_context(&self, name: &str) -> Result<()>;

    /// Links an entry to a context. Linking twice is a no-op.
    fn attach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry>;

    /// Unlinks an entry from a context. Unlinking an absent link is a no-op.
    fn detach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry>;

    /// Releases the files or connection held by this backend.
    fn close(self) -> Result<()>
    where
        Self: Sized;

    /// One summary per local calendar day, newest day first.
    ///
    /// Paging applies to days, not entries.
    fn list_days(&self, filter: &ListFilter) -> Result<Vec<DaySummary>> {
        let entries = self.list_entries(&filter.unpaged())?;
        let days = summarize_days(&entries);
        debug!("Aggregated {} entries into {} days", entries.len(), days.len());
        Ok(filter.page(days))
    }

    /// Returns the named context, creating it on first reference.
    fn ensure_context(&self, name: &str, source: &str) -> Result<Context> {
        match self.get_context(name) {
            Ok(context) => Ok(context),
            Err(e) if e.is_not_found() => {
                info!("Creating context {} on first reference", name);
                self.create_context(Context::new(name, source)?)
            }
            Err(e) => Err(e),
        }
    }

    /// Case-insensitive substring scan over entry content, newest first.
    fn search_entries(&self, query: &str, limit: usize) -> Result<Vec<Entry>> {
        let needle = query.to_lowercase();
        Ok(self
            .list_entries(&ListFilter::default())?
            .into_iter()
            .filter(|entry| entry.content.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }
}

/// Groups entries by local calendar day, newest day first.
pub fn summarize_days(entries: &[Entry]) -> Vec<DaySummary> {
    let mut days: BTreeMap<NaiveDate, (usize, &Entry)> = BTreeMap::new();
    for entry in entries {
        days.entry(local_date(&entry.created_at))
            .and_modify(|(count, latest)| {
                *count += 1;
                if is_later(entry, latest) {
                    *latest = entry;
                }
            })
            .or_insert((1, entry));
    }

    days.into_iter()
        .rev()
        .map(|(date, (count, latest))| DaySummary {
            date,
            count,
            preview: preview(&latest.content, PREVIEW_WIDTH),
        })
        .collect()
}

fn is_later(candidate: &Entry, current: &Entry) -> bool {
    (candidate.created_at, &candidate.id) > (current.created_at, &current.id)
}

/// Newest first; ties broken by id so both backends agree.
pub(crate) fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// The backends the application knows how to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One text file per record
    #[default]
    File,
    /// Embedded SQLite database
    Sqlite,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::File => f.write_str("file"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// An opened backend.
pub enum Store {
    File(FileStore),
    Sqlite(SqliteStore),
}

impl Store {
    /// Opens the backend selected in `config`.
    pub fn open(config: &Config) -> Result<Self> {
        info!(
            "Opening {} store in {}",
            config.backend,
            config.data_dir.display()
        );
        match config.backend {
            BackendKind::File => Ok(Store::File(FileStore::open(&config.data_dir)?)),
            BackendKind::Sqlite => Ok(Store::Sqlite(SqliteStore::open(&config.database_path())?)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Store::File(_) => BackendKind::File,
            Store::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Store::File($store) => $call,
            Store::Sqlite($store) => $call,
        }
    };
}

impl Storage for Store {
    fn create_entry(&self, entry: Entry) -> Result<Entry> {
        delegate!(self, s => s.create_entry(entry))
    }

    fn get_entry(&self, id: &str) -> Result<Entry> {
        delegate!(self, s => s.get_entry(id))
    }

    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<Entry>> {
        delegate!(self, s => s.list_entries(filter))
    }

    fn update_entry(
        &self,
        id: &str,
        content: &str,
        templates: Option<Vec<TemplateRef>>,
    ) -> Result<Entry> {
        delegate!(self, s => s.update_entry(id, content, templates))
    }

    fn delete_entry(&self, id: &str) -> Result<()> {
        delegate!(self, s => s.delete_entry(id))
    }

    fn create_template(&self, template: Template) -> Result<Template> {
        delegate!(self, s => s.create_template(template))
    }

    fn get_template(&self, name: &str) -> Result<Template> {
        delegate!(self, s => s.get_template(name))
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        delegate!(self, s => s.list_templates())
    }

    fn update_template(&self, name: &str, content: &str) -> Result<Template> {
        delegate!(self, s => s.update_template(name, content))
    }

    fn rename_template(&self, old_name: &str, new_name: &str) -> Result<Template> {
        delegate!(self, s => s.rename_template(old_name, new_name))
    }

    fn delete_template(&self, name: &str) -> Result<()> {
        delegate!(self, s => s.delete_template(name))
    }

    fn create_context(&self, context: Context) -> Result<Context> {
        delegate!(self, s => s.create_context(context))
    }

    fn get_context(&self, name: &str) -> Result<Context> {
        delegate!(self, s => s.get_context(name))
    }

    fn list_contexts(&self) -> Result<Vec<Context>> {
        delegate!(self, s => s.list_contexts())
    }

    fn delete_context(&self, name: &str) -> Result<()> {
        delegate!(self, s => s.delete_context(name))
    }

    fn attach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        delegate!(self, s => s.attach_context(entry_id, context_id))
    }

    fn detach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        delegate!(self, s => s.detach_context(entry_id, context_id))
    }

    fn close(self) -> Result<()> {
        delegate!(self, s => s.close())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Utc};

    use super::*;

    fn entry_at(hour: u32, content: &str) -> Entry {
        let at = Local
            .with_ymd_and_hms(2026, 1, 15, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        Entry::at(content, at).unwrap()
    }

    #[test]
    fn summarizes_one_day_with_latest_preview() {
        let entries = vec![
            entry_at(12, "noon"),
            entry_at(15, "afternoon\nmore"),
            entry_at(9, "morning"),
        ];
        let days = summarize_days(&entries);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].count, 3);
        assert_eq!(days[0].preview, "afternoon");
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
    }

    #[test]
    fn newest_first_breaks_ties_by_id() {
        let mut a = entry_at(9, "a");
        let mut b = a.clone();
        a.id = "aaaaaaaa".to_string();
        b.id = "bbbbbbbb".to_string();
        let mut entries = vec![a, b];
        sort_newest_first(&mut entries);
        assert_eq!(entries[0].id, "bbbbbbbb");
    }

    #[test]
    fn backend_kind_names() {
        assert_eq!(BackendKind::Sqlite.to_string(), "sqlite");
        assert_eq!(
            serde_json::from_str::<BackendKind>("\"file\"").unwrap(),
            BackendKind::File
        );
    }
}
