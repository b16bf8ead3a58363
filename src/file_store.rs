//! Flat-file backend: one text file per record.
//!
//! Layout under the base directory:
//!
//! ```text
//! entries/<YYYY>/<MM>/<DD>/<id>.md   # date of the UTC creation instant
//! templates/<name>.md
//! contexts/<name>.md                 # a '/' in the name is a subdirectory
//! ```
//!
//! Each file is a `---` fenced YAML header followed by a blank line and the
//! free-form body. Entry paths are computable from the record, but lookups
//! by id walk the `entries` tree because nothing indexes id → path.
use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Utc};
use log::{debug, error, info, trace, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use walkdir::WalkDir;

use crate::{
    next_timestamp, normalize_refs, sort_newest_first, validate_content, validate_context_name,
    validate_id, validate_template_name, write_atomic, write_atomic_new, Context, ContextRef,
    DaybookError, Entry, ListFilter, Result, Storage, Template, TemplateRef,
};

const RECORD_EXT: &str = "md";
const FENCE: &str = "---\n";
const CLOSING_FENCE: &str = "\n---\n";

#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    templates: Vec<TemplateRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    contexts: Vec<ContextRef>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TemplateHeader {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContextHeader {
    id: String,
    name: String,
    source: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Renders a header and body into the on-disk record format.
fn render_record<H: Serialize>(header: &H, body: &str) -> Result<String> {
    trace!("Serializing record header");
    let yaml = serde_yaml::to_string(header)?;
    Ok(format!("{}{}{}\n{}", FENCE, yaml, FENCE, body))
}

/// Splits a record into its parsed header and raw body.
fn parse_record<'a, H: DeserializeOwned>(path: &Path, raw: &'a str) -> Result<(H, &'a str)> {
    let corrupt = |message: String| DaybookError::CorruptRecord {
        path: path.to_path_buf(),
        message,
    };

    let rest = raw
        .strip_prefix(FENCE)
        .ok_or_else(|| corrupt("missing header fence".to_string()))?;
    let end = rest
        .find(CLOSING_FENCE)
        .ok_or_else(|| corrupt("unterminated header".to_string()))?;

    let header: H = serde_yaml::from_str(&rest[..=end]).map_err(|e| corrupt(e.to_string()))?;
    let body = &rest[end + CLOSING_FENCE.len()..];
    Ok((header, body.strip_prefix('\n').unwrap_or(body)))
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == RECORD_EXT)
}

fn record_file_name(key: &str) -> String {
    format!("{}.{}", key, RECORD_EXT)
}

/// Helper method to load a single entry from file
fn load_entry(path: &Path) -> Result<Entry> {
    debug!("Loading entry from file: {}", path.display());
    let raw = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open entry file {}: {}", path.display(), e);
        DaybookError::Io(e)
    })?;

    let (header, body) = parse_record::<EntryHeader>(path, &raw)?;
    let entry = Entry {
        id: header.id,
        content: body.to_string(),
        created_at: header.created_at,
        updated_at: header.updated_at,
        templates: header.templates,
        contexts: header.contexts,
    };

    if path.file_stem() != Some(OsStr::new(&entry.id)) {
        return Err(DaybookError::CorruptRecord {
            path: path.to_path_buf(),
            message: format!("header id {} does not match file name", entry.id),
        });
    }
    entry.validate().map_err(|e| DaybookError::CorruptRecord {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    trace!("Successfully loaded entry: {}", entry.id);
    Ok(entry)
}

fn load_template(path: &Path) -> Result<Template> {
    let raw = fs::read_to_string(path)?;
    let (header, body) = parse_record::<TemplateHeader>(path, &raw)?;
    Ok(Template {
        id: header.id,
        name: header.name,
        content: body.to_string(),
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn load_context(path: &Path) -> Result<Context> {
    let raw = fs::read_to_string(path)?;
    let (header, _) = parse_record::<ContextHeader>(path, &raw)?;
    Ok(Context {
        id: header.id,
        name: header.name,
        source: header.source,
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn render_entry(entry: &Entry) -> Result<String> {
    let header = EntryHeader {
        id: entry.id.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        templates: entry.templates.clone(),
        contexts: entry.contexts.clone(),
    };
    render_record(&header, &entry.content)
}

fn render_template(template: &Template) -> Result<String> {
    let header = TemplateHeader {
        id: template.id.clone(),
        name: template.name.clone(),
        created_at: template.created_at,
        updated_at: template.updated_at,
    };
    render_record(&header, &template.content)
}

fn render_context(context: &Context) -> Result<String> {
    let header = ContextHeader {
        id: context.id.clone(),
        name: context.name.clone(),
        source: context.source.clone(),
        created_at: context.created_at,
        updated_at: context.updated_at,
    };
    render_record(&header, "")
}

/// Walks `dir` and loads every record, skipping the ones that fail.
///
/// One unreadable or malformed file must not abort a listing.
fn scan<T>(dir: &Path, max_depth: usize, load: impl Fn(&Path) -> Result<T>) -> Vec<(PathBuf, T)> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_record(path) {
            continue;
        }
        match load(path) {
            Ok(record) => records.push((path.to_path_buf(), record)),
            Err(e) => {
                warn!("Skipping unreadable record {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} records while scanning {}", skipped, dir.display());
    }
    records
}

/// Stores entries, templates and contexts as individual files.
#[derive(Debug, Clone)]
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a file store rooted at `base`.
    pub fn open(base: &Path) -> Result<Self> {
        let store = FileStore {
            base: base.to_path_buf(),
        };

        for dir in [store.entries_dir(), store.templates_dir(), store.contexts_dir()] {
            if !dir.exists() {
                debug!("Directory does not exist, creating: {}", dir.display());
                fs::create_dir_all(&dir).map_err(|e| {
                    error!("Failed to create directory {}: {}", dir.display(), e);
                    DaybookError::DirectoryError { path: dir.clone() }
                })?;
            }
        }

        info!("Opened file store at {}", base.display());
        Ok(store)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn entries_dir(&self) -> PathBuf {
        self.base.join("entries")
    }

    fn templates_dir(&self) -> PathBuf {
        self.base.join("templates")
    }

    fn contexts_dir(&self) -> PathBuf {
        self.base.join("contexts")
    }

    /// Path of an entry, derived from its creation date: no lookup needed.
    pub fn entry_path(&self, entry: &Entry) -> PathBuf {
        let date = entry.created_at.date_naive();
        self.entries_dir()
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
            .join(record_file_name(&entry.id))
    }

    fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir().join(record_file_name(name))
    }

    fn context_path(&self, name: &str) -> PathBuf {
        self.contexts_dir().join(record_file_name(name))
    }

    /// Walks the entries tree for `<id>.md`.
    fn find_entry_path(&self, id: &str) -> Option<PathBuf> {
        let target = record_file_name(id);
        trace!("Walking entries tree for {}", target);
        WalkDir::new(self.entries_dir())
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| e.file_type().is_file() && e.file_name() == OsStr::new(&target))
            .map(|e| e.into_path())
    }

    fn locate_entry(&self, id: &str) -> Result<PathBuf> {
        validate_id(id, "entry")?;
        self.find_entry_path(id).ok_or_else(|| {
            debug!("Entry not found: {}", id);
            DaybookError::not_found("entry", id)
        })
    }

    fn scan_entries(&self) -> Vec<(PathBuf, Entry)> {
        scan(&self.entries_dir(), usize::MAX, load_entry)
    }

    fn scan_templates(&self) -> Vec<(PathBuf, Template)> {
        scan(&self.templates_dir(), 1, load_template)
    }

    fn scan_contexts(&self) -> Vec<(PathBuf, Context)> {
        scan(&self.contexts_dir(), usize::MAX, load_context)
    }

    fn find_context_by_id(&self, id: &str) -> Result<Context> {
        validate_id(id, "context")?;
        self.scan_contexts()
            .into_iter()
            .map(|(_, context)| context)
            .find(|context| context.id == id)
            .ok_or_else(|| DaybookError::not_found("context", id))
    }

    fn write_entry(&self, path: &Path, entry: &Entry) -> Result<()> {
        let record = render_entry(entry)?;
        write_atomic(path, record.as_bytes())
    }

    /// Applies `change` to every stored entry and rewrites the ones it
    /// reports as modified. Timestamps are left alone.
    fn rewrite_entries(&self, mut change: impl FnMut(&mut Entry) -> bool) -> Result<usize> {
        let mut rewritten = 0;
        for (path, mut entry) in self.scan_entries() {
            if change(&mut entry) {
                entry.templates = normalize_refs(entry.templates);
                entry.contexts = normalize_refs(entry.contexts);
                self.write_entry(&path, &entry)?;
                rewritten += 1;
            }
        }
        debug!("Rewrote {} entries", rewritten);
        Ok(rewritten)
    }

    /// Resolves context references against stored contexts.
    fn resolve_contexts(&self, refs: &[ContextRef]) -> Result<Vec<ContextRef>> {
        if refs.is_empty() {
            return Ok(Vec::new());
        }
        let stored = self.scan_contexts();
        refs.iter()
            .map(|r| {
                stored
                    .iter()
                    .find(|(_, context)| context.id == r.id)
                    .map(|(_, context)| ContextRef::from(context))
                    .ok_or_else(|| DaybookError::not_found("context", r.id.clone()))
            })
            .collect()
    }

    /// Helper method to recursively clean up empty directories
    ///
    /// Checks if a directory is empty and removes it if it is, then does the
    /// same for its parent, stopping at `root`.
    fn cleanup_empty_directory(&self, dir_path: &Path, root: &Path) {
        if !dir_path.exists() || dir_path == root || !dir_path.starts_with(root) {
            return;
        }

        match fs::read_dir(dir_path) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    debug!("Removing empty directory: {}", dir_path.display());
                    match fs::remove_dir(dir_path) {
                        Ok(_) => {
                            if let Some(parent) = dir_path.parent() {
                                self.cleanup_empty_directory(parent, root);
                            }
                        }
                        Err(e) => warn!(
                            "Failed to remove empty directory {}: {}",
                            dir_path.display(),
                            e
                        ),
                    }
                }
            }
            Err(e) => warn!("Failed to read directory {}: {}", dir_path.display(), e),
        }
    }

    fn remove_record(&self, path: &Path, root: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| {
            error!("Failed to delete file {}: {}", path.display(), e);
            DaybookError::Io(e)
        })?;
        if let Some(parent) = path.parent() {
            self.cleanup_empty_directory(parent, root);
        }
        Ok(())
    }
}

impl Storage for FileStore {
    fn create_entry(&self, entry: Entry) -> Result<Entry> {
        let mut entry = entry.prepared_for_create()?;
        info!("Creating entry: {}", entry.id);

        if self.find_entry_path(&entry.id).is_some() {
            warn!("Entry id collision: {}", entry.id);
            return Err(DaybookError::conflict("entry", entry.id));
        }
        entry.contexts = normalize_refs(self.resolve_contexts(&entry.contexts)?);

        let path = self.entry_path(&entry);
        debug!("File path for entry: {}", path.display());
        let record = render_entry(&entry)?;
        write_atomic_new(&path, record.as_bytes()).map_err(|e| {
            if e.is_conflict() {
                DaybookError::conflict("entry", entry.id.clone())
            } else {
                e
            }
        })?;

        info!("Entry saved successfully: {}", entry.id);
        Ok(entry)
    }

    fn get_entry(&self, id: &str) -> Result<Entry> {
        debug!("Retrieving entry by ID: {}", id);
        let path = self.locate_entry(id)?;
        load_entry(&path)
    }

    fn list_entries(&self, filter: &ListFilter) -> Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = self
            .scan_entries()
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| filter.matches(entry))
            .collect();

        sort_newest_first(&mut entries);
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
        let path = self.locate_entry(id)?;
        let mut entry = load_entry(&path)?;

        entry.content = content.to_string();
        entry.updated_at = next_timestamp(entry.updated_at);
        if let Some(templates) = templates {
            entry.templates = normalize_refs(templates);
        }
        entry.validate()?;

        self.write_entry(&path, &entry)?;
        info!("Entry {} updated successfully", id);
        Ok(entry)
    }

    fn delete_entry(&self, id: &str) -> Result<()> {
        info!("Deleting entry: {}", id);
        let path = self.locate_entry(id)?;
        self.remove_record(&path, &self.entries_dir())?;
        info!("Entry {} successfully deleted", id);
        Ok(())
    }

    fn create_template(&self, template: Template) -> Result<Template> {
        template.validate()?;
        info!("Creating template: {}", template.name);

        let mut template = template;
        template.updated_at = template.created_at;

        if self
            .scan_templates()
            .iter()
            .any(|(_, stored)| stored.id == template.id)
        {
            return Err(DaybookError::conflict("template", template.id));
        }

        let record = render_template(&template)?;
        write_atomic_new(&self.template_path(&template.name), record.as_bytes()).map_err(|e| {
            if e.is_conflict() {
                DaybookError::conflict("template", template.name.clone())
            } else {
                e
            }
        })?;
        Ok(template)
    }

    fn get_template(&self, name: &str) -> Result<Template> {
        validate_template_name(name)?;
        let path = self.template_path(name);
        if !path.is_file() {
            return Err(DaybookError::not_found("template", name));
        }
        let template = load_template(&path)?;
        if template.name != name {
            return Err(DaybookError::CorruptRecord {
                path,
                message: format!("header name {} does not match file name", template.name),
            });
        }
        Ok(template)
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        let mut templates: Vec<Template> = self
            .scan_templates()
            .into_iter()
            .map(|(_, template)| template)
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    fn update_template(&self, name: &str, content: &str) -> Result<Template> {
        let mut template = self.get_template(name)?;
        template.content = content.to_string();
        template.updated_at = next_timestamp(template.updated_at);

        let record = render_template(&template)?;
        write_atomic(&self.template_path(name), record.as_bytes())?;
        info!("Template {} updated", name);
        Ok(template)
    }

    fn rename_template(&self, old_name: &str, new_name: &str) -> Result<Template> {
        validate_template_name(new_name)?;
        let mut template = self.get_template(old_name)?;
        if old_name == new_name {
            return Ok(template);
        }
        info!("Renaming template {} to {}", old_name, new_name);

        template.name = new_name.to_string();
        template.updated_at = next_timestamp(template.updated_at);

        let record = render_template(&template)?;
        write_atomic_new(&self.template_path(new_name), record.as_bytes()).map_err(|e| {
            if e.is_conflict() {
                DaybookError::conflict("template", new_name)
            } else {
                e
            }
        })?;
        self.remove_record(&self.template_path(old_name), &self.templates_dir())?;

        let template_id = template.id.clone();
        self.rewrite_entries(|entry| {
            let mut changed = false;
            for reference in entry.templates.iter_mut() {
                if reference.id == template_id && reference.name != new_name {
                    reference.name = new_name.to_string();
                    changed = true;
                }
            }
            changed
        })?;

        Ok(template)
    }

    fn delete_template(&self, name: &str) -> Result<()> {
        validate_template_name(name)?;
        let path = self.template_path(name);
        if !path.exists() {
            return Err(DaybookError::not_found("template", name));
        }
        self.remove_record(&path, &self.templates_dir())?;
        info!("Template {} deleted", name);
        Ok(())
    }

    fn create_context(&self, context: Context) -> Result<Context> {
        context.validate()?;
        info!("Creating context: {}", context.name);

        let mut context = context;
        context.updated_at = context.created_at;

        if self
            .scan_contexts()
            .iter()
            .any(|(_, stored)| stored.id == context.id)
        {
            return Err(DaybookError::conflict("context", context.id));
        }

        let record = render_context(&context)?;
        write_atomic_new(&self.context_path(&context.name), record.as_bytes()).map_err(|e| {
            if e.is_conflict() {
                DaybookError::conflict("context", context.name.clone())
            } else {
                e
            }
        })?;
        Ok(context)
    }

    fn get_context(&self, name: &str) -> Result<Context> {
        validate_context_name(name)?;
        let path = self.context_path(name);
        if !path.is_file() {
            return Err(DaybookError::not_found("context", name));
        }
        let context = load_context(&path)?;
        if context.name != name {
            return Err(DaybookError::CorruptRecord {
                path,
                message: format!("header name {} does not match file name", context.name),
            });
        }
        Ok(context)
    }

    fn list_contexts(&self) -> Result<Vec<Context>> {
        let mut contexts: Vec<Context> = self
            .scan_contexts()
            .into_iter()
            .map(|(_, context)| context)
            .collect();
        contexts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contexts)
    }

    fn delete_context(&self, name: &str) -> Result<()> {
        let context = self.get_context(name)?;
        self.remove_record(&self.context_path(name), &self.contexts_dir())?;

        let detached = self.rewrite_entries(|entry| {
            let before = entry.contexts.len();
            entry.contexts.retain(|c| c.id != context.id);
            entry.contexts.len() != before
        })?;
        info!("Context {} deleted, detached from {} entries", name, detached);
        Ok(())
    }

    fn attach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        validate_id(entry_id, "entry")?;
        validate_id(context_id, "context")?;
        let path = self.locate_entry(entry_id)?;
        let mut entry = load_entry(&path)?;
        let context = self.find_context_by_id(context_id)?;

        if entry.contexts.iter().any(|c| c.id == context.id) {
            debug!("Entry {} already in context {}", entry_id, context.name);
            return Ok(entry);
        }

        entry.contexts.push(ContextRef::from(&context));
        entry.contexts = normalize_refs(entry.contexts);
        self.write_entry(&path, &entry)?;
        info!("Attached entry {} to context {}", entry_id, context.name);
        Ok(entry)
    }

    fn detach_context(&self, entry_id: &str, context_id: &str) -> Result<Entry> {
        validate_id(entry_id, "entry")?;
        validate_id(context_id, "context")?;
        let path = self.locate_entry(entry_id)?;
        let mut entry = load_entry(&path)?;
        let context = self.find_context_by_id(context_id)?;

        let before = entry.contexts.len();
        entry.contexts.retain(|c| c.id != context.id);
        if entry.contexts.len() == before {
            debug!("Entry {} was not in context {}", entry_id, context.name);
            return Ok(entry);
        }

        self.write_entry(&path, &entry)?;
        info!("Detached entry {} from context {}", entry_id, context.name);
        Ok(entry)
    }

    fn close(self) -> Result<()> {
        debug!("Closing file store at {}", self.base.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn entry_path_follows_creation_date() {
        let (tmp, store) = store();
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        let mut entry = Entry::at("hello", at).unwrap();
        entry.id = "abcd1234".to_string();

        assert_eq!(
            store.entry_path(&entry),
            tmp.path().join("entries/2026/01/15/abcd1234.md")
        );
    }

    #[test]
    fn record_format_has_header_blank_line_and_body() {
        let (_tmp, store) = store();
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let mut entry = Entry::at("line one\n\nline three\n", at).unwrap();
        entry.id = "abcd1234".to_string();
        let entry = store.create_entry(entry).unwrap();

        let raw = fs::read_to_string(store.entry_path(&entry)).unwrap();
        assert!(raw.starts_with("---\n"));
        assert!(raw.contains(&format!("id: {}", entry.id)));
        assert!(raw.ends_with("---\n\nline one\n\nline three\n"));

        // body survives exactly, including its trailing newline
        assert_eq!(store.get_entry(&entry.id).unwrap(), entry);
    }

    #[test]
    fn corrupt_file_is_skipped_by_scans_but_fails_point_reads() {
        let (tmp, store) = store();
        let good = store.create_entry(Entry::new("fine").unwrap()).unwrap();

        let broken = tmp.path().join("entries/2026/01/10/zzzz9999.md");
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, "no header here").unwrap();

        let listed = store.list_entries(&ListFilter::default()).unwrap();
        assert_eq!(listed, vec![good]);

        let err = store.get_entry("zzzz9999").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }

    #[test]
    fn header_id_must_match_file_name() {
        let (tmp, store) = store();
        let entry = store.create_entry(Entry::new("mine").unwrap()).unwrap();
        let stolen = tmp.path().join("entries/2026/02/01/yyyy1111.md");
        fs::create_dir_all(stolen.parent().unwrap()).unwrap();
        fs::copy(store.entry_path(&entry), &stolen).unwrap();

        assert!(matches!(
            store.get_entry("yyyy1111"),
            Err(DaybookError::CorruptRecord { .. })
        ));
        assert_eq!(store.list_entries(&ListFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn header_name_must_match_template_file_name() {
        let (tmp, store) = store();
        store
            .create_template(Template::new("daily", "body").unwrap())
            .unwrap();
        let templates = tmp.path().join("templates");
        fs::copy(templates.join("daily.md"), templates.join("weekly.md")).unwrap();

        assert!(matches!(
            store.get_template("weekly"),
            Err(DaybookError::CorruptRecord { .. })
        ));
        assert!(store.update_template("weekly", "x").is_err());
        assert_eq!(store.get_template("daily").unwrap().content, "body");
    }

    #[test]
    fn delete_prunes_empty_date_directories() {
        let (tmp, store) = store();
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap();
        let entry = store.create_entry(Entry::at("bye", at).unwrap()).unwrap();
        assert!(tmp.path().join("entries/2026/03/04").is_dir());

        store.delete_entry(&entry.id).unwrap();
        assert!(!tmp.path().join("entries/2026").exists());
        assert!(tmp.path().join("entries").is_dir());
    }

    #[test]
    fn nested_context_names_become_directories() {
        let (tmp, store) = store();
        let context = store
            .create_context(Context::new("work/app", "git").unwrap())
            .unwrap();
        assert!(tmp.path().join("contexts/work/app.md").is_file());
        assert_eq!(store.get_context("work/app").unwrap(), context);

        store.delete_context("work/app").unwrap();
        assert!(!tmp.path().join("contexts/work").exists());
    }

    #[test]
    fn temp_files_are_ignored_by_scans() {
        let (tmp, store) = store();
        store.create_entry(Entry::new("real").unwrap()).unwrap();
        let dir = tmp.path().join("entries/2026/01/01");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".tmpAbC123"), "partial").unwrap();

        assert_eq!(store.list_entries(&ListFilter::default()).unwrap().len(), 1);
    }
}
