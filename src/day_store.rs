//! Storage for the day/block journal.
//!
//! Each non-empty day is one JSON document at `days/<YYYY-MM-DD>.json`;
//! the whole day is rewritten atomically on every block mutation. Day
//! templates live at `templates/<id>.json`.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use walkdir::WalkDir;

use crate::{
    preview, validate_content, validate_id, validate_template_name, write_atomic,
    write_atomic_new, Block, Day, DaySummary, DayTemplate, DaybookError, ListFilter, Result,
    PREVIEW_WIDTH,
};

const DOC_EXT: &str = "json";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Operations on days, their blocks and block templates.
pub trait DayStore {
    /// The day at `date`; an empty, unsaved day when nothing is stored.
    fn get_day(&self, date: NaiveDate) -> Result<Day>;

    /// Adds a block to the day, creating the day on its first block.
    fn create_block(&self, date: NaiveDate, block: Block) -> Result<Block>;

    fn get_block(&self, date: NaiveDate, id: &str) -> Result<Block>;

    fn update_block(&self, date: NaiveDate, id: &str, content: &str) -> Result<Block>;

    /// Removes a block. A day left without blocks is removed from disk.
    fn delete_block(&self, date: NaiveDate, id: &str) -> Result<()>;

    /// One summary per stored day, newest first. Only the date fields and
    /// paging of `filter` apply.
    fn list_days(&self, filter: &ListFilter) -> Result<Vec<DaySummary>>;

    fn create_template(&self, template: DayTemplate) -> Result<DayTemplate>;

    fn get_template(&self, id: &str) -> Result<DayTemplate>;

    fn find_template(&self, name: &str) -> Result<DayTemplate>;

    /// All templates ordered by name.
    fn list_templates(&self) -> Result<Vec<DayTemplate>>;

    fn delete_template(&self, id: &str) -> Result<()>;

    /// Adds a block built from the named template.
    fn create_block_from_template(
        &self,
        date: NaiveDate,
        name: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<Block> {
        let template = self.find_template(name)?;
        let block = template.instantiate(attributes)?;
        self.create_block(date, block)
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        DaybookError::Io(e)
    })?;
    serde_json::from_str(&raw).map_err(|e| DaybookError::CorruptRecord {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_document<T: Serialize>(path: &Path, document: &T, no_clobber: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    if no_clobber {
        write_atomic_new(path, json.as_bytes())
    } else {
        write_atomic(path, json.as_bytes())
    }
}

/// Loads a day document and checks it against its file name.
fn load_day(path: &Path, date: NaiveDate) -> Result<Day> {
    let day: Day = read_document(path)?;
    let corrupt = |message: String| DaybookError::CorruptRecord {
        path: path.to_path_buf(),
        message,
    };

    if day.date != date {
        return Err(corrupt(format!("document is dated {}", day.date)));
    }
    for block in &day.blocks {
        block.validate().map_err(|e| corrupt(e.to_string()))?;
    }
    Ok(day)
}

fn load_template(path: &Path) -> Result<DayTemplate> {
    let template: DayTemplate = read_document(path)?;
    template.validate().map_err(|e| DaybookError::CorruptRecord {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(template)
}

/// Files of `dir` with the document extension, one level deep.
fn documents(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == DOC_EXT))
}

/// Journal of days kept as JSON documents.
#[derive(Debug, Clone)]
pub struct FileDayStore {
    base: PathBuf,
}

impl FileDayStore {
    pub fn open(base: &Path) -> Result<Self> {
        let store = FileDayStore {
            base: base.to_path_buf(),
        };

        for dir in [store.days_dir(), store.templates_dir()] {
            if !dir.exists() {
                debug!("Directory does not exist, creating: {}", dir.display());
                fs::create_dir_all(&dir).map_err(|e| {
                    error!("Failed to create directory {}: {}", dir.display(), e);
                    DaybookError::DirectoryError { path: dir.clone() }
                })?;
            }
        }

        info!("Opened day store at {}", base.display());
        Ok(store)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn days_dir(&self) -> PathBuf {
        self.base.join("days")
    }

    fn templates_dir(&self) -> PathBuf {
        self.base.join("templates")
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.days_dir()
            .join(format!("{}.{}", date.format(DATE_FORMAT), DOC_EXT))
    }

    fn template_path(&self, id: &str) -> PathBuf {
        self.templates_dir().join(format!("{}.{}", id, DOC_EXT))
    }

    /// Persists a day, or removes its document when it has no blocks left.
    fn save_day(&self, day: &Day) -> Result<()> {
        let path = self.day_path(day.date);
        if day.is_empty() {
            if path.exists() {
                debug!("Day {} has no blocks left, removing {}", day.date, path.display());
                fs::remove_file(&path).map_err(|e| {
                    error!("Failed to delete file {}: {}", path.display(), e);
                    DaybookError::Io(e)
                })?;
            }
            return Ok(());
        }
        write_document(&path, day, false)
    }

    /// Applies `change` to the stored day and saves the result.
    fn modify_day<T>(&self, date: NaiveDate, change: impl FnOnce(&mut Day) -> Result<T>) -> Result<T> {
        let mut day = self.get_day(date)?;
        let result = change(&mut day)?;
        self.save_day(&day)?;
        Ok(result)
    }

    fn scan_templates(&self) -> Vec<DayTemplate> {
        documents(&self.templates_dir())
            .filter_map(|path| match load_template(&path) {
                Ok(template) => Some(template),
                Err(e) => {
                    warn!("Skipping unreadable template {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }
}

impl DayStore for FileDayStore {
    fn get_day(&self, date: NaiveDate) -> Result<Day> {
        let path = self.day_path(date);
        if !path.exists() {
            debug!("No document for {}, returning an empty day", date);
            return Ok(Day::empty(date));
        }
        load_day(&path, date)
    }

    fn create_block(&self, date: NaiveDate, block: Block) -> Result<Block> {
        info!("Adding block {} to {}", block.id, date);
        self.modify_day(date, |day| {
            day.insert(block.clone())?;
            Ok(block)
        })
    }

    fn get_block(&self, date: NaiveDate, id: &str) -> Result<Block> {
        validate_id(id, "block")?;
        self.get_day(date)?
            .block(id)
            .cloned()
            .ok_or_else(|| DaybookError::not_found("block", id))
    }

    fn update_block(&self, date: NaiveDate, id: &str, content: &str) -> Result<Block> {
        validate_content(content, "block")?;
        validate_id(id, "block")?;
        let block = self.modify_day(date, |day| day.update(id, content))?;
        info!("Block {} on {} updated", id, date);
        Ok(block)
    }

    fn delete_block(&self, date: NaiveDate, id: &str) -> Result<()> {
        validate_id(id, "block")?;
        self.modify_day(date, |day| day.remove(id))?;
        info!("Block {} removed from {}", id, date);
        Ok(())
    }

    fn list_days(&self, filter: &ListFilter) -> Result<Vec<DaySummary>> {
        let mut summaries = Vec::new();

        for path in documents(&self.days_dir()) {
            let date = match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| NaiveDate::parse_from_str(stem, DATE_FORMAT).ok())
            {
                Some(date) => date,
                None => {
                    warn!("Ignoring unexpected file {}", path.display());
                    continue;
                }
            };
            if !filter.matches_date(date) {
                continue;
            }

            match load_day(&path, date) {
                Ok(day) => {
                    if let Some(latest) = day.latest() {
                        summaries.push(DaySummary {
                            date,
                            count: day.blocks.len(),
                            preview: preview(&latest.content, PREVIEW_WIDTH),
                        });
                    }
                }
                Err(e) => warn!("Skipping unreadable day {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| b.date.cmp(&a.date));
        debug!("Found {} days matching filter", summaries.len());
        Ok(filter.page(summaries))
    }

    fn create_template(&self, template: DayTemplate) -> Result<DayTemplate> {
        template.validate()?;
        info!("Creating day template: {}", template.name);

        if self
            .scan_templates()
            .iter()
            .any(|existing| existing.name == template.name)
        {
            return Err(DaybookError::conflict("template", template.name));
        }

        write_document(&self.template_path(&template.id), &template, true).map_err(|e| {
            if e.is_conflict() {
                DaybookError::conflict("template", template.id.clone())
            } else {
                e
            }
        })?;
        Ok(template)
    }

    fn get_template(&self, id: &str) -> Result<DayTemplate> {
        validate_id(id, "template")?;
        let path = self.template_path(id);
        if !path.exists() {
            return Err(DaybookError::not_found("template", id));
        }
        load_template(&path)
    }

    fn find_template(&self, name: &str) -> Result<DayTemplate> {
        validate_template_name(name)?;
        self.scan_templates()
            .into_iter()
            .find(|template| template.name == name)
            .ok_or_else(|| DaybookError::not_found("template", name))
    }

    fn list_templates(&self) -> Result<Vec<DayTemplate>> {
        let mut templates = self.scan_templates();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    fn delete_template(&self, id: &str) -> Result<()> {
        validate_id(id, "template")?;
        let path = self.template_path(id);
        if !path.exists() {
            return Err(DaybookError::not_found("template", id));
        }
        fs::remove_file(&path).map_err(|e| {
            error!("Failed to delete file {}: {}", path.display(), e);
            DaybookError::Io(e)
        })?;
        info!("Day template {} deleted", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store() -> (TempDir, FileDayStore) {
        let tmp = TempDir::new().unwrap();
        let store = FileDayStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn day_documents_are_named_by_date() {
        let (tmp, store) = store();
        assert_eq!(
            store.day_path(date()),
            tmp.path().join("days/2026-01-15.json")
        );
    }

    #[test]
    fn document_is_plain_json_with_ordered_blocks() {
        let (_tmp, store) = store();
        let block = store
            .create_block(date(), Block::new("hello").unwrap().with_attribute("type", "note"))
            .unwrap();

        let raw = fs::read_to_string(store.day_path(date())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["date"], "2026-01-15");
        assert_eq!(json["blocks"][0]["id"], block.id.as_str());
        assert_eq!(json["blocks"][0]["attributes"]["type"], "note");
    }

    #[test]
    fn misdated_document_is_corrupt() {
        let (_tmp, store) = store();
        store.create_block(date(), Block::new("x").unwrap()).unwrap();
        let other = NaiveDate::from_ymd_opt(2026, 1, 16).unwrap();
        fs::copy(store.day_path(date()), store.day_path(other)).unwrap();

        assert_eq!(
            store.get_day(other).unwrap_err().kind(),
            crate::ErrorKind::Storage
        );
        assert_eq!(store.list_days(&ListFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn failed_mutation_leaves_document_unchanged() {
        let (_tmp, store) = store();
        let block = store.create_block(date(), Block::new("x").unwrap()).unwrap();
        let before = fs::read(store.day_path(date())).unwrap();

        assert!(store.create_block(date(), block).unwrap_err().is_conflict());
        assert!(store.update_block(date(), "zzzzzzzz", "y").unwrap_err().is_not_found());
        assert_eq!(fs::read(store.day_path(date())).unwrap(), before);
    }

    #[test]
    fn duplicate_template_name_conflicts() {
        let (_tmp, store) = store();
        store
            .create_template(DayTemplate::new("standup", "a", BTreeMap::new()).unwrap())
            .unwrap();
        let err = store
            .create_template(DayTemplate::new("standup", "b", BTreeMap::new()).unwrap())
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
