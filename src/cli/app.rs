//! CLI module for the daybook application
//!
//! This module dispatches parsed commands to the entry store and the day
//! journal and prints the results.
use std::{
    collections::BTreeMap,
    fs::read_to_string,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate};
use log::{debug, info};

use crate::{
    parse_attributes, parse_names, BlockCommand, Block, Commands, Config, Context, ContextCommand,
    ContextRef, DayStore, DaySummary, DayTemplate, DaybookError, Entry, FileDayStore, ListFilter,
    Result, Storage, Store, Template, TemplateCommand, TemplateRef,
};

/// CLI Application handler - processes commands against the opened stores
pub struct App {
    /// Entry, template and context backend
    store: Store,

    /// Day/block journal
    days: FileDayStore,

    /// Application configuration
    config: Config,
}

impl App {
    pub fn new(store: Store, days: FileDayStore, config: Config) -> Self {
        Self {
            store,
            days,
            config,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Releases the backend.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Run the CLI application with the given command
    pub fn run(&self, command: Commands) -> Result<()> {
        debug!("Running command against the {} backend", self.store.kind());
        match command {
            Commands::Add {
                content,
                file,
                templates,
                contexts,
            } => self.add_entry(content, file, templates, contexts),

            Commands::Show { id, json } => {
                let entry = self.store.get_entry(&id)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                } else {
                    print_entry(&entry, true);
                }
                Ok(())
            }

            Commands::List { filter, json } => {
                let filter: ListFilter = filter.into();
                let entries = self.store.list_entries(&filter)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    print_entries(&entries);
                }
                Ok(())
            }

            Commands::Days { filter } => {
                print_days(&self.store.list_days(&filter.into())?);
                Ok(())
            }

            Commands::Edit {
                id,
                content,
                file,
                templates,
            } => {
                let content = read_content(content, file)?;
                let templates = match templates {
                    Some(names) => Some(self.template_refs(Some(names))?),
                    None => None,
                };
                let entry = self.store.update_entry(&id, &content, templates)?;
                println!("Entry {} updated", entry.id);
                Ok(())
            }

            Commands::Delete { id } => {
                self.store.delete_entry(&id)?;
                println!("Entry {} has been permanently deleted.", id);
                Ok(())
            }

            Commands::Search { query, limit } => {
                let results = self.store.search_entries(&query, limit)?;
                if results.is_empty() {
                    println!("No entries found matching query: \"{}\"", query);
                } else {
                    print_entries(&results);
                }
                Ok(())
            }

            Commands::Template { action } => self.handle_template(action),
            Commands::Context { action } => self.handle_context(action),
            Commands::Block { action } => self.handle_block(action),
        }
    }

    fn add_entry(
        &self,
        content: Option<String>,
        file: Option<PathBuf>,
        templates: Option<String>,
        contexts: Option<String>,
    ) -> Result<()> {
        let content = read_content(content, file)?;
        let templates = self.template_refs(templates)?;
        let contexts = parse_names(contexts)
            .iter()
            .map(|name| {
                self.store
                    .ensure_context(name, &self.config.context_source)
                    .map(|context| ContextRef::from(&context))
            })
            .collect::<Result<Vec<_>>>()?;

        let entry = Entry::new(content)?
            .with_templates(templates)
            .with_contexts(contexts);
        let entry = self.store.create_entry(entry)?;
        println!("Entry created with ID: {}", entry.id);
        Ok(())
    }

    /// Resolves comma-separated template names to references.
    fn template_refs(&self, names: Option<String>) -> Result<Vec<TemplateRef>> {
        parse_names(names)
            .iter()
            .map(|name| {
                self.store
                    .get_template(name)
                    .map(|template| TemplateRef::from(&template))
            })
            .collect()
    }

    fn handle_template(&self, action: TemplateCommand) -> Result<()> {
        match action {
            TemplateCommand::Add {
                name,
                content,
                file,
            } => {
                let content = read_content(content, file)?;
                let template = self.store.create_template(Template::new(name, content)?)?;
                println!("Template '{}' created with ID: {}", template.name, template.id);
            }
            TemplateCommand::List => {
                let templates = self.store.list_templates()?;
                if templates.is_empty() {
                    println!("No templates defined.");
                }
                for template in templates {
                    println!("{}  {}", template.id, template.name);
                }
            }
            TemplateCommand::Show { name } => {
                let template = self.store.get_template(&name)?;
                println!("ID: {} | Name: {}", template.id, template.name);
                println!("\n{}", template.content);
            }
            TemplateCommand::Rename { old, new } => {
                let template = self.store.rename_template(&old, &new)?;
                println!("Template '{}' renamed to '{}'", old, template.name);
            }
            TemplateCommand::Delete { name } => {
                self.store.delete_template(&name)?;
                println!("Template '{}' deleted", name);
            }
        }
        Ok(())
    }

    fn handle_context(&self, action: ContextCommand) -> Result<()> {
        match action {
            ContextCommand::Add { name, source } => {
                let context = self.store.create_context(Context::new(name, source)?)?;
                println!("Context '{}' created with ID: {}", context.name, context.id);
            }
            ContextCommand::List => {
                let contexts = self.store.list_contexts()?;
                if contexts.is_empty() {
                    println!("No contexts defined.");
                }
                for context in contexts {
                    println!("{}  {}  ({})", context.id, context.name, context.source);
                }
            }
            ContextCommand::Attach { entry_id, name } => {
                let context = self
                    .store
                    .ensure_context(&name, &self.config.context_source)?;
                self.store.attach_context(&entry_id, &context.id)?;
                println!("Entry {} filed under '{}'", entry_id, context.name);
            }
            ContextCommand::Detach { entry_id, name } => {
                let context = self.store.get_context(&name)?;
                self.store.detach_context(&entry_id, &context.id)?;
                println!("Entry {} removed from '{}'", entry_id, context.name);
            }
            ContextCommand::Delete { name } => {
                self.store.delete_context(&name)?;
                println!("Context '{}' deleted", name);
            }
        }
        Ok(())
    }

    fn handle_block(&self, action: BlockCommand) -> Result<()> {
        match action {
            BlockCommand::Add {
                content,
                date,
                attrs,
                template,
            } => {
                let date = date.unwrap_or_else(today);
                let attributes = parse_attributes(attrs)?;
                let block = self.add_block(date, content, attributes, template)?;
                println!("Block {} added to {}", block.id, date);
            }
            BlockCommand::Show { date } => {
                let day = self.days.get_day(date.unwrap_or_else(today))?;
                if day.is_empty() {
                    println!("Nothing recorded on {}.", day.date);
                }
                for block in &day.blocks {
                    print_block(block);
                }
            }
            BlockCommand::Delete { id, date } => {
                let date = date.unwrap_or_else(today);
                self.days.delete_block(date, &id)?;
                println!("Block {} removed from {}", id, date);
            }
            BlockCommand::Days { filter } => {
                print_days(&self.days.list_days(&filter.into())?);
            }
            BlockCommand::Template {
                name,
                content,
                attrs,
            } => {
                let attributes = parse_attributes(attrs)?;
                let template = self
                    .days
                    .create_template(DayTemplate::new(name, &content, attributes)?)?;
                println!(
                    "Day template '{}' created with ID: {}",
                    template.name, template.id
                );
            }
        }
        Ok(())
    }

    fn add_block(
        &self,
        date: NaiveDate,
        content: Option<String>,
        attributes: BTreeMap<String, String>,
        template: Option<String>,
    ) -> Result<Block> {
        match (content, template) {
            (Some(_), Some(_)) => Err(DaybookError::validation(
                "Cannot specify both block content and --template",
            )),
            (None, Some(name)) => self.days.create_block_from_template(date, &name, attributes),
            (Some(content), None) => {
                let block = Block::new(content)?.with_attributes(attributes);
                self.days.create_block(date, block)
            }
            (None, None) => Err(DaybookError::validation(
                "No block content given; pass it as an argument or use --template",
            )),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Content from the positional argument or from `--file`, never both.
fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<String> {
    match (content, file) {
        (Some(_), Some(_)) => Err(DaybookError::validation(
            "Cannot specify both content and --file",
        )),
        (Some(content), None) => Ok(content),
        (None, Some(path)) => read_content_from_file(&path),
        (None, None) => Err(DaybookError::validation(
            "No content given; pass it as an argument or with --file",
        )),
    }
}

fn read_content_from_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(DaybookError::not_found("file", path.display().to_string()));
    }
    info!("Reading content from {}", path.display());
    Ok(read_to_string(path)?)
}

fn print_entry(entry: &Entry, full: bool) {
    let created_at = entry.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    println!("ID: {} | Created: {}", entry.id, created_at);

    if !entry.templates.is_empty() {
        let names: Vec<_> = entry.templates.iter().map(|t| t.name.as_str()).collect();
        println!("Templates: {}", names.join(", "));
    }
    if !entry.contexts.is_empty() {
        let names: Vec<_> = entry.contexts.iter().map(|c| c.name.as_str()).collect();
        println!("Contexts: {}", names.join(", "));
    }

    if full {
        println!("\n{}", entry.content);
    } else {
        println!("{}", crate::preview(&entry.content, crate::PREVIEW_WIDTH));
    }
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries found matching the criteria.");
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            println!("{}", "-".repeat(40));
        }
        print_entry(entry, false);
    }

    println!(
        "\nFound {} entr{}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" }
    );
}

fn print_days(days: &[DaySummary]) {
    if days.is_empty() {
        println!("No days found matching the criteria.");
        return;
    }
    for day in days {
        println!("{}  {:>3}  {}", day.date, day.count, day.preview);
    }
}

fn print_block(block: &Block) {
    let at = block.created_at.with_timezone(&Local).format("%H:%M");
    let attributes: Vec<String> = block
        .attributes
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();

    if attributes.is_empty() {
        println!("[{}] {}  {}", block.id, at, block.content);
    } else {
        println!(
            "[{}] {}  {}  ({})",
            block.id,
            at,
            block.content,
            attributes.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::{BackendKind, FileStore, FilterArgs};

    fn app(tmp: &TempDir) -> App {
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            backend: BackendKind::File,
            ..Default::default()
        };
        let store = Store::File(FileStore::open(&config.data_dir).unwrap());
        let days = FileDayStore::open(&config.journal_dir()).unwrap();
        App::new(store, days, config)
    }

    #[test]
    fn content_comes_from_exactly_one_source() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("body.txt");
        fs::write(&path, "from file").unwrap();

        assert_eq!(read_content(Some("inline".into()), None).unwrap(), "inline");
        assert_eq!(read_content(None, Some(path.clone())).unwrap(), "from file");
        assert!(read_content(Some("x".into()), Some(path)).is_err());
        assert!(read_content(None, None).is_err());
        assert!(read_content(None, Some(tmp.path().join("missing")))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn add_creates_missing_contexts_and_resolves_templates() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        app.run(Commands::Template {
            action: TemplateCommand::Add {
                name: "daily".into(),
                content: Some("## Today".into()),
                file: None,
            },
        })
        .unwrap();

        app.run(Commands::Add {
            content: Some("shipped it".into()),
            file: None,
            templates: Some("daily".into()),
            contexts: Some("work/app".into()),
        })
        .unwrap();

        let entries = app.store().list_entries(&ListFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_template("daily"));
        assert!(entries[0].has_context("work/app"));
        assert_eq!(app.store().get_context("work/app").unwrap().source, "manual");
    }

    #[test]
    fn unknown_template_name_fails_add() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        let err = app
            .run(Commands::Add {
                content: Some("text".into()),
                file: None,
                templates: Some("nope".into()),
                contexts: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn block_from_template_lands_in_journal() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();

        app.run(Commands::Block {
            action: BlockCommand::Template {
                name: "mood".into(),
                content: "How was today?".into(),
                attrs: Some("type=mood".into()),
            },
        })
        .unwrap();
        app.run(Commands::Block {
            action: BlockCommand::Add {
                content: None,
                date: Some(date),
                attrs: None,
                template: Some("mood".into()),
            },
        })
        .unwrap();

        let day = app.days.get_day(date).unwrap();
        assert_eq!(day.blocks.len(), 1);
        assert_eq!(day.blocks[0].attributes["template"], "mood");

        app.run(Commands::Block {
            action: BlockCommand::Days {
                filter: FilterArgs::default(),
            },
        })
        .unwrap();
    }
}
