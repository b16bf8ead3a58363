//! Core entities of the entry model: entries, templates, contexts and the
//! attribution references that link them.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    generate_id, validate_content, validate_context_name, validate_id, validate_template_name,
    validate_timestamp, Result,
};

/// Denormalized pointer from an entry to a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub name: String,
}

/// Denormalized pointer from an entry to a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextRef {
    pub id: String,
    pub name: String,
}

impl From<&Template> for TemplateRef {
    fn from(template: &Template) -> Self {
        TemplateRef {
            id: template.id.clone(),
            name: template.name.clone(),
        }
    }
}

impl From<&Context> for ContextRef {
    fn from(context: &Context) -> Self {
        ContextRef {
            id: context.id.clone(),
            name: context.name.clone(),
        }
    }
}

/// Common view over the two reference types.
pub trait Reference: Clone {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Reference for TemplateRef {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Reference for ContextRef {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Deduplicates references by id (first occurrence wins) and puts them in
/// canonical `(name, id)` order, so both backends return identical lists.
pub fn normalize_refs<R: Reference>(refs: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    let mut unique: Vec<R> = refs
        .into_iter()
        .filter(|r| seen.insert(r.id().to_string()))
        .collect();
    unique.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id())));
    unique
}

/// A single diary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier, immutable once assigned
    pub id: String,
    /// Free-form entry body
    pub content: String,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Templates this entry was written from
    #[serde(default)]
    pub templates: Vec<TemplateRef>,
    /// Contexts this entry belongs to
    #[serde(default)]
    pub contexts: Vec<ContextRef>,
}

impl Entry {
    /// Creates a new entry stamped with the current time.
    pub fn new(content: impl Into<String>) -> Result<Self> {
        Self::at(content, Utc::now())
    }

    /// Creates a new entry with an explicit creation time (imports, backfill).
    pub fn at(content: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self> {
        let content = content.into();
        validate_content(&content, "entry")?;

        Ok(Entry {
            id: generate_id(),
            content,
            created_at,
            updated_at: created_at,
            templates: Vec::new(),
            contexts: Vec::new(),
        })
    }

    pub fn with_templates(mut self, templates: Vec<TemplateRef>) -> Self {
        self.templates = normalize_refs(templates);
        self
    }

    pub fn with_contexts(mut self, contexts: Vec<ContextRef>) -> Self {
        self.contexts = normalize_refs(contexts);
        self
    }

    /// Checks the invariants every stored entry must satisfy.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id, "entry")?;
        validate_content(&self.content, "entry")?;
        validate_timestamp(&self.created_at, "entry")?;
        validate_timestamp(&self.updated_at, "entry")?;
        if self.created_at > self.updated_at {
            return Err(crate::DaybookError::validation(format!(
                "entry {} was updated before it was created",
                self.id
            )));
        }
        for template in &self.templates {
            validate_id(&template.id, "template")?;
        }
        for context in &self.contexts {
            validate_id(&context.id, "context")?;
        }
        Ok(())
    }

    /// Prepares an entry for its first write: validated, references
    /// normalized and `updated_at` equal to `created_at`.
    pub(crate) fn prepared_for_create(mut self) -> Result<Self> {
        self.updated_at = self.created_at;
        self.templates = normalize_refs(self.templates);
        self.contexts = normalize_refs(self.contexts);
        self.validate()?;
        Ok(self)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.templates.iter().any(|t| t.name == name)
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.contexts.iter().any(|c| c.name == name)
    }
}

/// A reusable piece of entry text, looked up by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_template_name(&name)?;
        let now = Utc::now();

        Ok(Template {
            id: generate_id(),
            name,
            content: content.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id, "template")?;
        validate_template_name(&self.name)
    }
}

/// A named grouping of entries (a project, a repository, a topic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub id: String,
    pub name: String,
    /// Where the context came from, e.g. `manual` or an auto-detected origin
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_context_name(&name)?;
        let now = Utc::now();

        Ok(Context {
            id: generate_id(),
            name,
            source: source.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id, "context")?;
        validate_context_name(&self.name)
    }
}
