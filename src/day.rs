//! The day/block journal model.
//!
//! A [`Day`] is a container of [`Block`]s keyed by its calendar date. It
//! only exists on disk once it holds at least one block.
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use log::trace;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::{
    generate_id, next_timestamp, validate_content, validate_id, validate_template_name,
    validate_timestamp, DaybookError, Result,
};

/// One piece of a day, such as a note or a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Unique within its day
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Open key/value tags, e.g. `type=note`
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Block {
    pub fn new(content: impl Into<String>) -> Result<Self> {
        Self::at(content, Utc::now())
    }

    pub fn at(content: impl Into<String>, created_at: DateTime<Utc>) -> Result<Self> {
        let content = content.into();
        validate_content(&content, "block")?;

        Ok(Block {
            id: generate_id(),
            content,
            created_at,
            updated_at: created_at,
            attributes: BTreeMap::new(),
        })
    }

    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id, "block")?;
        validate_content(&self.content, "block")?;
        validate_timestamp(&self.created_at, "block")?;
        validate_timestamp(&self.updated_at, "block")?;
        if self.created_at > self.updated_at {
            return Err(DaybookError::validation(format!(
                "block {} was updated before it was created",
                self.id
            )));
        }
        Ok(())
    }
}

/// All blocks recorded on one calendar date, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub date: NaiveDate,
    /// Set when the first block is added
    pub created_at: Option<DateTime<Utc>>,
    /// Refreshed on every block mutation
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Day {
    /// An empty, not yet persisted day.
    pub fn empty(date: NaiveDate) -> Self {
        Day {
            date,
            created_at: None,
            updated_at: None,
            blocks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Adds a block and restores ascending `created_at` order.
    pub fn insert(&mut self, block: Block) -> Result<()> {
        block.validate()?;
        if self.block(&block.id).is_some() {
            return Err(DaybookError::conflict("block", block.id));
        }

        self.blocks.push(block);
        // stable, so equal timestamps keep arrival order
        self.blocks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.touch();
        Ok(())
    }

    /// Replaces a block's content.
    pub fn update(&mut self, id: &str, content: &str) -> Result<Block> {
        validate_content(content, "block")?;
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| DaybookError::not_found("block", id))?;

        block.content = content.to_string();
        block.updated_at = next_timestamp(block.updated_at);
        let updated = block.clone();
        self.touch();
        Ok(updated)
    }

    pub fn remove(&mut self, id: &str) -> Result<Block> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| DaybookError::not_found("block", id))?;

        let removed = self.blocks.remove(index);
        self.touch();
        Ok(removed)
    }

    fn touch(&mut self) {
        let now = match self.updated_at {
            Some(previous) => next_timestamp(previous),
            None => Utc::now(),
        };
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
    }

    /// The most recently created block.
    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }
}

/// Reusable block text with default attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DayTemplate {
    /// Builds a template from raw text.
    ///
    /// A leading `---` YAML block in `raw` declares attributes; it is
    /// removed from the stored content. `attributes` given by the caller
    /// override declared ones with the same key.
    pub fn new(
        name: impl Into<String>,
        raw: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<Self> {
        let name = name.into();
        validate_template_name(&name)?;

        let (mut merged, body) = split_frontmatter(raw)?;
        validate_content(body, "template")?;
        merged.extend(attributes);

        let now = Utc::now();
        Ok(DayTemplate {
            id: generate_id(),
            name,
            content: body.to_string(),
            attributes: merged,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id, "template")?;
        validate_template_name(&self.name)?;
        validate_content(&self.content, "template")
    }

    /// A block carrying this template's text.
    ///
    /// Attributes are the template's, overlaid with `overrides`, plus
    /// `template=<name>`.
    pub fn instantiate(&self, overrides: BTreeMap<String, String>) -> Result<Block> {
        let mut attributes = self.attributes.clone();
        attributes.extend(overrides);
        attributes.insert("template".to_string(), self.name.clone());
        Ok(Block::new(self.content.clone())?.with_attributes(attributes))
    }
}

/// Splits a leading `---` YAML mapping from the text after it.
fn split_frontmatter(raw: &str) -> Result<(BTreeMap<String, String>, &str)> {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return Ok((BTreeMap::new(), raw));
    };
    let (yaml, body) = if let Some(body) = rest.strip_prefix("---\n") {
        ("", body)
    } else if rest == "---" {
        ("", "")
    } else {
        match rest.find("\n---\n") {
            Some(end) => (&rest[..end], &rest[end + 5..]),
            None => match rest.strip_suffix("\n---") {
                Some(yaml) => (yaml, ""),
                None => return Ok((BTreeMap::new(), raw)),
            },
        }
    };

    trace!("Parsing template attribute block");
    let declared: BTreeMap<String, Value> = if yaml.trim().is_empty() {
        BTreeMap::new()
    } else {
        serde_yaml::from_str(yaml).map_err(|e| {
            DaybookError::validation(format!("template attributes are not a YAML mapping: {}", e))
        })?
    };

    let mut attributes = BTreeMap::new();
    for (key, value) in declared {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            _ => {
                return Err(DaybookError::validation(format!(
                    "template attribute '{}' must be a plain value",
                    key
                )))
            }
        };
        attributes.insert(key, value);
    }
    Ok((attributes, body.trim_start_matches('\n')))
}
