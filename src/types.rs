//! Shared data structures for the daybook library.
//!
//! This module contains the query filter used by both storage contracts,
//! the computed day summary and the command definitions of the binary.
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::{
    earliest_timestamp, latest_timestamp, local_day_end, local_day_start, DaybookError, Entry,
};

/// A specialized Result type for daybook operations.
pub type Result<T> = std::result::Result<T, DaybookError>;

/// Filter and paging options for listing queries.
///
/// Dates are local calendar dates. When `date` is set it takes precedence
/// over `start_date`/`end_date`; the range bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Only records from this day
    pub date: Option<NaiveDate>,
    /// Only records on or after this day
    pub start_date: Option<NaiveDate>,
    /// Only records on or before this day
    pub end_date: Option<NaiveDate>,
    /// Exact template name
    pub template: Option<String>,
    /// Exact context name
    pub context: Option<String>,
    /// Maximum number of results, unlimited when `None`
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: usize,
}

/// Half-open UTC interval `[from, until)` derived from a [`ListFilter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateWindow {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| *at >= from) && self.until.map_or(true, |until| *at < until)
    }
}

impl ListFilter {
    pub fn on(date: NaiveDate) -> Self {
        ListFilter {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        ListFilter {
            start_date: start,
            end_date: end,
            ..Default::default()
        }
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    pub fn with_context(mut self, name: impl Into<String>) -> Self {
        self.context = Some(name.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// The UTC interval selected by the date fields.
    ///
    /// Bounds are clamped to the storable timestamp range. A bound beyond
    /// the range on its own side is dropped; one beyond the opposite end is
    /// pinned to that end.
    pub fn window(&self) -> DateWindow {
        let window = match self.date {
            Some(date) => DateWindow {
                from: Some(local_day_start(date)),
                until: Some(local_day_end(date)),
            },
            None => DateWindow {
                from: self.start_date.map(local_day_start),
                until: self.end_date.map(local_day_end),
            },
        };
        DateWindow {
            from: window
                .from
                .filter(|from| *from > earliest_timestamp())
                .map(|from| from.min(latest_timestamp())),
            until: window
                .until
                .filter(|until| *until <= latest_timestamp())
                .map(|until| until.max(earliest_timestamp())),
        }
    }

    /// Whether a calendar date passes the date fields.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        match self.date {
            Some(only) => date == only,
            None => {
                self.start_date.map_or(true, |start| date >= start)
                    && self.end_date.map_or(true, |end| date <= end)
            }
        }
    }

    /// Whether an entry passes every non-paging criterion.
    pub fn matches(&self, entry: &Entry) -> bool {
        self.window().contains(&entry.created_at)
            && self
                .template
                .as_deref()
                .map_or(true, |name| entry.has_template(name))
            && self
                .context
                .as_deref()
                .map_or(true, |name| entry.has_context(name))
    }

    /// Same criteria without limit/offset.
    pub fn unpaged(&self) -> Self {
        ListFilter {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }

    /// Applies offset then limit.
    pub fn page<T>(&self, items: Vec<T>) -> Vec<T> {
        let rest = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rest.take(limit).collect(),
            None => rest.collect(),
        }
    }
}

/// Read-only rollup of one calendar day: how many records it holds and a
/// preview of the most recent one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub count: usize,
    pub preview: String,
}

/// Available subcommands for the daybook binary
#[derive(Subcommand)]
pub enum Commands {
    /// Write a new entry
    Add {
        /// Content of the entry
        content: Option<String>,

        /// Path to a file containing the entry's content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Templates the entry was written from (comma-separated names)
        #[clap(short = 't', long)]
        templates: Option<String>,

        /// Contexts to file the entry under (comma-separated names)
        #[clap(short = 'x', long)]
        contexts: Option<String>,
    },

    /// Show an entry by ID
    Show {
        /// ID of the entry to show
        id: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List entries, newest first
    List {
        #[clap(flatten)]
        filter: FilterArgs,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Summarize entries per day
    Days {
        #[clap(flatten)]
        filter: FilterArgs,
    },

    /// Replace the content of an entry
    Edit {
        /// ID of the entry to edit
        id: String,

        /// New content
        content: Option<String>,

        /// Path to a file containing the new content
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Replace the template list (comma-separated names)
        #[clap(short = 't', long)]
        templates: Option<String>,
    },

    /// Delete an entry permanently
    Delete {
        /// ID of the entry to delete
        id: String,
    },

    /// Find entries containing a piece of text
    Search {
        /// Text to look for
        query: String,

        /// Limit the number of results
        #[clap(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Template operations
    Template {
        #[clap(subcommand)]
        action: TemplateCommand,
    },

    /// Context operations
    Context {
        #[clap(subcommand)]
        action: ContextCommand,
    },

    /// Day/block journal operations
    Block {
        #[clap(subcommand)]
        action: BlockCommand,
    },
}

/// Filter flags shared by `list` and `days`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only this day (YYYY-MM-DD); wins over --from/--to
    #[clap(short, long)]
    pub date: Option<NaiveDate>,

    /// First day of the range, inclusive
    #[clap(long)]
    pub from: Option<NaiveDate>,

    /// Last day of the range, inclusive
    #[clap(long)]
    pub to: Option<NaiveDate>,

    /// Exact template name
    #[clap(short = 't', long)]
    pub template: Option<String>,

    /// Exact context name
    #[clap(short = 'x', long)]
    pub context: Option<String>,

    /// Limit the number of results
    #[clap(short = 'n', long)]
    pub limit: Option<usize>,

    /// Skip this many results
    #[clap(long, default_value_t = 0)]
    pub offset: usize,
}

impl From<FilterArgs> for ListFilter {
    fn from(args: FilterArgs) -> Self {
        ListFilter {
            date: args.date,
            start_date: args.from,
            end_date: args.to,
            template: args.template,
            context: args.context,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    /// Create a template
    Add {
        name: String,
        /// Template text
        content: Option<String>,
        /// Path to a file containing the template text
        #[clap(short, long)]
        file: Option<PathBuf>,
    },
    /// List templates
    List,
    /// Show a template
    Show { name: String },
    /// Rename a template, keeping its ID
    Rename { old: String, new: String },
    /// Delete a template
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum ContextCommand {
    /// Create a context
    Add {
        name: String,
        #[clap(short, long, default_value = "manual")]
        source: String,
    },
    /// List contexts
    List,
    /// File an entry under a context, creating the context if needed
    Attach { entry_id: String, name: String },
    /// Remove an entry from a context
    Detach { entry_id: String, name: String },
    /// Delete a context
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum BlockCommand {
    /// Append a block to a day (today by default)
    Add {
        /// Block text; taken from the template when omitted
        content: Option<String>,
        #[clap(short, long)]
        date: Option<NaiveDate>,
        /// Attributes as key=value pairs (comma-separated)
        #[clap(short, long)]
        attrs: Option<String>,
        /// Build the block from a day template
        #[clap(short, long)]
        template: Option<String>,
    },
    /// Show the blocks of a day (today by default)
    Show {
        #[clap(short, long)]
        date: Option<NaiveDate>,
    },
    /// Remove a block from a day
    Delete {
        id: String,
        #[clap(short, long)]
        date: Option<NaiveDate>,
    },
    /// Summarize stored days
    Days {
        #[clap(flatten)]
        filter: FilterArgs,
    },
    /// Create a day template
    Template {
        name: String,
        content: String,
        /// Attributes as key=value pairs (comma-separated)
        #[clap(short, long)]
        attrs: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, day).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(2026, 1, day, hour, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn window_bounds_stay_within_storable_years() {
        let far = NaiveDate::from_ymd_opt(10000, 1, 1).unwrap();
        let ancient = NaiveDate::from_ymd_opt(-5, 1, 1).unwrap();

        let open_end = ListFilter::between(Some(d(10)), Some(far)).window();
        assert!(open_end.from.is_some());
        assert_eq!(open_end.until, None);
        assert!(open_end.contains(&at(15, 12)));

        let open_start = ListFilter::between(Some(ancient), Some(d(20))).window();
        assert_eq!(open_start.from, None);
        assert!(open_start.contains(&at(15, 12)));

        let none = ListFilter::between(None, Some(ancient)).window();
        assert_eq!(none.until, Some(earliest_timestamp()));
        assert!(!none.contains(&at(15, 12)));
        assert!(!none.contains(&earliest_timestamp()));
    }

    #[test]
    fn date_wins_over_range() {
        let filter = ListFilter {
            date: Some(d(15)),
            start_date: Some(d(10)),
            end_date: Some(d(20)),
            ..Default::default()
        };
        let window = filter.window();
        assert!(window.contains(&at(15, 0)));
        assert!(window.contains(&at(15, 23)));
        assert!(!window.contains(&at(12, 12)));
        assert!(filter.matches_date(d(15)));
        assert!(!filter.matches_date(d(12)));
    }

    #[test]
    fn range_is_inclusive() {
        let filter = ListFilter::between(Some(d(11)), Some(d(14)));
        let window = filter.window();
        assert!(window.contains(&at(11, 0)));
        assert!(window.contains(&at(14, 23)));
        assert!(!window.contains(&at(10, 23)));
        assert!(!window.contains(&at(15, 0)));
    }

    #[test]
    fn paging_skips_then_limits() {
        let filter = ListFilter::default().with_offset(1).with_limit(2);
        assert_eq!(filter.page(vec![1, 2, 3, 4]), vec![2, 3]);
        assert_eq!(ListFilter::default().page(vec![1, 2]), vec![1, 2]);
    }
}
