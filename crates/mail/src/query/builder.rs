//! Structured mailbox queries rendered as Gmail search strings

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date encoding used by `after:` and `before:` clauses
pub const QUERY_DATE_FORMAT: &str = "%Y/%m/%d";

/// Optional lower and upper date bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Rendered as `after:`
    pub start: Option<NaiveDate>,
    /// Rendered as `before:`
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Search filters for listing messages
///
/// Render with [`MailboxQuery::build`]. Clauses appear in a fixed order:
/// free text, `from:`, `is:unread`, one `label:` per filter, `after:`,
/// `before:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxQuery {
    /// Free-text terms passed through verbatim
    pub terms: Vec<String>,
    /// Sender filter
    pub from: Option<String>,
    /// Label IDs or names; each appears once
    pub label_filters: Vec<String>,
    /// Only unread messages
    pub unread_only: bool,
    pub date_range: DateRange,
    /// Upper bound on results returned by listing (not part of the string)
    pub max_results: Option<usize>,
}

impl MailboxQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add free text; blank input is ignored
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = text.trim();
        if !text.is_empty() {
            self.terms.push(text.to_string());
        }
        self
    }

    pub fn from(mut self, sender: impl Into<String>) -> Self {
        let sender = sender.into();
        self.from = if sender.trim().is_empty() {
            None
        } else {
            Some(sender.trim().to_string())
        };
        self
    }

    /// Add a label filter; duplicates are dropped
    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        let label = label.trim();
        if !label.is_empty() && !self.label_filters.iter().any(|l| l == label) {
            self.label_filters.push(label.to_string());
        }
        self
    }

    pub fn labels<I, S>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        labels.into_iter().fold(self, |q, l| q.label(l))
    }

    pub fn unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = unread_only;
        self
    }

    pub fn after(mut self, date: NaiveDate) -> Self {
        self.date_range.start = Some(date);
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.date_range.end = Some(date);
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Whether the rendered string would be empty
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
            && self.from.is_none()
            && self.label_filters.is_empty()
            && !self.unread_only
            && self.date_range.is_empty()
    }

    /// Render as a Gmail search string
    pub fn build(&self) -> String {
        let mut clauses: Vec<String> = self.terms.clone();

        if let Some(from) = &self.from {
            clauses.push(format!("from:{}", quote_value(from)));
        }
        if self.unread_only {
            clauses.push("is:unread".to_string());
        }
        for label in &self.label_filters {
            clauses.push(format!("label:{}", quote_value(label)));
        }
        if let Some(start) = self.date_range.start {
            clauses.push(format!("after:{}", start.format(QUERY_DATE_FORMAT)));
        }
        if let Some(end) = self.date_range.end {
            clauses.push(format!("before:{}", end.format(QUERY_DATE_FORMAT)));
        }

        clauses.join(" ")
    }
}

impl fmt::Display for MailboxQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Render a structured query (free-function form of [`MailboxQuery::build`])
pub fn build_query(query: &MailboxQuery) -> String {
    query.build()
}

fn quote_value(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', ""))
    } else {
        value.to_string()
    }
}
