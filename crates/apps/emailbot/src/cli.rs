//! Command-line arguments

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use mail::{MailboxQuery, Transition};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "emailbot", version, about = "Send, search and triage Gmail from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Gmail user to act as (defaults to the settings file, then `me`)
    #[arg(long, global = true, env = "EMAILBOT_USER")]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a message
    Send(ComposeArgs),
    /// Save a message as a draft
    Draft(ComposeArgs),
    /// Send a previously saved draft
    SendDraft {
        #[arg(value_name = "DRAFT_ID")]
        draft_id: String,
    },
    /// List messages matching a query
    List(FilterArgs),
    /// Estimate how many messages match a query
    Count(FilterArgs),
    /// Print a message body
    Show {
        #[arg(value_name = "ID")]
        id: String,
        /// Prefer the HTML part when there is one
        #[arg(long)]
        html: bool,
    },
    /// Print message headers as JSON
    Headers {
        #[arg(value_name = "ID")]
        id: String,
        /// Only these headers (repeatable)
        #[arg(long = "name", short = 'n')]
        names: Vec<String>,
    },
    /// Download attachments into a directory
    Attachments {
        #[arg(value_name = "ID")]
        id: String,
        /// Target directory (defaults to the configured attachment directory)
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },
    /// Change message state
    Mark {
        #[arg(value_enum)]
        action: MarkAction,
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,
    },
    /// Add a label (by name or ID) to a message
    Move {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "LABEL")]
        label: String,
        /// Leave the message in the inbox
        #[arg(long)]
        keep_inbox: bool,
    },
    /// List labels
    Labels,
    /// Create a user label
    CreateLabel {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Permanently delete a message
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Recipients, comma separated
    #[arg(long, short)]
    pub to: String,
    /// Sender address
    #[arg(long, short, env = "EMAILBOT_FROM")]
    pub from: String,
    #[arg(long, short, default_value = "")]
    pub subject: String,
    /// Body text
    #[arg(long, short, conflicts_with = "body_file")]
    pub body: Option<String>,
    /// Read the body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,
    /// Attach a file (repeatable)
    #[arg(long = "attach", short = 'a')]
    pub attachments: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Raw Gmail search string, combined with the other filters
    #[arg(long, short)]
    pub query: Option<String>,
    #[arg(long)]
    pub from: Option<String>,
    /// Label name or ID (repeatable)
    #[arg(long = "label", short = 'l')]
    pub labels: Vec<String>,
    #[arg(long)]
    pub unread: bool,
    /// YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub after: Option<NaiveDate>,
    /// YYYY-MM-DD
    #[arg(long, value_parser = parse_date)]
    pub before: Option<NaiveDate>,
    #[arg(long, short)]
    pub max: Option<usize>,
}

impl FilterArgs {
    pub fn to_query(&self) -> MailboxQuery {
        let mut query = self
            .query
            .as_deref()
            .map(mail::parse_query)
            .unwrap_or_default()
            .labels(self.labels.iter().cloned());
        if let Some(from) = &self.from {
            query = query.from(from.as_str());
        }
        if self.unread {
            query = query.unread_only(true);
        }
        if let Some(after) = self.after {
            query = query.after(after);
        }
        if let Some(before) = self.before {
            query = query.before(before);
        }
        if let Some(max) = self.max {
            query = query.max_results(max);
        }
        query
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkAction {
    Read,
    Unread,
    Star,
    Unstar,
    Archive,
    Unarchive,
    Trash,
}

impl From<MarkAction> for Transition {
    fn from(action: MarkAction) -> Self {
        match action {
            MarkAction::Read => Transition::MarkRead,
            MarkAction::Unread => Transition::MarkUnread,
            MarkAction::Star => Transition::Star,
            MarkAction::Unstar => Transition::Unstar,
            MarkAction::Archive => Transition::Archive,
            MarkAction::Unarchive => Transition::Unarchive,
            MarkAction::Trash => Transition::Trash,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, mail::query::QUERY_DATE_FORMAT))
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
