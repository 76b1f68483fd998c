//! Gmail-style query parser
//!
//! Parses search strings back into a [`MailboxQuery`]:
//! - `from:john@example.com` - sender filter
//! - `label:Work`, `in:inbox` - label filters
//! - `is:unread` - unread filter
//! - `before:2024/12/01`, `after:2024/01/01` - date filters
//!
//! Any other token, including operators this crate does not model such as
//! `to:` or `has:attachment`, is kept verbatim as a free-text term so that
//! rebuilding the query preserves it.

use chrono::NaiveDate;

use super::builder::{MailboxQuery, QUERY_DATE_FORMAT};
use crate::models::LabelId;

/// Parse a search query string into a [`MailboxQuery`]
pub fn parse_query(input: &str) -> MailboxQuery {
    let mut query = MailboxQuery::default();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let (token, consumed) = next_token(rest);
        rest = rest[consumed..].trim_start();

        if let Some((key, value)) = split_operator(&token) {
            if apply_operator(&mut query, &key, &value) {
                continue;
            }
        }
        query.terms.push(token);
    }

    query
}

/// Apply a recognised operator; returns false to keep the token as text
fn apply_operator(query: &mut MailboxQuery, key: &str, value: &str) -> bool {
    match key {
        "from" => {
            if let Some(previous) = query.from.replace(value.to_string()) {
                log::debug!("Query has several from: clauses, replacing {previous}");
            }
            true
        }
        "label" | "in" => {
            let label = system_label(value).unwrap_or(value);
            let updated = std::mem::take(query).label(label);
            *query = updated;
            true
        }
        "is" if value.eq_ignore_ascii_case("unread") => {
            query.unread_only = true;
            true
        }
        "after" => match parse_date(value) {
            Some(date) => {
                query.date_range.start = Some(date);
                true
            }
            None => false,
        },
        "before" => match parse_date(value) {
            Some(date) => {
                query.date_range.end = Some(date);
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Split `key:value` / `key:"quoted value"` into a lowercase key and the
/// unquoted value
fn split_operator(token: &str) -> Option<(String, String)> {
    let (key, value) = token.split_once(':')?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let value = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
        .unwrap_or(value);
    if value.is_empty() {
        return None;
    }
    Some((key.to_ascii_lowercase(), value.to_string()))
}

/// Read one token: a quoted phrase, or a run of non-whitespace that may
/// contain a quoted section (`from:"John Doe"`)
fn next_token(input: &str) -> (String, usize) {
    let mut in_quotes = false;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => return (input[..i].to_string(), i),
            _ => {}
        }
    }
    (input.to_string(), input.len())
}

/// Map `inbox`, `Unread`, ... to the canonical system label ID
fn system_label(value: &str) -> Option<&'static str> {
    LabelId::SYSTEM
        .iter()
        .copied()
        .find(|id| id.eq_ignore_ascii_case(value))
}

/// Parse a date string (YYYY/MM/DD or YYYY-MM-DD)
fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, QUERY_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .ok()
}
