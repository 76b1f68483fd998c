//! Mailbox search queries
//!
//! [`MailboxQuery`] describes what to look for and renders it as a Gmail
//! search string; [`parse_query`] goes the other way. [`list_paged`] walks
//! the matching message list page by page.

mod builder;
mod paged;
mod parser;

pub use builder::{DateRange, MailboxQuery, QUERY_DATE_FORMAT, build_query};
pub use paged::{MAX_PAGE_SIZE, Pager, count_matching, list_paged};
pub use parser::parse_query;
