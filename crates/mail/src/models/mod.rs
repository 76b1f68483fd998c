//! Domain models for mail entities

mod address;
mod label;
mod message;

pub(crate) use address::addresses_from_parsed;
pub use address::{EmailAddress, format_address_list, parse_address_list, require_addresses};
pub use label::{Label, LabelColor, LabelDelta, LabelId, LabelSet, label_sort_order};
pub use message::{MessageFormat, MessageId, Recipients, ThreadId};
