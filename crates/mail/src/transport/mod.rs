//! Transport boundary
//!
//! Everything that crosses the network goes through [`MailTransport`]. The
//! Gmail REST client implements it for production use and
//! [`InMemoryTransport`] implements it over in-process state for tests and
//! offline runs.

mod memory;
mod traits;

pub use memory::{InMemoryTransport, SeedMessage};
pub use traits::{ListRequest, MailTransport};
