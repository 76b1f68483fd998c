//! Label actions
//!
//! Pure label-set transitions plus a handler that applies them through the
//! transport.

mod handler;
mod transitions;

pub use handler::{ActionHandler, MessageProcessor};
pub use transitions::{Transition, apply_delta, apply_delta_batch};
