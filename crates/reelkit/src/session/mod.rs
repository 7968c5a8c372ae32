//! Per-subject protocol sessions.
//!
//! [`SessionInitializer`] turns a landing page into a [`Session`];
//! [`SessionStore`] keeps one session per subject and makes sure concurrent
//! requesters share a single initialization.

mod initializer;
mod store;
mod types;

pub use initializer::SessionInitializer;
pub use store::SessionStore;
pub use types::{InitOutcome, Session};
