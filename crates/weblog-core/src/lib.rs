//! Pairing state machine, content access gating, and the domain events both
//! emit. Everything here is synchronous; callers on an async runtime wrap
//! calls in `spawn_blocking`.

pub mod content;
pub mod error;
pub mod events;
pub mod relationship;

pub use content::{ContentService, Page};
pub use error::{Error, ErrorKind, Result};
pub use events::{DomainEvent, EventSink};
pub use relationship::{CoupleInfo, RelationshipEngine};

#[cfg(test)]
mod tests;
