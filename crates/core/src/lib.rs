#![forbid(unsafe_code)]

pub mod deck_refs;
pub mod model;
pub mod reconcile;
pub mod time;
pub mod validation;

pub use deck_refs::{parse_deck_reference_keys, parse_deck_references};
pub use time::Clock;
pub use validation::{ErrorKey, ValidationErrors};
