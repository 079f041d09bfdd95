//! # geodeck CLI
//!
//! Deck files, the session they run against and the slides printed after
//! each step. The `geodeck` binary wraps this library.

pub mod deck;
pub mod slide;

pub use deck::{Deck, DeckError, Runner, Session, Step, Value};
pub use slide::Slide;
