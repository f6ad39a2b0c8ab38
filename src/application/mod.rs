//! Application layer managing state and business workflows.
//!
//! This module coordinates between the domain layer and presentation layer,
//! managing application state, user configuration and editing workflows.

pub mod config;
pub mod state;

pub use config::*;
pub use state::*;
