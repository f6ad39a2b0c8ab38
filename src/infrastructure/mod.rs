//! Infrastructure layer providing external service integrations.
//!
//! This module contains implementations for external concerns like
//! file I/O, CSV interchange, the system clipboard and log output.

pub mod clipboard;
pub mod csv_io;
pub mod errors;
pub mod logging;
pub mod persistence;

pub use clipboard::*;
pub use csv_io::*;
pub use errors::*;
pub use logging::*;
pub use persistence::*;
