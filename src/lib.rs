//! Bookshelf application library
//!
//! Project modules plus the bootstrap that wires settings, the database pool,
//! the module registry and the HTTP server together.

pub mod app;
pub mod modules;

pub use app::{init_db, run, App};
