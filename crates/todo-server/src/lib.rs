//! HTTP server for the Lakebase todo app.

pub mod config;
pub mod error;
pub mod handlers;
pub mod lakebase;
pub mod observability;
pub mod server;
pub mod user;

pub use config::AppConfig;
pub use server::{AppState, ServerBuilder, TodoServer, build_app, check_migrations};
pub use user::{RequestUser, UserDefaults};
