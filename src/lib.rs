#![doc = "The `taskforge_auth` library crate."]
#![doc = ""]
#![doc = "Authentication and session security for the TaskForge API: signed access,"]
#![doc = "refresh and personal access tokens, refresh rotation, CSRF double-submit"]
#![doc = "defense for cookie sessions, and the per-request authorization pipeline."]
#![doc = "The binary (`main.rs`) wires these into an actix-web server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use error::AppError;
pub use state::AppState;
