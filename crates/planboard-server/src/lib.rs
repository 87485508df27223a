pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod resource;
pub mod response;
pub mod routes;
pub mod store;
pub mod upload;

pub use config::Config;
pub use db::DbPool;
pub use routes::{create_router, AppState};
