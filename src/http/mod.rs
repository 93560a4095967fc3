//! HTTP transport adapter over the analysis core

pub mod handler;
pub mod server;

pub use handler::AppState;
pub use server::HttpServer;
