pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod sheets;

pub use config::AppConfig;
pub use error::{AppError, ParseError, Result};
pub use service::ReconciliationEngine;
