pub mod access;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod progress;
pub mod publication;
pub mod service;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
