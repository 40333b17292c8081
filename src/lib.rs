//! CVForge - client-side data layer for the CVForge AI resume builder
//!
//! This library is everything between a user interface and the CVForge
//! backend: it keeps the session token, talks JSON over HTTP, reconciles the
//! backend's inconsistent payload shapes, and caches resources with request
//! de-duplication, stale-while-revalidate and explicit invalidation.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf to root:
//!
//! - `storage`: persistent key-value backends (keyring, sled, memory)
//! - `auth`: token store, session context, login and signup
//! - `http`: the single HTTP chokepoint and its error classification
//! - `normalize`: envelope and message-content normalization
//! - `models`: normalized domain types
//! - `services`: conversation and template resource services
//! - `query`: the query/cache layer
//! - `client`: [`ResumeClient`], the facade consumers use
//! - `config`, `error`, `cli`, `commands`: ambient pieces and the binary
//!
//! # Example
//!
//! ```no_run
//! use cvforge::{Config, ResumeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let client = ResumeClient::from_config(&config)?;
//!     client.init().await;
//!     let page = client.templates(1, 9).await?;
//!     println!("{} PDFs", page.meta.total);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod normalize;
pub mod query;
pub mod services;
pub mod storage;

// Re-export commonly used types
pub use client::ResumeClient;
pub use config::Config;
pub use error::{ApiError, ApiResult, CvforgeError, ErrorKind, Result};
pub use query::{QueryClient, QueryKey, QueryObserver, QuerySnapshot};

#[cfg(test)]
pub mod test_utils;
