//! Authentication
//!
//! - [`token_store`] persists the bearer token and identity fields
//! - [`session`] is the explicit session context with change notification
//! - [`service`] talks to the login and signup endpoints

pub mod service;
pub mod session;
pub mod token_store;

pub use service::AuthService;
pub use session::{AuthState, Session};
pub use token_store::TokenStore;
