//! Cloudflare app-install webhook receiver.
//!
//! Cloudflare calls back on every change in an app's install screen. This
//! crate authenticates those signed callbacks and drives the wizard that
//! links the install to an organization, a project and one of its DSNs.
//!
//! ## Flow
//!
//! ```text
//! preview → option-change:account → option-change:organization → option-change:project
//! ```

pub mod config;
pub mod directory;
pub mod web;

// Re-export commonly used types
pub use config::{Config, OptionsStore};
pub use directory::{Directory, InMemoryDirectory, TokenAuthenticator};
pub use web::{router, AppState};
