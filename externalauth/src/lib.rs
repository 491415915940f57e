//! # externalauth
//!
//! Browser-redirect login against external identity providers:
//! - A state-validated redirect/callback handshake shared by every driver
//! - Windows Live (Microsoft account) OAuth
//! - WeChat Work OAuth and QR-code login
//! - HTTP client building with retry middleware
//!
//! ## Usage
//!
//! ```rust,ignore
//! use externalauth::{
//!     driver::{CallbackParams, Driver, LoginContext},
//!     providers::windows_live,
//!     state::MemoryStateStore,
//! };
//!
//! let driver = windows_live::Config { client, scope }.create();
//! let redirect = driver.external_login(LoginContext::new(&store, callback_url)).await?;
//! ```

pub mod driver;
pub mod error;
pub mod http;
pub mod profile;
pub mod providers;
pub mod redirect;
pub mod state;

// Re-export commonly used types
pub use driver::{CallbackParams, Driver, LoginContext};
pub use error::{Error, ErrorKind};
pub use profile::{AuthResult, Gender, Profile, ProfileIndex};
pub use redirect::{LoginRedirect, RedirectStyle};
pub use state::{LoginState, MemoryStateStore, StateStore};
