//! eBPLS mobile - client core
//!
//! The non-UI half of the eBPLS business permit app: everything that keeps
//! the three address groups of an application form (taxpayer, main office,
//! business location) consistent with the LGU's address directory.
//!
//! ## Layout
//! Directory (REST) -> CascadeController (per group) -> AddressForm
//!
//! - [`address`] - cascade state machine, "same as" mirrors, edit-mode preload
//! - [`application`] - open a saved application and replay its addresses
//! - [`session`] - login, logout and who `/me` says is logged in
//! - [`config`] - which backend to talk to
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ebpls_mobile::address::{AddressForm, AddressGroup, AddressLevel};
//! use ebpls_mobile::config::AppConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = AppConfig::from_env()?.http_client()?;
//! let mut form = AddressForm::new();
//! form.load_initial(&client).await?;
//! form.select(AddressGroup::Taxpayer, AddressLevel::Province, Some(3), &client).await?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod application;
pub mod config;
pub mod error;
pub mod session;

pub use address::{
    addresses_match, AddressForm, AddressGroup, AddressLevel, AddressSelection, CascadeController,
    MirrorFlags,
};
pub use application::{open_for_edit, ApplicationError, OpenedApplication};
pub use config::{AppConfig, ConfigError, ConfigStore};
pub use error::{AddressError, Alert};
pub use session::{LoginError, SessionState};

// Client re-exports so callers need only this crate
pub use ebpls_client::{
    AddressDirectory, ApplicationSource, CancellationToken, ClientError, ClientTimeouts,
    HttpClient, InProcessClient, SessionApi,
};
