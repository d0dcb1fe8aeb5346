//! Session-managed calendar adapter over Exchange Web Services.
//!
//! This crate exposes three calendar operations (list, update, delete) to a
//! host, behind an explicit session lifecycle:
//!
//! - [`CalendarAdapter`] - session transitions plus the calendar operations
//! - [`SessionManager`] - `Uninitialized → SessionCreated → Ready`
//! - [`remote`] - the [`Backend`] / [`ExchangeService`] collaborator traits
//! - [`AdapterError`] - the uniform error surface, with a [`Cause`]
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────┐
//!                │  CalendarAdapter │  list_events / update_event / delete_event
//!                └────────┬─────────┘
//!                         │ session check, local validation, translation
//!                         ▼
//!                ┌──────────────────┐
//!                │  SessionManager  │
//!                └────────┬─────────┘
//!                         │ Backend::discover / connect
//!              ┌──────────┴───────────┐
//!              ▼                      ▼
//!     ┌─────────────────┐    ┌─────────────────┐
//!     │   EwsBackend    │    │ InMemoryMailbox │
//!     │  (SOAP / HTTP)  │    │   (in-process)  │
//!     └─────────────────┘    └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::num::NonZeroUsize;
//! use calbridge_ews::{AdapterSettings, CalendarAdapter};
//!
//! let settings = AdapterSettings::load()?;
//! let adapter = CalendarAdapter::from_settings(&settings).await?;
//! let events = adapter
//!     .list_events(
//!         "2024-01-01T00:00:00.000Z",
//!         "2024-01-31T00:00:00.000Z",
//!         NonZeroUsize::new(50).unwrap(),
//!     )
//!     .await?;
//! ```

pub mod error;
#[cfg(feature = "ews")]
pub mod ews;
pub mod memory;
pub mod operations;
pub mod remote;
pub mod secret;
pub mod session;
pub mod settings;
mod translate;

pub use error::{AdapterError, AdapterResult, Cause, ErrorKind};
pub use memory::{CallCounts, InMemoryMailbox};
pub use operations::{CalendarAdapter, DELETE_CONFIRMATION};
pub use remote::{
    Backend, BoxFuture, Credentials, ExchangeService, TransportError, TransportErrorCode,
    TransportResult,
};
pub use session::{SessionManager, SessionState};
pub use settings::{AccountSettings, AdapterSettings, ConfigError, HttpSettings};
