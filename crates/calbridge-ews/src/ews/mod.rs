//! Exchange Web Services transport.
//!
//! This module provides an [`EwsBackend`] that talks SOAP to an Exchange
//! server.
//!
//! # Features
//!
//! - HTTP Basic authentication
//! - POX autodiscover with address and URL redirects
//! - `FindItem` / `GetItem` / `UpdateItem` / `DeleteItem` on calendar items
//! - Response-code classification (`ErrorItemNotFound` → not found)
//! - TLS configuration (can be disabled for testing)
//!
//! # Example
//!
//! ```ignore
//! use calbridge_ews::ews::{EwsBackend, EwsConfig};
//! use calbridge_ews::CalendarAdapter;
//!
//! let backend = EwsBackend::new(EwsConfig::new())?;
//! let mut adapter = CalendarAdapter::new(Arc::new(backend));
//! adapter.create_session("user@example.com", "password")?;
//! adapter.resolve_endpoint("user@example.com").await?;
//! ```

mod auth;
mod autodiscover;
mod client;
mod config;
mod service;
mod soap;
mod xml;

pub use config::EwsConfig;
pub use service::{EwsBackend, EwsService};
