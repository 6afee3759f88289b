//! # messageai-client
//!
//! Offline-first messaging core: a local SQLite cache in front of a remote
//! document store, optimistic sends, a sync coordinator that flushes queued
//! messages when connectivity returns, and clients for the media, push and
//! AI endpoints.
//!
//! [`state::AppState`] wires everything together.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod mirror;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.  `RUST_LOG` overrides the
/// default filter.  Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("messageai_client=debug,messageai_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
