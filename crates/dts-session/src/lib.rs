//! ---
//! dts_section: "06-security-access-control"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Session flag storage and page guard."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
//! Session guard for the substation dashboard.

/// Presence-based guard and logout flow.
pub mod guard;
/// Page catalogue.
pub mod page;
/// Key/value stores.
pub mod store;

use std::path::PathBuf;

pub use guard::{Confirm, Navigation, SessionGuard, AUTH_TOKEN_KEY, SUBSTATION_ID_KEY};
pub use page::{is_public_path, Page};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

/// Errors raised by session stores.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the backing file failed.
    #[error("session store io failure at {path}: {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file does not hold a JSON string map.
    #[error("session store {path} is corrupt: {source}")]
    Corrupt {
        /// Backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
