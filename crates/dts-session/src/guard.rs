//! ---
//! dts_section: "06-security-access-control"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Presence-based session guard for protected pages."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use tracing::{debug, info};

use crate::page::{is_public_path, Page};
use crate::store::SessionStore;
use crate::SessionError;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const SUBSTATION_ID_KEY: &str = "substationId";

const LOGOUT_PROMPT: &str = "Are you sure you want to logout?";

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(Page),
}

/// Interactive yes/no confirmation.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Gate in front of protected pages.
///
/// The check is a plain presence test on the stored token: no signature,
/// no expiry, no server round-trip.
#[derive(Debug, Clone)]
pub struct SessionGuard<S> {
    store: S,
}

impl<S: SessionStore> SessionGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// True iff a token is stored, whatever its content.
    pub fn is_authenticated(&self) -> bool {
        self.store.get(AUTH_TOKEN_KEY).is_some()
    }

    pub fn substation_id(&self) -> Option<String> {
        self.store.get(SUBSTATION_ID_KEY)
    }

    pub fn check_authentication(&self) -> Navigation {
        if self.is_authenticated() {
            Navigation::Stay
        } else {
            debug!("no auth token present; redirecting to login");
            Navigation::Redirect(Page::Login)
        }
    }

    /// Page-load hook: public pages pass, everything else is checked.
    pub fn guard_page(&self, path: &str) -> Navigation {
        if is_public_path(path) {
            return Navigation::Stay;
        }
        self.check_authentication()
    }

    /// Clear the session after confirmation and return to the entry page.
    pub fn logout(&self, confirm: &mut dyn Confirm) -> Result<Navigation, SessionError> {
        if !confirm.confirm(LOGOUT_PROMPT) {
            debug!("logout declined");
            return Ok(Navigation::Stay);
        }
        self.store.remove(AUTH_TOKEN_KEY)?;
        self.store.remove(SUBSTATION_ID_KEY)?;
        info!("session cleared");
        Ok(Navigation::Redirect(Page::Index))
    }
}
