//! ---
//! dts_section: "15-testing-qa-runbook"
//! dts_subsection: "integration-tests"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Session guard flows over the persisted session store."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::sync::Arc;

use dts_session::{
    FileSessionStore, Navigation, Page, SessionGuard, SessionStore, AUTH_TOKEN_KEY,
    SUBSTATION_ID_KEY,
};
use tempfile::tempdir;

#[test]
fn login_navigate_logout_cycle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session/local_storage.json");
    let store = Arc::new(FileSessionStore::open(&path).unwrap());
    let guard = SessionGuard::new(store.clone());

    // Unauthenticated: every protected page bounces to login.
    for page in Page::ALL {
        let expected = match page {
            Page::Index | Page::Login => Navigation::Stay,
            _ => Navigation::Redirect(Page::Login),
        };
        assert_eq!(guard.guard_page(&format!("/{}", page.file_name())), expected);
    }

    // A token written by the login page is picked up from disk.
    store.set(AUTH_TOKEN_KEY, "opaque-token").unwrap();
    store.set(SUBSTATION_ID_KEY, "SUB-042").unwrap();
    let reopened = SessionGuard::new(FileSessionStore::open(&path).unwrap());
    assert_eq!(reopened.guard_page("/realtime.html"), Navigation::Stay);
    assert_eq!(reopened.substation_id().as_deref(), Some("SUB-042"));

    // Declined logout leaves the session in place.
    assert_eq!(guard.logout(&mut |_: &str| false).unwrap(), Navigation::Stay);
    assert!(guard.is_authenticated());

    // Confirmed logout clears both keys on disk.
    assert_eq!(
        guard.logout(&mut |_: &str| true).unwrap(),
        Navigation::Redirect(Page::Index)
    );
    let after = SessionGuard::new(FileSessionStore::open(&path).unwrap());
    assert!(!after.is_authenticated());
    assert!(after.substation_id().is_none());
    assert_eq!(
        after.check_authentication(),
        Navigation::Redirect(Page::Login)
    );
}
