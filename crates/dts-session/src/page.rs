//! ---
//! dts_section: "06-security-access-control"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Dashboard page catalogue used for navigation and guarding."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Pages served by the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Index,
    Login,
    Home,
    Realtime,
    Equipment,
    Fault,
    Reports,
    Settings,
}

impl Page {
    pub const ALL: [Page; 8] = [
        Page::Index,
        Page::Login,
        Page::Home,
        Page::Realtime,
        Page::Equipment,
        Page::Fault,
        Page::Reports,
        Page::Settings,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Page::Index => "index.html",
            Page::Login => "login.html",
            Page::Home => "dashboard.html",
            Page::Realtime => "realtime.html",
            Page::Equipment => "equipment.html",
            Page::Fault => "fault.html",
            Page::Reports => "reports.html",
            Page::Settings => "settings.html",
        }
    }

    /// Header text shown when the page is active.
    pub fn title(&self) -> &'static str {
        match self {
            Page::Index => "Digital Twin Substation",
            Page::Login => "Sign In",
            Page::Home => "Digital Twin Substation Dashboard",
            Page::Realtime => "Real-Time Data Monitoring",
            Page::Equipment => "Equipment Health Status",
            Page::Fault => "Fault Simulation Center",
            Page::Reports => "System Reports",
            Page::Settings => "System Settings",
        }
    }

    /// Resolve a request path by its final segment.
    pub fn from_path(path: &str) -> Option<Page> {
        let name = last_segment(path);
        Page::ALL.into_iter().find(|page| page.file_name() == name)
    }
}

/// True for pages reachable without a session: the entry page, the login
/// page, and the bare site root.
pub fn is_public_path(path: &str) -> bool {
    matches!(last_segment(path), "" | "login.html" | "index.html")
}

fn last_segment(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default()
}
