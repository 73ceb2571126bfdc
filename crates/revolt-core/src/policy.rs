//! Navigation Policy
//!
//! Keeps the web view on the configured application. Links that leave the
//! application, and links asking for a new window, are handed to the
//! desktop's default URI handler instead.

use tracing::{debug, info};
use url::Url;

/// What the web engine is asking permission for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// Navigate the current view
    Navigation,
    /// Open a new window
    NewWindow,
    /// Accept a resource response
    Response,
}

/// What triggered a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    LinkClicked,
    FormSubmitted,
    BackForward,
    Reload,
    FormResubmitted,
    Other,
}

/// A policy decision request coming from the web view
#[derive(Debug, Clone, Copy)]
pub struct NavigationRequest<'a> {
    pub decision: DecisionKind,
    pub navigation: NavigationKind,
    pub uri: Option<&'a str>,
}

impl<'a> NavigationRequest<'a> {
    pub fn new(decision: DecisionKind, navigation: NavigationKind, uri: Option<&'a str>) -> Self {
        Self {
            decision,
            navigation,
            uri,
        }
    }

    /// A link click in the current view
    #[cfg(test)]
    pub(crate) fn link(uri: &'a str) -> Self {
        Self::new(DecisionKind::Navigation, NavigationKind::LinkClicked, Some(uri))
    }

    /// A link click targeting a new window
    #[cfg(test)]
    pub(crate) fn new_window_link(uri: &'a str) -> Self {
        Self::new(DecisionKind::NewWindow, NavigationKind::LinkClicked, Some(uri))
    }
}

/// Outcome of a policy decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// Let the web view handle it
    Allow,
    /// Cancel in the web view and open with the desktop handler
    OpenExternally(String),
}

/// Opens URIs outside the shell
pub trait UriOpener {
    fn open(&self, uri: &str);
}

/// Policy errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("Malformed URL: {0}")]
    MalformedUrl(#[from] url::ParseError),
}

/// Origin check against the application URL
#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    app_url: String,
}

impl NavigationPolicy {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }

    /// The configured application URL
    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// Point the policy at a different application URL
    pub fn set_app_url(&mut self, app_url: impl Into<String>) {
        self.app_url = app_url.into();
    }

    /// Whether `uri` belongs to the application
    pub fn is_in_app(&self, uri: &str) -> bool {
        uri.starts_with(&self.app_url)
    }

    pub fn decide(&self, request: &NavigationRequest<'_>) -> PolicyVerdict {
        let Some(uri) = request.uri else {
            return PolicyVerdict::Allow;
        };
        if request.navigation != NavigationKind::LinkClicked {
            return PolicyVerdict::Allow;
        }
        match request.decision {
            DecisionKind::Navigation if !self.is_in_app(uri) => {
                PolicyVerdict::OpenExternally(uri.to_string())
            }
            DecisionKind::NewWindow => PolicyVerdict::OpenExternally(uri.to_string()),
            _ => PolicyVerdict::Allow,
        }
    }

    /// Apply the decision. Returns `true` when the request was handled here
    /// and the web view must not navigate.
    pub fn handle(&self, request: &NavigationRequest<'_>, opener: &dyn UriOpener) -> bool {
        match self.decide(request) {
            PolicyVerdict::Allow => {
                if let Some(uri) = request.uri {
                    debug!("Allowing {:?} to {}", request.decision, uri);
                }
                false
            }
            PolicyVerdict::OpenExternally(uri) => {
                info!("Opening external link: {}", uri);
                opener.open(&uri);
                true
            }
        }
    }
}

/// URL of the in-app settings page: the current page with its fragment
/// replaced by `settings`, or the application URL when nothing is loaded.
pub fn settings_page_url(current: Option<&str>, app_url: &str) -> Result<String, PolicyError> {
    let mut url = Url::parse(current.unwrap_or(app_url))?;
    url.set_fragment(Some("settings"));
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const APP: &str = "https://riot.im/app/";

    #[derive(Default)]
    struct RecordingOpener {
        opened: RefCell<Vec<String>>,
    }

    impl UriOpener for RecordingOpener {
        fn open(&self, uri: &str) {
            self.opened.borrow_mut().push(uri.to_string());
        }
    }

    #[test]
    fn test_external_link_opened_once() {
        let policy = NavigationPolicy::new(APP);
        let opener = RecordingOpener::default();

        let handled = policy.handle(&NavigationRequest::link("https://example.org/x"), &opener);

        assert!(handled);
        assert_eq!(*opener.opened.borrow(), vec!["https://example.org/x".to_string()]);
    }

    #[test]
    fn test_in_app_link_allowed() {
        let policy = NavigationPolicy::new(APP);
        let opener = RecordingOpener::default();

        let handled = policy.handle(&NavigationRequest::link("https://riot.im/app/#/room/!abc"), &opener);

        assert!(!handled);
        assert!(opener.opened.borrow().is_empty());
    }

    #[test]
    fn test_prefix_check_is_literal() {
        let policy = NavigationPolicy::new(APP);

        assert!(policy.is_in_app("https://riot.im/app/"));
        assert!(!policy.is_in_app("https://riot.im/"));
        assert!(!policy.is_in_app("http://riot.im/app/"));
    }

    #[test]
    fn test_new_window_link_always_external() {
        let policy = NavigationPolicy::new(APP);
        let opener = RecordingOpener::default();

        assert!(policy.handle(&NavigationRequest::new_window_link("https://riot.im/app/#/home"), &opener));
        assert!(policy.handle(&NavigationRequest::new_window_link("https://matrix.org"), &opener));
        assert_eq!(opener.opened.borrow().len(), 2);
    }

    #[test]
    fn test_non_link_navigation_allowed() {
        let policy = NavigationPolicy::new(APP);
        let opener = RecordingOpener::default();

        for kind in [
            NavigationKind::FormSubmitted,
            NavigationKind::BackForward,
            NavigationKind::Reload,
            NavigationKind::Other,
        ] {
            let request = NavigationRequest::new(
                DecisionKind::Navigation,
                kind,
                Some("https://sso.example.com/login"),
            );
            assert!(!policy.handle(&request, &opener));
        }
        assert!(opener.opened.borrow().is_empty());
    }

    #[test]
    fn test_response_and_missing_uri_allowed() {
        let policy = NavigationPolicy::new(APP);

        let response = NavigationRequest::new(
            DecisionKind::Response,
            NavigationKind::LinkClicked,
            Some("https://cdn.example.com/a.png"),
        );
        assert_eq!(policy.decide(&response), PolicyVerdict::Allow);

        let no_uri = NavigationRequest::new(DecisionKind::Navigation, NavigationKind::LinkClicked, None);
        assert_eq!(policy.decide(&no_uri), PolicyVerdict::Allow);
    }

    #[test]
    fn test_set_app_url() {
        let mut policy = NavigationPolicy::new(APP);
        policy.set_app_url("https://chat.example.com/");

        assert_eq!(policy.app_url(), "https://chat.example.com/");
        assert!(policy.is_in_app("https://chat.example.com/#/home"));
        assert!(!policy.is_in_app(APP));
    }

    #[test]
    fn test_prefix_only_moves_with_loaded_app() {
        let mut policy = NavigationPolicy::new(APP);
        let opener = RecordingOpener::default();

        // Preference edited, page not reloaded yet: the loaded app keeps working
        let pending = "https://chat.example.org/";
        assert!(!policy.handle(&NavigationRequest::link("https://riot.im/app/#/room/x"), &opener));

        policy.set_app_url(pending);
        assert!(!policy.handle(&NavigationRequest::link("https://chat.example.org/#/home"), &opener));
        assert!(policy.handle(&NavigationRequest::link("https://riot.im/app/#/room/x"), &opener));
        assert_eq!(opener.opened.borrow().len(), 1);
    }

    #[test]
    fn test_settings_page_url() {
        let url = settings_page_url(Some("https://riot.im/app/#/room/!abc:matrix.org"), APP).unwrap();
        assert_eq!(url, "https://riot.im/app/#settings");

        let url = settings_page_url(None, APP).unwrap();
        assert_eq!(url, "https://riot.im/app/#settings");

        assert!(settings_page_url(Some("::bogus"), APP).is_err());
    }
}
