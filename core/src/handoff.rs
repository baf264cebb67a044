//! Handoff link construction.
//!
//! The link is what Device A renders as a QR code and Device B opens. It points
//! at the confirmation gateway's public entry point and carries only the
//! session id. Turning it into an image is a rendering concern outside this
//! crate.
//!
//! The id is the only secret in the link. Production use would bind the link
//! to a short-lived signed token instead of the raw id.

use crate::types::{PaymentSession, SessionId};

/// Path of the confirmation gateway, relative to the public base URL.
pub const CONFIRM_PATH: &str = "/payment/confirm";

/// Query parameter carrying the session id.
pub const SESSION_ID_PARAM: &str = "session_id";

/// Builds `{base_url}/payment/confirm?session_id={id}` links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffLinkBuilder {
    base_url: String,
}

impl HandoffLinkBuilder {
    /// Create a builder for the given public base URL.
    ///
    /// Trailing slashes are stripped so `https://pay.example/` and
    /// `https://pay.example` produce the same links.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// The normalised base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Link for a session.
    #[must_use]
    pub fn build(&self, session: &PaymentSession) -> String {
        self.build_for(session.id)
    }

    /// Link for a bare session id.
    #[must_use]
    pub fn build_for(&self, id: SessionId) -> String {
        format!(
            "{}{CONFIRM_PATH}?{SESSION_ID_PARAM}={}",
            self.base_url,
            urlencoding::encode(&id.to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use uuid::Uuid;

    fn fixed_id() -> SessionId {
        SessionId::from_uuid(Uuid::parse_str("7f1d2c3b-4a59-4e6f-8a7b-9c0d1e2f3a4b").unwrap())
    }

    #[test]
    fn builds_gateway_url() {
        let links = HandoffLinkBuilder::new("https://pay.example.com");
        assert_eq!(
            links.build_for(fixed_id()),
            "https://pay.example.com/payment/confirm?session_id=7f1d2c3b-4a59-4e6f-8a7b-9c0d1e2f3a4b"
        );
    }

    #[test]
    fn trailing_slash_is_normalised() {
        let with_slash = HandoffLinkBuilder::new("http://localhost:8080/");
        let without = HandoffLinkBuilder::new("http://localhost:8080");
        assert_eq!(with_slash, without);
        assert_eq!(with_slash.base_url(), "http://localhost:8080");
    }

    #[test]
    fn link_round_trips_through_session_id_parse() {
        let links = HandoffLinkBuilder::new("http://localhost:8080");
        let id = SessionId::new();
        let url = links.build_for(id);
        let (_, raw) = url.split_once("session_id=").unwrap();
        assert_eq!(SessionId::parse(raw), Some(id));
    }
}
