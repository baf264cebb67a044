//! # Paysession Client
//!
//! Device-side pieces of the payment handoff:
//!
//! - [`PaymentApiClient`]: typed HTTP access to the session endpoints
//! - [`ClientPoller`]: bounded status polling on the originating device
//! - [`SessionSource`]: what the poller reads from (HTTP or an in-process manager)
//!
//! ## Example
//!
//! ```ignore
//! use paysession_client::{ClientPoller, PaymentApiClient, PollerConfig};
//!
//! let api = PaymentApiClient::new("https://pay.example.com")?;
//! let created = api.create_session(&NewSession::new("evt-1", "10K", 199_000)).await?;
//! show_qr(&created.confirm_url);
//!
//! let poller = ClientPoller::new(api, PollerConfig::default());
//! let handle = poller.start(created.session.id, |_| {}, |_| {});
//! let outcome = handle.join().await;
//! ```

pub mod api;
pub mod error;
pub mod poller;
pub mod source;

pub use api::{DEFAULT_TIMEOUT, PaymentApiClient};
pub use error::ClientError;
pub use poller::{ClientPoller, PollHandle, PollOutcome, PollerConfig};
pub use source::SessionSource;
