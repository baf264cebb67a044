//! HTTP client for the payment-session endpoints.

use crate::error::ClientError;
use crate::source::SessionSource;
use paysession_core::api::SESSION_PATH;
use paysession_core::handoff::{CONFIRM_PATH, SESSION_ID_PARAM};
use paysession_core::{
    BoxFuture, ConfirmAction, ConfirmRequest, CreatedSession, ErrorBody, GatewayOutcome,
    GatewayView, NewSession, ParticipantStep, PaymentSession, PaymentStep, SessionId,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the payment service used by both devices.
#[derive(Debug, Clone)]
pub struct PaymentApiClient {
    client: Client,
    base_url: String,
}

impl PaymentApiClient {
    /// Create a client for `base_url` with [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured `reqwest` client.
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a payment session (Device A).
    ///
    /// # Errors
    ///
    /// - `Validation`: rejected input
    /// - `NotFound`: unknown event or category
    /// - `Transport` / `Server`: see [`ClientError::is_transient`]
    pub async fn create_session(&self, request: &NewSession) -> Result<CreatedSession, ClientError> {
        let response = self
            .client
            .post(format!("{}{SESSION_PATH}", self.base_url))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    /// Read the current state of a session.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown id
    /// - `Transport` / `Server`: see [`ClientError::is_transient`]
    pub async fn get_session(&self, id: SessionId) -> Result<PaymentSession, ClientError> {
        let response = self
            .client
            .get(format!("{}{SESSION_PATH}/{id}", self.base_url))
            .send()
            .await?;
        decode(response).await
    }

    /// Load what the second device shows for a handoff link.
    ///
    /// # Errors
    ///
    /// - `NotFound`: invalid or unknown link
    /// - `Transport` / `Server`: see [`ClientError::is_transient`]
    pub async fn view(&self, id: SessionId) -> Result<GatewayView, ClientError> {
        let response = self
            .client
            .get(format!("{}{CONFIRM_PATH}", self.base_url))
            .query(&[(SESSION_ID_PARAM, id.to_string())])
            .send()
            .await?;
        decode(response).await
    }

    /// Confirm or cancel (Device B).
    ///
    /// An already-resolved session is an accepted outcome, whether the server
    /// reports it as `200` with `already_processed` or as `409`.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown id
    /// - `Transport` / `Server`: see [`ClientError::is_transient`]
    pub async fn confirm(
        &self,
        id: SessionId,
        action: ConfirmAction,
    ) -> Result<GatewayOutcome, ClientError> {
        let response = self
            .client
            .post(format!("{}{CONFIRM_PATH}", self.base_url))
            .json(&ConfirmRequest {
                session_id: id.to_string(),
                action,
            })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let session = self.get_session(id).await?;
            return Ok(GatewayOutcome {
                status: session.status,
                already_processed: true,
            });
        }
        decode(response).await
    }

    /// Start the payment step of the registration flow.
    ///
    /// Creates the session for the selected ticket and participant and returns
    /// the flow's payment step together with the handoff link.
    ///
    /// # Errors
    ///
    /// Returns any error from [`create_session`](Self::create_session), or
    /// `Validation` if the server returned a session for a different ticket.
    pub async fn begin_payment(
        &self,
        step: ParticipantStep,
    ) -> Result<(PaymentStep, CreatedSession), ClientError> {
        let created = self.create_session(&step.session_request()).await?;
        let payment = step
            .attach_session(&created.session)
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        Ok((payment, created))
    }
}

impl SessionSource for PaymentApiClient {
    fn fetch(&self, id: SessionId) -> BoxFuture<'_, Result<PaymentSession, ClientError>> {
        Box::pin(self.get_session(id))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(ClientError::from);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |error| error.message);

    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            ClientError::Validation(message)
        },
        status => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    })
}
