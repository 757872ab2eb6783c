//! HTTP client for the Reservation Store web app
//!
//! Queries go out as GET with query parameters, mutations as form POSTs.
//! Every body is handed to [`ParsedResponse::parse`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use slotbook_api::{
    CreateAck, CreatePayload, LockGrant, LockRequest, LockToken, ParsedResponse, Reservation,
    SlotRange, StoreRecord,
};
use slotbook_util::{ReservationId, format_date};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{RemoteError, RemoteResult, ReservationStore};

/// Reservation Store reached over HTTP
pub struct HttpReservationStore {
    client: Client,
    endpoint: String,
}

impl HttpReservationStore {
    /// Create a client for `endpoint`; `timeout` bounds every single call
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get(&self, action: &str, params: &[(&str, String)]) -> RemoteResult<ParsedResponse> {
        debug!(endpoint = %self.endpoint, action, "Store GET");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", action)])
            .query(params)
            .send()
            .await?;

        read_body(action, response).await
    }

    async fn post_form(&self, action: &str, form: &[(&str, String)]) -> RemoteResult<ParsedResponse> {
        debug!(endpoint = %self.endpoint, action, "Store POST");

        let response = self.client.post(&self.endpoint).form(form).send().await?;

        read_body(action, response).await
    }
}

async fn read_body(action: &str, response: Response) -> RemoteResult<ParsedResponse> {
    let status = response.status();
    if !status.is_success() {
        warn!(action, status = %status, "Store answered with HTTP error");
        return Err(RemoteError::Network(format!("HTTP status {}", status)));
    }

    let body = response.text().await?;
    let parsed = ParsedResponse::parse(&body);
    debug!(action, status = ?parsed.status(), "Store response parsed");
    Ok(parsed)
}

fn range_params(range: &SlotRange) -> Vec<(&'static str, String)> {
    vec![
        ("fecha", format_date(range.date)),
        ("turno", range.shift.wire_name().to_string()),
        ("recurso", range.resource.to_string()),
        ("horas", range.hours_param()),
    ]
}

fn rejection(parsed: &ParsedResponse) -> RemoteError {
    match parsed {
        ParsedResponse::Unparseable(body) => {
            let preview: String = body.chars().take(120).collect();
            RemoteError::Malformed(preview)
        }
        other => RemoteError::Rejected(
            other
                .message()
                .or_else(|| other.status().map(str::to_string))
                .unwrap_or_else(|| "unexpected response".into()),
        ),
    }
}

#[async_trait]
impl ReservationStore for HttpReservationStore {
    async fn fetch_all(&self) -> RemoteResult<Vec<StoreRecord>> {
        let parsed = self.get("getAll", &[]).await?;
        if !parsed.is_ok() {
            return Err(rejection(&parsed));
        }
        parsed
            .records()
            .ok_or_else(|| RemoteError::Malformed("missing reservas array".into()))
    }

    async fn check_availability(&self, range: &SlotRange) -> RemoteResult<bool> {
        let parsed = self.get("check", &range_params(range)).await?;
        parsed.availability().ok_or_else(|| rejection(&parsed))
    }

    async fn create(
        &self,
        reservation: &Reservation,
        lock: Option<&LockToken>,
    ) -> RemoteResult<CreateAck> {
        let data = serde_json::to_string(&CreatePayload::new(reservation, lock))
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let parsed = self.post_form("create", &[("data", data)]).await?;
        parsed.create_ack().ok_or_else(|| rejection(&parsed))
    }

    async fn cancel(&self, id: ReservationId) -> RemoteResult<bool> {
        let parsed = self.get("cancel", &[("id", id.to_string())]).await?;
        match parsed.status() {
            Some(_) => Ok(parsed.is_ok()),
            None => Err(rejection(&parsed)),
        }
    }

    async fn acquire_lock(&self, request: &LockRequest) -> RemoteResult<LockGrant> {
        let mut form = vec![("action", "acquireLockAndCheck".to_string())];
        form.extend(range_params(&request.range));
        form.push(("lockId", request.lock_id.to_string()));
        form.push(("sessionId", request.session_id.to_string()));
        form.push(("ttl", request.ttl.as_secs().to_string()));

        let parsed = self.post_form("acquireLockAndCheck", &form).await?;
        parsed.lock_grant().ok_or_else(|| rejection(&parsed))
    }

    async fn release_lock(&self, token: &LockToken) -> RemoteResult<()> {
        let form = [
            ("action", "releaseLock".to_string()),
            ("lockId", token.lock_id.to_string()),
            ("sessionId", token.session_id.to_string()),
        ];

        let parsed = self.post_form("releaseLock", &form).await?;
        if parsed.is_ok() {
            Ok(())
        } else {
            Err(rejection(&parsed))
        }
    }
}
