//! HTTP ingress for a registry node
//!
//! Every route goes through the node's [`SequencerHandle`]: mutations are
//! `transact` calls applied at the sequencer's clock, reads are `query`
//! calls. Callers name themselves in the request body; the registry's own
//! permission checks decide what they may do.
//!
//! # Routes
//!
//! Shared by every variant:
//!
//! - `GET /health` - Liveness, recipient count and limit
//! - `GET /metrics` - Prometheus text format
//! - `GET /recipients/count` - Active recipients and limit
//! - `GET /recipients/:index?start=&end=` - Address valid for a window
//! - `GET /events?after=` - Journaled events after a sequence number
//!
//! Controlled: `POST /recipients`, `POST /recipients/remove`,
//! `POST /max-recipients`.
//!
//! Mirrored: `POST /list/items`, `POST /list/items/remove`,
//! `POST /recipients`, `POST /recipients/remove`, `POST /max-recipients`.
//!
//! Challenge: `POST /requests/registration`, `POST /requests/removal`,
//! `POST /requests/challenge`, `POST /requests/execute`,
//! `GET /requests/:recipient_id`, `GET /balances/:address`,
//! `POST /config/base-deposit`, `POST /config/challenge-period`,
//! `POST /max-recipients`.

use crate::{
    actor::SequencerHandle,
    challenge::ChallengeRegistry,
    controlled::ControlledRegistry,
    events::RegistryEvent,
    metrics::Metrics,
    mirrored::{MemoryList, MirroredRegistry},
    source::RecipientSource,
    storage::Journal,
    transfer::Vault,
    types::{Address, Deposit, Metadata, PendingRequest, RecipientId, Timestamp},
    Error, Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mirrored registry as run by the node, fed by an in-process list
pub type NodeMirroredRegistry = MirroredRegistry<Arc<MemoryList>>;

/// Deposit-backed registry as run by the node, paying into a vault
pub type NodeChallengeRegistry = ChallengeRegistry<Vault>;

/// Shared state of the HTTP layer
pub struct ApiState<R> {
    handle: SequencerHandle<R>,
    metrics: Metrics,
    journal: Arc<Journal>,
}

impl<R> ApiState<R> {
    /// Create new API state
    pub fn new(handle: SequencerHandle<R>, metrics: Metrics, journal: Arc<Journal>) -> Self {
        Self {
            handle,
            metrics,
            journal,
        }
    }
}

impl<R> Clone for ApiState<R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            metrics: self.metrics.clone(),
            journal: self.journal.clone(),
        }
    }
}

impl<R> std::fmt::Debug for ApiState<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiState")
            .field("handle", &self.handle)
            .field("journal", &self.journal)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::InvalidInput(_) | Error::IncorrectDeposit { .. } => StatusCode::BAD_REQUEST,
            Error::NotRegistered(_) | Error::ItemNotFound(_) | Error::RequestNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::NotConfigured
            | Error::LimitReached
            | Error::LimitDecreaseRejected
            | Error::AlreadyRegistered(_)
            | Error::AlreadyRemoved(_)
            | Error::ItemNotRemoved(_)
            | Error::RequestAlreadyPending(_)
            | Error::ChallengePeriodNotOver { .. }
            | Error::TransferFailed(_) => StatusCode::CONFLICT,
            Error::Storage(_)
            | Error::Serialization(_)
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string(),
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

/// Window of a temporal lookup
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Window {
    /// Window start (inclusive)
    pub start: Timestamp,
    /// Window end (inclusive)
    pub end: Timestamp,
}

/// Cursor into the event journal
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EventsQuery {
    /// Return events with a sequence number above this one
    #[serde(default)]
    pub after: u64,
}

/// Admit a recipient (controlled)
#[derive(Debug, Clone, Deserialize)]
pub struct AddRecipient {
    /// Caller, must be the controller
    pub caller: Address,
    /// Payout address
    pub address: Address,
    /// Recipient metadata
    pub metadata: String,
}

/// Tombstone a recipient (controlled)
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRecipient {
    /// Caller, must be the controller
    pub caller: Address,
    /// Recipient to remove
    pub recipient_id: RecipientId,
}

/// Raise the recipient limit
#[derive(Debug, Clone, Deserialize)]
pub struct SetMaxRecipients {
    /// Caller, must be the controller
    pub caller: Address,
    /// New limit
    pub max_recipients: u64,
}

/// Publish a row on the curated list
#[derive(Debug, Clone, Deserialize)]
pub struct ListRow {
    /// Column values of the row
    pub columns: Vec<String>,
}

/// Refer to a curated list item
#[derive(Debug, Clone, Deserialize)]
pub struct ListItem {
    /// Item identifier on the list
    pub item_id: RecipientId,
}

/// Open a registration request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRegistration {
    /// Requester, refunded on success
    pub submitter: Address,
    /// Payout address
    pub address: Address,
    /// Recipient metadata
    pub metadata: String,
    /// Attached deposit
    pub deposit: Deposit,
}

/// Open a removal request
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRemoval {
    /// Requester, refunded on success
    pub submitter: Address,
    /// Recipient to remove
    pub recipient_id: RecipientId,
    /// Attached deposit
    pub deposit: Deposit,
}

/// Reject a pending request
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeRequest {
    /// Caller, must be the controller
    pub caller: Address,
    /// Recipient the request is about
    pub recipient_id: RecipientId,
    /// Receives the forfeited deposit
    pub beneficiary: Address,
}

/// Execute a pending request
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    /// Caller; anyone once the challenge period is over
    pub caller: Address,
    /// Recipient the request is about
    pub recipient_id: RecipientId,
}

/// Change the base deposit
#[derive(Debug, Clone, Deserialize)]
pub struct SetBaseDeposit {
    /// Caller, must be the controller
    pub caller: Address,
    /// New base deposit
    pub amount: Deposit,
}

/// Change the challenge period
#[derive(Debug, Clone, Deserialize)]
pub struct SetChallengePeriod {
    /// Caller, must be the controller
    pub caller: Address,
    /// New challenge period in seconds
    pub seconds: u64,
}

/// Node liveness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the sequencer answers
    pub status: String,
    /// Active recipients
    pub recipients: u64,
    /// Recipient limit
    pub max_recipients: u64,
}

/// Recipient count and limit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    /// Active recipients
    pub count: u64,
    /// Recipient limit
    pub max_recipients: u64,
}

/// Outcome of a temporal lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressResponse {
    /// Slot index
    pub index: u64,
    /// Address valid for the window, zero when vacant
    pub address: Address,
}

/// Recipient admitted (or request executed) at an index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionResponse {
    /// Recipient identifier
    pub recipient_id: RecipientId,
    /// Slot index; zero when nothing was admitted
    pub index: u64,
}

/// Identifier of a new list item or request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdResponse {
    /// Identifier
    pub recipient_id: RecipientId,
}

/// Journaled event with its sequence number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Sequence number in the journal
    pub sequence: u64,
    /// Committed event
    pub event: RegistryEvent,
}

/// Account balance in the vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Account
    pub address: Address,
    /// Paid-out deposits credited to it
    pub balance: Deposit,
}

/// Router for a controlled registry
pub fn controlled_router(state: ApiState<ControlledRegistry>) -> Router {
    read_routes()
        .route("/recipients", post(controlled_add))
        .route("/recipients/remove", post(controlled_remove))
        .route("/max-recipients", post(controlled_set_max))
        .with_state(state)
}

/// Router for a list-mirroring registry
pub fn mirrored_router(state: ApiState<NodeMirroredRegistry>) -> Router {
    read_routes()
        .route("/list/items", post(list_add_item))
        .route("/list/items/remove", post(list_remove_item))
        .route("/recipients", post(mirrored_add))
        .route("/recipients/remove", post(mirrored_remove))
        .route("/max-recipients", post(mirrored_set_max))
        .with_state(state)
}

/// Router for a deposit-backed registry
pub fn challenge_router(state: ApiState<NodeChallengeRegistry>) -> Router {
    read_routes()
        .route("/requests/registration", post(submit_registration))
        .route("/requests/removal", post(submit_removal))
        .route("/requests/challenge", post(challenge))
        .route("/requests/execute", post(execute))
        .route("/requests/:recipient_id", get(pending_request))
        .route("/balances/:address", get(balance))
        .route("/config/base-deposit", post(set_base_deposit))
        .route("/config/challenge-period", post(set_challenge_period))
        .route("/max-recipients", post(challenge_set_max))
        .with_state(state)
}

fn read_routes<R>() -> Router<ApiState<R>>
where
    R: RecipientSource + Send + 'static,
{
    Router::new()
        .route("/health", get(health::<R>))
        .route("/metrics", get(metrics_handler::<R>))
        .route("/recipients/count", get(recipient_count::<R>))
        .route("/recipients/:index", get(recipient_address::<R>))
        .route("/events", get(events::<R>))
}

async fn health<R>(State(state): State<ApiState<R>>) -> Result<Json<HealthResponse>>
where
    R: RecipientSource + Send + 'static,
{
    let (recipients, max_recipients) = state
        .handle
        .query(|r| (r.recipient_count(), r.max_recipients()))
        .await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        recipients,
        max_recipients,
    }))
}

async fn metrics_handler<R>(State(state): State<ApiState<R>>) -> Result<String> {
    state
        .metrics
        .encode_text()
        .map_err(|e| Error::Metrics(e.to_string()))
}

async fn recipient_count<R>(State(state): State<ApiState<R>>) -> Result<Json<CountResponse>>
where
    R: RecipientSource + Send + 'static,
{
    let (count, max_recipients) = state
        .handle
        .query(|r| (r.recipient_count(), r.max_recipients()))
        .await?;
    Ok(Json(CountResponse { count, max_recipients }))
}

async fn recipient_address<R>(
    State(state): State<ApiState<R>>,
    Path(index): Path<u64>,
    Query(window): Query<Window>,
) -> Result<Json<AddressResponse>>
where
    R: RecipientSource + Send + 'static,
{
    if window.start > window.end {
        return Err(Error::InvalidInput(format!(
            "window start {} is after end {}",
            window.start, window.end
        )));
    }
    let address = state
        .handle
        .recipient_address(index, window.start, window.end)
        .await?;
    Ok(Json(AddressResponse { index, address }))
}

async fn events<R>(
    State(state): State<ApiState<R>>,
    Query(cursor): Query<EventsQuery>,
) -> Result<Json<Vec<JournalEntry>>> {
    let journal = state.journal.clone();
    let entries = tokio::task::spawn_blocking(move || journal.events_since(cursor.after))
        .await
        .map_err(|e| Error::Concurrency(format!("Journal read panicked: {}", e)))??;

    Ok(Json(
        entries
            .into_iter()
            .map(|(sequence, event)| JournalEntry { sequence, event })
            .collect(),
    ))
}

async fn controlled_add(
    State(state): State<ApiState<ControlledRegistry>>,
    Json(request): Json<AddRecipient>,
) -> Result<(StatusCode, Json<AdmissionResponse>)> {
    let admission = state
        .handle
        .transact(move |r, now| {
            let metadata = Metadata::from(request.metadata);
            let recipient_id = r.recipient_id(&request.address, &metadata);
            let index = r.add(request.caller, request.address, metadata, now)?;
            Ok(AdmissionResponse { recipient_id, index })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(admission)))
}

async fn controlled_remove(
    State(state): State<ApiState<ControlledRegistry>>,
    Json(request): Json<RemoveRecipient>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, now| r.remove(request.caller, request.recipient_id, now))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn controlled_set_max(
    State(state): State<ApiState<ControlledRegistry>>,
    Json(request): Json<SetMaxRecipients>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, _| r.set_max_recipients(request.caller, request.max_recipients))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_add_item(
    State(state): State<ApiState<NodeMirroredRegistry>>,
    Json(row): Json<ListRow>,
) -> Result<(StatusCode, Json<IdResponse>)> {
    let columns: Vec<&str> = row.columns.iter().map(String::as_str).collect();
    let payload = crate::mirrored::encode_row(&columns);

    // The list sits outside the registry; curating it is not a registry transaction
    let recipient_id = state
        .handle
        .query(move |r| r.list().add_item(payload))
        .await?;
    Ok((StatusCode::CREATED, Json(IdResponse { recipient_id })))
}

async fn list_remove_item(
    State(state): State<ApiState<NodeMirroredRegistry>>,
    Json(item): Json<ListItem>,
) -> Result<StatusCode> {
    let removed = state
        .handle
        .query(move |r| r.list().remove_item(&item.item_id))
        .await?;
    if !removed {
        return Err(Error::ItemNotFound(item.item_id.to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn mirrored_add(
    State(state): State<ApiState<NodeMirroredRegistry>>,
    Json(item): Json<ListItem>,
) -> Result<(StatusCode, Json<AdmissionResponse>)> {
    let index = state
        .handle
        .transact(move |r, now| r.add(item.item_id, now))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(AdmissionResponse {
            recipient_id: item.item_id,
            index,
        }),
    ))
}

async fn mirrored_remove(
    State(state): State<ApiState<NodeMirroredRegistry>>,
    Json(item): Json<ListItem>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, now| r.remove(item.item_id, now))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mirrored_set_max(
    State(state): State<ApiState<NodeMirroredRegistry>>,
    Json(request): Json<SetMaxRecipients>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, _| r.set_max_recipients(request.caller, request.max_recipients))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_registration(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<SubmitRegistration>,
) -> Result<(StatusCode, Json<IdResponse>)> {
    let recipient_id = state
        .handle
        .transact(move |r, now| {
            r.submit_registration(
                request.submitter,
                request.address,
                Metadata::from(request.metadata),
                request.deposit,
                now,
            )
        })
        .await?;
    Ok((StatusCode::ACCEPTED, Json(IdResponse { recipient_id })))
}

async fn submit_removal(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<SubmitRemoval>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, now| {
            r.submit_removal(request.submitter, request.recipient_id, request.deposit, now)
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn challenge(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, now| {
            r.challenge(request.caller, request.recipient_id, request.beneficiary, now)
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn execute(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<AdmissionResponse>> {
    let index = state
        .handle
        .transact(move |r, now| r.execute(request.caller, request.recipient_id, now))
        .await?;
    Ok(Json(AdmissionResponse {
        recipient_id: request.recipient_id,
        index,
    }))
}

async fn pending_request(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Path(recipient_id): Path<RecipientId>,
) -> Result<Json<PendingRequest>> {
    state
        .handle
        .query(move |r| r.pending_request(&recipient_id).cloned())
        .await?
        .map(Json)
        .ok_or_else(|| Error::RequestNotFound(recipient_id.to_string()))
}

async fn balance(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Path(address): Path<Address>,
) -> Result<Json<BalanceResponse>> {
    let balance = state
        .handle
        .query(move |r| r.transfer().balance_of(&address))
        .await?;
    Ok(Json(BalanceResponse { address, balance }))
}

async fn set_base_deposit(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<SetBaseDeposit>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, _| r.set_base_deposit(request.caller, request.amount))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_challenge_period(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<SetChallengePeriod>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, _| r.set_challenge_period_duration(request.caller, request.seconds))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn challenge_set_max(
    State(state): State<ApiState<NodeChallengeRegistry>>,
    Json(request): Json<SetMaxRecipients>,
) -> Result<StatusCode> {
    state
        .handle
        .transact(move |r, _| r.set_max_recipients(request.caller, request.max_recipients))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
