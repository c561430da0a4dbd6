//! Legacy flat participant API

use crate::api::error::ApiError;
use crate::api::extract::{parse_attributes, Authenticated};
use crate::domains::participant::types::{ParticipantSummary, Selector};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

/// `external_id` wins over `participant_id` when both are given.
/// `None` means the request can match nothing.
pub fn legacy_selector(params: &[(String, String)]) -> Option<Selector> {
    let lookup = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
    };

    if let Some(external_id) = lookup("external_id") {
        return Some(Selector::ExternalId(external_id.to_string()));
    }
    match lookup("participant_id") {
        Some(raw) => raw.parse::<i64>().ok().map(Selector::ParticipantId),
        None => Some(Selector::All),
    }
}

pub async fn index(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<ParticipantSummary>>, ApiError> {
    let selector = match legacy_selector(&params) {
        Some(selector) => selector,
        None => return Ok(Json(Vec::new())),
    };

    let participants = state.participants.list_participants(selector, &auth).await?;
    Ok(Json(participants.into_iter().map(ParticipantSummary::from).collect()))
}

pub async fn show(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
) -> Result<Json<ParticipantSummary>, ApiError> {
    let participant = state.participants.get_participant(&external_id, &auth).await?;
    Ok(Json(participant.into()))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    body: Bytes,
) -> Result<(StatusCode, Json<ParticipantSummary>), ApiError> {
    let attributes = parse_attributes(&body)?;
    let participant = state.participants.create_participant(attributes, &auth).await?;
    Ok((StatusCode::CREATED, Json(participant.into())))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let attributes = parse_attributes(&body)?;
    state
        .participants
        .update_participant(&external_id, attributes, &auth)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn destroy(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.participants.delete_participant(&external_id, &auth).await?;
    Ok(StatusCode::NO_CONTENT)
}
