//! Project-scoped participant API with dotted filters and nested writes

use crate::api::error::ApiError;
use crate::api::extract::{parse_attributes, Authenticated};
use crate::api::Envelope;
use crate::domains::participant::filter::parse_filters;
use crate::domains::participant::types::{ParticipantResponse, Selector};
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

pub async fn index(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope<Vec<ParticipantResponse>>>, ApiError> {
    let filters = parse_filters(&params)?;
    let selector = if filters.is_empty() {
        Selector::All
    } else {
        Selector::Filters(filters)
    };

    let participants = state.participants.list_participants(selector, &auth).await?;
    Ok(Json(Envelope::new(
        participants.into_iter().map(ParticipantResponse::from).collect(),
    )))
}

pub async fn show(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
) -> Result<Json<Envelope<ParticipantResponse>>, ApiError> {
    let participant = state.participants.get_participant(&external_id, &auth).await?;
    Ok(Json(Envelope::new(participant.into())))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<ParticipantResponse>>), ApiError> {
    let attributes = parse_attributes(&body)?;
    let participant = state.participants.create_participant(attributes, &auth).await?;
    Ok((StatusCode::CREATED, Json(Envelope::new(participant.into()))))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
    body: Bytes,
) -> Result<Json<Envelope<ParticipantResponse>>, ApiError> {
    let attributes = parse_attributes(&body)?;
    let participant = state
        .participants
        .update_participant(&external_id, attributes, &auth)
        .await
        .map_err(|e| ApiError::from(e).with_validation_status(StatusCode::BAD_REQUEST))?;
    Ok(Json(Envelope::new(participant.into())))
}

pub async fn destroy(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(external_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .participants
        .delete_participant(&external_id, &auth)
        .await
        .map_err(|e| ApiError::from(e).with_validation_status(StatusCode::BAD_REQUEST))?;
    Ok(StatusCode::NO_CONTENT)
}
