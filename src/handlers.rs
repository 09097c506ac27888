// src/handlers.rs
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{CurrentUser, MaybeUser};
use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::{
    CreatePollRequest, LoginRequest, LoginResponse, PollResponse, PollResults, RegisterRequest,
    UserResponse, VoteRequest, VoteResponse,
};
use crate::policy::{self, Operation};
use crate::results;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state.identity.register(request).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .identity
        .authenticate(&request.username, &request.password)
        .await?;
    let token = state.tokens.issue(&user)?;

    info!("{} logged in", user.username);
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: state.tokens.ttl_secs(),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.identity.find_by_username(&username).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Polls created by the caller, private ones included
pub async fn my_polls(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PollResponse>>, AppError> {
    let polls = state.polls.list_by_creator(&user).await?;
    Ok(Json(polls.iter().map(PollResponse::from).collect()))
}

pub async fn my_votes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<VoteResponse>>, AppError> {
    let votes = state.ledger.votes_by_user(&user).await?;
    Ok(Json(votes.iter().map(VoteResponse::from).collect()))
}

/// Polls created by `username` that the caller is allowed to see
pub async fn user_polls(
    State(state): State<AppState>,
    MaybeUser(requester): MaybeUser,
    AppPath(username): AppPath<String>,
) -> Result<Json<Vec<PollResponse>>, AppError> {
    let creator = state.identity.find_by_username(&username).await?;
    let polls = state.polls.list_by_creator(&creator).await?;

    Ok(Json(
        polls
            .iter()
            .filter(|p| policy::can_read(p, requester.as_ref()))
            .map(PollResponse::from)
            .collect(),
    ))
}

pub async fn create_poll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(request): AppJson<CreatePollRequest>,
) -> Result<(StatusCode, Json<PollResponse>), AppError> {
    let poll = state.polls.create_poll(request, &user).await?;
    Ok((StatusCode::CREATED, Json(PollResponse::from(&poll))))
}

pub async fn list_public_polls(
    State(state): State<AppState>,
) -> Result<Json<Vec<PollResponse>>, AppError> {
    let polls = state.polls.list_public().await?;
    Ok(Json(polls.iter().map(PollResponse::from).collect()))
}

pub async fn get_poll(
    State(state): State<AppState>,
    MaybeUser(requester): MaybeUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PollResponse>, AppError> {
    let poll = state.polls.get_poll(id).await?;
    policy::authorize(&poll, requester.as_ref(), Operation::Read)?;
    Ok(Json(PollResponse::from(&poll)))
}

/// Delete a poll as its creator (administrators are let through too)
pub async fn delete_poll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let poll = state.polls.get_poll(id).await?;
    policy::authorize(&poll, Some(&user), Operation::Delete)?;
    state.polls.delete_poll(id).await?;

    Ok(Json(json!({ "status": "Poll deleted" })))
}

/// Delete any poll, ownership is not checked (admin only)
pub async fn admin_delete_poll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    policy::require_admin(&user)?;
    state.polls.delete_poll(id).await?;

    info!("Administrator {} deleted poll {id}", user.username);
    Ok(Json(json!({ "status": "Poll deleted by administrator" })))
}

/// Vote for an option of a poll
pub async fn cast_vote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<VoteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let vote = state.ledger.cast_vote(id, request.option_id, &user).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "Vote recorded", "vote": vote })),
    ))
}

pub async fn poll_results(
    State(state): State<AppState>,
    MaybeUser(requester): MaybeUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PollResults>, AppError> {
    let poll = state.polls.get_poll(id).await?;
    policy::authorize(&poll, requester.as_ref(), Operation::ReadResults)?;
    Ok(Json(results::aggregate(&poll, &state.ledger).await?))
}

/// Individual ballots of a poll, visible wherever its results are
pub async fn poll_votes(
    State(state): State<AppState>,
    MaybeUser(requester): MaybeUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Vec<VoteResponse>>, AppError> {
    let poll = state.polls.get_poll(id).await?;
    policy::authorize(&poll, requester.as_ref(), Operation::ReadResults)?;

    let votes = state.ledger.votes_by_poll(poll.id).await?;
    Ok(Json(votes.iter().map(VoteResponse::from).collect()))
}
