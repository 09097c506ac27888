// src/poll.rs
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CreatePollRequest, NewPoll, Poll, User, Visibility};
use crate::store::Store;

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_OPTION_LEN: usize = 200;

/// Checks a create-poll payload and normalises its text.
pub fn validate(request: CreatePollRequest) -> Result<NewPoll, AppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title must not be blank".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }

    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
    {
        return Err(AppError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    if request.options.is_empty() {
        return Err(AppError::Validation("a poll needs at least one option".into()));
    }

    let mut options = Vec::with_capacity(request.options.len());
    for (i, option) in request.options.into_iter().enumerate() {
        let text = option.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation(format!("option {} must not be blank", i + 1)));
        }
        if text.chars().count() > MAX_OPTION_LEN {
            return Err(AppError::Validation(format!(
                "option {} must be at most {MAX_OPTION_LEN} characters",
                i + 1
            )));
        }
        options.push(text.to_string());
    }

    Ok(NewPoll {
        title: title.to_string(),
        description,
        visibility: Visibility::from_public_flag(request.is_public),
        options,
    })
}

pub struct PollService {
    store: Arc<dyn Store>,
}

impl PollService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create_poll(
        &self,
        request: CreatePollRequest,
        creator: &User,
    ) -> Result<Poll, AppError> {
        let new_poll = validate(request)?;
        let poll = self.store.insert_poll(new_poll, creator).await?;

        info!(
            "{} created poll {} with {} options",
            creator.username,
            poll.id,
            poll.options.len()
        );
        Ok(poll)
    }

    pub async fn get_poll(&self, id: Uuid) -> Result<Poll, AppError> {
        self.store
            .poll_by_id(id)
            .await?
            .ok_or(AppError::NotFound("poll"))
    }

    pub async fn list_public(&self) -> Result<Vec<Poll>, AppError> {
        Ok(self.store.public_polls().await?)
    }

    pub async fn list_by_creator(&self, creator: &User) -> Result<Vec<Poll>, AppError> {
        Ok(self.store.polls_by_creator(creator.id).await?)
    }

    /// Removes the poll with its options and votes.
    pub async fn delete_poll(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_poll(id).await? {
            warn!("Delete requested for missing poll {id}");
            return Err(AppError::NotFound("poll"));
        }

        info!("Deleted poll {id}");
        Ok(())
    }
}
