// src/store/memory.rs
use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Store, StoreError, EMAIL_UNIQUE_CONSTRAINT, USERNAME_UNIQUE_CONSTRAINT,
    VOTE_UNIQUE_CONSTRAINT,
};
use crate::models::{NewPoll, NewUser, NewVote, Poll, PollOption, User, Vote, VoteDetail};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    polls: Vec<Poll>,
    votes: Vec<Vote>,
    // (user_id, poll_id)
    ballots: HashSet<(Uuid, Uuid)>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn poll(&self, id: Uuid) -> Option<&Poll> {
        self.polls.iter().find(|p| p.id == id)
    }

    fn detail(&self, vote: &Vote) -> Option<VoteDetail> {
        let poll = self.poll(vote.poll_id)?;
        let option = poll.option(vote.option_id)?;

        Some(VoteDetail {
            vote: vote.clone(),
            poll_title: poll.title.clone(),
            option_text: option.text.clone(),
        })
    }
}

/// Case-insensitive match, non-ASCII letters included.
fn same_folded(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Process-local store. All writes happen under one lock, so each
/// constraint check and the write it guards are a single atomic step.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .iter()
            .any(|u| same_folded(&u.username, &user.username))
        {
            return Err(StoreError::Duplicate {
                constraint: USERNAME_UNIQUE_CONSTRAINT.to_string(),
            });
        }
        if tables
            .users
            .iter()
            .any(|u| same_folded(&u.email, &user.email))
        {
            return Err(StoreError::Duplicate {
                constraint: EMAIL_UNIQUE_CONSTRAINT.to_string(),
            });
        }

        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            registered_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| same_folded(&u.username, username))
            .cloned())
    }

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().any(|u| same_folded(&u.email, email)))
    }

    async fn insert_poll(&self, poll: NewPoll, creator: &User) -> Result<Poll, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.user(creator.id).is_none() {
            return Err(StoreError::ForeignKey(format!(
                "polls.created_by references missing user {}",
                creator.id
            )));
        }

        let id = Uuid::new_v4();
        let options = poll
            .options
            .into_iter()
            .map(|text| PollOption {
                id: Uuid::new_v4(),
                poll_id: id,
                text,
            })
            .collect();

        let poll = Poll {
            id,
            title: poll.title,
            description: poll.description,
            visibility: poll.visibility,
            created_at: Utc::now(),
            created_by: creator.id,
            creator_username: creator.username.clone(),
            options,
        };
        tables.polls.push(poll.clone());
        Ok(poll)
    }

    async fn poll_by_id(&self, id: Uuid) -> Result<Option<Poll>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.poll(id).cloned())
    }

    async fn public_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .polls
            .iter()
            .rev()
            .filter(|p| p.is_public())
            .cloned()
            .collect())
    }

    async fn polls_by_creator(&self, user_id: Uuid) -> Result<Vec<Poll>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .polls
            .iter()
            .rev()
            .filter(|p| p.created_by == user_id)
            .cloned()
            .collect())
    }

    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let before = tables.polls.len();
        tables.polls.retain(|p| p.id != id);
        if tables.polls.len() == before {
            return Ok(false);
        }

        // Cascade: options went with the poll, votes and ballots follow.
        tables.votes.retain(|v| v.poll_id != id);
        tables.ballots.retain(|(_, poll_id)| *poll_id != id);
        Ok(true)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(poll) = tables.poll(vote.poll_id) else {
            return Err(StoreError::ForeignKey(format!(
                "votes.poll_id references missing poll {}",
                vote.poll_id
            )));
        };
        if poll.option(vote.option_id).is_none() {
            return Err(StoreError::ForeignKey(format!(
                "votes.(option_id, poll_id) references missing option {} of poll {}",
                vote.option_id, vote.poll_id
            )));
        }
        if tables.user(vote.user_id).is_none() {
            return Err(StoreError::ForeignKey(format!(
                "votes.user_id references missing user {}",
                vote.user_id
            )));
        }

        if !tables.ballots.insert((vote.user_id, vote.poll_id)) {
            return Err(StoreError::Duplicate {
                constraint: VOTE_UNIQUE_CONSTRAINT.to_string(),
            });
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            user_id: vote.user_id,
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            voted_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        Ok(vote)
    }

    async fn count_votes_for_option(&self, option_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .filter(|v| v.option_id == option_id)
            .count() as i64)
    }

    async fn votes_by_user(&self, user_id: Uuid) -> Result<Vec<VoteDetail>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .rev()
            .filter(|v| v.user_id == user_id)
            .filter_map(|v| tables.detail(v))
            .collect())
    }

    async fn votes_by_poll(&self, poll_id: Uuid) -> Result<Vec<VoteDetail>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .votes
            .iter()
            .rev()
            .filter(|v| v.poll_id == poll_id)
            .filter_map(|v| tables.detail(v))
            .collect())
    }
}
