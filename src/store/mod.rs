// src/store/mod.rs
//! Durable store seam.
//!
//! Services hold an `Arc<dyn Store>` and never talk to a backend directly.
//! Every backend must enforce the same constraints the relational schema
//! declares: case-insensitive unique usernames and emails, one vote per
//! (user, poll), options belonging to their poll, and cascading deletes from
//! a poll to its options and votes.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPoll, NewUser, NewVote, Poll, User, Vote, VoteDetail};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const VOTE_UNIQUE_CONSTRAINT: &str = "votes_user_poll_key";
pub const USERNAME_UNIQUE_CONSTRAINT: &str = "users_username_lower_key";
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_lower_key";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    Duplicate { constraint: String },

    #[error("foreign key violated: {0}")]
    ForeignKey(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn is_duplicate(&self, name: &str) -> bool {
        matches!(self, StoreError::Duplicate { constraint } if constraint == name)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Case-insensitive lookup.
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError>;

    /// Persists the poll and all of its options, or nothing.
    async fn insert_poll(&self, poll: NewPoll, creator: &User) -> Result<Poll, StoreError>;

    async fn poll_by_id(&self, id: Uuid) -> Result<Option<Poll>, StoreError>;

    /// Newest first.
    async fn public_polls(&self) -> Result<Vec<Poll>, StoreError>;

    /// Newest first.
    async fn polls_by_creator(&self, user_id: Uuid) -> Result<Vec<Poll>, StoreError>;

    /// Returns `false` when no poll with that id existed.
    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::Duplicate`] on [`VOTE_UNIQUE_CONSTRAINT`]
    /// when the voter already has a vote on the poll.
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError>;

    async fn count_votes_for_option(&self, option_id: Uuid) -> Result<i64, StoreError>;

    async fn votes_by_user(&self, user_id: Uuid) -> Result<Vec<VoteDetail>, StoreError>;

    async fn votes_by_poll(&self, poll_id: Uuid) -> Result<Vec<VoteDetail>, StoreError>;
}
