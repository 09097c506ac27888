// src/ledger.rs
//! The vote ledger.
//!
//! A user holds at most one vote per poll. The guard is the store's unique
//! (user, poll) constraint: the insert itself either lands or is rejected, and
//! a rejection surfaces as [`AppError::AlreadyVoted`]. There is no read-then-
//! write check, so two concurrent ballots from the same user cannot both land.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewVote, PollOption, User, Vote, VoteDetail};
use crate::store::{Store, StoreError, VOTE_UNIQUE_CONSTRAINT};

pub struct VoteLedger {
    store: Arc<dyn Store>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        option_id: Uuid,
        voter: &User,
    ) -> Result<Vote, AppError> {
        let poll = self
            .store
            .poll_by_id(poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;

        // Only options of this poll count; an id from another poll is unknown here.
        if poll.option(option_id).is_none() {
            warn!("{} picked option {option_id} outside poll {poll_id}", voter.username);
            return Err(AppError::NotFound("option"));
        }

        let vote = self
            .store
            .insert_vote(NewVote {
                user_id: voter.id,
                poll_id,
                option_id,
            })
            .await
            .map_err(|e| match e {
                e if e.is_duplicate(VOTE_UNIQUE_CONSTRAINT) => {
                    warn!("{} tried to vote twice on poll {poll_id}", voter.username);
                    AppError::AlreadyVoted
                }
                // The poll was deleted between lookup and insert.
                StoreError::ForeignKey(_) => AppError::NotFound("poll"),
                e => AppError::Storage(e),
            })?;

        info!("{} voted on poll {poll_id}", voter.username);
        Ok(vote)
    }

    /// Counts the persisted votes for an option. Never cached.
    pub async fn tally_by_option(&self, option: &PollOption) -> Result<i64, AppError> {
        Ok(self.store.count_votes_for_option(option.id).await?)
    }

    pub async fn votes_by_user(&self, user: &User) -> Result<Vec<VoteDetail>, AppError> {
        Ok(self.store.votes_by_user(user.id).await?)
    }

    pub async fn votes_by_poll(&self, poll_id: Uuid) -> Result<Vec<VoteDetail>, AppError> {
        Ok(self.store.votes_by_poll(poll_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPoll, NewUser, Poll, Role, Visibility};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: VoteLedger,
        alice: User,
    }

    async fn insert_user(store: &MemoryStore, name: &str) -> User {
        store
            .insert_user(NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: String::new(),
                role: Role::User,
            })
            .await
            .unwrap()
    }

    impl Fixture {
        async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let alice = insert_user(&store, "alice").await;
            Self {
                ledger: VoteLedger::new(store.clone()),
                store,
                alice,
            }
        }

        async fn user(&self, name: &str) -> User {
            insert_user(&self.store, name).await
        }

        async fn poll(&self, options: &[&str]) -> Poll {
            self.store
                .insert_poll(
                    NewPoll {
                        title: "Lunch?".to_string(),
                        description: None,
                        visibility: Visibility::Public,
                        options: options.iter().map(|o| o.to_string()).collect(),
                    },
                    &self.alice,
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn second_vote_conflicts_for_any_option() {
        let f = Fixture::new().await;
        let bob = f.user("bob").await;
        let poll = f.poll(&["Pizza", "Salad"]).await;

        f.ledger
            .cast_vote(poll.id, poll.options[0].id, &bob)
            .await
            .unwrap();

        for option in &poll.options {
            let err = f.ledger.cast_vote(poll.id, option.id, &bob).await.unwrap_err();
            assert!(matches!(err, AppError::AlreadyVoted));
        }

        assert_eq!(f.ledger.tally_by_option(&poll.options[0]).await.unwrap(), 1);
        assert_eq!(f.ledger.tally_by_option(&poll.options[1]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_poll_is_not_found() {
        let f = Fixture::new().await;
        let err = f
            .ledger
            .cast_vote(Uuid::new_v4(), Uuid::new_v4(), &f.alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("poll")));
    }

    #[tokio::test]
    async fn option_from_another_poll_is_not_found() {
        let f = Fixture::new().await;
        let lunch = f.poll(&["Pizza"]).await;
        let dinner = f.poll(&["Soup"]).await;

        let err = f
            .ledger
            .cast_vote(lunch.id, dinner.options[0].id, &f.alice)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("option")));
        assert_eq!(f.ledger.tally_by_option(&dinner.options[0]).await.unwrap(), 0);
        assert!(f.ledger.votes_by_user(&f.alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_ballots_land_exactly_once() {
        let f = Fixture::new().await;
        let bob = f.user("bob").await;
        let poll = f.poll(&["Pizza", "Salad"]).await;
        let ledger = Arc::new(f.ledger);

        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = ledger.clone();
            let bob = bob.clone();
            let option_id = poll.options[i % 2].id;
            let poll_id = poll.id;
            handles.push(tokio::spawn(async move {
                ledger.cast_vote(poll_id, option_id, &bob).await
            }));
        }

        let mut landed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => landed += 1,
                Err(AppError::AlreadyVoted) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(landed, 1);

        let total = ledger.tally_by_option(&poll.options[0]).await.unwrap()
            + ledger.tally_by_option(&poll.options[1]).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn history_views_carry_labels() {
        let f = Fixture::new().await;
        let bob = f.user("bob").await;
        let carol = f.user("carol").await;
        let poll = f.poll(&["Pizza", "Salad"]).await;

        f.ledger.cast_vote(poll.id, poll.options[0].id, &bob).await.unwrap();
        f.ledger.cast_vote(poll.id, poll.options[1].id, &carol).await.unwrap();

        let bobs = f.ledger.votes_by_user(&bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].poll_title, "Lunch?");
        assert_eq!(bobs[0].option_text, "Pizza");
        assert_eq!(bobs[0].vote.user_id, bob.id);

        let all = f.ledger.votes_by_poll(poll.id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|d| d.vote.user_id == carol.id && d.option_text == "Salad"));
    }
}
