// src/store/postgres.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{
    NewPoll, NewUser, NewVote, Poll, PollOption, User, Visibility, Vote, VoteDetail,
};

const POLL_COLUMNS: &str = r#"
    SELECT p.id, p.title, p.description, p.is_public, p.created_at, p.created_by,
           u.username AS creator_username
    FROM polls p
    JOIN users u ON u.id = p.created_by
"#;

const VOTE_DETAIL_COLUMNS: &str = r#"
    SELECT v.id, v.user_id, v.poll_id, v.option_id, v.voted_at,
           p.title AS poll_title, o.text AS option_text
    FROM votes v
    JOIN polls p ON p.id = v.poll_id
    JOIN options o ON o.id = v.option_id
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    registered_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(StoreError::Corrupt)?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            registered_at: row.registered_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    is_public: bool,
    created_at: DateTime<Utc>,
    created_by: Uuid,
    creator_username: String,
}

impl PollRow {
    fn into_poll(self, options: Vec<PollOption>) -> Poll {
        Poll {
            id: self.id,
            title: self.title,
            description: self.description,
            visibility: Visibility::from_public_flag(self.is_public),
            created_at: self.created_at,
            created_by: self.created_by,
            creator_username: self.creator_username,
            options,
        }
    }
}

/// Translates constraint rejections into [`StoreError`] variants the
/// services can match on.
fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                constraint: db.constraint().unwrap_or_default().to_string(),
            };
        }
        if db.is_foreign_key_violation() {
            return StoreError::ForeignKey(db.message().to_string());
        }
    }
    StoreError::Database(e)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads options for a batch of polls in one query and stitches them on.
    async fn with_options(&self, rows: Vec<PollRow>) -> Result<Vec<Poll>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT id, poll_id, text FROM options WHERE poll_id = ANY($1) ORDER BY poll_id, position",
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
        for option in options {
            by_poll.entry(option.poll_id).or_default().push(option);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let options = by_poll.remove(&row.id).unwrap_or_default();
                row.into_poll(options)
            })
            .collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, role, registered_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        row.try_into()
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, role, registered_at
            FROM users
            WHERE lower(username) = lower($1)
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn insert_poll(&self, poll: NewPoll, creator: &User) -> Result<Poll, StoreError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO polls (id, title, description, is_public, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(poll.visibility.is_public())
        .bind(creator.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let mut options = Vec::with_capacity(poll.options.len());
        for (position, text) in poll.options.into_iter().enumerate() {
            let option_id = Uuid::new_v4();
            sqlx::query("INSERT INTO options (id, poll_id, text, position) VALUES ($1, $2, $3, $4)")
                .bind(option_id)
                .bind(id)
                .bind(&text)
                .bind(position as i32)
                .execute(&mut *tx)
                .await
                .map_err(map_db_err)?;

            options.push(PollOption {
                id: option_id,
                poll_id: id,
                text,
            });
        }

        tx.commit().await?;

        Ok(Poll {
            id,
            title: poll.title,
            description: poll.description,
            visibility: poll.visibility,
            created_at,
            created_by: creator.id,
            creator_username: creator.username.clone(),
            options,
        })
    }

    async fn poll_by_id(&self, id: Uuid) -> Result<Option<Poll>, StoreError> {
        let row = sqlx::query_as::<_, PollRow>(&format!("{POLL_COLUMNS} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.with_options(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn public_polls(&self) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(&format!(
            "{POLL_COLUMNS} WHERE p.is_public ORDER BY p.created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.with_options(rows).await
    }

    async fn polls_by_creator(&self, user_id: Uuid) -> Result<Vec<Poll>, StoreError> {
        let rows = sqlx::query_as::<_, PollRow>(&format!(
            "{POLL_COLUMNS} WHERE p.created_by = $1 ORDER BY p.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_options(rows).await
    }

    async fn delete_poll(&self, id: Uuid) -> Result<bool, StoreError> {
        // options and votes go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, StoreError> {
        sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (id, user_id, poll_id, option_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, poll_id, option_id, voted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vote.user_id)
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn count_votes_for_option(&self, option_id: Uuid) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE option_id = $1")
            .bind(option_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn votes_by_user(&self, user_id: Uuid) -> Result<Vec<VoteDetail>, StoreError> {
        let votes = sqlx::query_as::<_, VoteDetail>(&format!(
            "{VOTE_DETAIL_COLUMNS} WHERE v.user_id = $1 ORDER BY v.voted_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }

    async fn votes_by_poll(&self, poll_id: Uuid) -> Result<Vec<VoteDetail>, StoreError> {
        let votes = sqlx::query_as::<_, VoteDetail>(&format!(
            "{VOTE_DETAIL_COLUMNS} WHERE v.poll_id = $1 ORDER BY v.voted_at DESC"
        ))
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(votes)
    }
}
