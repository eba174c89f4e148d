use crate::db::BallotStore;
use crate::error::{VoteError, VoteResult};
use crate::models::{Ballot, Poll};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite,
};
use uuid::Uuid;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_url` and make sure the schema exists.
    pub async fn connect(db_url: &str) -> VoteResult<Self> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // An in-memory database lives and dies with its one connection
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> VoteResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                created_by TEXT NOT NULL,
                short_description TEXT NOT NULL,
                long_description TEXT NOT NULL,
                vote_type TEXT NOT NULL,
                options TEXT NOT NULL,
                open BOOLEAN NOT NULL DEFAULT TRUE,
                hidden BOOLEAN NOT NULL DEFAULT FALSE,
                allow_write_ins BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                ballot TEXT NOT NULL,
                cast_at TEXT NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                poll_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                PRIMARY KEY (poll_id, voter_id),
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn poll_exists(&self, poll_id: &str) -> VoteResult<bool> {
        Ok(sqlx::query("SELECT 1 FROM polls WHERE id = ?")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some())
    }
}

fn poll_from_row(row: &SqliteRow) -> VoteResult<Poll> {
    let options: Vec<String> = serde_json::from_str(&row.get::<String, _>("options"))?;
    let created_at_str = row.get::<String, _>("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc);

    Ok(Poll {
        id: row.get("id"),
        created_by: row.get("created_by"),
        short_description: row.get("short_description"),
        long_description: row.get("long_description"),
        vote_type: row.get("vote_type"),
        options,
        open: row.get::<bool, _>("open"),
        hidden: row.get::<bool, _>("hidden"),
        allow_write_ins: row.get::<bool, _>("allow_write_ins"),
        created_at,
    })
}

#[async_trait]
impl BallotStore for SqliteStore {
    async fn create_poll(&self, poll: &Poll) -> VoteResult<()> {
        sqlx::query(
            r#"
            INSERT INTO polls (id, created_by, short_description, long_description, vote_type, options, open, hidden, allow_write_ins, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(&poll.created_by)
        .bind(&poll.short_description)
        .bind(&poll.long_description)
        .bind(&poll.vote_type)
        .bind(serde_json::to_string(&poll.options)?)
        .bind(poll.open)
        .bind(poll.hidden)
        .bind(poll.allow_write_ins)
        .bind(poll.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_poll(&self, poll_id: &str) -> VoteResult<Poll> {
        let row = sqlx::query(
            r#"
            SELECT id, created_by, short_description, long_description, vote_type, options, open, hidden, allow_write_ins, created_at
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VoteError::PollNotFound(poll_id.to_string()))?;

        poll_from_row(&row)
    }

    async fn fetch_ballots(&self, poll_id: &str) -> VoteResult<Vec<Ballot>> {
        if !self.poll_exists(poll_id).await? {
            return Err(VoteError::PollNotFound(poll_id.to_string()));
        }

        let rows = sqlx::query("SELECT ballot FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_all(&self.pool)
            .await?;

        let ballots = rows
            .iter()
            .map(|row| serde_json::from_str(&row.get::<String, _>("ballot")))
            .collect::<Result<Vec<Ballot>, _>>()?;

        Ok(ballots)
    }

    async fn has_voted(&self, poll_id: &str, voter: &str) -> VoteResult<bool> {
        Ok(
            sqlx::query("SELECT 1 FROM voters WHERE poll_id = ? AND voter_id = ?")
                .bind(poll_id)
                .bind(voter)
                .fetch_optional(&self.pool)
                .await?
                .is_some(),
        )
    }

    async fn record_ballot(&self, poll_id: &str, voter: &str, ballot: &Ballot) -> VoteResult<()> {
        if !self.poll_exists(poll_id).await? {
            return Err(VoteError::PollNotFound(poll_id.to_string()));
        }

        let encoded = serde_json::to_string(ballot)?;
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            INSERT INTO voters (poll_id, voter_id)
            VALUES (?, ?)
            ON CONFLICT(poll_id, voter_id) DO NOTHING
            "#,
        )
        .bind(poll_id)
        .bind(voter)
        .execute(&mut *tx)
        .await?;

        // Dropping the transaction rolls it back
        if marked.rows_affected() == 0 {
            return Err(VoteError::AlreadyVoted);
        }

        sqlx::query(
            r#"
            INSERT INTO ballots (id, poll_id, ballot, cast_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(poll_id)
        .bind(encoded)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn ballot_count(&self, poll_id: &str) -> VoteResult<usize> {
        if !self.poll_exists(poll_id).await? {
            return Err(VoteError::PollNotFound(poll_id.to_string()));
        }
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM ballots WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?
            .get("count");
        Ok(count as usize)
    }
}
