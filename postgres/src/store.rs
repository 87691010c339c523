//! [`ConferenceStore`] over a `PostgreSQL` connection pool.

use crate::query::conference_query;
use crate::rows::{
    CONFERENCE_COLUMNS, ConferenceRow, ProfileRow, SESSION_COLUMNS, SessionRow, SpeakerRow,
    decode_all, to_i32, version_to_i64,
};
use conference_core::error::StoreError;
use conference_core::query::QueryPlan;
use conference_core::store::{ConferenceStore, Record, StoreFuture, Write, WriteSet};
use conference_core::types::{
    Conference, ConferenceId, Profile, ProfileId, Session, SessionId, Speaker, SpeakerId,
    TypeOfSession,
};
use conference_core::version::{ExpectedVersion, Versioned};
use chrono::NaiveTime;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::time::Instant;
use uuid::Uuid;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Default size of the connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed conference store.
///
/// Every record carries a `version` column. [`commit`](ConferenceStore::commit)
/// applies a whole [`WriteSet`] in one transaction: inserts use
/// `ON CONFLICT DO NOTHING`, updates are guarded by `WHERE version = $n`, and
/// a write that touches no row rolls the transaction back with
/// [`StoreError::WriteConflict`].
///
/// # Example
///
/// ```no_run
/// use conference_postgres::PostgresStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresStore::connect("postgres://localhost/conference", 10).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Use an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create or upgrade the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    async fn fetch_conferences(
        &self,
        mut query: QueryBuilder<'static, Postgres>,
    ) -> Result<Vec<Conference>, StoreError> {
        let rows: Vec<ConferenceRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(database)?;
        decode_all(rows)
    }

    async fn fetch_sessions(
        &self,
        mut query: QueryBuilder<'static, Postgres>,
    ) -> Result<Vec<Session>, StoreError> {
        let rows: Vec<SessionRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(database)?;
        decode_all(rows)
    }

    async fn apply(&self, writes: WriteSet) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(database)?;

        for write in writes {
            let key = write.record.key().to_string();
            if !apply_write(&mut *tx, write).await? {
                tracing::debug!(key = %key, "Write conflict, rolling back");
                metrics::counter!("conference_store_write_conflicts_total").increment(1);
                return Err(StoreError::WriteConflict { key });
            }
        }

        tx.commit().await.map_err(database)
    }
}

fn database(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

fn select(columns: &str, table: &str) -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!("SELECT {columns} FROM {table}"))
}

/// Bind the expected version for an update; inserts take no guard.
fn guarded(query: PgQuery<'static>, current: Option<i64>) -> PgQuery<'static> {
    match current {
        Some(version) => query.bind(version),
        None => query,
    }
}

/// Apply one write; `false` means its version expectation did not hold.
async fn apply_write(conn: &mut PgConnection, write: Write) -> Result<bool, StoreError> {
    let Write { record, expected } = write;
    let next = version_to_i64(expected.next())?;
    let current = match expected {
        ExpectedVersion::Absent => None,
        ExpectedVersion::Exact(version) => Some(version_to_i64(version)?),
    };

    let result = match record {
        Record::Conference(c) => {
            let query = match current {
                None => sqlx::query(
                    "INSERT INTO conferences (id, organizer, name, description, city, topics, \
                     start_date, end_date, month, max_attendees, seats_available, version) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                     ON CONFLICT (id) DO NOTHING",
                ),
                Some(_) => sqlx::query(
                    "UPDATE conferences SET organizer = $2, name = $3, description = $4, \
                     city = $5, topics = $6, start_date = $7, end_date = $8, month = $9, \
                     max_attendees = $10, seats_available = $11, version = $12 \
                     WHERE id = $1 AND version = $13",
                ),
            };
            let query = query
                .bind(*c.id.as_uuid())
                .bind(c.organizer.as_str().to_string())
                .bind(c.name)
                .bind(c.description)
                .bind(c.city)
                .bind(c.topics)
                .bind(c.start_date)
                .bind(c.end_date)
                .bind(to_i32(c.month, "month")?)
                .bind(to_i32(c.max_attendees, "max_attendees")?)
                .bind(to_i32(c.seats_available, "seats_available")?)
                .bind(next);
            guarded(query, current).execute(&mut *conn).await
        }
        Record::Session(s) => {
            let query = match current {
                None => sqlx::query(
                    "INSERT INTO sessions (id, conference_id, name, highlights, speakers, \
                     duration_minutes, type_of_session, date, start_time, location, version) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                     ON CONFLICT (id) DO NOTHING",
                ),
                Some(_) => sqlx::query(
                    "UPDATE sessions SET conference_id = $2, name = $3, highlights = $4, \
                     speakers = $5, duration_minutes = $6, type_of_session = $7, date = $8, \
                     start_time = $9, location = $10, version = $11 \
                     WHERE id = $1 AND version = $12",
                ),
            };
            let speakers: Vec<String> =
                s.speakers.iter().map(|id| id.as_str().to_string()).collect();
            let query = query
                .bind(*s.id.as_uuid())
                .bind(*s.conference_id.as_uuid())
                .bind(s.name)
                .bind(s.highlights)
                .bind(speakers)
                .bind(to_i32(s.duration_minutes, "duration_minutes")?)
                .bind(s.type_of_session.as_str())
                .bind(s.date)
                .bind(s.start_time)
                .bind(s.location)
                .bind(next);
            guarded(query, current).execute(&mut *conn).await
        }
        Record::Profile(p) => {
            let query = match current {
                None => sqlx::query(
                    "INSERT INTO profiles (id, display_name, main_email, tee_shirt_size, \
                     conferences_to_attend, sessions_on_wishlist, version) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7) \
                     ON CONFLICT (id) DO NOTHING",
                ),
                Some(_) => sqlx::query(
                    "UPDATE profiles SET display_name = $2, main_email = $3, \
                     tee_shirt_size = $4, conferences_to_attend = $5, \
                     sessions_on_wishlist = $6, version = $7 \
                     WHERE id = $1 AND version = $8",
                ),
            };
            let attending: Vec<Uuid> =
                p.conferences_to_attend.iter().map(|id| *id.as_uuid()).collect();
            let wishlist: Vec<Uuid> =
                p.sessions_on_wishlist.iter().map(|id| *id.as_uuid()).collect();
            let query = query
                .bind(p.id.as_str().to_string())
                .bind(p.display_name)
                .bind(p.main_email)
                .bind(p.tee_shirt_size.as_str())
                .bind(attending)
                .bind(wishlist)
                .bind(next);
            guarded(query, current).execute(&mut *conn).await
        }
    };

    Ok(result.map_err(database)?.rows_affected() == 1)
}

impl ConferenceStore for PostgresStore {
    fn conference(&self, id: ConferenceId) -> StoreFuture<'_, Option<Versioned<Conference>>> {
        Box::pin(async move {
            let row: Option<ConferenceRow> = sqlx::query_as(&format!(
                "SELECT {CONFERENCE_COLUMNS} FROM conferences WHERE id = $1"
            ))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database)?;
            row.map(Versioned::try_from).transpose()
        })
    }

    fn conferences(&self) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let mut query = select(CONFERENCE_COLUMNS, "conferences");
            query.push(r#" ORDER BY name COLLATE "C", id"#);
            self.fetch_conferences(query).await
        })
    }

    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let mut query = select(CONFERENCE_COLUMNS, "conferences");
            query.push(" WHERE organizer = ");
            query.push_bind(organizer.as_str().to_string());
            query.push(r#" ORDER BY name COLLATE "C", id"#);
            self.fetch_conferences(query).await
        })
    }

    fn query_conferences(&self, plan: QueryPlan) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let started = Instant::now();
            let conferences = self.fetch_conferences(conference_query(&plan)).await?;
            metrics::histogram!("conference_store_query_duration_seconds")
                .record(started.elapsed().as_secs_f64());
            tracing::debug!(
                predicates = plan.predicates().len(),
                results = conferences.len(),
                "Queried conferences"
            );
            Ok(conferences)
        })
    }

    fn session(&self, id: SessionId) -> StoreFuture<'_, Option<Versioned<Session>>> {
        Box::pin(async move {
            let row: Option<SessionRow> = sqlx::query_as(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
            ))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(database)?;
            row.map(Versioned::try_from).transpose()
        })
    }

    fn sessions_of(&self, conference: ConferenceId) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            let mut query = select(SESSION_COLUMNS, "sessions");
            query.push(" WHERE conference_id = ");
            query.push_bind(*conference.as_uuid());
            query.push(r#" ORDER BY name COLLATE "C", id"#);
            self.fetch_sessions(query).await
        })
    }

    fn sessions_by_speaker(&self, speaker: SpeakerId) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            let mut query = select(SESSION_COLUMNS, "sessions");
            query.push(" WHERE speakers @> ARRAY[");
            query.push_bind(speaker.as_str().to_string());
            query.push(r#"]::TEXT[] ORDER BY name COLLATE "C", id"#);
            self.fetch_sessions(query).await
        })
    }

    fn sessions_of_types_starting_by(
        &self,
        types: Vec<TypeOfSession>,
        latest_start: NaiveTime,
    ) -> StoreFuture<'_, Vec<Session>> {
        Box::pin(async move {
            let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            let mut query = select(SESSION_COLUMNS, "sessions");
            query.push(" WHERE type_of_session = ANY(");
            query.push_bind(types);
            query.push(") AND start_time <= ");
            query.push_bind(latest_start);
            query.push(r#" ORDER BY name COLLATE "C", id"#);
            self.fetch_sessions(query).await
        })
    }

    fn profile(&self, id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>> {
        Box::pin(async move {
            let row: Option<ProfileRow> = sqlx::query_as(
                "SELECT id, display_name, main_email, tee_shirt_size, conferences_to_attend, \
                 sessions_on_wishlist, version FROM profiles WHERE id = $1",
            )
            .bind(id.as_str().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(database)?;
            row.map(Versioned::try_from).transpose()
        })
    }

    fn speaker(&self, id: SpeakerId) -> StoreFuture<'_, Option<Speaker>> {
        Box::pin(async move {
            let row: Option<SpeakerRow> =
                sqlx::query_as("SELECT id, name FROM speakers WHERE id = $1")
                    .bind(id.as_str().to_string())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(database)?;
            Ok(row.map(Speaker::from))
        })
    }

    fn speakers(&self, ids: Vec<SpeakerId>) -> StoreFuture<'_, Vec<Speaker>> {
        Box::pin(async move {
            let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
            let rows: Vec<SpeakerRow> = sqlx::query_as(
                r#"SELECT id, name FROM speakers WHERE id = ANY($1) ORDER BY id COLLATE "C""#,
            )
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(database)?;
            Ok(rows.into_iter().map(Speaker::from).collect())
        })
    }

    fn get_or_insert_speaker(&self, speaker: Speaker) -> StoreFuture<'_, Speaker> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO speakers (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(speaker.id.as_str().to_string())
            .bind(&speaker.name)
            .execute(&self.pool)
            .await
            .map_err(database)?;

            let row: SpeakerRow = sqlx::query_as("SELECT id, name FROM speakers WHERE id = $1")
                .bind(speaker.id.as_str().to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(database)?;
            Ok(Speaker::from(row))
        })
    }

    fn commit(&self, writes: WriteSet) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if writes.is_empty() {
                return Ok(());
            }
            self.apply(writes).await
        })
    }
}
