//! Hosted history backed by PostgreSQL.
//!
//! `plants` holds one row per identification, `care_info` one row per care
//! tip. Every query is scoped to the user the session reports at call time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{HistoryRef, HistoryStore, RemoveOutcome};
use crate::error::{LeafError, Result};
use crate::model::Identification;
use crate::session::{SessionGate, User};

/// Row of the `plants` table.
#[derive(Debug, Clone, FromRow)]
pub struct PlantRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plant_name: String,
    pub scientific_name: String,
    pub confidence: f64,
    pub description: Option<String>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Row of the `care_info` table.
#[derive(Debug, Clone, FromRow)]
pub struct CareInfoRow {
    pub id: i64,
    pub plant_id: Uuid,
    pub info: String,
}

/// Repository for plant and care-tip rows
#[derive(Clone)]
pub struct PlantRepository {
    pool: PgPool,
}

impl PlantRepository {
    /// Create a pool that opens connections on first use.
    ///
    /// `acquire_timeout` bounds how long any query waits for a connection.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)
            .map_err(|e| LeafError::Config(format!("invalid DATABASE_URL: {e}")))?;

        debug!("PostgreSQL pool created");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub async fn insert_plant(&self, user_id: Uuid, record: &Identification) -> Result<PlantRow> {
        let id = Uuid::parse_str(&record.id).map_err(|_| {
            LeafError::Persistence(format!("record id '{}' is not a UUID", record.id))
        })?;

        let row = sqlx::query_as::<_, PlantRow>(
            r#"
            INSERT INTO plants (
                id, user_id, plant_name, scientific_name,
                confidence, description, image_url, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&record.plant_name)
        .bind(&record.scientific_name)
        .bind(record.confidence)
        .bind(&record.description)
        .bind(&record.image_url)
        .bind(record.timestamp)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert care tips in order.
    pub async fn insert_care_info(&self, plant_id: Uuid, tips: &[String]) -> Result<()> {
        if tips.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO care_info (plant_id, info)
            SELECT $1, tip FROM UNNEST($2::text[]) WITH ORDINALITY AS t(tip, n)
            ORDER BY n
            "#,
        )
        .bind(plant_id)
        .bind(tips)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A user's plants, newest first, optionally filtered by name.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: Option<&str>,
    ) -> Result<Vec<PlantRow>> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());

        let rows = sqlx::query_as::<_, PlantRow>(
            r#"
            SELECT * FROM plants
            WHERE user_id = $1
            AND (
                $2::text IS NULL
                OR POSITION(lower($2) IN lower(plant_name)) > 0
                OR POSITION(lower($2) IN lower(scientific_name)) > 0
            )
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(user_id)
        .bind(filter)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<PlantRow>> {
        let row = sqlx::query_as::<_, PlantRow>(
            r#"
            SELECT * FROM plants
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Care rows for the given plants, in insertion order.
    pub async fn care_for(&self, plant_ids: &[Uuid]) -> Result<Vec<CareInfoRow>> {
        if plant_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, CareInfoRow>(
            r#"
            SELECT * FROM care_info
            WHERE plant_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(plant_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Returns whether a row was deleted. Care rows go with it.
    pub async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM plants
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM plants WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn hydrated(&self, rows: Vec<PlantRow>) -> Result<Vec<Identification>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let care = self.care_for(&ids).await?;
        Ok(hydrate(rows, care))
    }
}

impl std::fmt::Debug for PlantRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlantRepository").finish_non_exhaustive()
    }
}

/// Join plant rows with their care rows, keeping plant order.
///
/// Plants without care rows come back with `care_info: None`.
pub fn hydrate(rows: Vec<PlantRow>, care: Vec<CareInfoRow>) -> Vec<Identification> {
    let mut tips: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in care {
        tips.entry(row.plant_id).or_default().push(row.info);
    }

    rows.into_iter()
        .map(|row| Identification {
            id: row.id.to_string(),
            care_info: tips.remove(&row.id),
            plant_name: row.plant_name,
            scientific_name: row.scientific_name,
            confidence: row.confidence,
            description: row.description,
            image_url: row.image_url,
            timestamp: row.created_at,
        })
        .collect()
}

/// [`HistoryStore`] over [`PlantRepository`], owned by the signed-in user.
///
/// Migrations run on the first signed-in call that reaches the database. A
/// failed run is retried on the next call.
pub struct HostedHistory {
    repo: PlantRepository,
    session: Arc<dyn SessionGate>,
    schema: OnceCell<()>,
}

impl HostedHistory {
    pub fn new(repo: PlantRepository, session: Arc<dyn SessionGate>) -> Self {
        Self {
            repo,
            session,
            schema: OnceCell::new(),
        }
    }

    pub fn repository(&self) -> &PlantRepository {
        &self.repo
    }

    async fn require_user(&self) -> Result<User> {
        self.session
            .current_user()
            .await
            .ok_or_else(|| LeafError::Unauthenticated("sign in to use the hosted history".into()))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| self.repo.migrate())
            .await?;
        Ok(())
    }

    async fn find(&self, user: &User, id: Uuid) -> Result<Option<Identification>> {
        self.ensure_schema().await?;
        match self.repo.find_for_user(id, user.id).await? {
            Some(row) => Ok(self.repo.hydrated(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl HistoryStore for HostedHistory {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>> {
        let Some(user) = self.session.current_user().await else {
            debug!("No session, hosted history is empty");
            return Ok(Vec::new());
        };

        if let Err(e) = self.ensure_schema().await {
            warn!(error = %e, user_id = %user.id, "Hosted history unavailable");
            return Ok(Vec::new());
        }

        let rows = match self.repo.list_for_user(user.id, filter).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "Failed to load hosted history");
                return Ok(Vec::new());
            }
        };

        match self.repo.hydrated(rows).await {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "Failed to load care info");
                Ok(Vec::new())
            }
        }
    }

    #[instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn append(&self, record: Identification) -> Result<()> {
        let user = self.require_user().await?;
        self.ensure_schema().await?;
        let row = self.repo.insert_plant(user.id, &record).await?;

        // The plant row stays even if its care tips fail to insert
        if let Err(e) = self.repo.insert_care_info(row.id, record.care_tips()).await {
            warn!(error = %e, plant_id = %row.id, "Failed to store care info");
        }

        debug!(user_id = %user.id, plant_id = %row.id, "Stored identification");
        Ok(())
    }

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome> {
        let user = self.require_user().await?;
        self.ensure_schema().await?;

        let id = match &target {
            HistoryRef::Id(id) => match Uuid::parse_str(id) {
                Ok(id) => Some(id),
                Err(_) => None,
            },
            HistoryRef::Index(i) => self
                .repo
                .list_for_user(user.id, None)
                .await?
                .get(*i)
                .map(|row| row.id),
        };

        let Some(id) = id else {
            debug!(target = %target, "Nothing to remove");
            return Ok(RemoveOutcome::NotFound);
        };

        if self.repo.delete_for_user(id, user.id).await? {
            debug!(user_id = %user.id, plant_id = %id, "Removed identification");
            Ok(RemoveOutcome::Removed)
        } else {
            Ok(RemoveOutcome::NotFound)
        }
    }

    async fn clear(&self) -> Result<()> {
        let user = self.require_user().await?;
        self.ensure_schema().await?;
        let removed = self.repo.delete_all_for_user(user.id).await?;
        info!(user_id = %user.id, removed, "Cleared hosted history");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Identification>> {
        let Some(user) = self.session.current_user().await else {
            return Ok(None);
        };
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        match self.find(&user, id).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(error = %e, user_id = %user.id, plant_id = %id, "Failed to load identification");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for HostedHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedHistory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;
    use chrono::TimeZone;

    fn plant(id: Uuid, name: &str, secs: i64) -> PlantRow {
        PlantRow {
            id,
            user_id: Uuid::nil(),
            plant_name: name.into(),
            scientific_name: format!("{name} sci"),
            confidence: 91.5,
            description: None,
            image_url: format!("https://cdn.example/{name}.jpg"),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn care(id: i64, plant_id: Uuid, info: &str) -> CareInfoRow {
        CareInfoRow {
            id,
            plant_id,
            info: info.into(),
        }
    }

    #[test]
    fn test_hydrate_groups_care_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![plant(b, "Pothos", 20), plant(a, "Monstera", 10)];
        let care_rows = vec![
            care(1, a, "Bright, indirect light"),
            care(2, b, "Water when dry"),
            care(3, a, "Water every 1-2 weeks"),
        ];

        let records = hydrate(rows, care_rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].plant_name, "Pothos");
        assert_eq!(records[0].id, b.to_string());
        assert_eq!(records[0].care_info, Some(vec!["Water when dry".to_string()]));
        assert_eq!(
            records[1].care_info,
            Some(vec![
                "Bright, indirect light".to_string(),
                "Water every 1-2 weeks".to_string()
            ])
        );
        assert_eq!(records[1].timestamp, Utc.timestamp_opt(10, 0).unwrap());
    }

    #[test]
    fn test_hydrate_without_care_is_none() {
        let a = Uuid::new_v4();
        let records = hydrate(vec![plant(a, "Fern", 1)], Vec::new());
        assert_eq!(records[0].care_info, None);
        assert!(records[0].care_tips().is_empty());
    }

    #[test]
    fn test_hydrate_ignores_orphan_care() {
        let records = hydrate(Vec::new(), vec![care(1, Uuid::new_v4(), "lost")]);
        assert!(records.is_empty());
    }

    // Nothing listens on port 1, so every connection attempt fails fast.
    const UNREACHABLE_DB: &str = "postgres://leafid@127.0.0.1:1/leafid";

    fn unreachable_history(session: MemorySession) -> HostedHistory {
        let repo =
            PlantRepository::connect_lazy(UNREACHABLE_DB, 1, Duration::from_millis(200)).unwrap();
        HostedHistory::new(repo, Arc::new(session))
    }

    fn signed_in() -> MemorySession {
        MemorySession::signed_in(User {
            id: Uuid::new_v4(),
            email: Some("fern@example.com".into()),
        })
    }

    fn record() -> Identification {
        let id = Uuid::new_v4();
        hydrate(vec![plant(id, "Fern", 1)], vec![care(1, id, "Keep moist")])
            .pop()
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_lazy_rejects_bad_url() {
        let result = PlantRepository::connect_lazy("not a url", 1, Duration::from_secs(1));
        assert!(matches!(result, Err(LeafError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_degrades_to_empty_when_database_is_down() {
        let history = unreachable_history(signed_in());
        assert_eq!(history.list(None).await.unwrap(), Vec::new());
        assert_eq!(history.list(Some("fern")).await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_get_degrades_to_none_when_database_is_down() {
        let history = unreachable_history(signed_in());
        let id = Uuid::new_v4().to_string();
        assert_eq!(history.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_surface_persistence_errors_when_database_is_down() {
        let history = unreachable_history(signed_in());

        assert!(matches!(
            history.append(record()).await,
            Err(LeafError::Persistence(_))
        ));
        assert!(matches!(
            history.remove(HistoryRef::Index(0)).await,
            Err(LeafError::Persistence(_))
        ));
        assert!(matches!(history.clear().await, Err(LeafError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_signed_out_never_reaches_database() {
        let history = unreachable_history(MemorySession::new());

        assert!(history.list(None).await.unwrap().is_empty());
        assert_eq!(history.get(&Uuid::new_v4().to_string()).await.unwrap(), None);
        assert!(matches!(
            history.append(record()).await,
            Err(LeafError::Unauthenticated(_))
        ));
        assert!(matches!(
            history.clear().await,
            Err(LeafError::Unauthenticated(_))
        ));
    }
}
