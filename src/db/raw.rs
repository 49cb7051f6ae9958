//! Raw-event store (component B as seen by E/F): one table per event kind,
//! append-only, queried through filtered paginated reads served by the F
//! RPC surface.

use crate::schemas::events::{ClickEvent, CustomEvent, ErrorEvent, PageViewEvent, PerformanceEvent, Severity};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;
use uuid::Uuid;

pub struct RawStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn or_default_limit(self) -> Self {
        if self.limit <= 0 {
            Self { limit: 100, offset: self.offset.max(0) }
        } else {
            Self { limit: self.limit, offset: self.offset.max(0) }
        }
    }
}

pub struct PageViewRow {
    pub id: Uuid,
    pub project_id: String,
    pub page: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub referrer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct ClickRow {
    pub id: Uuid,
    pub project_id: String,
    pub page: String,
    pub element_id: String,
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct PerformanceRow {
    pub id: Uuid,
    pub project_id: String,
    pub page: String,
    pub ttfb_ms: Option<f64>,
    pub fcp_ms: Option<f64>,
    pub lcp_ms: Option<f64>,
    pub total_page_load_ms: Option<f64>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct ErrorRow {
    pub id: Uuid,
    pub project_id: String,
    pub page: String,
    pub error_type: String,
    pub message: String,
    pub stack: Option<String>,
    pub severity: i32,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct CustomEventRow {
    pub id: Uuid,
    pub project_id: String,
    pub name: String,
    pub page: Option<String>,
    pub properties: Option<serde_json::Value>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RawStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cheap connectivity check for the readiness probe.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_page_views (
                id UUID PRIMARY KEY,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                user_id TEXT,
                session_id TEXT,
                referrer TEXT,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_clicks (
                id UUID PRIMARY KEY,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                element_id TEXT NOT NULL,
                action TEXT,
                user_id TEXT,
                session_id TEXT,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_performance (
                id UUID PRIMARY KEY,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                ttfb_ms DOUBLE PRECISION,
                fcp_ms DOUBLE PRECISION,
                lcp_ms DOUBLE PRECISION,
                total_page_load_ms DOUBLE PRECISION,
                user_id TEXT,
                session_id TEXT,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_errors (
                id UUID PRIMARY KEY,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                error_type TEXT NOT NULL,
                message TEXT NOT NULL,
                stack TEXT,
                severity INTEGER NOT NULL,
                user_id TEXT,
                session_id TEXT,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS raw_custom_events (
                id UUID PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                page TEXT,
                properties JSONB,
                user_id TEXT,
                session_id TEXT,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn insert_page_view(&self, event: &PageViewEvent) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let ts = crate::time::millis_to_datetime(event.timestamp).unwrap_or_else(Utc::now);
        sqlx::query(
            "INSERT INTO raw_page_views (id, project_id, page, user_id, session_id, referrer, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(&event.project_id)
        .bind(&event.page)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(&event.referrer)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_click(&self, event: &ClickEvent) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let ts = crate::time::millis_to_datetime(event.timestamp).unwrap_or_else(Utc::now);
        sqlx::query(
            "INSERT INTO raw_clicks (id, project_id, page, element_id, action, user_id, session_id, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&event.project_id)
        .bind(&event.page)
        .bind(&event.element_id)
        .bind(&event.action)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_performance(&self, event: &PerformanceEvent) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let ts = crate::time::millis_to_datetime(event.timestamp).unwrap_or_else(Utc::now);
        sqlx::query(
            "INSERT INTO raw_performance (id, project_id, page, ttfb_ms, fcp_ms, lcp_ms, total_page_load_ms, user_id, session_id, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(&event.project_id)
        .bind(&event.page)
        .bind(event.ttfb_ms)
        .bind(event.fcp_ms)
        .bind(event.lcp_ms)
        .bind(event.total_page_load_ms)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_error(&self, event: &ErrorEvent) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let ts = crate::time::millis_to_datetime(event.timestamp).unwrap_or_else(Utc::now);
        let severity = event.severity_or_default().unwrap_or(Severity::Error).as_i32();
        sqlx::query(
            "INSERT INTO raw_errors (id, project_id, page, error_type, message, stack, severity, user_id, session_id, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(id)
        .bind(&event.project_id)
        .bind(&event.page)
        .bind(&event.error_type)
        .bind(&event.message)
        .bind(&event.stack)
        .bind(severity)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn insert_custom_event(&self, event: &CustomEvent) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let ts = crate::time::millis_to_datetime(event.timestamp).unwrap_or_else(Utc::now);
        let properties = event.properties.clone().map(serde_json::Value::Object);
        sqlx::query(
            "INSERT INTO raw_custom_events (id, project_id, name, page, properties, user_id, session_id, timestamp) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(&event.project_id)
        .bind(&event.name)
        .bind(&event.page)
        .bind(properties)
        .bind(&event.user_id)
        .bind(&event.session_id)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_page_views(
        &self,
        project_id: &str,
        range: &TimeRange,
        page_filter: Option<&str>,
        user_id_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<PageViewRow>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, project_id, page, user_id, session_id, referrer, timestamp FROM raw_page_views WHERE 1=1",
        );
        push_project_filter(&mut qb, project_id);
        push_time_range(&mut qb, range, "timestamp");
        if let Some(p) = page_filter {
            qb.push(" AND page ILIKE ").push_bind(format!("%{p}%"));
        }
        if let Some(u) = user_id_filter {
            qb.push(" AND user_id = ").push_bind(u);
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(Uuid, String, String, Option<String>, Option<String>, Option<String>, DateTime<Utc>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, page, user_id, session_id, referrer, timestamp)| PageViewRow {
                id,
                project_id,
                page,
                user_id,
                session_id,
                referrer,
                timestamp,
            })
            .collect())
    }

    pub async fn get_clicks(
        &self,
        project_id: &str,
        range: &TimeRange,
        page_filter: Option<&str>,
        element_id_filter: Option<&str>,
        user_id_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<ClickRow>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, project_id, page, element_id, action, user_id, session_id, timestamp FROM raw_clicks WHERE 1=1",
        );
        push_project_filter(&mut qb, project_id);
        push_time_range(&mut qb, range, "timestamp");
        if let Some(p) = page_filter {
            qb.push(" AND page ILIKE ").push_bind(format!("%{p}%"));
        }
        if let Some(e) = element_id_filter {
            qb.push(" AND element_id = ").push_bind(e);
        }
        if let Some(u) = user_id_filter {
            qb.push(" AND user_id = ").push_bind(u);
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(Uuid, String, String, String, Option<String>, Option<String>, Option<String>, DateTime<Utc>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, page, element_id, action, user_id, session_id, timestamp)| ClickRow {
                id,
                project_id,
                page,
                element_id,
                action,
                user_id,
                session_id,
                timestamp,
            })
            .collect())
    }

    pub async fn get_performance(
        &self,
        project_id: &str,
        range: &TimeRange,
        page_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<PerformanceRow>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, project_id, page, ttfb_ms, fcp_ms, lcp_ms, total_page_load_ms, user_id, session_id, timestamp FROM raw_performance WHERE 1=1",
        );
        push_project_filter(&mut qb, project_id);
        push_time_range(&mut qb, range, "timestamp");
        if let Some(p) = page_filter {
            qb.push(" AND page ILIKE ").push_bind(format!("%{p}%"));
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(Uuid, String, String, Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<String>, Option<String>, DateTime<Utc>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, page, ttfb_ms, fcp_ms, lcp_ms, total_page_load_ms, user_id, session_id, timestamp)| PerformanceRow {
                id,
                project_id,
                page,
                ttfb_ms,
                fcp_ms,
                lcp_ms,
                total_page_load_ms,
                user_id,
                session_id,
                timestamp,
            })
            .collect())
    }

    pub async fn get_errors(
        &self,
        project_id: &str,
        range: &TimeRange,
        page_filter: Option<&str>,
        error_type_filter: Option<&str>,
        user_id_filter: Option<&str>,
        severity_filter: Option<i32>,
        pagination: Pagination,
    ) -> Result<Vec<ErrorRow>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, project_id, page, error_type, message, stack, severity, user_id, session_id, timestamp FROM raw_errors WHERE 1=1",
        );
        push_project_filter(&mut qb, project_id);
        push_time_range(&mut qb, range, "timestamp");
        if let Some(p) = page_filter {
            qb.push(" AND page ILIKE ").push_bind(format!("%{p}%"));
        }
        if let Some(e) = error_type_filter {
            qb.push(" AND error_type = ").push_bind(e);
        }
        if let Some(u) = user_id_filter {
            qb.push(" AND user_id = ").push_bind(u);
        }
        if let Some(s) = severity_filter {
            qb.push(" AND severity = ").push_bind(s);
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(Uuid, String, String, String, String, Option<String>, i32, Option<String>, Option<String>, DateTime<Utc>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, page, error_type, message, stack, severity, user_id, session_id, timestamp)| ErrorRow {
                id,
                project_id,
                page,
                error_type,
                message,
                stack,
                severity,
                user_id,
                session_id,
                timestamp,
            })
            .collect())
    }

    pub async fn get_custom_events(
        &self,
        project_id: &str,
        range: &TimeRange,
        name_filter: Option<&str>,
        user_id_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<CustomEventRow>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT id, project_id, name, page, properties, user_id, session_id, timestamp FROM raw_custom_events WHERE 1=1",
        );
        push_project_filter(&mut qb, project_id);
        push_time_range(&mut qb, range, "timestamp");
        if let Some(n) = name_filter {
            qb.push(" AND name = ").push_bind(n);
        }
        if let Some(u) = user_id_filter {
            qb.push(" AND user_id = ").push_bind(u);
        }
        qb.push(" ORDER BY timestamp DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(Uuid, String, String, Option<String>, Option<serde_json::Value>, Option<String>, Option<String>, DateTime<Utc>)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, project_id, name, page, properties, user_id, session_id, timestamp)| CustomEventRow {
                id,
                project_id,
                name,
                page,
                properties,
                user_id,
                session_id,
                timestamp,
            })
            .collect())
    }
}

/// An empty `project_id` means "all projects" -- used by the aggregator's
/// tick-loop fetch, which has no single project in scope. Dashboard-facing
/// callers always pass a real project id.
fn push_project_filter(qb: &mut QueryBuilder<sqlx::Postgres>, project_id: &str) {
    if !project_id.is_empty() {
        qb.push(" AND project_id = ").push_bind(project_id.to_string());
    }
}

fn push_time_range(qb: &mut QueryBuilder<sqlx::Postgres>, range: &TimeRange, column: &str) {
    if let Some(start) = range.start {
        qb.push(format!(" AND {column} >= ")).push_bind(start);
    }
    if let Some(end) = range.end {
        qb.push(format!(" AND {column} < ")).push_bind(end);
    }
}
