//! Aggregate store (C) plus the watermark row it owns exclusively. Upsert
//! SQL is the literal translation of
//! `aggregation-service/src/database.cpp`'s `write*` methods: counts
//! accumulate via `col = table.col + EXCLUDED.col`, uniques/averages/
//! percentiles replace via `col = EXCLUDED.col`.

use crate::schemas::aggregates::{ClicksAgg, CustomEventsAgg, ErrorsAgg, PageViewsAgg, PerformanceAgg};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::QueryBuilder;

pub struct AggStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    fn or_default_limit(self) -> Self {
        if self.limit <= 0 {
            Self { limit: 100, offset: self.offset.max(0) }
        } else {
            Self { limit: self.limit, offset: self.offset.max(0) }
        }
    }
}

impl AggStore {
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
            CREATE TABLE IF NOT EXISTS agg_page_views (
                time_bucket TIMESTAMPTZ NOT NULL,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                views_count BIGINT NOT NULL DEFAULT 0,
                unique_users BIGINT NOT NULL DEFAULT 0,
                unique_sessions BIGINT NOT NULL DEFAULT 0,
                UNIQUE (time_bucket, project_id, page)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agg_clicks (
                time_bucket TIMESTAMPTZ NOT NULL,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                element_id TEXT NOT NULL,
                clicks_count BIGINT NOT NULL DEFAULT 0,
                unique_users BIGINT NOT NULL DEFAULT 0,
                unique_sessions BIGINT NOT NULL DEFAULT 0,
                UNIQUE (time_bucket, project_id, page, element_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agg_performance (
                time_bucket TIMESTAMPTZ NOT NULL,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                samples_count BIGINT NOT NULL DEFAULT 0,
                avg_total_load_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                p95_total_load_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_ttfb_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                p95_ttfb_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_fcp_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                p95_fcp_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                avg_lcp_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                p95_lcp_ms DOUBLE PRECISION NOT NULL DEFAULT 0,
                UNIQUE (time_bucket, project_id, page)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agg_errors (
                time_bucket TIMESTAMPTZ NOT NULL,
                project_id TEXT NOT NULL,
                page TEXT NOT NULL,
                error_type TEXT NOT NULL,
                errors_count BIGINT NOT NULL DEFAULT 0,
                warning_count BIGINT NOT NULL DEFAULT 0,
                critical_count BIGINT NOT NULL DEFAULT 0,
                unique_users BIGINT NOT NULL DEFAULT 0,
                UNIQUE (time_bucket, project_id, page, error_type)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agg_custom_events (
                time_bucket TIMESTAMPTZ NOT NULL,
                project_id TEXT NOT NULL,
                event_name TEXT NOT NULL,
                page TEXT NOT NULL,
                events_count BIGINT NOT NULL DEFAULT 0,
                unique_users BIGINT NOT NULL DEFAULT 0,
                unique_sessions BIGINT NOT NULL DEFAULT 0,
                UNIQUE (time_bucket, project_id, event_name, page)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS aggregation_watermark (
                id INTEGER PRIMARY KEY,
                last_aggregated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO aggregation_watermark (id, last_aggregated_at) VALUES (1, $1) ON CONFLICT (id) DO NOTHING",
        )
        .bind(DateTime::<Utc>::from_timestamp(0, 0).unwrap())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_watermark(&self) -> Result<DateTime<Utc>, sqlx::Error> {
        let (ts,): (DateTime<Utc>,) =
            sqlx::query_as("SELECT last_aggregated_at FROM aggregation_watermark WHERE id = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(ts)
    }

    pub async fn set_watermark(&self, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE aggregation_watermark SET last_aggregated_at = $1 WHERE id = 1")
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_page_views(&self, rows: &[PageViewsAgg]) -> Result<(), sqlx::Error> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO agg_page_views (time_bucket, project_id, page, views_count, unique_users, unique_sessions)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (time_bucket, project_id, page) DO UPDATE SET
                    views_count = agg_page_views.views_count + EXCLUDED.views_count,
                    unique_users = EXCLUDED.unique_users,
                    unique_sessions = EXCLUDED.unique_sessions
                "#,
            )
            .bind(r.time_bucket)
            .bind(&r.project_id)
            .bind(&r.page)
            .bind(r.views_count)
            .bind(r.unique_users)
            .bind(r.unique_sessions)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_clicks(&self, rows: &[ClicksAgg]) -> Result<(), sqlx::Error> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO agg_clicks (time_bucket, project_id, page, element_id, clicks_count, unique_users, unique_sessions)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (time_bucket, project_id, page, element_id) DO UPDATE SET
                    clicks_count = agg_clicks.clicks_count + EXCLUDED.clicks_count,
                    unique_users = EXCLUDED.unique_users,
                    unique_sessions = EXCLUDED.unique_sessions
                "#,
            )
            .bind(r.time_bucket)
            .bind(&r.project_id)
            .bind(&r.page)
            .bind(&r.element_id)
            .bind(r.clicks_count)
            .bind(r.unique_users)
            .bind(r.unique_sessions)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_performance(&self, rows: &[PerformanceAgg]) -> Result<(), sqlx::Error> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO agg_performance (
                    time_bucket, project_id, page, samples_count,
                    avg_total_load_ms, p95_total_load_ms, avg_ttfb_ms, p95_ttfb_ms,
                    avg_fcp_ms, p95_fcp_ms, avg_lcp_ms, p95_lcp_ms
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (time_bucket, project_id, page) DO UPDATE SET
                    samples_count = agg_performance.samples_count + EXCLUDED.samples_count,
                    avg_total_load_ms = EXCLUDED.avg_total_load_ms,
                    p95_total_load_ms = EXCLUDED.p95_total_load_ms,
                    avg_ttfb_ms = EXCLUDED.avg_ttfb_ms,
                    p95_ttfb_ms = EXCLUDED.p95_ttfb_ms,
                    avg_fcp_ms = EXCLUDED.avg_fcp_ms,
                    p95_fcp_ms = EXCLUDED.p95_fcp_ms,
                    avg_lcp_ms = EXCLUDED.avg_lcp_ms,
                    p95_lcp_ms = EXCLUDED.p95_lcp_ms
                "#,
            )
            .bind(r.time_bucket)
            .bind(&r.project_id)
            .bind(&r.page)
            .bind(r.samples_count)
            .bind(r.avg_total_load_ms)
            .bind(r.p95_total_load_ms)
            .bind(r.avg_ttfb_ms)
            .bind(r.p95_ttfb_ms)
            .bind(r.avg_fcp_ms)
            .bind(r.p95_fcp_ms)
            .bind(r.avg_lcp_ms)
            .bind(r.p95_lcp_ms)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_errors(&self, rows: &[ErrorsAgg]) -> Result<(), sqlx::Error> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO agg_errors (time_bucket, project_id, page, error_type, errors_count, warning_count, critical_count, unique_users)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (time_bucket, project_id, page, error_type) DO UPDATE SET
                    errors_count = agg_errors.errors_count + EXCLUDED.errors_count,
                    warning_count = agg_errors.warning_count + EXCLUDED.warning_count,
                    critical_count = agg_errors.critical_count + EXCLUDED.critical_count,
                    unique_users = EXCLUDED.unique_users
                "#,
            )
            .bind(r.time_bucket)
            .bind(&r.project_id)
            .bind(&r.page)
            .bind(&r.error_type)
            .bind(r.errors_count)
            .bind(r.warning_count)
            .bind(r.critical_count)
            .bind(r.unique_users)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_custom_events(&self, rows: &[CustomEventsAgg]) -> Result<(), sqlx::Error> {
        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO agg_custom_events (time_bucket, project_id, event_name, page, events_count, unique_users, unique_sessions)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (time_bucket, project_id, event_name, page) DO UPDATE SET
                    events_count = agg_custom_events.events_count + EXCLUDED.events_count,
                    unique_users = EXCLUDED.unique_users,
                    unique_sessions = EXCLUDED.unique_sessions
                "#,
            )
            .bind(r.time_bucket)
            .bind(&r.project_id)
            .bind(&r.event_name)
            .bind(&r.page)
            .bind(r.events_count)
            .bind(r.unique_users)
            .bind(r.unique_sessions)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get_page_views_agg(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<PageViewsAgg>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT time_bucket, project_id, page, views_count, unique_users, unique_sessions FROM agg_page_views WHERE project_id = ",
        );
        qb.push_bind(project_id).push(" AND time_bucket >= ").push_bind(from).push(" AND time_bucket < ").push_bind(to);
        if let Some(p) = page_filter {
            qb.push(" AND page = ").push_bind(p);
        }
        qb.push(" ORDER BY time_bucket DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(DateTime<Utc>, String, String, i64, i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(time_bucket, project_id, page, views_count, unique_users, unique_sessions)| PageViewsAgg {
                time_bucket,
                project_id,
                page,
                views_count,
                unique_users,
                unique_sessions,
            })
            .collect())
    }

    pub async fn get_clicks_agg(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_filter: Option<&str>,
        element_id_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<ClicksAgg>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT time_bucket, project_id, page, element_id, clicks_count, unique_users, unique_sessions FROM agg_clicks WHERE project_id = ",
        );
        qb.push_bind(project_id).push(" AND time_bucket >= ").push_bind(from).push(" AND time_bucket < ").push_bind(to);
        if let Some(p) = page_filter {
            qb.push(" AND page = ").push_bind(p);
        }
        if let Some(e) = element_id_filter {
            qb.push(" AND element_id = ").push_bind(e);
        }
        qb.push(" ORDER BY time_bucket DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(DateTime<Utc>, String, String, String, i64, i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(time_bucket, project_id, page, element_id, clicks_count, unique_users, unique_sessions)| ClicksAgg {
                time_bucket,
                project_id,
                page,
                element_id,
                clicks_count,
                unique_users,
                unique_sessions,
            })
            .collect())
    }

    pub async fn get_performance_agg(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<PerformanceAgg>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"SELECT time_bucket, project_id, page, samples_count,
                      avg_total_load_ms, p95_total_load_ms, avg_ttfb_ms, p95_ttfb_ms,
                      avg_fcp_ms, p95_fcp_ms, avg_lcp_ms, p95_lcp_ms
               FROM agg_performance WHERE project_id = "#,
        );
        qb.push_bind(project_id).push(" AND time_bucket >= ").push_bind(from).push(" AND time_bucket < ").push_bind(to);
        if let Some(p) = page_filter {
            qb.push(" AND page = ").push_bind(p);
        }
        qb.push(" ORDER BY time_bucket DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(DateTime<Utc>, String, String, i64, f64, f64, f64, f64, f64, f64, f64, f64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(time_bucket, project_id, page, samples_count, avg_total_load_ms, p95_total_load_ms, avg_ttfb_ms, p95_ttfb_ms, avg_fcp_ms, p95_fcp_ms, avg_lcp_ms, p95_lcp_ms)| {
                PerformanceAgg {
                    time_bucket,
                    project_id,
                    page,
                    samples_count,
                    avg_total_load_ms,
                    p95_total_load_ms,
                    avg_ttfb_ms,
                    p95_ttfb_ms,
                    avg_fcp_ms,
                    p95_fcp_ms,
                    avg_lcp_ms,
                    p95_lcp_ms,
                }
            })
            .collect())
    }

    pub async fn get_errors_agg(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_filter: Option<&str>,
        error_type_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<ErrorsAgg>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT time_bucket, project_id, page, error_type, errors_count, warning_count, critical_count, unique_users FROM agg_errors WHERE project_id = ",
        );
        qb.push_bind(project_id).push(" AND time_bucket >= ").push_bind(from).push(" AND time_bucket < ").push_bind(to);
        if let Some(p) = page_filter {
            qb.push(" AND page = ").push_bind(p);
        }
        if let Some(e) = error_type_filter {
            qb.push(" AND error_type = ").push_bind(e);
        }
        qb.push(" ORDER BY time_bucket DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(DateTime<Utc>, String, String, String, i64, i64, i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(time_bucket, project_id, page, error_type, errors_count, warning_count, critical_count, unique_users)| ErrorsAgg {
                time_bucket,
                project_id,
                page,
                error_type,
                errors_count,
                warning_count,
                critical_count,
                unique_users,
            })
            .collect())
    }

    pub async fn get_custom_events_agg(
        &self,
        project_id: &str,
        event_name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page_filter: Option<&str>,
        pagination: Pagination,
    ) -> Result<Vec<CustomEventsAgg>, sqlx::Error> {
        let pagination = pagination.or_default_limit();
        let mut qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT time_bucket, project_id, event_name, page, events_count, unique_users, unique_sessions FROM agg_custom_events WHERE project_id = ",
        );
        qb.push_bind(project_id).push(" AND event_name = ").push_bind(event_name);
        qb.push(" AND time_bucket >= ").push_bind(from).push(" AND time_bucket < ").push_bind(to);
        if let Some(p) = page_filter {
            qb.push(" AND page = ").push_bind(p);
        }
        qb.push(" ORDER BY time_bucket DESC LIMIT ").push_bind(pagination.limit).push(" OFFSET ").push_bind(pagination.offset);

        let rows = qb
            .build_query_as::<(DateTime<Utc>, String, String, String, i64, i64, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(time_bucket, project_id, event_name, page, events_count, unique_users, unique_sessions)| CustomEventsAgg {
                time_bucket,
                project_id,
                event_name,
                page,
                events_count,
                unique_users,
                unique_sessions,
            })
            .collect())
    }
}
