//! Health-sample store for the monitor (I): an append-only `logs` table and
//! the day/week/month/year uptime rollups served at `/uptime*`.

use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPool;

pub struct MonitorStore {
    pool: PgPool,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct UptimePeriod {
    pub ok: i64,
    pub total: i64,
}

impl UptimePeriod {
    /// `ok/total*100`, or `0.0` when there are no samples yet.
    pub fn percent(&self) -> f64 {
        if self.total > 0 {
            self.ok as f64 * 100.0 / self.total as f64
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UptimeStats {
    pub day: UptimePeriod,
    pub week: UptimePeriod,
    pub month: UptimePeriod,
    pub year: UptimePeriod,
}

impl MonitorStore {
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
            CREATE TABLE IF NOT EXISTS logs (
                id BIGSERIAL PRIMARY KEY,
                service_name TEXT NOT NULL,
                log_message TEXT NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record(&self, service_name: &str, ok: bool, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let log_message = if ok { "OK" } else { "FAIL" };
        sqlx::query("INSERT INTO logs (service_name, log_message, timestamp) VALUES ($1, $2, $3)")
            .bind(service_name)
            .bind(log_message)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn period_since(&self, service_name: &str, since: DateTime<Utc>) -> Result<UptimePeriod, sqlx::Error> {
        let (ok, total): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE log_message = 'OK')::BIGINT,
                COUNT(*)::BIGINT
            FROM logs
            WHERE service_name = $1 AND timestamp >= $2
            "#,
        )
        .bind(service_name)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(UptimePeriod { ok, total })
    }

    pub async fn get_uptime_stats(&self, service_name: &str, now: DateTime<Utc>) -> Result<UptimeStats, sqlx::Error> {
        let day = self.period_since(service_name, now - Duration::days(1)).await?;
        let week = self.period_since(service_name, now - Duration::days(7)).await?;
        let month = self.period_since(service_name, now - Duration::days(30)).await?;
        let year = self.period_since(service_name, now - Duration::days(365)).await?;
        Ok(UptimeStats { day, week, month, year })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_zero_with_no_samples() {
        let p = UptimePeriod { ok: 0, total: 0 };
        assert_eq!(p.percent(), 0.0);
    }

    #[test]
    fn percent_is_ratio_times_100() {
        let p = UptimePeriod { ok: 9, total: 10 };
        assert_eq!(p.percent(), 90.0);
    }
}
