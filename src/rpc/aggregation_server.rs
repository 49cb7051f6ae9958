//! H: aggregate read + watermark RPC, served by the aggregator alongside
//! its tick loop. Timestamps on this surface are `google.protobuf.Timestamp`.

use super::aggregation::aggregation_service_server::AggregationService;
use super::aggregation::*;
use crate::db::agg::{AggStore, Pagination as DbPagination};
use crate::time::{datetime_to_prost_timestamp, prost_timestamp_to_datetime};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct AggregationRpc {
    store: Arc<AggStore>,
}

impl AggregationRpc {
    pub fn new(store: Arc<AggStore>) -> Self {
        Self { store }
    }
}

fn internal(e: sqlx::Error) -> Status {
    Status::internal(format!("database error: {e}"))
}

fn bounds(range: Option<TimeRange>) -> Result<(DateTime<Utc>, DateTime<Utc>), Status> {
    let range = range.ok_or_else(|| Status::invalid_argument("time_range is required"))?;
    let from = range.from.as_ref().and_then(prost_timestamp_to_datetime).ok_or_else(|| Status::invalid_argument("invalid from timestamp"))?;
    let to = range.to.as_ref().and_then(prost_timestamp_to_datetime).ok_or_else(|| Status::invalid_argument("invalid to timestamp"))?;
    Ok((from, to))
}

fn db_pagination(p: Option<Pagination>) -> DbPagination {
    match p {
        Some(p) => DbPagination { limit: p.limit as i64, offset: p.offset as i64 },
        None => DbPagination::default(),
    }
}

#[tonic::async_trait]
impl AggregationService for AggregationRpc {
    async fn get_watermark(&self, _request: Request<GetWatermarkRequest>) -> Result<Response<GetWatermarkResponse>, Status> {
        let watermark = self.store.get_watermark().await.map_err(internal)?;
        Ok(Response::new(GetWatermarkResponse { last_aggregated_at: Some(datetime_to_prost_timestamp(watermark)) }))
    }

    async fn get_page_views_agg(&self, request: Request<GetPageViewsAggRequest>) -> Result<Response<GetPageViewsAggResponse>, Status> {
        let req = request.into_inner();
        let (from, to) = bounds(req.time_range)?;
        let rows = self
            .store
            .get_page_views_agg(&req.project_id, from, to, req.page.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let rows = rows
            .into_iter()
            .map(|r| PageViewsAggRecord {
                time_bucket: Some(datetime_to_prost_timestamp(r.time_bucket)),
                project_id: r.project_id,
                page: r.page,
                views_count: r.views_count,
                unique_users: r.unique_users,
                unique_sessions: r.unique_sessions,
            })
            .collect();
        Ok(Response::new(GetPageViewsAggResponse { rows }))
    }

    async fn get_clicks_agg(&self, request: Request<GetClicksAggRequest>) -> Result<Response<GetClicksAggResponse>, Status> {
        let req = request.into_inner();
        let (from, to) = bounds(req.time_range)?;
        let rows = self
            .store
            .get_clicks_agg(&req.project_id, from, to, req.page.as_deref(), req.element_id.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let rows = rows
            .into_iter()
            .map(|r| ClicksAggRecord {
                time_bucket: Some(datetime_to_prost_timestamp(r.time_bucket)),
                project_id: r.project_id,
                page: r.page,
                element_id: r.element_id,
                clicks_count: r.clicks_count,
                unique_users: r.unique_users,
                unique_sessions: r.unique_sessions,
            })
            .collect();
        Ok(Response::new(GetClicksAggResponse { rows }))
    }

    async fn get_performance_agg(&self, request: Request<GetPerformanceAggRequest>) -> Result<Response<GetPerformanceAggResponse>, Status> {
        let req = request.into_inner();
        let (from, to) = bounds(req.time_range)?;
        let rows = self
            .store
            .get_performance_agg(&req.project_id, from, to, req.page.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let rows = rows
            .into_iter()
            .map(|r| PerformanceAggRecord {
                time_bucket: Some(datetime_to_prost_timestamp(r.time_bucket)),
                project_id: r.project_id,
                page: r.page,
                samples_count: r.samples_count,
                avg_total_load_ms: r.avg_total_load_ms,
                p95_total_load_ms: r.p95_total_load_ms,
                avg_ttfb_ms: r.avg_ttfb_ms,
                p95_ttfb_ms: r.p95_ttfb_ms,
                avg_fcp_ms: r.avg_fcp_ms,
                p95_fcp_ms: r.p95_fcp_ms,
                avg_lcp_ms: r.avg_lcp_ms,
                p95_lcp_ms: r.p95_lcp_ms,
            })
            .collect();
        Ok(Response::new(GetPerformanceAggResponse { rows }))
    }

    async fn get_errors_agg(&self, request: Request<GetErrorsAggRequest>) -> Result<Response<GetErrorsAggResponse>, Status> {
        let req = request.into_inner();
        let (from, to) = bounds(req.time_range)?;
        let rows = self
            .store
            .get_errors_agg(&req.project_id, from, to, req.page.as_deref(), req.error_type.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let rows = rows
            .into_iter()
            .map(|r| ErrorsAggRecord {
                time_bucket: Some(datetime_to_prost_timestamp(r.time_bucket)),
                project_id: r.project_id,
                page: r.page,
                error_type: r.error_type,
                errors_count: r.errors_count,
                warning_count: r.warning_count,
                critical_count: r.critical_count,
                unique_users: r.unique_users,
            })
            .collect();
        Ok(Response::new(GetErrorsAggResponse { rows }))
    }

    async fn get_custom_events_agg(&self, request: Request<GetCustomEventsAggRequest>) -> Result<Response<GetCustomEventsAggResponse>, Status> {
        let req = request.into_inner();
        let (from, to) = bounds(req.time_range)?;
        let rows = self
            .store
            .get_custom_events_agg(&req.project_id, &req.event_name, from, to, req.page.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let rows = rows
            .into_iter()
            .map(|r| CustomEventsAggRecord {
                time_bucket: Some(datetime_to_prost_timestamp(r.time_bucket)),
                project_id: r.project_id,
                event_name: r.event_name,
                page: r.page,
                events_count: r.events_count,
                unique_users: r.unique_users,
                unique_sessions: r.unique_sessions,
            })
            .collect();
        Ok(Response::new(GetCustomEventsAggResponse { rows }))
    }
}
