//! F: raw-event read RPC, served by the persister. Timestamps on this
//! surface are plain seconds-since-epoch integers (see `crate::time`).

use super::raw::raw_events_service_server::RawEventsService;
use super::raw::*;
use crate::db::raw::{Pagination as DbPagination, RawStore, TimeRange as DbTimeRange};
use crate::time::{datetime_to_seconds, seconds_to_datetime};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct RawEventsRpc {
    store: Arc<RawStore>,
}

impl RawEventsRpc {
    pub fn new(store: Arc<RawStore>) -> Self {
        Self { store }
    }
}

fn db_time_range(range: Option<TimeRange>) -> DbTimeRange {
    match range {
        Some(r) => DbTimeRange { start: seconds_to_datetime(r.start), end: seconds_to_datetime(r.end) },
        None => DbTimeRange::default(),
    }
}

fn db_pagination(p: Option<Pagination>) -> DbPagination {
    match p {
        Some(p) => DbPagination { limit: p.limit as i64, offset: p.offset as i64 },
        None => DbPagination::default(),
    }
}

fn internal(e: sqlx::Error) -> Status {
    Status::internal(format!("database error: {e}"))
}

#[tonic::async_trait]
impl RawEventsService for RawEventsRpc {
    async fn get_page_views(&self, request: Request<GetPageViewsRequest>) -> Result<Response<GetPageViewsResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .store
            .get_page_views(&req.project_id, &db_time_range(req.time_range), req.page_filter.as_deref(), req.user_id_filter.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let events: Vec<PageViewRecord> = rows
            .into_iter()
            .map(|r| PageViewRecord {
                id: r.id.to_string(),
                project_id: r.project_id,
                page: r.page,
                user_id: r.user_id.unwrap_or_default(),
                session_id: r.session_id.unwrap_or_default(),
                referrer: r.referrer.unwrap_or_default(),
                timestamp: datetime_to_seconds(r.timestamp),
            })
            .collect();
        let total_count = events.len() as i64;
        Ok(Response::new(GetPageViewsResponse { events, total_count }))
    }

    async fn get_clicks(&self, request: Request<GetClicksRequest>) -> Result<Response<GetClicksResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .store
            .get_clicks(
                &req.project_id,
                &db_time_range(req.time_range),
                req.page_filter.as_deref(),
                req.element_id_filter.as_deref(),
                req.user_id_filter.as_deref(),
                db_pagination(req.pagination),
            )
            .await
            .map_err(internal)?;
        let events: Vec<ClickRecord> = rows
            .into_iter()
            .map(|r| ClickRecord {
                id: r.id.to_string(),
                project_id: r.project_id,
                page: r.page,
                element_id: r.element_id,
                action: r.action.unwrap_or_default(),
                user_id: r.user_id.unwrap_or_default(),
                session_id: r.session_id.unwrap_or_default(),
                timestamp: datetime_to_seconds(r.timestamp),
            })
            .collect();
        let total_count = events.len() as i64;
        Ok(Response::new(GetClicksResponse { events, total_count }))
    }

    async fn get_performance(&self, request: Request<GetPerformanceRequest>) -> Result<Response<GetPerformanceResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .store
            .get_performance(&req.project_id, &db_time_range(req.time_range), req.page_filter.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let events: Vec<PerformanceRecord> = rows
            .into_iter()
            .map(|r| PerformanceRecord {
                id: r.id.to_string(),
                project_id: r.project_id,
                page: r.page,
                ttfb_ms: r.ttfb_ms.unwrap_or(0.0),
                fcp_ms: r.fcp_ms.unwrap_or(0.0),
                lcp_ms: r.lcp_ms.unwrap_or(0.0),
                total_page_load_ms: r.total_page_load_ms.unwrap_or(0.0),
                user_id: r.user_id.unwrap_or_default(),
                session_id: r.session_id.unwrap_or_default(),
                timestamp: datetime_to_seconds(r.timestamp),
            })
            .collect();
        let total_count = events.len() as i64;
        Ok(Response::new(GetPerformanceResponse { events, total_count }))
    }

    async fn get_errors(&self, request: Request<GetErrorsRequest>) -> Result<Response<GetErrorsResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .store
            .get_errors(
                &req.project_id,
                &db_time_range(req.time_range),
                req.page_filter.as_deref(),
                req.error_type_filter.as_deref(),
                req.user_id_filter.as_deref(),
                req.severity_filter,
                db_pagination(req.pagination),
            )
            .await
            .map_err(internal)?;
        let events: Vec<ErrorRecord> = rows
            .into_iter()
            .map(|r| ErrorRecord {
                id: r.id.to_string(),
                project_id: r.project_id,
                page: r.page,
                error_type: r.error_type,
                message: r.message,
                stack: r.stack.unwrap_or_default(),
                severity: r.severity,
                user_id: r.user_id.unwrap_or_default(),
                session_id: r.session_id.unwrap_or_default(),
                timestamp: datetime_to_seconds(r.timestamp),
            })
            .collect();
        let total_count = events.len() as i64;
        Ok(Response::new(GetErrorsResponse { events, total_count }))
    }

    async fn get_custom_events(&self, request: Request<GetCustomEventsRequest>) -> Result<Response<GetCustomEventsResponse>, Status> {
        let req = request.into_inner();
        let rows = self
            .store
            .get_custom_events(&req.project_id, &db_time_range(req.time_range), req.name_filter.as_deref(), req.user_id_filter.as_deref(), db_pagination(req.pagination))
            .await
            .map_err(internal)?;
        let events: Vec<CustomEventRecord> = rows
            .into_iter()
            .map(|r| CustomEventRecord {
                id: r.id.to_string(),
                project_id: r.project_id,
                name: r.name,
                page: r.page.unwrap_or_default(),
                user_id: r.user_id.unwrap_or_default(),
                session_id: r.session_id.unwrap_or_default(),
                timestamp: datetime_to_seconds(r.timestamp),
            })
            .collect();
        let total_count = events.len() as i64;
        Ok(Response::new(GetCustomEventsResponse { events, total_count }))
    }
}
