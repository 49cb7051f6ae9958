//! Thin client the aggregator uses to pull raw events from F for a
//! `[watermark, now)` window. Per-kind fetches plus a `fetch_all`
//! convenience, mirroring the source's `AggregationClient`/
//! `metrics.h` stub usage (one deadline-bound call per kind).

use super::raw::raw_events_service_client::RawEventsServiceClient;
use super::raw::{GetClicksRequest, GetCustomEventsRequest, GetErrorsRequest, GetPageViewsRequest, GetPerformanceRequest, TimeRange};
use crate::aggregation::bucket::{RawClick, RawCustomEvent, RawError, RawPageView, RawPerformance};
use crate::time::{datetime_to_seconds, seconds_to_datetime};
use chrono::{DateTime, Utc};
use tonic::transport::Channel;

pub struct RawEventsClient {
    inner: RawEventsServiceClient<Channel>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchedEvents {
    pub page_views: Vec<RawPageView>,
    pub clicks: Vec<RawClick>,
    pub performance: Vec<RawPerformance>,
    pub errors: Vec<RawError>,
    pub custom_events: Vec<RawCustomEvent>,
}

fn range(from: DateTime<Utc>, to: DateTime<Utc>) -> TimeRange {
    TimeRange { start: datetime_to_seconds(from), end: datetime_to_seconds(to) }
}

impl RawEventsClient {
    pub async fn connect(uri: String) -> Result<Self, tonic::transport::Error> {
        let inner = RawEventsServiceClient::connect(uri).await?;
        Ok(Self { inner })
    }

    pub async fn fetch_page_views(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RawPageView>, tonic::Status> {
        let resp = self
            .inner
            .get_page_views(GetPageViewsRequest {
                time_range: Some(range(from, to)),
                page_filter: None,
                user_id_filter: None,
                pagination: None,
                project_id: String::new(),
            })
            .await?
            .into_inner();
        Ok(resp
            .events
            .into_iter()
            .filter_map(|e| {
                Some(RawPageView {
                    project_id: e.project_id,
                    page: e.page,
                    user_id: Some(e.user_id).filter(|s| !s.is_empty()),
                    session_id: Some(e.session_id).filter(|s| !s.is_empty()),
                    timestamp: seconds_to_datetime(e.timestamp)?,
                })
            })
            .collect())
    }

    pub async fn fetch_clicks(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RawClick>, tonic::Status> {
        let resp = self
            .inner
            .get_clicks(GetClicksRequest {
                time_range: Some(range(from, to)),
                page_filter: None,
                element_id_filter: None,
                user_id_filter: None,
                pagination: None,
                project_id: String::new(),
            })
            .await?
            .into_inner();
        Ok(resp
            .events
            .into_iter()
            .filter_map(|e| {
                Some(RawClick {
                    project_id: e.project_id,
                    page: e.page,
                    element_id: e.element_id,
                    user_id: Some(e.user_id).filter(|s| !s.is_empty()),
                    session_id: Some(e.session_id).filter(|s| !s.is_empty()),
                    timestamp: seconds_to_datetime(e.timestamp)?,
                })
            })
            .collect())
    }

    pub async fn fetch_performance(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RawPerformance>, tonic::Status> {
        let resp = self
            .inner
            .get_performance(GetPerformanceRequest {
                time_range: Some(range(from, to)),
                page_filter: None,
                pagination: None,
                project_id: String::new(),
            })
            .await?
            .into_inner();
        Ok(resp
            .events
            .into_iter()
            .filter_map(|e| {
                Some(RawPerformance {
                    project_id: e.project_id,
                    page: e.page,
                    ttfb_ms: Some(e.ttfb_ms),
                    fcp_ms: Some(e.fcp_ms),
                    lcp_ms: Some(e.lcp_ms),
                    total_page_load_ms: Some(e.total_page_load_ms),
                    timestamp: seconds_to_datetime(e.timestamp)?,
                })
            })
            .collect())
    }

    pub async fn fetch_errors(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RawError>, tonic::Status> {
        let resp = self
            .inner
            .get_errors(GetErrorsRequest {
                time_range: Some(range(from, to)),
                page_filter: None,
                error_type_filter: None,
                user_id_filter: None,
                severity_filter: None,
                pagination: None,
                project_id: String::new(),
            })
            .await?
            .into_inner();
        Ok(resp
            .events
            .into_iter()
            .filter_map(|e| {
                Some(RawError {
                    project_id: e.project_id,
                    page: e.page,
                    error_type: e.error_type,
                    severity: e.severity,
                    user_id: Some(e.user_id).filter(|s| !s.is_empty()),
                    timestamp: seconds_to_datetime(e.timestamp)?,
                })
            })
            .collect())
    }

    pub async fn fetch_custom_events(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<RawCustomEvent>, tonic::Status> {
        let resp = self
            .inner
            .get_custom_events(GetCustomEventsRequest {
                time_range: Some(range(from, to)),
                name_filter: None,
                user_id_filter: None,
                pagination: None,
                project_id: String::new(),
            })
            .await?
            .into_inner();
        Ok(resp
            .events
            .into_iter()
            .filter_map(|e| {
                Some(RawCustomEvent {
                    project_id: e.project_id,
                    name: e.name,
                    page: Some(e.page).filter(|s| !s.is_empty()),
                    user_id: Some(e.user_id).filter(|s| !s.is_empty()),
                    session_id: Some(e.session_id).filter(|s| !s.is_empty()),
                    timestamp: seconds_to_datetime(e.timestamp)?,
                })
            })
            .collect())
    }

    /// Fetches all five kinds for the window, sequentially over the one
    /// client connection (a multi-connection pool could run these
    /// concurrently; not needed at this scale).
    pub async fn fetch_all(&mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<FetchedEvents, tonic::Status> {
        Ok(FetchedEvents {
            page_views: self.fetch_page_views(from, to).await?,
            clicks: self.fetch_clicks(from, to).await?,
            performance: self.fetch_performance(from, to).await?,
            errors: self.fetch_errors(from, to).await?,
            custom_events: self.fetch_custom_events(from, to).await?,
        })
    }
}
