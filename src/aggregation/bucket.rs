//! Grouping and per-kind aggregation, a direct port of the per-kind loops
//! in `aggregator.cpp::aggregateEvents`. Input types mirror the raw-event
//! RPC response shapes (component F) rather than the persister's DB rows,
//! since the aggregator only ever talks to F over RPC.

use crate::schemas::aggregates::{ClicksAgg, CustomEventsAgg, ErrorsAgg, PageViewsAgg, PerformanceAgg};
use crate::time::truncate_to_bucket;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct RawPageView {
    pub project_id: String,
    pub page: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RawClick {
    pub project_id: String,
    pub page: String,
    pub element_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RawPerformance {
    pub project_id: String,
    pub page: String,
    pub ttfb_ms: Option<f64>,
    pub fcp_ms: Option<f64>,
    pub lcp_ms: Option<f64>,
    pub total_page_load_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RawError {
    pub project_id: String,
    pub page: String,
    pub error_type: String,
    pub severity: i32,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RawCustomEvent {
    pub project_id: String,
    pub name: String,
    pub page: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

pub fn aggregate_page_views(events: &[RawPageView], bucket_minutes: i64) -> Vec<PageViewsAgg> {
    struct Acc {
        count: i64,
        users: HashSet<String>,
        sessions: HashSet<String>,
    }
    let mut groups: HashMap<(DateTime<Utc>, String, String), Acc> = HashMap::new();
    for e in events {
        let bucket = truncate_to_bucket(e.timestamp, bucket_minutes);
        let key = (bucket, e.project_id.clone(), e.page.clone());
        let acc = groups.entry(key).or_insert_with(|| Acc { count: 0, users: HashSet::new(), sessions: HashSet::new() });
        acc.count += 1;
        if let Some(u) = non_empty(&e.user_id) {
            acc.users.insert(u.to_string());
        }
        if let Some(s) = non_empty(&e.session_id) {
            acc.sessions.insert(s.to_string());
        }
    }
    groups
        .into_iter()
        .map(|((time_bucket, project_id, page), acc)| PageViewsAgg {
            time_bucket,
            project_id,
            page,
            views_count: acc.count,
            unique_users: acc.users.len() as i64,
            unique_sessions: acc.sessions.len() as i64,
        })
        .collect()
}

pub fn aggregate_clicks(events: &[RawClick], bucket_minutes: i64) -> Vec<ClicksAgg> {
    struct Acc {
        count: i64,
        users: HashSet<String>,
        sessions: HashSet<String>,
    }
    let mut groups: HashMap<(DateTime<Utc>, String, String, String), Acc> = HashMap::new();
    for e in events {
        let bucket = truncate_to_bucket(e.timestamp, bucket_minutes);
        let key = (bucket, e.project_id.clone(), e.page.clone(), e.element_id.clone());
        let acc = groups.entry(key).or_insert_with(|| Acc { count: 0, users: HashSet::new(), sessions: HashSet::new() });
        acc.count += 1;
        if let Some(u) = non_empty(&e.user_id) {
            acc.users.insert(u.to_string());
        }
        if let Some(s) = non_empty(&e.session_id) {
            acc.sessions.insert(s.to_string());
        }
    }
    groups
        .into_iter()
        .map(|((time_bucket, project_id, page, element_id), acc)| ClicksAgg {
            time_bucket,
            project_id,
            page,
            element_id,
            clicks_count: acc.count,
            unique_users: acc.users.len() as i64,
            unique_sessions: acc.sessions.len() as i64,
        })
        .collect()
}

pub fn aggregate_performance(events: &[RawPerformance], bucket_minutes: i64) -> Vec<PerformanceAgg> {
    #[derive(Default)]
    struct Acc {
        samples: i64,
        ttfb: Vec<f64>,
        fcp: Vec<f64>,
        lcp: Vec<f64>,
        total: Vec<f64>,
    }
    let mut groups: HashMap<(DateTime<Utc>, String, String), Acc> = HashMap::new();
    for e in events {
        let bucket = truncate_to_bucket(e.timestamp, bucket_minutes);
        let key = (bucket, e.project_id.clone(), e.page.clone());
        let acc = groups.entry(key).or_default();
        acc.samples += 1;
        if let Some(v) = e.ttfb_ms {
            if v > 0.0 {
                acc.ttfb.push(v);
            }
        }
        if let Some(v) = e.fcp_ms {
            if v > 0.0 {
                acc.fcp.push(v);
            }
        }
        if let Some(v) = e.lcp_ms {
            if v > 0.0 {
                acc.lcp.push(v);
            }
        }
        if let Some(v) = e.total_page_load_ms {
            if v > 0.0 {
                acc.total.push(v);
            }
        }
    }
    groups
        .into_iter()
        .map(|((time_bucket, project_id, page), acc)| PerformanceAgg {
            time_bucket,
            project_id,
            page,
            samples_count: acc.samples,
            avg_total_load_ms: super::stats::average(&acc.total),
            p95_total_load_ms: super::stats::p95(&acc.total),
            avg_ttfb_ms: super::stats::average(&acc.ttfb),
            p95_ttfb_ms: super::stats::p95(&acc.ttfb),
            avg_fcp_ms: super::stats::average(&acc.fcp),
            p95_fcp_ms: super::stats::p95(&acc.fcp),
            avg_lcp_ms: super::stats::average(&acc.lcp),
            p95_lcp_ms: super::stats::p95(&acc.lcp),
        })
        .collect()
}

pub fn aggregate_errors(events: &[RawError], bucket_minutes: i64) -> Vec<ErrorsAgg> {
    #[derive(Default)]
    struct Acc {
        errors: i64,
        warnings: i64,
        criticals: i64,
        users: HashSet<String>,
    }
    let mut groups: HashMap<(DateTime<Utc>, String, String, String), Acc> = HashMap::new();
    for e in events {
        let bucket = truncate_to_bucket(e.timestamp, bucket_minutes);
        let key = (bucket, e.project_id.clone(), e.page.clone(), e.error_type.clone());
        let acc = groups.entry(key).or_default();
        acc.errors += 1;
        match e.severity {
            1 => acc.warnings += 1,
            3 => acc.criticals += 1,
            _ => {}
        }
        if let Some(u) = non_empty(&e.user_id) {
            acc.users.insert(u.to_string());
        }
    }
    groups
        .into_iter()
        .map(|((time_bucket, project_id, page, error_type), acc)| ErrorsAgg {
            time_bucket,
            project_id,
            page,
            error_type,
            errors_count: acc.errors,
            warning_count: acc.warnings,
            critical_count: acc.criticals,
            unique_users: acc.users.len() as i64,
        })
        .collect()
}

pub fn aggregate_custom_events(events: &[RawCustomEvent], bucket_minutes: i64) -> Vec<CustomEventsAgg> {
    struct Acc {
        count: i64,
        users: HashSet<String>,
        sessions: HashSet<String>,
    }
    let mut groups: HashMap<(DateTime<Utc>, String, String, String), Acc> = HashMap::new();
    for e in events {
        let bucket = truncate_to_bucket(e.timestamp, bucket_minutes);
        let page = e.page.clone().unwrap_or_default();
        let key = (bucket, e.project_id.clone(), e.name.clone(), page);
        let acc = groups.entry(key).or_insert_with(|| Acc { count: 0, users: HashSet::new(), sessions: HashSet::new() });
        acc.count += 1;
        if let Some(u) = non_empty(&e.user_id) {
            acc.users.insert(u.to_string());
        }
        if let Some(s) = non_empty(&e.session_id) {
            acc.sessions.insert(s.to_string());
        }
    }
    groups
        .into_iter()
        .map(|((time_bucket, project_id, event_name, page), acc)| CustomEventsAgg {
            time_bucket,
            project_id,
            event_name,
            page,
            events_count: acc.count,
            unique_users: acc.users.len() as i64,
            unique_sessions: acc.sessions.len() as i64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, min, 0).unwrap()
    }

    #[test]
    fn page_views_accumulate_per_bucket_project_page() {
        let events = vec![
            RawPageView { project_id: "p1".into(), page: "/home".into(), user_id: Some("u1".into()), session_id: Some("s1".into()), timestamp: ts(1) },
            RawPageView { project_id: "p1".into(), page: "/home".into(), user_id: Some("u1".into()), session_id: Some("s2".into()), timestamp: ts(2) },
            RawPageView { project_id: "p1".into(), page: "/home".into(), user_id: None, session_id: None, timestamp: ts(3) },
        ];
        let agg = aggregate_page_views(&events, 5);
        assert_eq!(agg.len(), 1);
        let row = &agg[0];
        assert_eq!(row.views_count, 3);
        assert_eq!(row.unique_users, 1);
        assert_eq!(row.unique_sessions, 2);
    }

    #[test]
    fn errors_split_by_severity_and_cap_at_errors_count() {
        let events = vec![
            RawError { project_id: "p1".into(), page: "/a".into(), error_type: "TypeError".into(), severity: 1, user_id: Some("u1".into()), timestamp: ts(1) },
            RawError { project_id: "p1".into(), page: "/a".into(), error_type: "TypeError".into(), severity: 2, user_id: Some("u1".into()), timestamp: ts(2) },
            RawError { project_id: "p1".into(), page: "/a".into(), error_type: "TypeError".into(), severity: 3, user_id: Some("u2".into()), timestamp: ts(3) },
        ];
        let agg = aggregate_errors(&events, 5);
        assert_eq!(agg.len(), 1);
        let row = &agg[0];
        assert_eq!(row.errors_count, 3);
        assert_eq!(row.warning_count, 1);
        assert_eq!(row.critical_count, 1);
        assert!(row.warning_count + row.critical_count <= row.errors_count);
        assert_eq!(row.unique_users, 2);
    }

    #[test]
    fn performance_ignores_non_positive_samples_in_percentile_math() {
        let events = vec![
            RawPerformance { project_id: "p1".into(), page: "/a".into(), ttfb_ms: Some(0.0), fcp_ms: Some(100.0), lcp_ms: None, total_page_load_ms: None, timestamp: ts(1) },
            RawPerformance { project_id: "p1".into(), page: "/a".into(), ttfb_ms: Some(50.0), fcp_ms: Some(150.0), lcp_ms: None, total_page_load_ms: None, timestamp: ts(2) },
        ];
        let agg = aggregate_performance(&events, 5);
        assert_eq!(agg.len(), 1);
        let row = &agg[0];
        assert_eq!(row.samples_count, 2);
        assert_eq!(row.avg_ttfb_ms, 50.0);
        assert_eq!(row.avg_fcp_ms, 125.0);
    }
}
