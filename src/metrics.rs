//! Prometheus metrics for HTTP traffic and process health.
//!
//! This module provides:
//! - Request duration histogram and request counter, labelled by method,
//!   normalized route and status code
//! - Process-level gauges refreshed on every scrape
//! - The middleware that records one sample per request

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::{Lazy, OnceCell};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use crate::error::AppError;

// === Metric Name Constants ===

/// HTTP request duration histogram metric name.
pub const METRIC_HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// Process start time metric name.
pub const METRIC_PROCESS_START_TIME: &str = "process_start_time_seconds";
/// Process uptime metric name.
pub const METRIC_PROCESS_UPTIME: &str = "process_uptime_seconds";
/// Resident memory metric name.
pub const METRIC_PROCESS_RESIDENT_MEMORY: &str = "process_resident_memory_bytes";
/// OS thread count metric name.
pub const METRIC_PROCESS_THREADS: &str = "process_threads";
/// Runtime worker count metric name.
pub const METRIC_TOKIO_WORKERS: &str = "tokio_workers";
/// Alive task count metric name.
pub const METRIC_TOKIO_ALIVE_TASKS: &str = "tokio_alive_tasks";
/// Global queue depth metric name.
pub const METRIC_TOKIO_GLOBAL_QUEUE_DEPTH: &str = "tokio_global_queue_depth";

/// Path of the exposition endpoint. Requests to it are never recorded.
pub const METRICS_PATH: &str = "/metrics";
/// Value of the `app` label attached to every metric.
pub const APP_LABEL: &str = "cicd-demo-app";
/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
/// Histogram buckets for request duration, in seconds.
pub const HTTP_DURATION_BUCKETS: [f64; 9] = [0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

/// Process start, as a monotonic instant and as unix seconds.
static PROCESS_START: Lazy<(Instant, f64)> = Lazy::new(|| {
    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    (Instant::now(), unix)
});

/// Install the process-wide Prometheus recorder and return its handle.
///
/// Safe to call more than once; later calls return the same handle.
pub fn install_recorder() -> Result<PrometheusHandle, AppError> {
    RECORDER
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .add_global_label("app", APP_LABEL)
                .set_buckets_for_metric(
                    Matcher::Full(METRIC_HTTP_REQUEST_DURATION.to_string()),
                    &HTTP_DURATION_BUCKETS,
                )
                .map_err(|e| AppError::Metrics(e.to_string()))?
                .install_recorder()
                .map_err(|e| AppError::Metrics(e.to_string()))?;

            Lazy::force(&PROCESS_START);
            describe_metrics();
            Ok(handle)
        })
        .cloned()
}

/// Register metric descriptions.
fn describe_metrics() {
    describe_histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Duration of HTTP requests in seconds"
    );
    describe_counter!(METRIC_HTTP_REQUESTS_TOTAL, "Total number of HTTP requests");

    describe_gauge!(
        METRIC_PROCESS_START_TIME,
        metrics::Unit::Seconds,
        "Start time of the process since unix epoch in seconds"
    );
    describe_gauge!(
        METRIC_PROCESS_UPTIME,
        metrics::Unit::Seconds,
        "Process uptime in seconds"
    );
    describe_gauge!(
        METRIC_PROCESS_RESIDENT_MEMORY,
        metrics::Unit::Bytes,
        "Resident memory size in bytes"
    );
    describe_gauge!(METRIC_PROCESS_THREADS, "Number of OS threads in the process");
    describe_gauge!(METRIC_TOKIO_WORKERS, "Number of async runtime worker threads");
    describe_gauge!(METRIC_TOKIO_ALIVE_TASKS, "Number of alive async tasks");
    describe_gauge!(
        METRIC_TOKIO_GLOBAL_QUEUE_DEPTH,
        "Tasks waiting in the runtime's global queue"
    );

    debug!("Metrics initialized");
}

/// Record one completed HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16, elapsed: Duration) {
    histogram!(
        METRIC_HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_code" => status.to_string()
    )
    .record(elapsed.as_secs_f64());

    counter!(
        METRIC_HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_code" => status.to_string()
    )
    .increment(1);
}

/// Route label for a request: the matched route template, or the raw path
/// when nothing matched.
///
/// Unmatched paths are recorded verbatim, so arbitrary 404 paths each get
/// their own label.
pub fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map_or_else(|| req.uri().path().to_owned(), |p| p.as_str().to_owned())
}

/// Middleware recording duration and count for every request except scrapes.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    if req.uri().path() == METRICS_PATH {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().to_string();
    let route = route_label(&req);

    let response = next.run(req).await;

    record_http_request(&method, &route, response.status().as_u16(), start.elapsed());
    response
}

/// Refresh process gauges and render every metric in exposition format.
pub fn render(handle: &PrometheusHandle) -> String {
    collect_process_metrics();
    handle.render()
}

/// Process table handle, refreshed for this process only on each scrape.
static SYSTEM: Lazy<Mutex<System>> = Lazy::new(|| Mutex::new(System::new()));

/// Resident memory and OS thread count of this process.
fn process_usage() -> Option<(u64, Option<usize>)> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = SYSTEM.lock().unwrap_or_else(|e| e.into_inner());
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory().with_tasks(),
    );
    let process = sys.process(pid)?;
    // Thread lists are only reported on Linux.
    Some((process.memory(), process.tasks().map(|tasks| tasks.len())))
}

/// Update process-level gauges.
pub fn collect_process_metrics() {
    let (started, start_unix) = *PROCESS_START;
    gauge!(METRIC_PROCESS_START_TIME).set(start_unix);
    gauge!(METRIC_PROCESS_UPTIME).set(started.elapsed().as_secs_f64());

    if let Some((resident_bytes, threads)) = process_usage() {
        gauge!(METRIC_PROCESS_RESIDENT_MEMORY).set(resident_bytes as f64);
        if let Some(threads) = threads {
            gauge!(METRIC_PROCESS_THREADS).set(threads as f64);
        }
    }

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let m = runtime.metrics();
        gauge!(METRIC_TOKIO_WORKERS).set(m.num_workers() as f64);
        gauge!(METRIC_TOKIO_ALIVE_TASKS).set(m.num_alive_tasks() as f64);
        gauge!(METRIC_TOKIO_GLOBAL_QUEUE_DEPTH).set(m.global_queue_depth() as f64);
    }
}
