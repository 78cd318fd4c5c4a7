use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

pub const TIMING_TARGET: &str = "booth.timing";

#[derive(Debug)]
pub struct RequestTimer {
    route: String,
    metadata: Option<String>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    status: String,
    detail: Option<String>,
    completed: bool,
}

impl RequestTimer {
    pub fn new(route: &str) -> Self {
        RequestTimer {
            route: route.to_string(),
            metadata: None,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            status: "success".to_string(),
            detail: None,
            completed: false,
        }
    }

    pub fn set_metadata(&mut self, metadata: &str) {
        let flattened = metadata.replace('\n', " ");
        self.metadata = Some(crate::utils::http::truncate_for_log(&flattened, 300));
    }

    pub fn log_received(&self) {
        info!(
            target: TIMING_TARGET,
            "event=request_received route={} received_at={}",
            self.route,
            self.started_at.to_rfc3339()
        );
    }

    pub fn mark_status(&mut self, status: &str, detail: Option<String>) {
        self.status = status.to_string();
        self.detail = detail;
    }

    pub fn log_completed(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completed_at = Utc::now();
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed route={} started_at={} completed_at={} duration_s={:.3} status={} metadata={:?} detail={}",
            self.route,
            self.started_at.to_rfc3339(),
            completed_at.to_rfc3339(),
            duration,
            self.status,
            self.metadata,
            self.detail.clone().unwrap_or_default()
        );
    }
}

impl Drop for RequestTimer {
    // A handler future dropped mid-flight never reaches `log_completed`.
    fn drop(&mut self) {
        if !self.completed {
            self.mark_status("aborted", None);
            self.log_completed();
        }
    }
}

pub fn start_request_timer(route: &str) -> RequestTimer {
    let timer = RequestTimer::new(route);
    timer.log_received();
    timer
}

pub fn complete_request_timer(timer: &mut RequestTimer, status: &str, detail: Option<String>) {
    timer.mark_status(status, detail);
    timer.log_completed();
}

pub async fn log_upstream_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_at = Utc::now();
    let started_perf = Instant::now();
    info!(
        target: TIMING_TARGET,
        "event=upstream_request provider={} model={} operation={} started_at={}",
        provider,
        model,
        operation,
        started_at.to_rfc3339()
    );

    let result = call().await;
    let status = match &result {
        Ok(_) => "success".to_string(),
        Err(err) => format!("error:{err}"),
    };

    let completed_at = Utc::now();
    let duration = started_perf.elapsed().as_secs_f64();
    info!(
        target: TIMING_TARGET,
        "event=upstream_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={}",
        provider,
        model,
        operation,
        completed_at.to_rfc3339(),
        duration,
        crate::utils::http::truncate_for_log(&status, 300)
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upstream_timing_passes_result_through() {
        let ok: Result<u32, String> =
            log_upstream_timing("test", "model", "op", || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            log_upstream_timing("test", "model", "op", || async { Err("boom".to_string()) })
                .await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn completion_is_logged_once() {
        let mut timer = start_request_timer("/analyze");
        timer.set_metadata("ISO 800,\nf/7.1");
        assert_eq!(timer.metadata.as_deref(), Some("ISO 800, f/7.1"));
        complete_request_timer(&mut timer, "error", Some("boom".to_string()));
        assert!(timer.completed);
        assert_eq!(timer.status, "error");
        drop(timer);
    }
}
