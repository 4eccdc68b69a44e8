//! Deterministic in-process engine for tests and dry demos.
//!
//! Succeeds by default, writing a small text artifact that lists the request.
//! Rules keyed on one `(parameter, value)` pair make matching requests fail,
//! hang until dropped, or sleep before succeeding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::engine::{Artifact, RenderEngine, RenderRequest};
use crate::error::{io_err, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubBehavior {
    Succeed,
    Fail(String),
    /// Never completes; only a timeout ends it.
    Hang,
    Delay(Duration),
}

#[derive(Debug, Clone)]
struct Rule {
    param: String,
    value: String,
    behavior: StubBehavior,
}

/// Decrements the in-flight counter even when the render future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct StubEngine {
    rules: Vec<Rule>,
    calls: Mutex<Vec<RenderRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, param: &str, value: &str, behavior: StubBehavior) -> Self {
        self.rules.push(Rule {
            param: param.to_string(),
            value: value.to_string(),
            behavior,
        });
        self
    }

    pub fn fail_when(self, param: &str, value: &str, message: &str) -> Self {
        self.rule(param, value, StubBehavior::Fail(message.to_string()))
    }

    pub fn hang_when(self, param: &str, value: &str) -> Self {
        self.rule(param, value, StubBehavior::Hang)
    }

    pub fn delay_when(self, param: &str, value: &str, delay: Duration) -> Self {
        self.rule(param, value, StubBehavior::Delay(delay))
    }

    /// First matching rule wins.
    pub fn behavior_for(&self, request: &RenderRequest) -> StubBehavior {
        self.rules
            .iter()
            .find(|r| request.params.get(&r.param) == Some(&r.value))
            .map(|r| r.behavior.clone())
            .unwrap_or(StubBehavior::Succeed)
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<RenderRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Highest number of renders observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn artifact_body(request: &RenderRequest) -> String {
        let mut body = format!("template={}\nformat={}\n", request.template, request.format);
        for (k, v) in &request.params {
            body.push_str(&format!("{k}={v}\n"));
        }
        body
    }
}

#[async_trait]
impl RenderEngine for StubEngine {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match self.behavior_for(request) {
            StubBehavior::Fail(message) => return Err(EngineError::Rejected(message)),
            StubBehavior::Hang => std::future::pending::<()>().await,
            StubBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            StubBehavior::Succeed => {}
        }

        tokio::fs::write(&request.destination, Self::artifact_body(request))
            .await
            .map_err(|e| io_err(&request.destination, e))?;
        Ok(Artifact {
            path: request.destination.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use quire_core::{OutputFormat, TemplateRef};

    use super::*;

    fn request(unit: &str, dest: std::path::PathBuf) -> RenderRequest {
        let mut params = BTreeMap::new();
        params.insert("unit".to_string(), unit.to_string());
        RenderRequest {
            template: TemplateRef::from("t.qmd"),
            params,
            format: OutputFormat::Html,
            destination: dest,
        }
    }

    #[tokio::test]
    async fn default_behavior_writes_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("a.html");
        let engine = StubEngine::new();
        engine.render(&request("A", dest.clone())).await.expect("render");
        let body = std::fs::read_to_string(&dest).unwrap();
        assert!(body.contains("format=html"));
        assert!(body.contains("unit=A"));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn fail_rule_rejects_only_matching_value() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = StubEngine::new().fail_when("unit", "B", "no data for B");
        let err = engine
            .render(&request("B", dir.path().join("b.html")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(ref m) if m == "no data for B"));
        assert!(!dir.path().join("b.html").exists());
        engine
            .render(&request("A", dir.path().join("a.html")))
            .await
            .expect("A still renders");
    }

    #[tokio::test(start_paused = true)]
    async fn hang_rule_never_completes() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = StubEngine::new().hang_when("unit", "A");
        let req = request("A", dir.path().join("a.html"));
        let result = tokio::time::timeout(Duration::from_secs(5), engine.render(&req)).await;
        assert!(result.is_err(), "hang must only end by timeout");
        assert_eq!(engine.in_flight.load(Ordering::SeqCst), 0, "guard released on drop");
    }
}
