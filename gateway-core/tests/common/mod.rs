//! Scripted adapters shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use gateway_core::protocol::{
    Capabilities, ConnectionStatus, Entity, ModelInfo, Operation, Options,
};
use gateway_core::providers::{AdapterError, AdapterResult, ProviderAdapter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// What a scripted call does
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(AdapterError),
    Hang,
}

/// Adapter whose calls follow a script; once the script runs out the
/// fallback step repeats
pub struct ScriptedAdapter {
    id: String,
    declared: &'static [Operation],
    reported: Option<Vec<Operation>>,
    self_report_hangs: bool,
    script: Mutex<Vec<Step>>,
    fallback: Step,
    calls: AtomicU32,
    seen_options: Mutex<Vec<Options>>,
}

pub const CONTENT_AND_PROBES: &[Operation] = &[
    Operation::Summarize,
    Operation::ExtractEntities,
    Operation::TestConnection,
    Operation::GetCapabilities,
    Operation::GetModels,
];

pub const SUMMARIZE_ONLY: &[Operation] = &[Operation::Summarize, Operation::GetCapabilities];

impl ScriptedAdapter {
    pub fn new(id: &str, declared: &'static [Operation]) -> Self {
        Self {
            id: id.to_string(),
            declared,
            reported: None,
            self_report_hangs: false,
            script: Mutex::new(Vec::new()),
            fallback: Step::Succeed,
            calls: AtomicU32::new(0),
            seen_options: Mutex::new(Vec::new()),
        }
    }

    /// Steps taken in order before the fallback applies
    pub fn with_script(self, steps: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = steps.into_iter().rev().collect();
        self
    }

    pub fn with_fallback(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Self-report differing from the declared operations
    pub fn reporting(mut self, operations: Vec<Operation>) -> Self {
        self.reported = Some(operations);
        self
    }

    /// `get_capabilities` never answers
    pub fn with_hanging_self_report(mut self) -> Self {
        self.self_report_hangs = true;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_options(&self) -> Vec<Options> {
        self.seen_options.lock().unwrap().clone()
    }

    async fn step(&self) -> AdapterResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| self.fallback.clone());
        match step {
            Step::Succeed => Ok(()),
            Step::Fail(error) => Err(error),
            Step::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn declared_operations(&self) -> &'static [Operation] {
        self.declared
    }

    async fn summarize(&self, text: &str, options: &Options) -> AdapterResult<String> {
        self.seen_options.lock().unwrap().push(options.clone());
        self.step().await?;
        Ok(format!("summary of {} chars", text.len()))
    }

    async fn extract_entities(&self, text: &str, options: &Options) -> AdapterResult<Vec<Entity>> {
        self.seen_options.lock().unwrap().push(options.clone());
        self.step().await?;
        Ok(text
            .split_whitespace()
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .map(|w| Entity::new(w, "MISC", 0.9))
            .collect())
    }

    async fn test_connection(&self) -> AdapterResult<ConnectionStatus> {
        self.step().await?;
        Ok(ConnectionStatus::ok("Connected"))
    }

    async fn get_capabilities(&self) -> AdapterResult<Capabilities> {
        if self.self_report_hangs {
            std::future::pending::<()>().await;
        }
        let operations = self
            .reported
            .clone()
            .unwrap_or_else(|| self.declared.to_vec());
        Ok(Capabilities::new(operations))
    }

    async fn get_models(&self) -> AdapterResult<Vec<ModelInfo>> {
        self.step().await?;
        Ok(vec![ModelInfo::new(format!("{}-model", self.id))])
    }
}

/// Route gateway tracing to the test output; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn unavailable() -> AdapterError {
    AdapterError::status(503, "service unavailable")
}
