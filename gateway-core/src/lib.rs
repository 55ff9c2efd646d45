//! Provider Gateway Core Library
//!
//! One resilient interface over heterogeneous AI text-processing providers:
//! a uniform adapter contract, error classification with retry guidance,
//! a redacting request/response debugger, connection diagnostics and the
//! [`ServiceManager`] façade that ties them together.

mod call;

pub mod classify;
pub mod config;
pub mod debug;
pub mod diagnostics;
pub mod http;
pub mod manager;
pub mod protocol;
pub mod providers;

pub use classify::{ClassifiedError, ErrorClassifier, ErrorLevel};
pub use config::{GatewayConfig, ProviderConfig, ProviderKind};
pub use debug::{LogEntry, RequestLogger};
pub use diagnostics::{BackoffPolicy, ConnectionTester, TestOptions, TestResult};
pub use manager::{GatewayError, InvocationFailure, InvokeOptions, ServiceManager};
pub use protocol::{Operation, OperationOutput, OperationRequest, Options};
pub use providers::{AdapterError, ProviderAdapter};

/// Returns the version of the gateway core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
