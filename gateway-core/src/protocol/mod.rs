//! Protocol module for gateway request/response structures
//!
//! This module defines the canonical data models shared by callers and
//! provider adapters. These structures are designed to be:
//! - Provider-agnostic
//! - Serializable, so callers can persist results directly
//! - Extensible through loose options and custom capability flags

pub mod types;

pub use types::{
    Capabilities, CategoryScore, ConnectionStatus, Entity, KeywordScore, ModelInfo, Operation,
    OperationOutput, OperationRequest, Options, QualityScore, UsageInfo, DEFAULT_TIMEOUT,
};
