//! The generative-API boundary: a transport-agnostic provider trait, one
//! concrete REST implementation, and the retry/rotation/throttling core
//! that sits in front of it.

pub mod client;
pub mod config;
pub mod key_pool;
pub mod provider;
pub mod providers;
pub mod retry;

pub use client::ApiClient;
pub use config::ApiClientConfig;
pub use provider::{GenerateRequest, GenerateResponse, GenerativeClient, HistoryTurn, ModelInfo};
