//! Forge Generation Port
//!
//! Abstraction over "send a prompt, receive raw text". The port enforces a
//! cancelling deadline per call, retries transient failures with exponential
//! backoff and never retries a rejection.
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_model::{BackendConfig, GenerationPort, InvokeOptions, OpenAiCompatibleBackend};
//! use std::sync::Arc;
//!
//! let backend = OpenAiCompatibleBackend::new(BackendConfig::default().with_api_key(key))?;
//! let port = GenerationPort::new(Arc::new(backend));
//! let raw = port.invoke("Describe a calculator app as JSON", InvokeOptions::default()).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod http;
mod port;
mod request;
mod retry;

pub use error::GenerationError;
pub use http::{classify_status, BackendConfig, OpenAiCompatibleBackend, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use port::{GenerationBackend, GenerationPort};
pub use request::{GenerationParams, GenerationRequest, GenerationResponse, InvokeOptions, RawResponse};
pub use retry::{is_retryable_status, RetryPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
