//! Centralized error handling for the stream resolver
//!
//! Errors are split by the layer that produces them:
//!
//! - **Provider Errors**: upstream HTTP calls (search, detail, metadata) made
//!   through the request gateway
//! - **Application Errors**: configuration, validation and anything that
//!   escapes a pipeline stage
//!
//! Pipeline stages degrade provider failures into "no results"; only the
//! binary edge ever sees an [`AppError`].
//!
//! # Usage
//!
//! ```rust
//! use stream_resolver::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::validation("empty identifier"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for provider call Results
pub type ProviderResult<T> = Result<T, ProviderError>;
