pub mod cache;
pub mod config;
pub mod context;
pub mod errors;
pub mod gateway;
pub mod matching;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod queue;
pub mod resolver;
pub mod search;
pub mod streams;
pub mod utils;

pub use config::Config;
pub use context::ResolverContext;
pub use errors::{AppError, AppResult};
pub use pipeline::{PipelineProviders, StreamResolver};
