pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod payload;
pub mod publisher;
pub mod rate_limiter;
pub mod response;
pub mod schema;
pub mod server;
pub mod timestamp;
pub mod transform;
pub mod validation;

pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use handlers::{AppState, RequestHandler};
pub use server::create_app;
