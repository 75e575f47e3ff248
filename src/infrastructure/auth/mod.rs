//! Authentication infrastructure: the validation pipeline and the engine
//! that framework adapters call

mod engine;
mod pipeline;

pub use engine::{AuthEngine, AuthRequest, AuthzDecision};
pub use pipeline::ValidationPipeline;
