//! Call interception pipeline: context resolution, body capture, audit,
//! error normalization and saga dispatch.

pub mod buffer;
pub mod bypass;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod layer;
pub mod normalizer;
pub mod recorder;
pub mod resolver;
pub mod saga;

pub use bypass::{can_bypass_context_generation, ExemptCalls};
pub use config::LogwareConfig;
pub use endpoint::{EndpointMarker, EndpointMetadata, EndpointProvider, EndpointRegistry};
pub use error::{BusinessError, CallError};
pub use extract::Caller;
pub use layer::{LogwareBuilder, LogwareLayer, LogwareService};
pub use normalizer::ExceptionNormalizer;
pub use recorder::{AuditRecorder, RecordOutcome};
pub use resolver::{ContextResolver, CONTEXT_HEADER};
pub use saga::{plan_dispatch, DispatchInput, DispatchPlan, SagaDispatcher, SkipReason};
