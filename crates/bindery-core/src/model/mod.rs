//! Definition model.
//!
//! Definitions are created by the [`builder`], completed in place by the
//! normalizer and then read by the OpenAPI assembler and the source
//! synthesizer. Fields documented as "populated by the normalizer" are never
//! set by users.

pub mod builder;
mod event_feed;
mod function;
mod http;

pub use event_feed::{CommandProperty, CommandShape, EventFeedTrigger};
pub use function::{FunctionDefinition, Trigger};
pub use http::{
    AuthorizationKind, HeaderBindingConfiguration, HttpMethod, HttpParameter, HttpTrigger,
    ResponseConfiguration, RouteConfiguration, SharedRoute, join_route, route_tokens,
};
