//! Source synthesis.
//!
//! Each normalized definition is rendered through the template named by
//! [`FunctionDefinition::template_id`](crate::model::FunctionDefinition::template_id)
//! with the definition itself as the data context. A startup unit indexes
//! every function, and an explorer unit is added when an API explorer route
//! is configured.

mod synthesizer;
mod template;

pub use synthesizer::{OPENAPI_UI_UNIT, SourceSynthesizer, SourceUnit, SynthesisInput};
pub use template::{
    BuiltinTemplates, DirectoryTemplates, PlaceholderRenderer, TemplateProvider, TemplateRenderer,
};
