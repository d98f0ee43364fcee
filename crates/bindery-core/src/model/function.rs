//! Function definitions.

use serde::Serialize;

use super::{EventFeedTrigger, HttpTrigger};
use crate::describe::TypeRef;

/// Trigger-specific part of a definition.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Http(HttpTrigger),
    EventFeed(EventFeedTrigger),
}

/// One declared function: a command type plus the trigger that invokes it.
///
/// Serialized as the data context of the function's source template.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    /// Unit name; unique within one function app.
    pub name: String,
    /// Stamped by the normalizer.
    pub namespace: String,
    /// Fully-qualified path of the command type.
    pub command_type: String,
    pub command_result_type: Option<TypeRef>,
    /// Rust spelling of the result type, stamped by the normalizer.
    pub result_type_name: Option<String>,
    pub command_deserializer: Option<String>,
    pub is_using_validator: bool,
    pub trigger: Trigger,
}

impl FunctionDefinition {
    /// Definition named after the command type, without a `Command` suffix.
    pub fn new(command_type: impl Into<String>, trigger: Trigger) -> Self {
        let command_type = command_type.into();
        Self {
            name: default_function_name(&command_type),
            namespace: String::new(),
            command_type,
            command_result_type: None,
            result_type_name: None,
            command_deserializer: None,
            is_using_validator: false,
            trigger,
        }
    }

    pub fn http(&self) -> Option<&HttpTrigger> {
        match &self.trigger {
            Trigger::Http(http) => Some(http),
            Trigger::EventFeed(_) => None,
        }
    }

    pub fn http_mut(&mut self) -> Option<&mut HttpTrigger> {
        match &mut self.trigger {
            Trigger::Http(http) => Some(http),
            Trigger::EventFeed(_) => None,
        }
    }

    pub fn event_feed(&self) -> Option<&EventFeedTrigger> {
        match &self.trigger {
            Trigger::EventFeed(feed) => Some(feed),
            Trigger::Http(_) => None,
        }
    }

    pub fn event_feed_mut(&mut self) -> Option<&mut EventFeedTrigger> {
        match &mut self.trigger {
            Trigger::EventFeed(feed) => Some(feed),
            Trigger::Http(_) => None,
        }
    }

    /// Template used to synthesize this definition's source unit.
    pub fn template_id(&self) -> &'static str {
        match self.trigger {
            Trigger::Http(_) => "http",
            Trigger::EventFeed(_) => "event_feed",
        }
    }
}

fn default_function_name(command_type: &str) -> String {
    let short = command_type.rsplit("::").next().unwrap_or(command_type);
    match short.strip_suffix("Command") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => short.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SharedRoute;

    #[test]
    fn test_default_name_strips_command_suffix() {
        assert_eq!(default_function_name("shop::GetWidgetCommand"), "GetWidget");
        assert_eq!(default_function_name("shop::Command"), "Command");
        assert_eq!(default_function_name("Ping"), "Ping");
    }

    #[test]
    fn test_trigger_serializes_with_kind_tag() {
        let http = HttpTrigger::new(SharedRoute::new("widgets"), Some("widgets".into()));
        let definition = FunctionDefinition::new("shop::GetWidget", Trigger::Http(http));

        let context = serde_json::to_value(&definition).unwrap();
        assert_eq!(context["trigger"]["kind"], "http");
        assert_eq!(context["trigger"]["route_configuration"]["route"], "widgets");
        assert_eq!(definition.template_id(), "http");
    }
}
