//! Event-feed (document change feed) trigger model.

use serde::{Deserialize, Serialize};

use crate::describe::TypeRef;

/// How a change-feed command is built from the incoming documents.
///
/// Chosen once by the normalizer from the command type's contracts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandShape {
    /// Each document is deserialized into the command.
    #[default]
    Plain,
    /// The command wraps one document.
    SingleDocument,
    /// The command wraps the whole batch.
    DocumentBatch,
}

/// A command property populated from a feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandProperty {
    pub name: String,
    /// Field name in the stored document.
    pub store_name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub type_name: String,
}

/// Event-feed specific part of a function definition.
#[derive(Debug, Clone, Serialize)]
pub struct EventFeedTrigger {
    pub connection_name: String,
    pub collection_name: String,
    pub database_name: String,
    pub lease_connection_name: Option<String>,
    pub lease_collection_name: String,
    pub lease_database_name: Option<String>,
    pub create_lease_collection_if_not_exists: bool,
    pub start_from_beginning: bool,
    pub convert_to_pascal_case: bool,
    pub lease_collection_prefix: Option<String>,
    pub max_items_per_invocation: Option<u32>,
    /// Milliseconds.
    pub feed_poll_delay: Option<u32>,
    pub lease_acquire_interval: Option<u32>,
    pub lease_expiration_interval: Option<u32>,
    pub lease_renew_interval: Option<u32>,
    pub checkpoint_frequency: Option<u32>,
    pub leases_collection_throughput: Option<u32>,
    /// Type invoked when the handler fails for a document.
    pub error_handler: Option<String>,

    // Populated by the normalizer.
    pub command_properties: Vec<CommandProperty>,
    pub command_shape: CommandShape,
}

impl EventFeedTrigger {
    pub fn new(
        connection_name: impl Into<String>,
        collection_name: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            connection_name: connection_name.into(),
            collection_name: collection_name.into(),
            database_name: database_name.into(),
            lease_connection_name: None,
            lease_collection_name: "leases".to_string(),
            lease_database_name: None,
            create_lease_collection_if_not_exists: true,
            start_from_beginning: false,
            convert_to_pascal_case: false,
            lease_collection_prefix: None,
            max_items_per_invocation: None,
            feed_poll_delay: None,
            lease_acquire_interval: None,
            lease_expiration_interval: None,
            lease_renew_interval: None,
            checkpoint_frequency: None,
            leases_collection_throughput: None,
            error_handler: None,
            command_properties: Vec::new(),
            command_shape: CommandShape::Plain,
        }
    }

    /// Lease database, falling back to the monitored database.
    pub fn lease_database(&self) -> &str {
        self.lease_database_name
            .as_deref()
            .unwrap_or(&self.database_name)
    }

    /// Lease connection, falling back to the monitored connection.
    pub fn lease_connection(&self) -> &str {
        self.lease_connection_name
            .as_deref()
            .unwrap_or(&self.connection_name)
    }
}
