use crate::domain::activeflow::{Activeflow, ActiveflowId};
use crate::CoreError;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the activeflow ID this event is associated with
    fn activeflow_id(&self) -> &ActiveflowId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;

    /// The published payload
    fn payload(&self) -> Result<serde_json::Value, CoreError>;
}

/// Event: activeflow created
#[derive(Debug)]
pub struct ActiveflowCreated {
    /// The record as created
    pub activeflow: Activeflow,

    /// The timestamp when the activeflow was created
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ActiveflowCreated {
    fn event_type(&self) -> &'static str {
        "activeflow_created"
    }

    fn activeflow_id(&self) -> &ActiveflowId {
        &self.activeflow.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn payload(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(&self.activeflow)?)
    }
}

/// Event: activeflow updated
#[derive(Debug)]
pub struct ActiveflowUpdated {
    /// The record after the update
    pub activeflow: Activeflow,

    /// The timestamp of the update
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ActiveflowUpdated {
    fn event_type(&self) -> &'static str {
        "activeflow_updated"
    }

    fn activeflow_id(&self) -> &ActiveflowId {
        &self.activeflow.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn payload(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(&self.activeflow)?)
    }
}

/// Event: activeflow deleted
#[derive(Debug)]
pub struct ActiveflowDeleted {
    /// The record as soft-deleted
    pub activeflow: Activeflow,

    /// The timestamp of the deletion
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for ActiveflowDeleted {
    fn event_type(&self) -> &'static str {
        "activeflow_deleted"
    }

    fn activeflow_id(&self) -> &ActiveflowId {
        &self.activeflow.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn payload(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(&self.activeflow)?)
    }
}
