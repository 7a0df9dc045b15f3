//!
//! Activeflow Core - stack-based execution engine for telephony flows
//!
//! An activeflow is one running instance of a flow bound to a reference
//! (a call, a conversation, a campaign). This crate defines the action and
//! stack model, the variable store, the record store contract with its lease
//! lock, and the engine that advances an activeflow action by action.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - actions, stacks, the activeflow aggregate and its ports
pub mod domain;

/// Application services - record store, variables, lifecycle and engine
pub mod application;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

// Re-export key types
pub use config::EngineConfig;
pub use error::CoreError;

// Application services
pub use application::activeflow_service::{ActiveflowService, CreateActiveflow};
pub use application::event_publisher::{BroadcastEventHandler, DomainEventHandler, PublishedEvent};
pub use application::lease::Lease;
pub use application::record_store::ActiveflowStore;
pub use application::variable_service::VariableService;

// Re-export main API types for easy use
pub use domain::action::{Action, ActionId, ActionType};
pub use domain::activeflow::{
    Activeflow, ActiveflowId, ActiveflowStatus, CustomerId, FlowId, ReferenceType,
};
pub use domain::lock::{LeaseLock, LeaseToken};
pub use domain::repository::{ActiveflowFilter, ActiveflowRepository, Page, VariableRepository};
pub use domain::rpc::RpcFacade;
pub use domain::stack::{StackId, StackMap};
pub use domain::variable::Variable;
