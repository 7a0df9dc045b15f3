/// The per-activeflow lease
pub mod lease;

/// Activeflow records behind the lease lock
pub mod record_store;

/// Variable bags
pub mod variable_service;

/// Event publishing
pub mod event_publisher;

/// Activeflow lifecycle operations
pub mod activeflow_service;

/// The advance loop
pub mod engine;

/// Per-type action handlers
pub mod handlers;
