//! Error types for policies and configuration.

/// Contract violations by a policy. Each one halts the offending node only.
///
/// Duplicate deliveries, forks and orphans are normal divergence and are
/// never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy on {node_id} was consulted before a chain state was bound")]
    UnboundState { node_id: String },

    #[error("policy on {node_id} chose unknown parent block {parent_hash}")]
    InvalidParentChoice {
        node_id: String,
        parent_hash: String,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("unknown policy kind: {0}")]
    UnknownPolicy(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
