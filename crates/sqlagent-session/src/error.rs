use thiserror::Error;

use sqlagent_gateway::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Blank or whitespace-only question. Never reaches the network.
    #[error("question is empty")]
    EmptyInput,

    /// Another submission is still pending.
    #[error("a submission is already in progress")]
    AlreadyInProgress,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
