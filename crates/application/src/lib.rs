//! Application services and ports for the Triggergate gateway.

#![forbid(unsafe_code)]

mod auth_ports;
mod authorization_service;
mod call_handler;
mod workflow_call_service;
mod workflow_ports;

pub use auth_ports::{AuthConfigStore, TokenVerifier};
pub use authorization_service::{AuthDecision, AuthorizationService};
pub use call_handler::{CallHandler, CallRequest, CallResponder};
pub use workflow_call_service::{PollSettings, WorkflowCallService};
pub use workflow_ports::{
    InstallationDirectory, InstallationId, ResultUnpacker, WorkflowRunGateway,
};
