//! Domain model for the Triggergate workflow gateway.

#![forbid(unsafe_code)]

mod call;
mod policy;
mod run;

pub use call::{CallAddress, CallInput, CallType, MIN_WAITING_TIME_SECONDS};
pub use policy::{AuthConfig, CallPermission, GroupInfo, GroupPermissions, UniqueGroupName};
pub use run::{RunArtifact, WorkflowRun};
