//! Infrastructure adapters for the Triggergate gateway ports.

#![forbid(unsafe_code)]

mod file_auth_config_store;
mod github_app_directory;
mod github_workflow_gateway;
mod oidc_token_verifier;
mod zip_result_unpacker;

pub use file_auth_config_store::FileAuthConfigStore;
pub use github_app_directory::GithubAppInstallationDirectory;
pub use github_workflow_gateway::GithubWorkflowGateway;
pub use oidc_token_verifier::OidcTokenVerifier;
pub use zip_result_unpacker::ZipResultUnpacker;
