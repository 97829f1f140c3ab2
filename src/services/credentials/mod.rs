pub mod endpoint;
pub mod manager;
pub mod store;
pub mod trigger;
pub mod types;

pub use endpoint::{EndpointError, GoogleOAuthClient, TokenEndpoint, TokenGrant};
pub use manager::CredentialManager;
pub use store::TokenStore;
pub use trigger::{ReauthOutcome, ReauthTrigger};
pub use types::{
    AuthState, ClientSecrets, Credential, CredentialError, CredentialStatus, TokenMaterial,
};
