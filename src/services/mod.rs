pub mod oidc;
pub mod provisioning;
pub mod session;
pub mod user_store;
