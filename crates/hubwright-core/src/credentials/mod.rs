//! Encrypted per-provider credential storage and discovery.

mod cipher;
mod discovery;
mod error;
mod providers;
mod store;

pub use cipher::SecretCipher;
pub use discovery::{DiscoveryContext, extract_secret};
pub use error::{CredentialError, CredentialResult};
pub use providers::{config_file_paths, env_var_names};
pub use store::CredentialStore;
