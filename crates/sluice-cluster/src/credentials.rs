//! Credential extraction from node environment metadata.

use sluice_types::{Credentials, NodeId};

use crate::error::RegistryError;

const USER_KEYS: &[&str] = &["MINIO_ACCESS_KEY", "MINIO_ROOT_USER"];
const PASSWORD_KEYS: &[&str] = &["MINIO_SECRET_KEY", "MINIO_ROOT_PASSWORD"];

/// Find the access key pair in a node's `KEY=VALUE` environment.
///
/// Either recognized key name may supply each half; when several are present
/// the last entry wins. Entries without `=` are ignored.
pub fn extract_credentials(node: &NodeId, env: &[String]) -> Result<Credentials, RegistryError> {
    let mut user = "";
    let mut password = "";

    for entry in env {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        if USER_KEYS.contains(&key) {
            user = value;
        } else if PASSWORD_KEYS.contains(&key) {
            password = value;
        }
    }

    if user.is_empty() || password.is_empty() {
        return Err(RegistryError::MissingCredentials { node: node.clone() });
    }
    Ok(Credentials::new(user, password))
}
