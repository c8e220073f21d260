//! Azure AD credential selection and token acquisition.
//!
//! Two sources are supported:
//! - a service principal (tenant id, client id, client secret)
//! - the default Azure credential chain (environment, managed identity, Azure CLI)
//!
//! A token is requested only when a new connection has to be opened and is
//! dropped as soon as the TDS login has used it.

use crate::config::{CredentialConfig, DatabaseConfig};
use crate::constants::{AZURE_AUTHORITY_HOST, AZURE_SQL_SCOPE};
use crate::error::ServerError;
use azure_core::auth::TokenCredential;
use azure_identity::{ClientSecretCredential, DefaultAzureCredential, TokenCredentialOptions};
use std::fmt;
use std::sync::Arc;
use tiberius::{AuthMethod, Config, EncryptionLevel};
use tracing::debug;

/// Where the access token comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Client-secret flow for a registered application.
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },

    /// Whatever identity the platform provides.
    AmbientDefault,
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::AmbientDefault => f.write_str("AmbientDefault"),
        }
    }
}

impl CredentialSource {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServicePrincipal { .. } => "service principal",
            Self::AmbientDefault => "default credential chain",
        }
    }

    /// Build the identity-library credential for this source.
    pub fn build(&self) -> Result<Arc<dyn TokenCredential>, ServerError> {
        match self {
            Self::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                let authority_host: azure_core::Url = AZURE_AUTHORITY_HOST
                    .parse()
                    .map_err(|e| ServerError::credential(format!("Invalid authority host: {}", e)))?;

                Ok(Arc::new(ClientSecretCredential::new(
                    azure_core::new_http_client(),
                    authority_host,
                    tenant_id.clone(),
                    client_id.clone(),
                    client_secret.clone(),
                )))
            }
            Self::AmbientDefault => {
                let credential = DefaultAzureCredential::create(TokenCredentialOptions::default())
                    .map_err(|e| {
                        ServerError::credential(format!(
                            "Failed to build default Azure credential: {}",
                            e
                        ))
                    })?;
                Ok(Arc::new(credential))
            }
        }
    }
}

/// Choose the credential source.
///
/// The service principal is used only when all three fields are present and
/// non-empty.
pub fn resolve_credential(config: &CredentialConfig) -> CredentialSource {
    let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

    match (
        present(&config.tenant_id),
        present(&config.client_id),
        present(&config.client_secret),
    ) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => {
            CredentialSource::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            }
        }
        _ => CredentialSource::AmbientDefault,
    }
}

/// Request an Azure SQL access token.
pub async fn acquire_token(source: &CredentialSource) -> Result<String, ServerError> {
    debug!("Acquiring Azure SQL access token via {}", source.kind());

    let credential = source.build()?;
    let response = credential
        .get_token(&[AZURE_SQL_SCOPE])
        .await
        .map_err(|e| {
            ServerError::credential(format!(
                "Failed to acquire access token via {}: {}",
                source.kind(),
                e
            ))
        })?;

    debug!("Access token acquired");
    Ok(response.token.secret().to_string())
}

/// Build the tiberius configuration for an Azure SQL login with `token`.
///
/// Encryption is always required. Certificate validation stays on unless
/// `trust_server_certificate` is set.
pub fn create_token_config(db_config: &DatabaseConfig, token: String) -> Result<Config, ServerError> {
    let (server, database) = db_config.target()?;

    let mut config = Config::new();
    config.host(server);
    config.port(db_config.port);
    config.database(database);
    config.encryption(EncryptionLevel::Required);
    if db_config.trust_server_certificate {
        config.trust_cert();
    }
    config.application_name(&db_config.application_name);
    config.authentication(AuthMethod::aad_token(token));

    Ok(config)
}

/// Truncate a string for logging purposes.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
