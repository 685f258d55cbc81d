//! # Service Tokens
//!
//! Stateless JWTs identifying the worker services that call back into the
//! orchestrator. Tokens are signed with an HS256 shared secret or an RS256
//! key pair, depending on configuration.

use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::permissions::{has_permission, ServicePermission, ServiceType};
use crate::config::{AuthConfig, JwtAlgorithm};
use crate::constants::MAX_TOKEN_TTL_SECONDS;
use crate::models::TaskType;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Key parsing error: {0}")]
    KeyParsingError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("JWT processing error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthFormat,

    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Permission {permission} cannot be granted to {service_type}")]
    PermissionNotGrantable {
        service_type: ServiceType,
        permission: ServicePermission,
    },
}

/// JWT claims carried by a service token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceClaims {
    /// Subject (service identifier, recorded as the task's worker id)
    pub sub: String,
    pub service_type: ServiceType,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Unique token id
    pub jti: String,
}

impl ServiceClaims {
    pub fn service_id(&self) -> &str {
        &self.sub
    }

    pub fn has_permission(&self, permission: ServicePermission) -> bool {
        has_permission(&self.permissions, &permission)
    }

    /// A worker may report on a task only with `tasks:update` and only for task types it handles
    pub fn authorize_task_update(&self, task_type: TaskType) -> Result<(), AuthError> {
        if !self.has_permission(ServicePermission::TasksUpdate) {
            return Err(AuthError::InsufficientPermissions(format!(
                "{} lacks {}",
                self.sub,
                ServicePermission::TasksUpdate
            )));
        }
        if !self.service_type.handles(task_type) {
            return Err(AuthError::InsufficientPermissions(format!(
                "{} ({}) does not handle {task_type} tasks",
                self.sub, self.service_type
            )));
        }
        Ok(())
    }
}

/// Issues and validates service tokens
#[derive(Clone)]
pub struct ServiceTokenIssuer {
    config: AuthConfig,
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: Option<DecodingKey>,
}

impl std::fmt::Debug for ServiceTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTokenIssuer")
            .field("enabled", &self.config.enabled)
            .field("algorithm", &self.algorithm)
            .field("has_encoding_key", &self.encoding_key.is_some())
            .field("has_decoding_key", &self.decoding_key.is_some())
            .finish()
    }
}

impl ServiceTokenIssuer {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let algorithm = match config.algorithm {
            JwtAlgorithm::Hs256 => Algorithm::HS256,
            JwtAlgorithm::Rs256 => Algorithm::RS256,
        };

        if !config.enabled {
            debug!("Service token authentication disabled");
            return Ok(Self {
                config: config.clone(),
                algorithm,
                encoding_key: None,
                decoding_key: None,
            });
        }

        let (encoding_key, decoding_key) = match config.algorithm {
            JwtAlgorithm::Hs256 => {
                if config.jwt_secret.is_empty() {
                    return Err(AuthError::ConfigurationError(
                        "JWT secret not configured".to_string(),
                    ));
                }
                let secret = config.jwt_secret.as_bytes();
                (
                    Some(EncodingKey::from_secret(secret)),
                    DecodingKey::from_secret(secret),
                )
            }
            JwtAlgorithm::Rs256 => {
                if config.jwt_public_key.is_empty() {
                    return Err(AuthError::ConfigurationError(
                        "JWT public key not configured".to_string(),
                    ));
                }
                // Private key is optional: validators do not need to issue
                let encoding_key = if config.jwt_private_key.is_empty() {
                    None
                } else {
                    Some(
                        EncodingKey::from_rsa_pem(config.jwt_private_key.as_bytes()).map_err(
                            |e| AuthError::KeyParsingError(format!("RSA private key: {e}")),
                        )?,
                    )
                };
                let decoding_key = DecodingKey::from_rsa_pem(config.jwt_public_key.as_bytes())
                    .map_err(|e| AuthError::KeyParsingError(format!("RSA public key: {e}")))?;
                (encoding_key, decoding_key)
            }
        };

        debug!(algorithm = ?algorithm, "Service token issuer configured");

        Ok(Self {
            config: config.clone(),
            algorithm,
            encoding_key,
            decoding_key: Some(decoding_key),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Issue a token valid for the configured TTL
    pub fn generate_service_token(
        &self,
        service_id: &str,
        service_type: ServiceType,
        permissions: &[ServicePermission],
    ) -> Result<String, AuthError> {
        let ttl_seconds = self.config.token_ttl_seconds.min(MAX_TOKEN_TTL_SECONDS);
        let ttl = Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(0));
        self.generate_service_token_with_ttl(service_id, service_type, permissions, ttl)
    }

    pub fn generate_service_token_with_ttl(
        &self,
        service_id: &str,
        service_type: ServiceType,
        permissions: &[ServicePermission],
        ttl: Duration,
    ) -> Result<String, AuthError> {
        if service_id.trim().is_empty() {
            return Err(AuthError::InvalidToken("service id must not be empty".to_string()));
        }
        if let Some(permission) = permissions
            .iter()
            .find(|permission| !service_type.can_be_granted(**permission))
        {
            warn!(
                service_id = %service_id,
                service_type = %service_type,
                permission = %permission,
                "Refusing to grant permission outside service type"
            );
            return Err(AuthError::PermissionNotGrantable {
                service_type,
                permission: *permission,
            });
        }

        let encoding_key = self.encoding_key.as_ref().ok_or_else(|| {
            AuthError::ConfigurationError("Encoding key not configured".to_string())
        })?;

        let now = Utc::now();
        let expiry = now + ttl;
        let claims = ServiceClaims {
            sub: service_id.to_string(),
            service_type,
            permissions: permissions.iter().map(|p| p.as_str().to_string()).collect(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        debug!(
            service_id = %service_id,
            service_type = %service_type,
            expiry_timestamp = claims.exp,
            permissions = ?claims.permissions,
            "Generating service token"
        );

        encode(&Header::new(self.algorithm), &claims, encoding_key).map_err(|e| {
            error!(error = %e, "Failed to generate service token");
            AuthError::JwtError(e)
        })
    }

    /// Verify signature, issuer, audience and expiry, returning the claims
    pub fn validate_service_token(&self, token: &str) -> Result<ServiceClaims, AuthError> {
        if !self.config.enabled {
            let now = Utc::now().timestamp();
            return Ok(ServiceClaims {
                sub: "local-worker".to_string(),
                service_type: ServiceType::ProvisioningWorker,
                permissions: vec!["*".to_string()],
                iss: self.config.jwt_issuer.clone(),
                aud: self.config.jwt_audience.clone(),
                exp: now + 3600,
                iat: now,
                jti: Uuid::new_v4().to_string(),
            });
        }

        let decoding_key = self.decoding_key.as_ref().ok_or_else(|| {
            AuthError::ConfigurationError("Decoding key not configured".to_string())
        })?;

        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.leeway = self.config.leeway_seconds;

        let token_data = decode::<ServiceClaims>(token, decoding_key, &validation).map_err(|e| {
            warn!(error = %e, "Service token validation failed");
            if matches!(e.kind(), JwtErrorKind::ExpiredSignature) {
                AuthError::TokenExpired
            } else {
                AuthError::JwtError(e)
            }
        })?;

        debug!(
            service_id = %token_data.claims.sub,
            service_type = %token_data.claims.service_type,
            permissions = ?token_data.claims.permissions,
            "Service token validated"
        );

        Ok(token_data.claims)
    }

    pub fn service_id_from_token(&self, token: &str) -> Result<String, AuthError> {
        self.validate_service_token(token).map(|claims| claims.sub)
    }

    /// Extract bearer token from Authorization header
    pub fn extract_bearer_token(auth_header: &HeaderValue) -> Result<&str, AuthError> {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthFormat)?;

        auth_str
            .strip_prefix("Bearer ")
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::InvalidAuthFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> ServiceTokenIssuer {
        ServiceTokenIssuer::from_config(&AuthConfig::for_secret("unit-test-secret")).unwrap()
    }

    #[test]
    fn test_generate_and_validate() {
        let issuer = issuer();
        let token = issuer
            .generate_service_token(
                "provisioner-1",
                ServiceType::ProvisioningWorker,
                &[ServicePermission::TasksUpdate],
            )
            .unwrap();

        let claims = issuer.validate_service_token(&token).unwrap();
        assert_eq!(claims.sub, "provisioner-1");
        assert_eq!(claims.service_type, ServiceType::ProvisioningWorker);
        assert!(claims.has_permission(ServicePermission::TasksUpdate));
        assert!(!claims.has_permission(ServicePermission::BillingInvoicesIssue));
        assert_eq!(issuer.service_id_from_token(&token).unwrap(), "provisioner-1");
    }

    #[test]
    fn test_least_privilege_is_enforced() {
        let err = issuer()
            .generate_service_token(
                "provisioner-1",
                ServiceType::ProvisioningWorker,
                &[ServicePermission::BillingInvoicesIssue],
            )
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionNotGrantable { .. }));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = issuer();
        let token = issuer
            .generate_service_token_with_ttl(
                "provisioner-1",
                ServiceType::ProvisioningWorker,
                &[ServicePermission::TasksUpdate],
                Duration::seconds(-300),
            )
            .unwrap();

        assert!(matches!(
            issuer.validate_service_token(&token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_foreign_signature_is_rejected() {
        let other = ServiceTokenIssuer::from_config(&AuthConfig::for_secret("other-secret")).unwrap();
        let token = other
            .generate_service_token("rogue", ServiceType::ProvisioningWorker, &[])
            .unwrap();

        assert!(matches!(
            issuer().validate_service_token(&token),
            Err(AuthError::JwtError(_))
        ));
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let mut config = AuthConfig::for_secret("unit-test-secret");
        config.jwt_audience = "billing-api".to_string();
        let token = ServiceTokenIssuer::from_config(&config)
            .unwrap()
            .generate_service_token("provisioner-1", ServiceType::ProvisioningWorker, &[])
            .unwrap();

        assert!(issuer().validate_service_token(&token).is_err());
    }

    #[test]
    fn test_authorize_task_update() {
        let issuer = issuer();
        let token = issuer
            .generate_service_token(
                "billing-1",
                ServiceType::BillingWorker,
                &[ServicePermission::TasksUpdate],
            )
            .unwrap();
        let claims = issuer.validate_service_token(&token).unwrap();

        assert!(claims.authorize_task_update(TaskType::InvoiceGeneration).is_ok());
        assert!(matches!(
            claims.authorize_task_update(TaskType::TenantProvision),
            Err(AuthError::InsufficientPermissions(_))
        ));
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let err = ServiceTokenIssuer::from_config(&AuthConfig::for_secret("")).unwrap_err();
        assert!(matches!(err, AuthError::ConfigurationError(_)));
    }

    #[test]
    fn test_extract_bearer_token() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(
            ServiceTokenIssuer::extract_bearer_token(&header).unwrap(),
            "abc.def.ghi"
        );
        let header = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        assert!(ServiceTokenIssuer::extract_bearer_token(&header).is_err());
    }
}
