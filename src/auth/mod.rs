//! # Service Authentication
//!
//! Service tokens authenticate worker callbacks. Authorization is two-fold: the
//! token must carry `tasks:update`, and its service type must handle the
//! task's type.

pub mod permissions;
pub mod service_token;

pub use permissions::{has_permission, permission_matches, ServicePermission, ServiceType};
pub use service_token::{AuthError, ServiceClaims, ServiceTokenIssuer};
