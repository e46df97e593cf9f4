//! Authorization oracle consulted before every operation.

use vds_types::{ObjectKind, Permission, Result};

/// Decides whether an account may perform an operation on an object.
///
/// The service consults the oracle before touching storage; policy content
/// (API keys, grants, tenancy) lives entirely behind this trait.
pub trait AuthorizationOracle: Send + Sync {
    /// Return `Ok(())` to allow, or `Err(Error::NotAuthorized)` to deny.
    fn verify_allowed(
        &self,
        account: &str,
        name: &str,
        kind: ObjectKind,
        permission: Permission,
    ) -> Result<()>;
}

/// Allows everything. For tests and single-tenant deployments.
pub struct OpenAccess;

impl AuthorizationOracle for OpenAccess {
    fn verify_allowed(
        &self,
        _account: &str,
        _name: &str,
        _kind: ObjectKind,
        _permission: Permission,
    ) -> Result<()> {
        Ok(())
    }
}
