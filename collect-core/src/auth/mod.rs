use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use constant_time_eq::constant_time_eq;
use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::db::SystemStore;
use crate::domain::TenantBinding;
use crate::error::{CollectError, Result};

/// Single configured administrator credential for Metrics Pass-Through.
///
/// Not tenant-scoped: this identity is the one allowed to reach the
/// allow-listed alerting paths, distinct from edge-system credentials.
#[derive(Debug, Clone)]
pub struct AdminCredential {
    pub admin_id: String,
    pub admin_secret_hash: String,
}

/// Verifies HTTP Basic credentials presented by edge systems and the
/// pass-through administrator.
#[derive(Clone)]
pub struct AuthGate {
    systems: Arc<dyn SystemStore>,
    admin: AdminCredential,
}

impl AuthGate {
    pub fn new(systems: Arc<dyn SystemStore>, admin: AdminCredential) -> Self {
        Self { systems, admin }
    }

    /// Verify a system's `(system_id, secret)` pair and return its tenant
    /// binding. Fails closed on any lookup error, disabled system, or
    /// mismatched secret.
    pub async fn verify_system(&self, system_id: &str, secret: &str) -> Result<TenantBinding> {
        let record = self
            .systems
            .get_system(system_id)
            .await?
            .ok_or(CollectError::AuthFailure)?;

        if !record.is_active() {
            return Err(CollectError::AuthFailure);
        }

        if !verify_secret(secret, &record.system_secret_hash) {
            return Err(CollectError::AuthFailure);
        }

        Ok(TenantBinding { system_id: record.system_id, tenant_id: record.tenant_id })
    }

    /// Verify the Metrics Pass-Through administrator credential. Compares
    /// `admin_id` in constant time in addition to the Argon2 secret check,
    /// since it is the only identity this path accepts.
    pub fn verify_admin(&self, admin_id: &str, secret: &str) -> bool {
        let id_matches = admin_id.len() == self.admin.admin_id.len()
            && constant_time_eq(admin_id.as_bytes(), self.admin.admin_id.as_bytes());

        id_matches && verify_secret(secret, &self.admin.admin_secret_hash)
    }
}

/// Hash a plaintext secret with Argon2id for storage.
///
/// Salt bytes come from the workspace's `rand` crate rather than
/// `password-hash`'s own `rand_core` shim, keeping the two RNG stacks from
/// diverging.
pub fn hash_secret(secret: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|err| CollectError::BadPayload(format!("salt generation failed: {err}")))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|err| CollectError::BadPayload(format!("salt encoding failed: {err}")))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| CollectError::BadPayload(format!("secret hashing failed: {err}")))?
        .to_string();
    Ok(hash)
}

/// Verify a plaintext secret against a stored Argon2 hash. Argon2's
/// `verify_password` is already constant-time; a malformed stored hash is
/// treated as a verification failure rather than propagated as an error, so
/// a corrupt row fails closed instead of 500ing.
fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_secret("correct-horse-battery-staple").unwrap();
        assert!(verify_secret("correct-horse-battery-staple", &hash));
        assert!(!verify_secret("wrong-secret", &hash));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify_secret("anything", "not-a-real-hash"));
    }
}
