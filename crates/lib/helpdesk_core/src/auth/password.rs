//! Directory secret hashing via bcrypt.
//!
//! Only the static directory stores secrets, and only as bcrypt hashes.

use super::AuthError;

/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Hash a secret with bcrypt (cost 10).
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    hash_secret_with_cost(secret, BCRYPT_COST)
}

/// Hash a secret with an explicit bcrypt cost.
pub fn hash_secret_with_cost(secret: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(secret, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a secret against a bcrypt hash.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(secret, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_secret_with_cost("s3cret", 4).unwrap();
        assert!(verify_secret("s3cret", &hash).unwrap());
        assert!(!verify_secret("wrong", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_secret("s3cret", "not-a-bcrypt-hash").is_err());
    }
}
