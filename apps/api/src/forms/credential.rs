use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::AppError;

/// Hashes a plaintext credential into an argon2id PHC string.
/// Runs on the blocking pool.
pub async fn hash_password(plain: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Password hashing failed: {e}"))
    })
    .await
    .context("Password hashing task did not complete")??;
    Ok(hash)
}

/// Checks a plaintext credential against a stored PHC string.
pub async fn verify_password(plain: String, stored_hash: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow!("Stored password hash is malformed: {e}"))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .context("Password verification task did not complete")??;
    Ok(matches)
}
