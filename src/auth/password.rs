use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Argon2id with a fresh random salt. Runs on the blocking pool.
pub async fn hash(plain: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_sync(&plain))
        .await
        .context("password hashing task")?
}

/// Constant-time check of `plain` against a stored PHC string.
/// `Ok(false)` means mismatch; `Err` means the stored hash is unusable.
pub async fn verify(plain: String, stored: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || verify_sync(&plain, &stored))
        .await
        .context("password verification task")?
}

/// Well-formed Argon2id PHC string with the default cost parameters. No
/// password matches it; verifying against it costs the same as a real check.
const DUMMY_PHC: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Spends one verification's worth of work and discards the result, so a
/// login for a missing or unverified account takes as long as a wrong password.
pub async fn verify_dummy(plain: String) {
    let _ = verify(plain, DUMMY_PHC.to_owned()).await;
}

fn hash_sync(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))?
        .to_string();
    Ok(hash)
}

fn verify_sync(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("argon2 parse hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify_roundtrip() {
        let hash = hash("Secur3P@ssw0rd!".into()).await.expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert!(verify("Secur3P@ssw0rd!".into(), hash).await.expect("verify should succeed"));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_password() {
        let hash = hash("correct-horse-battery-staple".into()).await.unwrap();
        assert!(!verify("wrong-password".into(), hash).await.expect("verify should not error"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_sync("same").unwrap(), hash_sync("same").unwrap());
    }

    #[test]
    fn dummy_hash_parses_and_never_matches() {
        assert_eq!(DUMMY_PHC.rsplit('$').next().unwrap().len(), 43);
        assert!(!verify_sync("", DUMMY_PHC).expect("dummy hash is well formed"));
        assert!(!verify_sync("pw123456", DUMMY_PHC).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_sync("anything", "not-a-valid-hash").is_err());
    }
}
