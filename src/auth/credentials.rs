use std::sync::LazyLock;

use pbkdf2::pbkdf2_hmac;
use regex::Regex;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::AuthError;

pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Salted password digest kept by the mock registry. The plaintext is
/// never stored.
#[derive(Clone)]
pub struct PasswordDigest {
    salt: [u8; SALT_LENGTH],
    hash: [u8; HASH_LENGTH],
    iterations: u32,
}

impl PasswordDigest {
    /// Derive from password + fresh salt using PBKDF2-SHA256
    pub fn new(password: &str, iterations: u32) -> Self {
        let salt = generate_salt();
        let hash = derive(password, &salt, iterations);
        Self {
            salt,
            hash: *hash,
            iterations,
        }
    }

    /// Constant-time check of a candidate password.
    pub fn verify(&self, candidate: &str) -> bool {
        let derived = derive(candidate, &self.salt, self.iterations);
        derived[..].ct_eq(&self.hash[..]).into()
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordDigest")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

fn derive(password: &str, salt: &[u8; SALT_LENGTH], iterations: u32) -> Zeroizing<[u8; HASH_LENGTH]> {
    let mut out = Zeroizing::new([0u8; HASH_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations.max(1), &mut out[..]);
    out
}

/// Generate a cryptographically random salt
fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Trim and lower-case an email; reject blanks and obviously bad shapes.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::MissingField("email"));
    }
    if !EMAIL_SHAPE.is_match(&email) {
        return Err(AuthError::InvalidEmail(email));
    }
    Ok(email)
}
