//! The single administrator credential.
//!
//! The password is kept only as an Argon2id PHC string (`ADMIN_PASS_HASH`).
//! `qbrack hash-password` produces one.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroize;

use crate::error::{QbrackError, Result};

/// Salt size for Argon2 (128 bits)
const SALT_SIZE: usize = 16;

/// Parameters for Argon2id password hashing
const ARGON2_PARAMS: argon2::Params = match argon2::Params::new(
    19 * 1024, // 19 MiB memory cost
    2,         // 2 iterations
    1,         // 1 thread (single-threaded)
    Some(32),  // 32-byte output length
) {
    Ok(params) => params,
    Err(_) => panic!("Invalid Argon2 parameters"),
};

fn argon2() -> Argon2<'static> {
    Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ARGON2_PARAMS,
    )
}

/// A plaintext password, wiped from memory on drop
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Constant-time comparison with another password
    pub fn matches(&self, other: &Password) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Hashes a password into a PHC string suitable for `ADMIN_PASS_HASH`
pub fn hash_password(password: &Password) -> Result<String> {
    if password.is_empty() {
        return Err(QbrackError::password("Password cannot be empty"));
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| QbrackError::password(format!("Invalid salt: {}", e)))?;

    let hash = argon2()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| QbrackError::password(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Checks a password against a PHC string
pub fn verify_password(password: &Password, expected_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(expected_hash)
        .map_err(|e| QbrackError::password(format!("Invalid password hash: {}", e)))?;

    match argon2().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(QbrackError::password(format!(
            "Password verification failed: {}",
            e
        ))),
    }
}

/// The administrator account. Without a password hash nobody is admin.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    username: String,
    password_hash: Option<String>,
}

impl AdminCredentials {
    /// Fails when `password_hash` is present but not a PHC string.
    pub fn new(username: impl Into<String>, password_hash: Option<String>) -> Result<Self> {
        let password_hash = password_hash.filter(|hash| !hash.trim().is_empty());
        if let Some(hash) = &password_hash {
            PasswordHash::new(hash)
                .map_err(|e| QbrackError::config(format!("ADMIN_PASS_HASH is invalid: {}", e)))?;
        }
        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_enabled(&self) -> bool {
        self.password_hash.is_some()
    }

    /// True only for the configured username and password.
    pub fn verify(&self, username: &str, password: &Password) -> bool {
        let Some(hash) = &self.password_hash else {
            return false;
        };

        let user_ok: bool = username.as_bytes().ct_eq(self.username.as_bytes()).into();
        // Always run the hash so a wrong username costs the same as a wrong password
        let pass_ok = match verify_password(password, hash) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "admin password check failed");
                false
            }
        };
        user_ok & pass_ok
    }
}

/// Decodes an `Authorization: Basic ...` header value into username and password.
pub fn parse_basic_authorization(header: &str) -> Option<(String, Password)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), Password::new(pass.to_string())))
}
