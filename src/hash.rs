//! Password hashing
//!
//! Records never hold plaintext. The hasher is passed in by the caller
//! rather than living in process-wide state.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Turns a plaintext password into a fixed-length digest
pub trait PasswordHasher: Send + Sync {
    fn digest(&self, password: &str) -> Vec<u8>;

    /// Lowercase hex of [`digest`](PasswordHasher::digest)
    fn hex_digest(&self, password: &str) -> String {
        to_hex(&self.digest(password))
    }
}

/// SHA-256 over the UTF-8 bytes of the password
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl PasswordHasher for Sha256Hasher {
    fn digest(&self, password: &str) -> Vec<u8> {
        Sha256::digest(password.as_bytes()).to_vec()
    }

    fn hex_digest(&self, password: &str) -> String {
        format!("{:x}", Sha256::digest(password.as_bytes()))
    }
}

/// Lowercase hex encoding
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
