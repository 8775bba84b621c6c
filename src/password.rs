//! Password hashing for registration and login.
//!
//! bcrypt with work factor 12. Hashing at this cost burns a noticeable
//! amount of CPU, so handlers call these through `spawn_blocking`.

/// bcrypt work factor used for all stored hashes.
pub const BCRYPT_COST: u32 = 12;

/// Hash a plaintext password. The salt is generated and embedded by bcrypt.
pub fn hash(plaintext: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, BCRYPT_COST)
}

/// Verify a plaintext password against a stored hash.
/// bcrypt's comparison does not leak timing between near-miss and far-miss
/// passwords; a malformed stored hash is an error, not a mismatch.
pub fn verify(plaintext: &str, hashed: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(plaintext, hashed)
}
