//! Legacy password digest
//!
//! **Not for credentials.** [`hash_password`] is a single unsalted SHA-256
//! pass with no work factor. Nothing in this crate calls it and the identity
//! stores never do; `IdentityUser::password_hash` is written by the
//! authentication layer. It is kept so digests produced by older tooling can
//! still be recomputed.

use sha2::{Digest, Sha256};

/// SHA-256 of the UTF-8 bytes of `password` as 64 lowercase hex characters
pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    hex::encode(digest)
}
