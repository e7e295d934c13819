//! Hash primitives and name-to-identity derivation.
//!
//! An identity id is `hash160(sha256d(lowercase(name)))` for a root name, and
//! `hash160(sha256d(parent_id || sha256d(lowercase(name))))` for a name
//! under a parent. Fully qualified names are resolved right to left: the root
//! system first, then each dotted component under the previous one.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::{
    address::Hash160,
    errors::{ProtocolError, Result},
};

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Double SHA-256 over the concatenation of `parts`.
pub fn sha256d(parts: &[&[u8]]) -> [u8; 32] {
    let mut inner = Sha256::new();
    for part in parts {
        inner.update(part);
    }
    Sha256::digest(inner.finalize()).into()
}

/// RIPEMD-160 of SHA-256.
pub fn hash160(data: &[u8]) -> Hash160 {
    Hash160::new(Ripemd160::digest(Sha256::digest(data)).into())
}

/// Identity id of a single name component under an optional parent.
pub fn name_to_id(name: &str, parent: Option<&Hash160>) -> Hash160 {
    let name_hash = sha256d(&[name.to_lowercase().as_bytes()]);
    let id_hash = match parent {
        Some(parent) => sha256d(&[parent.as_bytes().as_slice(), name_hash.as_slice()]),
        None => name_hash,
    };
    hash160(&id_hash)
}

/// Identity id of a fully qualified name, relative to `root_system_name`.
///
/// A trailing `@` is ignored. A trailing `.<root>` component (any case) is
/// implied, so `alice`, `alice.vrsc` and `alice.VRSC@` resolve to the same id
/// under root `VRSC`. The root name on its own resolves to the root id.
pub fn fqn_to_id(fqn: &str, root_system_name: &str) -> Result<Hash160> {
    let trimmed = fqn.strip_suffix('@').unwrap_or(fqn);
    let mut parts: Vec<&str> = trimmed.split('.').collect();

    if root_system_name.is_empty() || parts.iter().any(|part| part.is_empty()) {
        return Err(ProtocolError::InvalidName(fqn.to_string()));
    }

    if parts.len() > 1
        && parts.last().is_some_and(|last| last.eq_ignore_ascii_case(root_system_name))
    {
        parts.pop();
    }

    let root_id = name_to_id(root_system_name, None);
    if parts.len() == 1 && parts[0].eq_ignore_ascii_case(root_system_name) {
        return Ok(root_id);
    }

    let (leaf, parents) =
        parts.split_first().ok_or_else(|| ProtocolError::InvalidName(fqn.to_string()))?;
    let parent =
        parents.iter().rev().fold(root_id, |parent, part| name_to_id(part, Some(&parent)));

    Ok(name_to_id(leaf, Some(&parent)))
}
