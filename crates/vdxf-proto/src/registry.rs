//! Ordinal registry.
//!
//! Binds small integers ("ordinals") to VDXF keys and to the payload kind that
//! decodes them, one to one to one. A registry is an explicit value passed to
//! decoders through [`DecodeContext`](crate::record::DecodeContext); tests
//! build their own, while hosts that want a shared one use [`global`], which
//! is populated exactly once per process.
//!
//! Registration is append-only by default: re-binding an ordinal or key to
//! something else fails unless the caller asks for
//! [`RegistrationMode::Overwrite`]. Registering an identical binding again is a
//! no-op, so bootstrap code can run more than once.

use std::{collections::BTreeMap, sync::OnceLock};

use crate::{
    address::VdxfKey,
    errors::{ProtocolError, Result},
    hash,
    ordinal::is_reserved_type,
    payloads::PayloadKind,
};

/// Root system the built-in keys are derived under.
pub const BUILTIN_ROOT_SYSTEM: &str = "VRSC";

/// Built-in bindings installed by [`register_ordinals`].
///
/// Ordinals and names are wire format and never change once released.
pub const BUILTIN_ORDINALS: &[(u64, &str, PayloadKind)] = &[
    (0, "vrsc::data.type.object.datadescriptor", PayloadKind::DataDescriptor),
    (1, "vrsc::data.type.string", PayloadKind::Utf8String),
    (2, "vrsc::data.type.bytevector", PayloadKind::Bytes),
    (3, "vrsc::identity.appencryptionrequest", PayloadKind::AppEncryptionRequest),
];

/// How [`Registry::register`] treats a conflicting binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegistrationMode {
    /// Conflicts are errors
    #[default]
    Strict,
    /// Conflicting bindings are replaced
    Overwrite,
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registration {
    /// Key the ordinal stands for
    pub key: VdxfKey,
    /// Decoder for payloads under this key
    pub kind: PayloadKind,
}

/// Bidirectional ordinal ↔ key map with a decoder per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    by_ordinal: BTreeMap<u64, Registration>,
    by_key: BTreeMap<VdxfKey, u64>,
}

impl Registry {
    /// Empty registry.
    pub const fn new() -> Self {
        Self { by_ordinal: BTreeMap::new(), by_key: BTreeMap::new() }
    }

    /// Shared empty registry.
    pub fn empty() -> &'static Self {
        static EMPTY: Registry = Registry::new();
        &EMPTY
    }

    /// Registry holding the built-in bindings.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for &(ordinal, name, kind) in BUILTIN_ORDINALS {
            registry.bind(ordinal, builtin_key(name), kind);
        }
        registry
    }

    /// Bind `ordinal` to `key`, decoded as `kind`.
    pub fn register(
        &mut self,
        ordinal: u64,
        key: VdxfKey,
        kind: PayloadKind,
        mode: RegistrationMode,
    ) -> Result<()> {
        if is_reserved_type(ordinal) {
            return Err(ProtocolError::ReservedOrdinal(ordinal));
        }

        let wanted = Registration { key, kind };
        let existing = self.by_ordinal.get(&ordinal).copied();
        let existing_ordinal = self.by_key.get(&key).copied();

        if existing == Some(wanted) {
            return Ok(());
        }

        if mode == RegistrationMode::Strict {
            if let Some(existing) = existing {
                return Err(ProtocolError::DuplicateOrdinal {
                    ordinal,
                    existing: format!("{} ({})", existing.key, existing.kind),
                    attempted: format!("{key} ({kind})"),
                });
            }
            if let Some(existing_ordinal) = existing_ordinal {
                return Err(ProtocolError::DuplicateKey {
                    key: key.to_string(),
                    existing: existing_ordinal,
                    attempted: ordinal,
                });
            }
        }

        if let Some(old) = existing {
            tracing::warn!(
                ordinal,
                old_key = %old.key,
                new_key = %key,
                "Overwriting ordinal binding"
            );
            self.by_key.remove(&old.key);
        }
        if let Some(old_ordinal) = existing_ordinal.filter(|old| *old != ordinal) {
            tracing::warn!(
                key = %key,
                old_ordinal,
                new_ordinal = ordinal,
                "Rebinding key to new ordinal"
            );
            self.by_ordinal.remove(&old_ordinal);
        }

        self.bind(ordinal, key, kind);
        tracing::debug!(ordinal, key = %key, kind = %kind, "Registered ordinal");
        Ok(())
    }

    fn bind(&mut self, ordinal: u64, key: VdxfKey, kind: PayloadKind) {
        self.by_ordinal.insert(ordinal, Registration { key, kind });
        self.by_key.insert(key, ordinal);
    }

    /// Entry bound to `ordinal`.
    pub fn get(&self, ordinal: u64) -> Option<&Registration> {
        self.by_ordinal.get(&ordinal)
    }

    /// Entry bound to `ordinal`, or `UnregisteredOrdinal`.
    pub fn resolve(&self, ordinal: u64) -> Result<&Registration> {
        self.get(ordinal).ok_or(ProtocolError::UnregisteredOrdinal(ordinal))
    }

    /// Key bound to `ordinal`.
    pub fn key_for_ordinal(&self, ordinal: u64) -> Option<&VdxfKey> {
        self.get(ordinal).map(|entry| &entry.key)
    }

    /// Ordinal bound to `key`.
    pub fn ordinal_for_key(&self, key: &VdxfKey) -> Option<u64> {
        self.by_key.get(key).copied()
    }

    /// Ordinal and kind bound to `key`.
    pub fn lookup_key(&self, key: &VdxfKey) -> Option<(u64, PayloadKind)> {
        let ordinal = self.ordinal_for_key(key)?;
        self.get(ordinal).map(|entry| (ordinal, entry.kind))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.by_ordinal.len()
    }

    /// True if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.by_ordinal.is_empty()
    }

    /// Bindings in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Registration)> {
        self.by_ordinal.iter().map(|(ordinal, entry)| (*ordinal, entry))
    }
}

/// Key of a built-in `namespace::name` under [`BUILTIN_ROOT_SYSTEM`].
fn builtin_key(qualified_name: &str) -> VdxfKey {
    let (namespace, name) = qualified_name.split_once("::").unwrap_or(("", qualified_name));
    let root = hash::name_to_id(BUILTIN_ROOT_SYSTEM, None);
    let parent = if namespace.is_empty() || namespace.eq_ignore_ascii_case(BUILTIN_ROOT_SYSTEM) {
        root
    } else {
        hash::name_to_id(namespace, Some(&root))
    };
    VdxfKey::from_hash(hash::name_to_id(name, Some(&parent)))
}

/// Install the built-in bindings.
///
/// Safe to call repeatedly. Fails if a built-in ordinal or key was already
/// bound to something else.
pub fn register_ordinals(registry: &mut Registry) -> Result<()> {
    for &(ordinal, name, kind) in BUILTIN_ORDINALS {
        registry.register(ordinal, builtin_key(name), kind, RegistrationMode::Strict)?;
    }
    tracing::debug!(count = BUILTIN_ORDINALS.len(), "Built-in ordinals registered");
    Ok(())
}

/// Process-wide registry holding the built-in bindings.
///
/// Built on first use; concurrent first calls block until one of them has
/// finished building it.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(|| {
        tracing::debug!("Initializing global ordinal registry");
        Registry::builtin()
    })
}
