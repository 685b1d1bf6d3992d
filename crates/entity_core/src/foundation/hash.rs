//! Hashed type names
//!
//! Component, entity-system and world-system kinds are identified by the
//! 64-bit FNV-1a hash of their declared name. Hashing is `const`, so kinds
//! can be declared as constants next to the types they describe:
//!
//! ```
//! use entity_core::foundation::HashedName;
//!
//! const MESH: HashedName = HashedName::new("mesh");
//! assert_eq!(MESH, HashedName::from("mesh"));
//! ```

use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash of a type name, compared by value
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashedName(u64);

impl HashedName {
    /// Hash a name at compile time or runtime
    pub const fn new(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Raw hash value
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<&str> for HashedName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Debug for HashedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedName({:#018x})", self.0)
    }
}

impl fmt::Display for HashedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
