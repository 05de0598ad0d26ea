//! Identity types for item records and stores.

use core::fmt;

use uuid::Uuid;

/// Opaque, GUID-backed identifier naming one item record.
///
/// An `ItemId` is a weak handle: holding one never keeps the record alive, and
/// every use must re-resolve it through the owning store. Ids are never reused,
/// so a removed id resolves to `None` forever.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Sentinel for "no item". Never names a live record.
    pub const INVALID: Self = Self(Uuid::nil());

    /// Creates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }

    /// Splits the id into the four 32-bit words used on the wire.
    pub fn to_words(&self) -> [u32; 4] {
        let value = self.0.as_u128();
        [
            (value >> 96) as u32,
            (value >> 64) as u32,
            (value >> 32) as u32,
            value as u32,
        ]
    }

    /// Rebuilds an id from its wire words.
    pub fn from_words(words: [u32; 4]) -> Self {
        let value = (u128::from(words[0]) << 96)
            | (u128::from(words[1]) << 64)
            | (u128::from(words[2]) << 32)
            | u128::from(words[3]);
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0.hyphenated())
        } else {
            f.write_str("<invalid>")
        }
    }
}

impl From<Uuid> for ItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ItemId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_words().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        <[u32; 4]>::deserialize(deserializer).map(Self::from_words)
    }
}

/// Identifies one store within an [`crate::ItemsStores`] set.
///
/// Both roles agree on store ids out of band, the same way they agree on
/// definition ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreId(pub u32);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}
