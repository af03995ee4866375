use crate::error::{HamtError, Result};

/// Terminal node of the trie: an owned key/value pair.
///
/// Instance bit size: roughly two `Vec<u8>` headers plus their heap
/// allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Leaf {
    /// Construct a new `Leaf` from `key` and `value`.
    ///
    /// `None` stands for an absent key or value and is rejected; a
    /// zero-length `Vec` is a perfectly valid key or value.
    ///
    /// # Errors
    /// Returns [`HamtError::InvalidArgument`] if either argument is `None`.
    pub fn new(key: Option<Vec<u8>>, value: Option<Vec<u8>>) -> Result<Self> {
        let key = key.ok_or_else(|| HamtError::InvalidArgument("leaf key must not be null".into()))?;
        let value =
            value.ok_or_else(|| HamtError::InvalidArgument("leaf value must not be null".into()))?;
        Ok(Leaf { key, value })
    }

    /// Borrow the key bytes.
    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Borrow the value bytes.
    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Replace the stored value outright.
    #[inline]
    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value = value;
    }
}
