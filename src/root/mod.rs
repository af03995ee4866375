use crate::error::{HamtError, Result};
use crate::hash::hash_key;
use crate::leaf::Leaf;
use crate::table::{Node, Table};

const W_MIN: u32 = 2;
const W_MAX: u32 = 6;
const T_MIN: u32 = 2;
const T_MAX: u32 = 64;

enum Action {
    InsertNew,
    Overwrite,
    Split,
    Recurse,
}

enum DeleteAction {
    Remove,
    Recurse,
    Mismatch,
}

/// Fixed-fanout entry point of the trie and the crate's public surface.
///
/// Unlike an interior [`Table`], the Root is direct-indexed: slot `i`
/// always corresponds to hash-index `i`, whether or not neighboring slots
/// are occupied, so no bitmap is needed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    w: u32,
    t: u32,
    d_max: usize,
    mask: u64,
    slots: Vec<Option<Node>>,
}

impl Root {
    /// Construct an empty trie with `2^w` slots per interior Table and
    /// `2^t` slots at the Root.
    ///
    /// # Errors
    /// [`HamtError::InvalidArgument`] if `w` is outside `[2, 6]`, `t` is
    /// outside `[2, 64]`, or the resulting slot count cannot be
    /// represented by `usize` on this target (this only arises for large
    /// `t` on 32-bit targets, and always for `t == 64` since `2^64` slots
    /// cannot be addressed by any `usize`).
    pub fn new(w: u32, t: u32) -> Result<Self> {
        if !(W_MIN..=W_MAX).contains(&w) {
            return Err(HamtError::InvalidArgument(format!(
                "w must be in [{W_MIN}, {W_MAX}], got {w}"
            )));
        }
        if !(T_MIN..=T_MAX).contains(&t) {
            return Err(HamtError::InvalidArgument(format!(
                "t must be in [{T_MIN}, {T_MAX}], got {t}"
            )));
        }

        let slot_count: u128 = 1u128 << t;
        let slot_count = usize::try_from(slot_count).map_err(|_| {
            HamtError::InvalidArgument(format!(
                "root slot count 2^{t} does not fit in usize on this target"
            ))
        })?;

        let d_max = ((64 - t) / w) as usize;
        // slot_count's usize conversion above already rejects t == 64 on any
        // real target, so t < 64 here and the shift below cannot overflow.
        let mask = (1u64 << t) - 1;

        Ok(Root {
            w,
            t,
            d_max,
            mask,
            slots: std::iter::repeat_with(|| None).take(slot_count).collect(),
        })
    }

    /// `w` configured at construction.
    #[inline]
    pub fn w(&self) -> u32 {
        self.w
    }

    /// `t` configured at construction.
    #[inline]
    pub fn t(&self) -> u32 {
        self.t
    }

    /// Maximum interior Table depth, `floor((64 - t) / w)`.
    #[inline]
    pub fn d_max(&self) -> usize {
        self.d_max
    }

    /// Bitmask over the low `t` bits used for direct indexing at the Root.
    #[inline]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Insert `leaf`, overwriting the stored value if its key already
    /// exists.
    ///
    /// # Errors
    /// [`HamtError::MaxDepthExceeded`] if a collision would require a
    /// split past `d_max`.
    pub fn insert(&mut self, leaf: Leaf) -> Result<()> {
        let h = hash_key(leaf.key());
        let i = (h & self.mask) as usize;

        let action = match &self.slots[i] {
            None => Action::InsertNew,
            Some(Node::Leaf(existing)) if existing.key() == leaf.key() => Action::Overwrite,
            Some(Node::Leaf(_)) => Action::Split,
            Some(Node::Table(_)) => Action::Recurse,
        };

        match action {
            Action::InsertNew => {
                self.slots[i] = Some(Node::Leaf(leaf));
                Ok(())
            }
            Action::Overwrite => {
                match &mut self.slots[i] {
                    Some(Node::Leaf(existing)) => existing.set_value(leaf.value().to_vec()),
                    _ => unreachable!("Overwrite action implies an existing Leaf"),
                }
                Ok(())
            }
            Action::Split => {
                if self.d_max < 1 {
                    return Err(HamtError::MaxDepthExceeded);
                }
                // Build the sub-table off a clone of the incumbent and only
                // commit it into self.slots[i] once both the construction
                // and the nested insert have succeeded, so a deeper
                // MaxDepthExceeded never drops the leaf already stored here.
                let incumbent = match &self.slots[i] {
                    Some(Node::Leaf(l)) => l.clone(),
                    _ => unreachable!("Split action implies an existing Leaf"),
                };
                let mut sub = Table::new(1, self.w, self.t, self.d_max, incumbent)?;
                sub.insert(h >> self.t, leaf)?;
                self.slots[i] = Some(Node::Table(Box::new(sub)));
                Ok(())
            }
            Action::Recurse => match &mut self.slots[i] {
                Some(Node::Table(sub)) => sub.insert(h >> self.t, leaf),
                _ => unreachable!("Recurse action implies an existing Table"),
            },
        }
    }

    /// Look up `key`.
    ///
    /// # Errors
    /// [`HamtError::NotFound`] if no Leaf matches `key`.
    pub fn find(&self, key: &[u8]) -> Result<&[u8]> {
        let h = hash_key(key);
        let i = (h & self.mask) as usize;
        match &self.slots[i] {
            None => Err(HamtError::NotFound),
            Some(Node::Leaf(l)) if l.key() == key => Ok(l.value()),
            Some(Node::Leaf(_)) => Err(HamtError::NotFound),
            Some(Node::Table(sub)) => sub.find(h >> self.t, key),
        }
    }

    /// Remove the entry for `key`.
    ///
    /// # Errors
    /// [`HamtError::NotFound`] if no Leaf matches `key`.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let h = hash_key(key);
        let i = (h & self.mask) as usize;

        let action = match &self.slots[i] {
            None => return Err(HamtError::NotFound),
            Some(Node::Leaf(l)) if l.key() == key => DeleteAction::Remove,
            Some(Node::Leaf(_)) => DeleteAction::Mismatch,
            Some(Node::Table(_)) => DeleteAction::Recurse,
        };

        match action {
            DeleteAction::Mismatch => Err(HamtError::NotFound),
            DeleteAction::Remove => {
                self.slots[i] = None;
                Ok(())
            }
            DeleteAction::Recurse => match &mut self.slots[i] {
                Some(Node::Table(sub)) => sub.delete(h >> self.t, key),
                _ => unreachable!("Recurse action implies an existing Table"),
            },
        }
    }

    /// Total number of distinct keys stored.
    pub fn leaf_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                None => 0,
                Some(Node::Leaf(_)) => 1,
                Some(Node::Table(t)) => t.leaf_count(),
            })
            .sum()
    }

    /// Total number of Tables in the trie, including the Root itself.
    pub fn table_count(&self) -> usize {
        1 + self
            .slots
            .iter()
            .map(|slot| match slot {
                Some(Node::Table(t)) => t.table_count(),
                _ => 0,
            })
            .sum::<usize>()
    }

    /// Walk the whole trie and verify the structural invariants of every
    /// reachable Table (bitmap/slot agreement, depth bound). Intended for
    /// use from tests, not a hot-path operation.
    pub fn check_invariants(&self) -> bool {
        self.slots.iter().all(|slot| match slot {
            None | Some(Node::Leaf(_)) => true,
            Some(Node::Table(t)) => t.check_invariants(),
        })
    }
}
