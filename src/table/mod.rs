use crate::error::{HamtError, Result};
use crate::hash::hash_key;
use crate::leaf::Leaf;

/// Either a terminal [`Leaf`] or a boxed interior [`Table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Leaf(Leaf),
    Table(Box<Table>),
}

/// Local slot index consumed from the low-order bits of a shifted hash.
#[inline]
fn local_index(h_shifted: u64, w: u32) -> usize {
    let mask = (1u64 << w) - 1;
    (h_shifted & mask) as usize
}

/// Packed-slot-vector position for a bitmap bit, via popcount of the prefix.
#[inline]
fn slot_pos(bitmap: u64, flag: u64) -> usize {
    (bitmap & (flag - 1)).count_ones() as usize
}

/// Decision made while inspecting a slot, kept separate from the mutation
/// that follows so the inspecting borrow does not overlap the mutating one.
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

/// Interior node: a 64-bit occupancy bitmap plus a dense vector holding
/// only the occupied children.
///
/// `w`, `t` and `d_max` are copies of the values fixed at [`crate::Root::new`]
/// time rather than a borrow of the owning Root, since an actual reference
/// back to the owner is not expressible without making the tree
/// self-referential; the values never change for the trie's lifetime so a
/// copy is observationally identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    depth: usize,
    w: u32,
    t: u32,
    d_max: usize,
    bitmap: u64,
    slots: Vec<Node>,
}

impl Table {
    /// Construct a Table at `depth`, seeded with `first_leaf`.
    ///
    /// Recomputes the hash of `first_leaf`'s key from scratch (a `Leaf`
    /// does not retain its hash) and shifts it by the bits already
    /// consumed at shallower levels, exactly as if the hash had been
    /// threaded down from the Root.
    pub(crate) fn new(depth: usize, w: u32, t: u32, d_max: usize, first_leaf: Leaf) -> Result<Self> {
        debug_assert!(depth >= 1 && depth <= d_max);
        let h = hash_key(first_leaf.key());
        let shift = t as u64 + ((depth - 1) as u64) * w as u64;
        let h_shifted = if shift >= 64 { 0 } else { h >> shift };
        let ndx = local_index(h_shifted, w);
        Ok(Table {
            depth,
            w,
            t,
            d_max,
            bitmap: 1u64 << ndx,
            slots: vec![Node::Leaf(first_leaf)],
        })
    }

    /// Insert `leaf` below this Table, given the hash already shifted past
    /// every bit consumed above this level.
    ///
    /// # Errors
    /// [`HamtError::MaxDepthExceeded`] if a collision would require a
    /// split past `d_max`.
    pub(crate) fn insert(&mut self, h_shifted: u64, leaf: Leaf) -> Result<()> {
        let ndx = local_index(h_shifted, self.w);
        let flag = 1u64 << ndx;
        let pos = slot_pos(self.bitmap, flag);

        let action = if self.bitmap & flag == 0 {
            Action::InsertNew
        } else {
            match &self.slots[pos] {
                Node::Leaf(existing) if existing.key() == leaf.key() => Action::Overwrite,
                Node::Leaf(_) => Action::Split,
                Node::Table(_) => Action::Recurse,
            }
        };

        match action {
            Action::InsertNew => {
                self.slots.insert(pos, Node::Leaf(leaf));
                self.bitmap |= flag;
                Ok(())
            }
            Action::Overwrite => {
                match &mut self.slots[pos] {
                    Node::Leaf(existing) => existing.set_value(leaf.value().to_vec()),
                    Node::Table(_) => unreachable!("Overwrite action implies an existing Leaf"),
                }
                Ok(())
            }
            Action::Split => {
                if self.depth == self.d_max {
                    return Err(HamtError::MaxDepthExceeded);
                }
                // Build the sub-table off a clone of the incumbent and only
                // commit it into self.slots[pos] once both the construction
                // and the nested insert have succeeded. A deeper collision
                // can still report MaxDepthExceeded; until we know that
                // can't happen, self.slots[pos] must stay untouched so a
                // failed split leaves this Table exactly as it was.
                let incumbent = match &self.slots[pos] {
                    Node::Leaf(l) => l.clone(),
                    Node::Table(_) => unreachable!("Split action implies an existing Leaf"),
                };
                let mut sub = Table::new(self.depth + 1, self.w, self.t, self.d_max, incumbent)?;
                sub.insert(h_shifted >> self.w, leaf)?;
                self.slots[pos] = Node::Table(Box::new(sub));
                Ok(())
            }
            Action::Recurse => match &mut self.slots[pos] {
                Node::Table(sub) => sub.insert(h_shifted >> self.w, leaf),
                Node::Leaf(_) => unreachable!("Recurse action implies an existing Table"),
            },
        }
    }

    /// Look up `key`, given the hash already shifted past this Table's
    /// ancestors.
    ///
    /// # Errors
    /// [`HamtError::NotFound`] if no matching Leaf is reachable from here.
    pub(crate) fn find(&self, h_shifted: u64, key: &[u8]) -> Result<&[u8]> {
        let ndx = local_index(h_shifted, self.w);
        let flag = 1u64 << ndx;
        if self.bitmap & flag == 0 {
            return Err(HamtError::NotFound);
        }
        let pos = slot_pos(self.bitmap, flag);
        match &self.slots[pos] {
            Node::Leaf(l) if l.key() == key => Ok(l.value()),
            Node::Leaf(_) => Err(HamtError::NotFound),
            Node::Table(sub) => {
                if self.depth + 1 > self.d_max {
                    return Err(HamtError::NotFound);
                }
                sub.find(h_shifted >> self.w, key)
            }
        }
    }

    /// Remove the entry for `key`, given the hash already shifted past this
    /// Table's ancestors.
    ///
    /// # Errors
    /// [`HamtError::NotFound`] if no matching Leaf is reachable from here.
    pub(crate) fn delete(&mut self, h_shifted: u64, key: &[u8]) -> Result<()> {
        if self.slots.is_empty() {
            return Err(HamtError::NotFound);
        }
        let ndx = local_index(h_shifted, self.w);
        let flag = 1u64 << ndx;
        if self.bitmap & flag == 0 {
            return Err(HamtError::NotFound);
        }
        let pos = slot_pos(self.bitmap, flag);

        let action = match &self.slots[pos] {
            Node::Leaf(l) if l.key() == key => DeleteAction::Remove,
            Node::Leaf(_) => DeleteAction::Mismatch,
            Node::Table(_) => DeleteAction::Recurse,
        };

        match action {
            DeleteAction::Mismatch => Err(HamtError::NotFound),
            DeleteAction::Remove => {
                self.slots.remove(pos);
                self.bitmap &= !flag;
                Ok(())
            }
            DeleteAction::Recurse => {
                if self.depth + 1 > self.d_max {
                    return Err(HamtError::NotFound);
                }
                match &mut self.slots[pos] {
                    Node::Table(sub) => sub.delete(h_shifted >> self.w, key),
                    Node::Leaf(_) => unreachable!("Recurse action implies an existing Table"),
                }
            }
        }
    }

    /// Count of Leaves reachable from this Table, inclusive of nested
    /// sub-Tables.
    pub(crate) fn leaf_count(&self) -> usize {
        self.slots
            .iter()
            .map(|n| match n {
                Node::Leaf(_) => 1,
                Node::Table(t) => t.leaf_count(),
            })
            .sum()
    }

    /// Count of Tables reachable from this Table, including itself.
    pub(crate) fn table_count(&self) -> usize {
        1 + self
            .slots
            .iter()
            .map(|n| match n {
                Node::Leaf(_) => 0,
                Node::Table(t) => t.table_count(),
            })
            .sum::<usize>()
    }

    /// Walk this Table and every descendant, verifying the bitmap/slot
    /// invariants and the depth bound.
    pub(crate) fn check_invariants(&self) -> bool {
        if self.bitmap.count_ones() as usize != self.slots.len() {
            return false;
        }
        if self.depth > self.d_max || self.depth < 1 {
            return false;
        }
        self.slots.iter().all(|n| match n {
            Node::Leaf(_) => true,
            Node::Table(t) => t.check_invariants(),
        })
    }
}
