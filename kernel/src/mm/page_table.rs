//! Flat virtual-page-number to physical-frame-number map with a single
//! validity bit. The source lineage this crate was transformed from keeps a
//! three-level Sv39 radix tree with a bitflags permission byte per entry;
//! this kernel has no multi-level lookups or page permissions, so the tree
//! collapses to one level and the permission byte collapses to a bool.

use std::collections::HashMap;

use crate::mm::address::{PhysAddr, VirtAddr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame: usize,
    pub valid: bool,
}

/// A process's address space: a sparse map from virtual page number to
/// physical frame number. Unmapped pages simply have no entry.
#[derive(Debug, Default, Clone)]
pub struct PageTable {
    entries: HashMap<usize, PageTableEntry>,
}

impl PageTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Maps virtual page `vpn` to physical frame `frame`. Overwrites any
    /// existing mapping for `vpn`.
    pub fn map(&mut self, vpn: usize, frame: usize) {
        self.entries.insert(
            vpn,
            PageTableEntry {
                frame,
                valid: true,
            },
        );
    }

    pub fn unmap(&mut self, vpn: usize) {
        self.entries.remove(&vpn);
    }

    pub fn is_mapped(&self, vpn: usize) -> bool {
        self.entries.contains_key(&vpn)
    }

    /// Translates a virtual address into its physical counterpart, or `None`
    /// if its page is unmapped.
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        let entry = self.entries.get(&va.page_number())?;
        if !entry.valid {
            return None;
        }
        Some(PhysAddr::new(entry.frame * crate::constants::PAGE_SIZE + va.page_offset()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PAGE_SIZE;

    #[test]
    fn unmapped_page_does_not_translate() {
        let table = PageTable::new();
        assert_eq!(table.translate(VirtAddr::new(0)), None);
    }

    #[test]
    fn mapped_page_translates_with_offset() {
        let mut table = PageTable::new();
        table.map(2, 7);
        let va = VirtAddr::new(2 * PAGE_SIZE + 42);
        assert_eq!(table.translate(va), Some(PhysAddr::new(7 * PAGE_SIZE + 42)));
    }

    #[test]
    fn unmap_removes_translation() {
        let mut table = PageTable::new();
        table.map(0, 1);
        table.unmap(0);
        assert!(!table.is_mapped(0));
    }
}
