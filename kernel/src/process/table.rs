//! Fixed-capacity process table. Slot index and pid are deliberately
//! independent: slots are recycled on reap, pids never are. `JOIN` stores a
//! pid and looks it up by linear scan rather than holding a direct
//! reference to a slot, since a slot can be reused by the time the join
//! resolves.

use crate::process::descriptor::{Pid, ProcessDescriptor};

#[derive(Debug)]
pub struct ProcessTable {
    slots: Vec<Option<ProcessDescriptor>>,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Empties every slot, as on `RESET`.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_none())
    }

    pub fn insert(&mut self, slot: usize, descriptor: ProcessDescriptor) {
        self.slots[slot] = Some(descriptor);
    }

    pub fn remove(&mut self, slot: usize) -> Option<ProcessDescriptor> {
        self.slots[slot].take()
    }

    pub fn get(&self, slot: usize) -> Option<&ProcessDescriptor> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ProcessDescriptor> {
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(d) if d.pid == pid))
    }

    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &ProcessDescriptor)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|d| (i, d)))
    }

    pub fn iter_occupied_mut(&mut self) -> impl Iterator<Item = (usize, &mut ProcessDescriptor)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|d| (i, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_slot_finds_first_empty() {
        let mut table = ProcessTable::new(4);
        table.insert(0, ProcessDescriptor::new(0, 0, 2));
        assert_eq!(table.free_slot(), Some(1));
    }

    #[test]
    fn find_by_pid_survives_slot_reuse() {
        let mut table = ProcessTable::new(4);
        table.insert(0, ProcessDescriptor::new(5, 0, 2));
        assert_eq!(table.find_by_pid(5), Some(0));
        table.remove(0);
        assert_eq!(table.find_by_pid(5), None);
        table.insert(0, ProcessDescriptor::new(6, 0, 2));
        assert_eq!(table.find_by_pid(6), Some(0));
    }

    #[test]
    fn full_table_reports_no_free_slot() {
        let mut table = ProcessTable::new(2);
        table.insert(0, ProcessDescriptor::new(0, 0, 2));
        table.insert(1, ProcessDescriptor::new(1, 4, 6));
        assert_eq!(table.free_slot(), None);
    }
}
