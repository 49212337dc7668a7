//! Round-robin scheduler with a clock-tick quantum. Tie-breaking is
//! deterministic by slot index; the `priority` field is preserved on the
//! descriptor but never consulted here.

use log::info;

use crate::process::descriptor::ProcessState;
use crate::process::table::ProcessTable;

pub struct Scheduler {
    current: Option<usize>,
    quantum_ticks: u32,
    quantum_remaining: u32,
}

impl Scheduler {
    pub fn new(quantum_ticks: u32) -> Self {
        Self {
            current: None,
            quantum_ticks,
            quantum_remaining: quantum_ticks,
        }
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    /// Forgets the current selection, e.g. after `RESET` clears the table.
    pub fn reset(&mut self) {
        self.current = None;
        self.quantum_remaining = self.quantum_ticks;
    }

    /// Decrements the quantum by one clock tick.
    pub fn tick(&mut self) {
        if self.current.is_some() && self.quantum_remaining > 0 {
            self.quantum_remaining -= 1;
        }
    }

    /// Runs one selection pass. If the current process is still runnable
    /// and its quantum hasn't elapsed, it stays selected. Otherwise scans
    /// circularly from `(current + 1) % capacity` for the next `Ready` or
    /// `Running` descriptor.
    pub fn select(&mut self, table: &mut ProcessTable) {
        if let Some(slot) = self.current {
            let still_running = matches!(
                table.get(slot).map(|d| d.state),
                Some(ProcessState::Running)
            );
            if still_running && self.quantum_remaining > 0 {
                return;
            }
        }

        let capacity = table.capacity();
        let start = self.current.map(|c| (c + 1) % capacity).unwrap_or(0);

        let mut chosen = None;
        for offset in 0..capacity {
            let slot = (start + offset) % capacity;
            if matches!(
                table.get(slot).map(|d| d.state),
                Some(ProcessState::Ready) | Some(ProcessState::Running)
            ) {
                chosen = Some(slot);
                break;
            }
        }

        if let Some(previous) = self.current {
            if matches!(table.get(previous).map(|d| d.state), Some(ProcessState::Running)) {
                if let Some(desc) = table.get_mut(previous) {
                    desc.state = ProcessState::Ready;
                }
            }
        }

        match chosen {
            Some(slot) => {
                if let Some(desc) = table.get_mut(slot) {
                    desc.state = ProcessState::Running;
                    info!("scheduler selected pid {} (slot {slot})", desc.pid);
                }
                self.current = Some(slot);
                self.quantum_remaining = self.quantum_ticks;
            }
            None => {
                self.current = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::descriptor::ProcessDescriptor;

    fn ready_table(n: usize) -> ProcessTable {
        let mut table = ProcessTable::new(n);
        for i in 0..n {
            let mut desc = ProcessDescriptor::new(i, 0, 2);
            desc.state = ProcessState::Ready;
            table.insert(i, desc);
        }
        table
    }

    #[test]
    fn quantum_law_two_ticks_switch() {
        let mut table = ready_table(2);
        let mut sched = Scheduler::new(2);

        sched.select(&mut table);
        assert_eq!(sched.current_slot(), Some(0));

        sched.tick();
        sched.select(&mut table);
        assert_eq!(sched.current_slot(), Some(0), "quantum not yet elapsed");

        sched.tick();
        sched.select(&mut table);
        assert_eq!(sched.current_slot(), Some(1), "quantum elapsed, switches");
    }

    #[test]
    fn no_runnable_process_idles() {
        let mut table = ProcessTable::new(2);
        let mut sched = Scheduler::new(2);
        sched.select(&mut table);
        assert_eq!(sched.current_slot(), None);
    }
}
