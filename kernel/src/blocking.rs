//! Blocker resolution. Two passes over the process table, run in this
//! order every trap: wake processes whose blocking condition has become
//! true, then reap processes that are `Terminated`. The ordering matters —
//! a `Join` on a target that just terminated in this same trap must
//! observe that termination before the target's slot is freed.

use log::{info, warn};

use crate::io::IoBus;
use crate::process::descriptor::{Blocking, ProcessState};
use crate::process::table::ProcessTable;

pub struct BlockingResolver;

impl BlockingResolver {
    /// Runs pass A (wake) then pass B (reap). A failed I/O probe terminates
    /// the affected process locally rather than propagating an error.
    pub fn resolve<IO: IoBus>(table: &mut ProcessTable, io: &mut IO) {
        Self::wake(table, io);
        Self::reap(table);
    }

    fn wake<IO: IoBus>(table: &mut ProcessTable, io: &mut IO) {
        let targets: Vec<(usize, Blocking)> = table
            .iter_occupied()
            .filter_map(|(slot, desc)| match desc.state {
                ProcessState::Blocked(blocking) => Some((slot, blocking)),
                _ => None,
            })
            .collect();

        for (slot, blocking) in targets {
            match blocking {
                Blocking::Input { device } => Self::wake_input(table, io, slot, device),
                Blocking::Output { device } => Self::wake_output(table, io, slot, device),
                Blocking::Join { target } => Self::wake_join(table, slot, target),
            }
        }
    }

    fn wake_input<IO: IoBus>(table: &mut ProcessTable, io: &mut IO, slot: usize, device: usize) {
        let ready = match io.read_register(device) {
            Ok(status) => status != 0,
            Err(err) => {
                warn!("blocking: status probe failed on register {device}: {err}");
                Self::terminate(table, slot);
                return;
            }
        };
        if !ready {
            return;
        }

        let in_dev = match table.get(slot) {
            Some(desc) => desc.in_dev,
            None => return,
        };

        match io.read_register(in_dev) {
            Ok(word) => {
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = word;
                    desc.state = ProcessState::Ready;
                    info!("pid {} woke from INPUT block with a={}", desc.pid, word);
                }
            }
            Err(err) => {
                warn!("blocking: input read failed on register {in_dev}: {err}");
                Self::terminate(table, slot);
            }
        }
    }

    fn wake_output<IO: IoBus>(table: &mut ProcessTable, io: &mut IO, slot: usize, device: usize) {
        let ready = match io.read_register(device) {
            Ok(status) => status != 0,
            Err(err) => {
                warn!("blocking: status probe failed on register {device}: {err}");
                Self::terminate(table, slot);
                return;
            }
        };
        if !ready {
            return;
        }

        let (out_dev, word) = match table.get(slot) {
            Some(desc) => (desc.out_dev, desc.context.x),
            None => return,
        };

        match io.write_register(out_dev, word) {
            Ok(()) => {
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = 0;
                    desc.state = ProcessState::Ready;
                    info!("pid {} woke from OUTPUT block", desc.pid);
                }
            }
            Err(err) => {
                warn!("blocking: output write failed on register {out_dev}: {err}");
                Self::terminate(table, slot);
            }
        }
    }

    fn wake_join(table: &mut ProcessTable, slot: usize, target: usize) {
        let target_done = match table.find_by_pid(target) {
            Some(target_slot) => {
                matches!(table.get(target_slot).map(|d| d.state), Some(ProcessState::Terminated))
            }
            None => true,
        };
        if !target_done {
            return;
        }
        if let Some(desc) = table.get_mut(slot) {
            desc.state = ProcessState::Ready;
            info!("pid {} woke from JOIN({target})", desc.pid);
        }
    }

    fn terminate(table: &mut ProcessTable, slot: usize) {
        if let Some(desc) = table.get_mut(slot) {
            desc.state = ProcessState::Terminated;
        }
    }

    fn reap(table: &mut ProcessTable) {
        let terminated: Vec<usize> = table
            .iter_occupied()
            .filter(|(_, desc)| matches!(desc.state, ProcessState::Terminated))
            .map(|(slot, _)| slot)
            .collect();

        for slot in terminated {
            if let Some(desc) = table.remove(slot) {
                info!("reaped pid {} from slot {slot}", desc.pid);
            }
        }
    }
}
