//! System call decoding and service. The call number lives in the current
//! process's `a` register, the first argument in `x`; the return value is
//! written back to `a`. Every handler here operates on the process
//! occupying `slot`, which the caller (the orchestrator) has already
//! established is the current process.

use log::{info, warn};

use crate::allocator::{FrameAllocator, IdentifierAllocator};
use crate::constants::{REGISTERS_PER_TERMINAL, TERMINALS};
use crate::error::KernelError;
use crate::io::{IoBus, Memory, Mmu, ProgramSource};
use crate::loader::Loader;
use crate::process::descriptor::{Blocking, ProcessDescriptor, ProcessState};
use crate::process::table::ProcessTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read,
    Write,
    CreateProc,
    KillProc,
    WaitProc,
}

impl TryFrom<usize> for Syscall {
    type Error = KernelError;

    fn try_from(number: usize) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            3 => Ok(Self::CreateProc),
            4 => Ok(Self::KillProc),
            5 => Ok(Self::WaitProc),
            other => Err(KernelError::BadSyscall { number: other }),
        }
    }
}

pub struct SyscallDispatcher;

impl SyscallDispatcher {
    /// Services the syscall named by `table[slot].context.a`. Returns `Err`
    /// only for an unrecognised call number, after terminating the caller;
    /// that also sets the internal-error flag, which the orchestrator does
    /// on receiving the error.
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch<IO: IoBus, MEM: Memory, M: Mmu, PS: ProgramSource>(
        table: &mut ProcessTable,
        slot: usize,
        io: &mut IO,
        memory: &mut MEM,
        mmu: &mut M,
        frames: &mut FrameAllocator,
        pids: &mut IdentifierAllocator,
        source: &PS,
        max_filename_len: usize,
    ) -> Result<(), KernelError> {
        let number = table
            .get(slot)
            .map(|d| d.context.a)
            .ok_or(KernelError::NoFreeSlot)?;

        let call = match Syscall::try_from(number) {
            Ok(call) => call,
            Err(err) => {
                warn!("pid in slot {slot} made unknown syscall {number}");
                Self::terminate(table, slot);
                return Err(err);
            }
        };

        match call {
            Syscall::Read => Self::read(table, slot, io),
            Syscall::Write => Self::write(table, slot, io),
            Syscall::CreateProc => {
                Self::create_proc(table, slot, memory, mmu, frames, pids, source, max_filename_len)
            }
            Syscall::KillProc => Self::kill_proc(table, slot),
            Syscall::WaitProc => Self::wait_proc(table, slot),
        }
        Ok(())
    }

    fn read<IO: IoBus>(table: &mut ProcessTable, slot: usize, io: &mut IO) {
        let in_dev = match table.get(slot) {
            Some(desc) => desc.in_dev,
            None => return,
        };
        let status_reg = in_dev + 1;

        let status = match io.read_register(status_reg) {
            Ok(v) => v,
            Err(_) => {
                Self::terminate(table, slot);
                return;
            }
        };

        if status == 0 {
            if let Some(desc) = table.get_mut(slot) {
                desc.state = ProcessState::Blocked(Blocking::Input { device: status_reg });
                info!("pid {} blocked on INPUT({status_reg})", desc.pid);
            }
            return;
        }

        match io.read_register(in_dev) {
            Ok(word) => {
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = word;
                }
            }
            Err(_) => Self::terminate(table, slot),
        }
    }

    fn write<IO: IoBus>(table: &mut ProcessTable, slot: usize, io: &mut IO) {
        let (out_dev, word) = match table.get(slot) {
            Some(desc) => (desc.out_dev, desc.context.x),
            None => return,
        };
        let status_reg = out_dev + 1;

        let status = match io.read_register(status_reg) {
            Ok(v) => v,
            Err(_) => {
                Self::terminate(table, slot);
                return;
            }
        };

        if status == 0 {
            if let Some(desc) = table.get_mut(slot) {
                desc.state = ProcessState::Blocked(Blocking::Output { device: status_reg });
                info!("pid {} blocked on OUTPUT({status_reg})", desc.pid);
            }
            return;
        }

        match io.write_register(out_dev, word) {
            Ok(()) => {
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = 0;
                }
            }
            Err(_) => Self::terminate(table, slot),
        }
    }

    fn create_proc<MEM: Memory, M: Mmu, PS: ProgramSource>(
        table: &mut ProcessTable,
        slot: usize,
        memory: &mut MEM,
        mmu: &mut M,
        frames: &mut FrameAllocator,
        pids: &mut IdentifierAllocator,
        source: &PS,
        max_filename_len: usize,
    ) {
        let fail = |table: &mut ProcessTable| {
            if let Some(desc) = table.get_mut(slot) {
                desc.context.a = (-1_i64) as usize;
            }
        };

        let filename = match Self::read_cstring(table, slot, mmu, max_filename_len) {
            Some(name) => name,
            None => return fail(table),
        };

        let new_slot = match table.free_slot() {
            Some(s) => s,
            None => return fail(table),
        };

        let terminal = new_slot % TERMINALS;
        let in_dev = terminal * REGISTERS_PER_TERMINAL;
        let out_dev = terminal * REGISTERS_PER_TERMINAL + 2;

        let pid = pids.allocate();
        let mut descriptor = ProcessDescriptor::new(pid, in_dev, out_dev);

        match Loader::open_and_load_into_process(memory, frames, source, &mut descriptor, &filename)
        {
            Ok(load_address) => {
                descriptor.context.pc = load_address;
                descriptor.state = ProcessState::Ready;
                table.insert(new_slot, descriptor);
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = pid;
                }
                info!("created pid {pid} in slot {new_slot} from {filename:?}");
            }
            Err(err) => {
                warn!("CREATE_PROC failed to load {filename:?}: {err}");
                fail(table);
            }
        }
    }

    fn kill_proc(table: &mut ProcessTable, slot: usize) {
        let target = match table.get(slot) {
            Some(desc) => desc.context.x,
            None => return,
        };

        if target == 0 {
            // `x = 0` is the self-kill sentinel, independent of the caller's own pid.
            Self::terminate(table, slot);
            return;
        }

        match table.find_by_pid(target) {
            Some(target_slot) => {
                Self::terminate(table, target_slot);
                if let Some(desc) = table.get_mut(slot) {
                    desc.context.a = 0;
                }
            }
            None => {
                // Source policy: an unknown target terminates the caller, not an error return.
                Self::terminate(table, slot);
            }
        }
    }

    fn wait_proc(table: &mut ProcessTable, slot: usize) {
        let target = match table.get(slot) {
            Some(desc) => desc.context.x,
            None => return,
        };
        let caller_pid = table.get(slot).map(|d| d.pid);

        let target_exists_and_not_self = table.find_by_pid(target).is_some() && Some(target) != caller_pid;

        if target_exists_and_not_self {
            if let Some(desc) = table.get_mut(slot) {
                desc.state = ProcessState::Blocked(Blocking::Join { target });
                desc.context.a = 0;
                info!("pid {} blocked on JOIN({target})", desc.pid);
            }
        } else {
            Self::terminate(table, slot);
        }
    }

    fn terminate(table: &mut ProcessTable, slot: usize) {
        if let Some(desc) = table.get_mut(slot) {
            desc.state = ProcessState::Terminated;
        }
    }

    /// Copies a NUL-terminated filename out of the caller's virtual address
    /// space, one byte at a time through the MMU in user mode — the same
    /// translated access any other user-mode memory access would use.
    fn read_cstring<M: Mmu>(
        table: &ProcessTable,
        slot: usize,
        mmu: &mut M,
        max_len: usize,
    ) -> Option<String> {
        let base = table.get(slot)?.context.x;

        let mut bytes = Vec::new();
        for offset in 0..max_len {
            let byte = mmu.read_user(base + offset).ok()?;
            if byte == 0 {
                return String::from_utf8(bytes).ok();
            }
            bytes.push(byte);
        }
        None
    }
}
