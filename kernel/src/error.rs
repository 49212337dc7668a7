use thiserror::Error;

use crate::process::descriptor::Pid;

/// The kernel's error kinds. A step that returns `Err` here always
/// means "the orchestrator sets the internal-error flag" (see `TrapHandler`) —
/// steps with a non-fatal recovery path (e.g. a blocked `READ` whose status
/// probe fails, or a `CREATE_PROC` that can't find a file) absorb the failure
/// locally into process state instead of propagating it.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("I/O failure on device register {register}")]
    Io { register: usize },

    #[error("failed to load program {path:?}: {reason}")]
    Load { path: String, reason: String },

    #[error("unknown system call number {number}")]
    BadSyscall { number: usize },

    #[error("CPU fault in pid {pid}: err={err}")]
    CpuFault { pid: Pid, err: usize },

    #[error("unrecognised interrupt code {0}")]
    UnknownInterrupt(u32),

    #[error("frame allocator exhausted: requested {requested} frames, {available} available")]
    OutOfFrames { requested: usize, available: usize },

    #[error("no free process table slot")]
    NoFreeSlot,

    #[error("unmapped or invalid virtual address {address:#x}")]
    MemoryFault { address: usize },
}
