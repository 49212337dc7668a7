//! Process descriptor and its state machine. The source lineage this crate
//! was transformed from encodes `Process_State` and `Process_Blocking_On`
//! as separate bit-flag fields with an invariant linking them (`state =
//! BLOCKED` iff `blocking.kind != NOT_BLOCKING`); here the invariant is
//! built into the type instead of maintained by convention, by folding the
//! blocking condition into the `Blocked` variant itself.

use crate::mm::page_table::PageTable;
use crate::process::context::TrapContext;

pub type Pid = usize;

/// The condition a `BLOCKED` process is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    /// Waiting for the status register at `device` to read non-zero before
    /// reading a word from its paired data register.
    Input { device: usize },
    /// Waiting for the status register at `device` to read non-zero before
    /// writing a word to its paired data register.
    Output { device: usize },
    /// Waiting for the descriptor with pid `target` to be absent or
    /// `Terminated`.
    Join { target: Pid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Blocked(Blocking),
    Terminated,
}

#[derive(Debug, Clone)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    /// Reserved for future schedulers; preserved but not consulted by the
    /// round-robin core.
    pub priority: f64,
    pub state: ProcessState,
    pub context: TrapContext,
    pub in_dev: usize,
    pub out_dev: usize,
    pub page_table: PageTable,
}

impl ProcessDescriptor {
    pub fn new(pid: Pid, in_dev: usize, out_dev: usize) -> Self {
        Self {
            pid,
            priority: 0.0,
            state: ProcessState::New,
            context: TrapContext::new(),
            in_dev,
            out_dev,
            page_table: PageTable::new(),
        }
    }

    pub fn is_blocked_on_join_with(&self, pid: Pid) -> bool {
        matches!(self.state, ProcessState::Blocked(Blocking::Join { target }) if target == pid)
    }
}
