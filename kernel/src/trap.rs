//! Interrupt classification. The simulated CPU delivers one of a small
//! fixed set of interrupt kinds; anything else is a latent fault the
//! kernel reports rather than silently ignores.

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Reset,
    Clock,
    CpuError,
    Syscall,
}

pub const IRQ_RESET: u32 = 0;
pub const IRQ_CLOCK: u32 = 1;
pub const IRQ_CPU_ERROR: u32 = 2;
pub const IRQ_SYSCALL: u32 = 3;

impl TryFrom<u32> for Irq {
    type Error = KernelError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            IRQ_RESET => Ok(Self::Reset),
            IRQ_CLOCK => Ok(Self::Clock),
            IRQ_CPU_ERROR => Ok(Self::CpuError),
            IRQ_SYSCALL => Ok(Self::Syscall),
            other => Err(KernelError::UnknownInterrupt(other)),
        }
    }
}
