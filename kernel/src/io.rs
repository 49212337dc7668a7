//! External collaborator interfaces. These are the narrow seams the kernel
//! core calls through; implementations are either real device-backed
//! adapters (owned by a harness binary) or in-memory mocks (owned by
//! tests). The kernel is generic over them so neither costs a vtable
//! indirection, the same way `hal` is consumed by a generic kernel in the
//! poplar lineage this crate borrows the pattern from.

use crate::error::KernelError;
use crate::mm::page_table::PageTable;

/// The simulated CPU. In the source, the kernel registers itself as a trap
/// callback and the CPU halts whenever that callback returns non-zero. In
/// this crate a harness owns the run loop directly and calls
/// `Kernel::trap` itself, so the only remaining CPU-side behaviour worth
/// modelling is the halt.
pub trait Cpu {
    fn halt(&mut self);
}

/// The MMU: save-area access in supervisor mode, translated access in user
/// mode through whichever page table was last installed, and installation
/// of the current process's page table ahead of returning to user mode.
pub trait Mmu {
    fn read_supervisor(&mut self, address: usize) -> Result<usize, KernelError>;
    fn write_supervisor(&mut self, address: usize, value: usize) -> Result<(), KernelError>;
    /// Translates `address` through the installed page table and reads the
    /// byte behind it. Used by `CREATE_PROC` to copy a filename out of the
    /// caller's address space the same way the MMU translates any other
    /// user-mode access.
    fn read_user(&mut self, address: usize) -> Result<u8, KernelError>;
    fn set_page_table(&mut self, table: &PageTable);
}

/// Byte-addressable physical memory, used by the loader for raw frame copies
/// and the one-shot trap-stub install.
pub trait Memory {
    fn read_byte(&self, address: usize) -> Result<u8, KernelError>;
    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), KernelError>;
}

/// Memory-mapped device registers. Device register numbering is fixed:
/// each terminal occupies four consecutive registers, and the clock
/// occupies two more past the terminal space (see `constants`).
pub trait IoBus {
    fn read_register(&mut self, register: usize) -> Result<usize, KernelError>;
    fn write_register(&mut self, register: usize, value: usize) -> Result<(), KernelError>;
}

/// Line-oriented logging collaborator. `tick` is `tictac()` in the source:
/// it advances simulated time by one tick and is the kernel's only idle
/// primitive.
pub trait Console {
    fn log_line(&mut self, line: &str);
    fn tick(&mut self);
}

/// A program image as handed back by a `ProgramSource`: a load address, a
/// size, and byte access relative to the start of the image.
pub trait ProgramImage {
    fn load_address(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn byte_at(&self, offset: usize) -> u8;
}

/// The program file loader collaborator: given a path, yields an image.
pub trait ProgramSource {
    type Image: ProgramImage;

    fn open(&self, path: &str) -> Result<Self::Image, KernelError>;
}
