//! Fixed constants collected in one place instead of scattered through the core,
//! plus the handful of values a test harness may reasonably override.

/// Physical page / frame size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Addresses `[0, SAVE_AREA_SIZE)` are reserved for the trap save area; the CPU
/// writes user registers there on trap entry and reads them back on trap return.
pub const SAVE_AREA_SIZE: usize = 100;

/// Number of physical frames occupied by the reserved save-area region. The
/// frame allocator starts handing out frames past this point.
pub const RESERVED_FRAMES: usize = (SAVE_AREA_SIZE + PAGE_SIZE - 1) / PAGE_SIZE;

/// Save-area cell addresses. The exact offsets are an implementation
/// choice, one cell per saved register; see DESIGN.md.
pub const SAVE_AREA_PC: usize = 0;
pub const SAVE_AREA_A: usize = 8;
pub const SAVE_AREA_X: usize = 16;
pub const SAVE_AREA_ERR: usize = 24;

/// Scheduler quantum, expressed in clock ticks.
pub const SCHEDULER_QUANTUM_TICKS: u32 = 2;

/// Clock tick interval, expressed in (simulated) instructions.
pub const CLOCK_TICK_INSTRUCTIONS: usize = 50;

/// Fixed process table capacity.
pub const MAX_PROCESSES: usize = 4;

/// Maximum length of a `CREATE_PROC` filename, including the terminating NUL.
pub const MAX_SYSCALL_FILENAME_LEN: usize = 256;

/// Number of terminals and registers-per-terminal: each terminal occupies four
/// consecutive registers `(data_in, status_in, data_out, status_out)`.
pub const TERMINALS: usize = 4;
pub const REGISTERS_PER_TERMINAL: usize = 4;

/// Clock device registers, placed just past the terminal register space.
pub const CLOCK_TIMER_REGISTER: usize = TERMINALS * REGISTERS_PER_TERMINAL;
pub const CLOCK_INTERRUPT_REGISTER: usize = CLOCK_TIMER_REGISTER + 1;

/// pid of the initial process, and the `KILL_PROC`/`WAIT_PROC` self-referent sentinel.
pub const INIT_PID: usize = 0;

/// The well-known boot images the loader installs.
pub const TRAP_STUB_IMAGE: &str = "trata_int.maq";
pub const INIT_IMAGE: &str = "init.maq";

/// Physical address the supervisor trap stub must load at, immediately
/// past the reserved save-area region. A mismatch here means the image on
/// disk doesn't agree with the machine's layout and is fatal.
pub const TRAP_STUB_ADDRESS: usize = SAVE_AREA_SIZE;

/// Virtual address `init.maq` must load at, by the same convention.
pub const INIT_LOAD_ADDRESS: usize = SAVE_AREA_SIZE;

/// Values a harness may reasonably override for testing; production code
/// should just use [`KernelConfig::default`].
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    pub max_processes: usize,
    pub scheduler_quantum_ticks: u32,
    pub clock_tick_instructions: usize,
    pub max_syscall_filename_len: usize,
    /// Total physical frames the simulated machine has. The frame allocator
    /// never hands out more than this.
    pub physical_frame_count: usize,
    /// Safety valve for the idle loop: by design it retries blocker
    /// resolution and scheduling forever until a process is runnable. A
    /// finite test harness needs a bound so a scenario with no runnable
    /// process ever again doesn't spin the test process forever. `None`
    /// (the production default) means unbounded.
    pub max_idle_ticks: Option<usize>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: MAX_PROCESSES,
            scheduler_quantum_ticks: SCHEDULER_QUANTUM_TICKS,
            clock_tick_instructions: CLOCK_TICK_INSTRUCTIONS,
            max_syscall_filename_len: MAX_SYSCALL_FILENAME_LEN,
            physical_frame_count: 1 << 16,
            max_idle_ticks: None,
        }
    }
}
