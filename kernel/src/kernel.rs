//! The trap orchestrator: the kernel's single entry point.
//! Every interrupt runs the same five-phase sequence without reentry —
//! save context, service the interrupt, resolve blockers, schedule, dispatch
//! — and the kernel never does anything else. A harness owns the run loop
//! and calls [`Kernel::trap`] once per simulated interrupt.

use log::{info, warn};

use crate::allocator::{FrameAllocator, IdentifierAllocator};
use crate::blocking::BlockingResolver;
use crate::constants::{
    CLOCK_INTERRUPT_REGISTER, CLOCK_TIMER_REGISTER, INIT_IMAGE, INIT_LOAD_ADDRESS, SAVE_AREA_A,
    SAVE_AREA_ERR, SAVE_AREA_PC, SAVE_AREA_X, TRAP_STUB_ADDRESS, TRAP_STUB_IMAGE,
};
use crate::dispatcher::Dispatcher;
use crate::error::KernelError;
use crate::io::{Console, IoBus, Memory, Mmu, ProgramSource};
use crate::loader::Loader;
use crate::process::context::TrapContext;
use crate::process::descriptor::ProcessDescriptor;
use crate::process::descriptor::ProcessState;
use crate::process::table::ProcessTable;
use crate::scheduler::Scheduler;
use crate::syscall::SyscallDispatcher;
use crate::trap::Irq;
use crate::KernelConfig;

/// The trap handler's return-value contract, modelled as an enum instead of
/// the source's raw 0/non-zero integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    Resume,
    Halt,
}

pub struct Kernel<M, MEM, IO, CO, PS>
where
    M: Mmu,
    MEM: Memory,
    IO: IoBus,
    CO: Console,
    PS: ProgramSource,
{
    process_table: ProcessTable,
    scheduler: Scheduler,
    frames: FrameAllocator,
    pids: IdentifierAllocator,
    internal_error: bool,
    config: KernelConfig,
    mmu: M,
    memory: MEM,
    io: IO,
    console: CO,
    program_source: PS,
}

impl<M, MEM, IO, CO, PS> Kernel<M, MEM, IO, CO, PS>
where
    M: Mmu,
    MEM: Memory,
    IO: IoBus,
    CO: Console,
    PS: ProgramSource,
{
    /// Installs the supervisor trap stub into physical memory and builds a
    /// kernel around the given collaborators. Call [`Kernel::trap`] with
    /// `RESET` to boot `init.maq`.
    pub fn new(
        config: KernelConfig,
        mmu: M,
        mut memory: MEM,
        io: IO,
        console: CO,
        program_source: PS,
    ) -> Result<Self, KernelError> {
        let stub_address =
            Loader::open_and_load_physical(&mut memory, &program_source, TRAP_STUB_IMAGE)?;

        let mut internal_error = false;
        if stub_address != TRAP_STUB_ADDRESS {
            warn!(
                "{TRAP_STUB_IMAGE} loaded at {stub_address:#x}, expected {TRAP_STUB_ADDRESS:#x}"
            );
            internal_error = true;
        }

        Ok(Self {
            process_table: ProcessTable::new(config.max_processes),
            scheduler: Scheduler::new(config.scheduler_quantum_ticks),
            frames: FrameAllocator::new(config.physical_frame_count),
            pids: IdentifierAllocator::new(),
            internal_error,
            config,
            mmu,
            memory,
            io,
            console,
            program_source,
        })
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.process_table
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.scheduler.current_slot()
    }

    pub fn internal_error(&self) -> bool {
        self.internal_error
    }

    /// Runs the five-phase sequence for one interrupt.
    pub fn trap(&mut self, irq_code: u32) -> TrapOutcome {
        if let Err(err) = self.save_context() {
            warn!("context save failed: {err}");
            self.internal_error = true;
        }

        match Irq::try_from(irq_code) {
            Ok(Irq::Reset) => self.service_reset(),
            Ok(Irq::Clock) => self.service_clock(),
            Ok(Irq::CpuError) => self.service_cpu_error(),
            Ok(Irq::Syscall) => self.service_syscall(),
            Err(err) => {
                warn!("{err}");
                self.internal_error = true;
            }
        }

        self.resolve_and_schedule();
        self.dispatch_or_halt()
    }

    fn save_context(&mut self) -> Result<(), KernelError> {
        let slot = match self.scheduler.current_slot() {
            Some(slot) => slot,
            None => return Ok(()),
        };

        let pc = self.mmu.read_supervisor(SAVE_AREA_PC)?;
        let a = self.mmu.read_supervisor(SAVE_AREA_A)?;
        let x = self.mmu.read_supervisor(SAVE_AREA_X)?;
        let err = self.mmu.read_supervisor(SAVE_AREA_ERR)?;

        if let Some(desc) = self.process_table.get_mut(slot) {
            desc.context = TrapContext { pc, a, x, err };
        }
        Ok(())
    }

    fn service_reset(&mut self) {
        self.process_table.clear();
        self.scheduler.reset();

        let pid = self.pids.allocate();
        // init is bound to terminal A: data_in/status_in/data_out/status_out at 0/1/2/3.
        let mut init = ProcessDescriptor::new(pid, 0, 2);

        match Loader::open_and_load_into_process(
            &mut self.memory,
            &mut self.frames,
            &self.program_source,
            &mut init,
            INIT_IMAGE,
        ) {
            Ok(load_address) => {
                if load_address != INIT_LOAD_ADDRESS {
                    warn!(
                        "RESET: {INIT_IMAGE} loaded at {load_address:#x}, expected {INIT_LOAD_ADDRESS:#x}"
                    );
                    self.internal_error = true;
                    self.process_table.insert(0, init);
                    return;
                }
                init.context.pc = load_address;
                init.state = ProcessState::Ready;
                info!("RESET: booted pid {pid} from {INIT_IMAGE} at {load_address:#x}");
                self.process_table.insert(0, init);
            }
            Err(err) => {
                warn!("RESET: failed to load {INIT_IMAGE}: {err}");
                self.internal_error = true;
            }
        }
    }

    fn service_clock(&mut self) {
        if let Err(err) = self.io.write_register(CLOCK_INTERRUPT_REGISTER, 0) {
            warn!("clock ack failed: {err}");
            self.internal_error = true;
            return;
        }
        if let Err(err) = self
            .io
            .write_register(CLOCK_TIMER_REGISTER, self.config.clock_tick_instructions)
        {
            warn!("clock rearm failed: {err}");
            self.internal_error = true;
            return;
        }
        self.scheduler.tick();
    }

    fn service_cpu_error(&mut self) {
        if let Some(slot) = self.scheduler.current_slot() {
            if let Some(desc) = self.process_table.get_mut(slot) {
                warn!("pid {} faulted: err={}", desc.pid, desc.context.err);
                desc.state = ProcessState::Terminated;
            }
        }
        self.internal_error = true;
    }

    fn service_syscall(&mut self) {
        let slot = match self.scheduler.current_slot() {
            Some(slot) => slot,
            None => return,
        };

        if let Err(err) = SyscallDispatcher::dispatch(
            &mut self.process_table,
            slot,
            &mut self.io,
            &mut self.memory,
            &mut self.mmu,
            &mut self.frames,
            &mut self.pids,
            &self.program_source,
            self.config.max_syscall_filename_len,
        ) {
            warn!("syscall dispatch error: {err}");
            self.internal_error = true;
        }
    }

    /// Resolves blockers and schedules, idling (advancing simulated time
    /// through the console) until a process is runnable, a fatal error has
    /// occurred, or (test-only) `max_idle_ticks` is exhausted.
    fn resolve_and_schedule(&mut self) {
        let mut idle_ticks = 0usize;
        loop {
            BlockingResolver::resolve(&mut self.process_table, &mut self.io);
            self.scheduler.select(&mut self.process_table);

            if self.scheduler.current_slot().is_some() || self.internal_error {
                return;
            }

            if let Some(max) = self.config.max_idle_ticks {
                if idle_ticks >= max {
                    return;
                }
            }

            self.console.tick();
            idle_ticks += 1;
        }
    }

    fn dispatch_or_halt(&mut self) -> TrapOutcome {
        if self.internal_error {
            return TrapOutcome::Halt;
        }

        let slot = match self.scheduler.current_slot() {
            Some(slot) => slot,
            None => return TrapOutcome::Halt,
        };

        let desc = match self.process_table.get(slot) {
            Some(desc) => desc,
            None => return TrapOutcome::Halt,
        };

        match Dispatcher::dispatch(&mut self.mmu, desc) {
            Ok(()) => TrapOutcome::Resume,
            Err(err) => {
                warn!("dispatch failed: {err}");
                self.internal_error = true;
                TrapOutcome::Halt
            }
        }
    }
}
