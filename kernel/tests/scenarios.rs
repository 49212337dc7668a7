//! Integration tests exercising the full trap sequence (save → service →
//! resolve → schedule → dispatch) against an in-memory mock environment,
//! covering the scenarios and laws of the testable-properties section.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kernel::constants::{
    PAGE_SIZE, SAVE_AREA_A, SAVE_AREA_ERR, SAVE_AREA_PC, SAVE_AREA_X,
};
use kernel::error::KernelError;
use kernel::io::{Console, IoBus, Memory, Mmu, ProgramImage, ProgramSource};
use kernel::mm::address::VirtAddr;
use kernel::mm::page_table::PageTable;
use kernel::process::descriptor::{Blocking, ProcessState};
use kernel::{Kernel, KernelConfig, TrapOutcome};

const IRQ_RESET: u32 = 0;
const IRQ_CLOCK: u32 = 1;
const IRQ_CPU_ERROR: u32 = 2;
const IRQ_SYSCALL: u32 = 3;

/// Syscall numbers, mirrored here for test readability.
const SYS_READ: usize = 1;
const SYS_CREATE_PROC: usize = 3;
const SYS_KILL_PROC: usize = 4;
const SYS_WAIT_PROC: usize = 5;

struct Machine {
    physical_memory: Vec<u8>,
    registers: HashMap<usize, usize>,
    installed_page_table: Option<PageTable>,
}

#[derive(Clone)]
struct Handle(Rc<RefCell<Machine>>);

impl Handle {
    fn new(frame_count: usize) -> Self {
        Self(Rc::new(RefCell::new(Machine {
            physical_memory: vec![0u8; frame_count * PAGE_SIZE],
            registers: HashMap::new(),
            installed_page_table: None,
        })))
    }

    fn write_save_area(&self, pc: usize, a: usize, x: usize, err: usize) {
        let mut m = self.0.borrow_mut();
        write_word(&mut m.physical_memory, SAVE_AREA_PC, pc);
        write_word(&mut m.physical_memory, SAVE_AREA_A, a);
        write_word(&mut m.physical_memory, SAVE_AREA_X, x);
        write_word(&mut m.physical_memory, SAVE_AREA_ERR, err);
    }

    fn set_register(&self, register: usize, value: usize) {
        self.0.borrow_mut().registers.insert(register, value);
    }

    fn write_cstring_at_pa(&self, pa: usize, s: &str) {
        let mut m = self.0.borrow_mut();
        for (i, byte) in s.bytes().chain(std::iter::once(0)).enumerate() {
            m.physical_memory[pa + i] = byte;
        }
    }
}

fn write_word(memory: &mut [u8], address: usize, value: usize) {
    memory[address..address + 8].copy_from_slice(&value.to_le_bytes());
}

fn read_word(memory: &[u8], address: usize) -> usize {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&memory[address..address + 8]);
    usize::from_le_bytes(bytes)
}

impl Mmu for Handle {
    fn read_supervisor(&mut self, address: usize) -> Result<usize, KernelError> {
        Ok(read_word(&self.0.borrow().physical_memory, address))
    }

    fn write_supervisor(&mut self, address: usize, value: usize) -> Result<(), KernelError> {
        write_word(&mut self.0.borrow_mut().physical_memory, address, value);
        Ok(())
    }

    fn read_user(&mut self, address: usize) -> Result<u8, KernelError> {
        let m = self.0.borrow();
        let pt = m
            .installed_page_table
            .as_ref()
            .ok_or(KernelError::MemoryFault { address })?;
        let pa = pt
            .translate(VirtAddr::new(address))
            .ok_or(KernelError::MemoryFault { address })?;
        Ok(m.physical_memory[pa.as_usize()])
    }

    fn set_page_table(&mut self, table: &PageTable) {
        self.0.borrow_mut().installed_page_table = Some(table.clone());
    }
}

impl Memory for Handle {
    fn read_byte(&self, address: usize) -> Result<u8, KernelError> {
        Ok(self.0.borrow().physical_memory[address])
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), KernelError> {
        self.0.borrow_mut().physical_memory[address] = value;
        Ok(())
    }
}

impl IoBus for Handle {
    fn read_register(&mut self, register: usize) -> Result<usize, KernelError> {
        Ok(*self.0.borrow().registers.get(&register).unwrap_or(&0))
    }

    fn write_register(&mut self, register: usize, value: usize) -> Result<(), KernelError> {
        self.0.borrow_mut().registers.insert(register, value);
        Ok(())
    }
}

impl Console for Handle {
    fn log_line(&mut self, _line: &str) {}
    fn tick(&mut self) {}
}

struct MemImage {
    load_address: usize,
    bytes: Vec<u8>,
}

impl ProgramImage for MemImage {
    fn load_address(&self) -> usize {
        self.load_address
    }
    fn len(&self) -> usize {
        self.bytes.len()
    }
    fn byte_at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }
}

struct MockProgramSource {
    images: HashMap<String, (usize, Vec<u8>)>,
}

impl MockProgramSource {
    fn new() -> Self {
        let mut images = HashMap::new();
        // The stub is written directly to physical memory (bypassing the
        // frame allocator entirely), so it loads at the same address
        // init.maq does without colliding with any allocated frame.
        images.insert("trata_int.maq".to_string(), (100, vec![0xAA; 4]));
        images.insert("init.maq".to_string(), (100, vec![1, 2, 3, 4, 5, 6, 7, 8]));
        images.insert("child.maq".to_string(), (100, vec![9, 9, 9, 9]));
        Self { images }
    }
}

impl ProgramSource for MockProgramSource {
    type Image = MemImage;

    fn open(&self, path: &str) -> Result<Self::Image, KernelError> {
        let (load_address, bytes) =
            self.images
                .get(path)
                .cloned()
                .ok_or_else(|| KernelError::Load {
                    path: path.to_string(),
                    reason: "no such image".to_string(),
                })?;
        Ok(MemImage {
            load_address,
            bytes,
        })
    }
}

type TestKernel = Kernel<Handle, Handle, Handle, Handle, MockProgramSource>;

fn boot() -> (TestKernel, Handle) {
    let handle = Handle::new(64);
    let config = KernelConfig {
        physical_frame_count: 64,
        max_idle_ticks: Some(8),
        ..KernelConfig::default()
    };
    let mut kernel = Kernel::new(
        config,
        handle.clone(),
        handle.clone(),
        handle.clone(),
        handle.clone(),
        MockProgramSource::new(),
    )
    .expect("boot stub install should succeed");

    let outcome = kernel.trap(IRQ_RESET);
    assert_eq!(outcome, TrapOutcome::Resume);
    (kernel, handle)
}

/// Writes `filename` into pid 0's mapped address space at virtual address
/// 200 (inside the page `init.maq` was loaded into) and returns that VA.
fn stash_filename(kernel: &TestKernel, filename: &str, handle: &Handle) -> usize {
    let va = 200usize;
    let desc = kernel.process_table().get(0).unwrap();
    let pa = desc
        .page_table
        .translate(VirtAddr::new(va))
        .expect("va should be mapped inside init's loaded page");
    handle.write_cstring_at_pa(pa.as_usize(), filename);
    va
}

#[test]
fn boot_creates_init_in_slot_zero() {
    let (kernel, _handle) = boot();

    let desc = kernel.process_table().get(0).expect("slot 0 occupied");
    assert_eq!(desc.pid, 0);
    assert_eq!(desc.state, ProcessState::Running);
    assert_eq!(desc.context.pc, 100);
    assert!(desc.page_table.is_mapped(100 / PAGE_SIZE));
}

#[test]
fn round_robin_switches_after_two_clock_ticks() {
    let (mut kernel, handle) = boot();

    // p0 creates p1 via CREATE_PROC so there are two runnable processes.
    let filename_va = stash_filename(&kernel, "child.maq", &handle);
    handle.write_save_area(100, SYS_CREATE_PROC, filename_va, 0);
    kernel.trap(IRQ_SYSCALL);

    assert_eq!(kernel.current_slot(), Some(0));
    assert_eq!(
        kernel.process_table().get(0).unwrap().context.a,
        1,
        "CREATE_PROC should return pid 1"
    );
    assert_eq!(
        kernel.process_table().get(1).unwrap().state,
        ProcessState::Ready
    );

    kernel.trap(IRQ_CLOCK);
    assert_eq!(kernel.current_slot(), Some(0), "quantum not yet elapsed");

    kernel.trap(IRQ_CLOCK);
    assert_eq!(
        kernel.current_slot(),
        Some(1),
        "quantum elapsed, scheduler should switch to pid 1"
    );
}

#[test]
fn blocking_read_wakes_with_pending_word() {
    let (mut kernel, handle) = boot();

    // status register for terminal A is in_dev(0) + 1 = 1, currently 0.
    handle.write_save_area(100, SYS_READ, 0, 0);
    kernel.trap(IRQ_SYSCALL);

    let desc = kernel.process_table().get(0).unwrap();
    assert_eq!(desc.state, ProcessState::Blocked(Blocking::Input { device: 1 }));

    handle.set_register(0, 777); // data register
    handle.set_register(1, 1); // status register now non-zero
    kernel.trap(IRQ_CLOCK);

    let desc = kernel.process_table().get(0).unwrap();
    assert_eq!(desc.state, ProcessState::Running);
    assert_eq!(desc.context.a, 777);
}

#[test]
fn create_kill_join_wakes_joiner_with_zero() {
    let (mut kernel, handle) = boot();

    let filename_va = stash_filename(&kernel, "child.maq", &handle);
    handle.write_save_area(100, SYS_CREATE_PROC, filename_va, 0);
    kernel.trap(IRQ_SYSCALL);
    assert_eq!(kernel.process_table().get(0).unwrap().context.a, 1);

    // p0 waits on pid 1.
    handle.write_save_area(100, SYS_WAIT_PROC, 1, 0);
    kernel.trap(IRQ_SYSCALL);
    assert_eq!(
        kernel.process_table().get(0).unwrap().state,
        ProcessState::Blocked(Blocking::Join { target: 1 })
    );
    assert_eq!(kernel.current_slot(), Some(1), "p1 should now be running");

    // p1 kills itself (x = 0 self-kill sentinel).
    handle.write_save_area(100, SYS_KILL_PROC, 0, 0);
    kernel.trap(IRQ_SYSCALL);

    assert_eq!(kernel.process_table().find_by_pid(1), None, "slot reclaimed");
    let joiner = kernel.process_table().get(0).unwrap();
    assert_eq!(joiner.state, ProcessState::Running);
    assert_eq!(joiner.context.a, 0);
}

#[test]
fn cpu_fault_terminates_process_and_halts() {
    let (mut kernel, handle) = boot();

    handle.write_save_area(100, 0, 0, 42);
    let outcome = kernel.trap(IRQ_CPU_ERROR);

    assert_eq!(outcome, TrapOutcome::Halt);
    assert!(kernel.internal_error());
    assert_eq!(kernel.process_table().find_by_pid(0), None);
}

#[test]
fn full_process_table_rejects_create_proc() {
    let (mut kernel, handle) = boot();

    for _ in 0..3 {
        let filename_va = stash_filename(&kernel, "child.maq", &handle);
        handle.write_save_area(100, SYS_CREATE_PROC, filename_va, 0);
        kernel.trap(IRQ_SYSCALL);
    }
    assert!(kernel.process_table().free_slot().is_none());

    let filename_va = stash_filename(&kernel, "child.maq", &handle);
    handle.write_save_area(100, SYS_CREATE_PROC, filename_va, 0);
    kernel.trap(IRQ_SYSCALL);

    let desc = kernel.process_table().get(0).unwrap();
    assert_eq!(desc.context.a, (-1_i64) as usize, "CREATE_PROC should report failure");
    assert_eq!(desc.state, ProcessState::Running, "caller is not terminated");
}
