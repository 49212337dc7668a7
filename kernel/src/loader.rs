//! Program loader. Installs a program image either directly into physical
//! memory (the trap stub, installed once at construction) or into a
//! process's virtual address space behind a freshly allocated run of
//! physical frames (`init.maq` at boot, and every `CREATE_PROC`).

use crate::allocator::FrameAllocator;
use crate::constants::PAGE_SIZE;
use crate::error::KernelError;
use crate::io::{Memory, ProgramImage, ProgramSource};
use crate::mm::address::page_span;
use crate::process::descriptor::ProcessDescriptor;

pub struct Loader;

impl Loader {
    /// Writes every byte of `image` into physical memory at its literal
    /// `load_address`, bypassing any process's page table. Used once to
    /// install the supervisor trap stub. Returns the load address so the
    /// caller can check it against where the machine expects the image to
    /// land.
    pub fn load_physical<MEM: Memory, IMG: ProgramImage>(
        memory: &mut MEM,
        image: &IMG,
    ) -> Result<usize, KernelError> {
        let base = image.load_address();
        for offset in 0..image.len() {
            memory.write_byte(base + offset, image.byte_at(offset))?;
        }
        Ok(base)
    }

    /// Allocates a contiguous run of frames covering `image`'s virtual
    /// range, maps them into `process`'s page table, and copies the image
    /// bytes in. Returns the virtual load address on success.
    pub fn load_into_process<MEM: Memory, IMG: ProgramImage>(
        memory: &mut MEM,
        frames: &mut FrameAllocator,
        process: &mut ProcessDescriptor,
        image: &IMG,
    ) -> Result<usize, KernelError> {
        let load_address = image.load_address();
        let page_count = page_span(load_address, image.len());
        let base_frame = frames.alloc_contiguous(page_count)?;
        let first_vpn = load_address / PAGE_SIZE;

        for page in 0..page_count {
            process.page_table.map(first_vpn + page, base_frame + page);
        }

        for offset in 0..image.len() {
            let va = load_address + offset;
            let vpn = va / PAGE_SIZE;
            let frame = base_frame + (vpn - first_vpn);
            let pa = frame * PAGE_SIZE + (va % PAGE_SIZE);
            memory.write_byte(pa, image.byte_at(offset))?;
        }

        Ok(load_address)
    }

    /// Opens `path` through the program source and loads it directly into
    /// physical memory, returning the load address.
    pub fn open_and_load_physical<MEM: Memory, PS: ProgramSource>(
        memory: &mut MEM,
        source: &PS,
        path: &str,
    ) -> Result<usize, KernelError> {
        let image = source.open(path)?;
        Self::load_physical(memory, &image)
    }

    /// Opens `path` through the program source and loads it into `process`,
    /// returning the virtual load address.
    pub fn open_and_load_into_process<MEM: Memory, PS: ProgramSource>(
        memory: &mut MEM,
        frames: &mut FrameAllocator,
        source: &PS,
        process: &mut ProcessDescriptor,
        path: &str,
    ) -> Result<usize, KernelError> {
        let image = source.open(path)?;
        Self::load_into_process(memory, frames, process, &image)
    }
}
