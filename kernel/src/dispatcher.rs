//! Context dispatch: writes the selected process's saved `pc`/`a`/`x` into
//! the save area through the MMU in supervisor mode and installs its page
//! table, or reports that the CPU should halt if no process was selected
//! and there's no recovering from it.

use crate::constants::{SAVE_AREA_A, SAVE_AREA_PC, SAVE_AREA_X};
use crate::error::KernelError;
use crate::io::Mmu;
use crate::process::descriptor::ProcessDescriptor;

pub struct Dispatcher;

impl Dispatcher {
    pub fn dispatch<M: Mmu>(mmu: &mut M, process: &ProcessDescriptor) -> Result<(), KernelError> {
        mmu.write_supervisor(SAVE_AREA_PC, process.context.pc)?;
        mmu.write_supervisor(SAVE_AREA_A, process.context.a)?;
        mmu.write_supervisor(SAVE_AREA_X, process.context.x)?;
        mmu.set_page_table(&process.page_table);
        Ok(())
    }
}
