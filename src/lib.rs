//! RISC-V External Debug core: the DTM/DMI transport stack and hart debug
//! module state machine that sits between a host debugger and RISC-V
//! silicon reached over JTAG or RVSWD.
//!
//! Host-side GDB protocol parsing, the CLI, the USB stack and
//! target-chip board bring-up are collaborator concerns; this crate only
//! implements discovery, halt/resume/step, CSR and memory access, and
//! the trigger mediator.

pub mod csr;
pub mod dm;
pub mod dtm;
pub mod error;
pub mod hart;
pub mod registers;
pub mod transport;
pub mod trigger;
pub mod vendor;

pub use dm::{discover_debug_modules, DebugModule, DmWindow};
pub use dtm::Dmi;
pub use error::{HartStatus, Result, RiscvError};
pub use hart::{Hart, HartState};
pub use vendor::{VendorHookRegistry, VendorKey};

/// Discover every DM and hart reachable on `dmi`, running vendor hooks
/// and resuming each successfully-discovered hart before returning
/// (discover, vendor-hook, resume, publish).
pub fn dmi_init(
    mut dmi: Dmi,
    hooks: &VendorHookRegistry,
) -> error::Result<(Dmi, Vec<DebugModule>)> {
    let mut modules = discover_debug_modules(&mut dmi)?;

    for module in &mut modules {
        let mut window = DmWindow::new(&mut dmi, module.base);

        for hart in &mut module.harts {
            if hart.access_width == 0 {
                // rv128 or persistent-failure hart: left inactive, no
                // hook, no resume.
                continue;
            }

            let key = VendorKey {
                designer_code: hart.designer_code,
                arch_id: hart.arch_id,
                impl_id: hart.impl_id,
            };
            hooks.run(key, &mut window, hart);
            hart.resume(&mut window, false)?;
        }
    }

    Ok((dmi, modules))
}
