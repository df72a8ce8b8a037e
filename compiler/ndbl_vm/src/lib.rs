//! Virtual machine for Nodable instruction code.
//!
//! Executes the [`ndbl_compile::Code`] lowered from a graph, either to
//! completion ([`VirtualMachine::run_program`]) or one instruction at a
//! time for a debugger ([`VirtualMachine::debug_program`] then
//! [`VirtualMachine::step_over`]).
//!
//! ```text
//! let code = Compiler::default().compile(&graph)?;
//! let mut vm = VirtualMachine::new(&graph);
//! vm.load_program(code)?;
//! vm.run_program()?;
//! let x = vm.read_variable(x);
//! ```

mod error;
mod memory;
mod registers;
mod vm;

use std::sync::Once;

pub use error::VmError;
pub use registers::Registers;
pub use vm::{VirtualMachine, VmConfig, VmState};

static TRACING_INIT: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set, and only the first call of this
/// function or [`init_tracing_tree`] has an effect.
/// `RUST_LOG=ndbl_vm=trace` prints every executed instruction.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Like [`init_tracing`], with indented span trees instead of flat lines.
pub fn init_tracing_tree() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};
        use tracing_tree::HierarchicalLayer;

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(HierarchicalLayer::new(2).with_targets(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
