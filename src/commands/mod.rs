//! CLI command implementations
//!
//! Every command except `list-programmers` runs against an initialized
//! [`BusSession`](wilcspi_core::BusSession) over the selected programmer.

mod list;
mod mem;
mod reg;

pub use list::list_programmers;
pub use mem::{run_read_mem, run_write_mem};
pub use reg::{run_init, run_irq_clear, run_irq_status, run_irq_sync, run_read_reg, run_write_reg};
