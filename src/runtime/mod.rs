pub mod runtime_error;
pub mod vm;

pub use runtime_error::{Fault, RuntimeError};
pub use vm::{Vm, VmConfig};
