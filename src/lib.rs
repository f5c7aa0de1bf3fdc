//! `mjc`: a single-pass compiler and interpreter for MicroJava.
//!
//! Source text is scanned, parsed, checked and translated to MicroJava
//! bytecode in one pass; the resulting object file can be saved, listed or
//! executed on the bundled virtual machine.

pub mod bytecode;
pub mod diagnostics;
pub mod frontend;
pub mod runtime;
pub mod symtab;

pub use bytecode::compile::{Compilation, Compiler, CompilerConfig};
pub use bytecode::compile_error::CompileError;
pub use bytecode::object::{ObjectFile, ObjectFileError};
pub use diagnostics::{Diagnostic, Diagnostics, Message};
pub use runtime::{Fault, RuntimeError, Vm, VmConfig};
