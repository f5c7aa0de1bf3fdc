pub mod code;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod label;
pub mod object;
pub mod op;
pub mod operand;

pub use object::ObjectFile;
pub use op::OpCode;
