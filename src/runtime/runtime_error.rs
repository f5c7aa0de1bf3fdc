use thiserror::Error;

/// What went wrong while executing an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("program has no main method")]
    NoMain,
    #[error("invalid opcode {0}")]
    BadOpcode(u8),
    #[error("pc outside of the code area")]
    PcOutOfRange,
    #[error("expression stack underflow")]
    StackUnderflow,
    #[error("stack size limit exceeded ({0})")]
    StackOverflow(usize),
    #[error("call depth limit exceeded ({0}) - possible infinite recursion")]
    CallDepthExceeded(usize),
    #[error("execution step limit exceeded ({0})")]
    StepLimitExceeded(usize),
    #[error("no active frame")]
    NoFrame,
    #[error("local slot {0} outside of the frame")]
    BadLocal(usize),
    #[error("global slot {0} outside of the data area")]
    BadGlobal(usize),
    #[error("null reference")]
    NullReference,
    #[error("invalid reference {0}")]
    BadReference(i32),
    #[error("field {0} outside of the object")]
    BadField(usize),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i32, len: usize },
    #[error("negative array size {0}")]
    NegativeArraySize(i32),
    #[error("heap exhausted")]
    HeapExhausted,
    #[error("division by zero")]
    DivisionByZero,
    #[error("function ended without a return statement")]
    MissingReturn,
    #[error("trap {0}")]
    Trap(u8),
    #[error("print width {0} exceeds the limit")]
    PrintWidth(usize),
    #[error("no integer in input")]
    InvalidInput,
    #[error("end of input")]
    EndOfInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("runtime error at pc {pc}: {fault}")]
pub struct RuntimeError {
    /// Address of the failing instruction.
    pub pc: usize,
    pub fault: Fault,
}

impl RuntimeError {
    pub fn new(pc: usize, fault: Fault) -> Self {
        RuntimeError { pc, fault }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RuntimeError::new(
            12,
            Fault::IndexOutOfBounds {
                index: 5,
                len: 3,
            },
        );
        assert_eq!(
            err.to_string(),
            "runtime error at pc 12: index 5 out of bounds for length 3"
        );
    }
}
