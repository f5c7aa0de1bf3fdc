use serde::{Deserialize, Serialize};

// =============================================================================
// OPCODE - MicroJava VM instruction set
// =============================================================================

/// One-byte opcodes of the target machine. Discriminants are the encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    // locals
    Load = 1,
    Load0 = 2,
    Load1 = 3,
    Load2 = 4,
    Load3 = 5,
    Store = 6,
    Store0 = 7,
    Store1 = 8,
    Store2 = 9,
    Store3 = 10,

    // globals & fields
    GetStatic = 11,
    PutStatic = 12,
    GetField = 13,
    PutField = 14,

    // constants
    Const0 = 15,
    Const1 = 16,
    Const2 = 17,
    Const3 = 18,
    Const4 = 19,
    Const5 = 20,
    ConstM1 = 21,
    Const = 22,

    // arithmetic
    Add = 23,
    Sub = 24,
    Mul = 25,
    Div = 26,
    Rem = 27,
    Neg = 28,
    Shl = 29,
    Shr = 30,
    Inc = 31,

    // objects & arrays
    New = 32,
    NewArray = 33,
    ALoad = 34,
    AStore = 35,
    BALoad = 36,
    BAStore = 37,
    ArrayLength = 38,

    // stack
    Pop = 39,
    Dup = 40,
    Dup2 = 41,

    // jumps
    Jmp = 42,
    Jeq = 43,
    Jne = 44,
    Jlt = 45,
    Jle = 46,
    Jgt = 47,
    Jge = 48,

    // methods
    Call = 49,
    Return = 50,
    Enter = 51,
    Exit = 52,

    // I/O
    Read = 53,
    Print = 54,
    BRead = 55,
    BPrint = 56,

    Trap = 57,
    Nop = 58,
}

/// Shape of the immediates following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operands {
    None,
    /// One unsigned byte.
    Byte,
    /// Two bytes (`inc`: slot and signed delta; `enter`: parameter and frame size).
    TwoBytes,
    /// One big-endian 16-bit value.
    Short,
    /// One big-endian signed 16-bit offset relative to the end of the instruction.
    Offset,
    /// One big-endian 32-bit value.
    Word,
}

impl Operands {
    /// Number of immediate bytes.
    pub fn width(self) -> usize {
        match self {
            Operands::None => 0,
            Operands::Byte => 1,
            Operands::TwoBytes | Operands::Short | Operands::Offset => 2,
            Operands::Word => 4,
        }
    }
}

impl OpCode {
    const ALL: [OpCode; 58] = [
        OpCode::Load,
        OpCode::Load0,
        OpCode::Load1,
        OpCode::Load2,
        OpCode::Load3,
        OpCode::Store,
        OpCode::Store0,
        OpCode::Store1,
        OpCode::Store2,
        OpCode::Store3,
        OpCode::GetStatic,
        OpCode::PutStatic,
        OpCode::GetField,
        OpCode::PutField,
        OpCode::Const0,
        OpCode::Const1,
        OpCode::Const2,
        OpCode::Const3,
        OpCode::Const4,
        OpCode::Const5,
        OpCode::ConstM1,
        OpCode::Const,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Rem,
        OpCode::Neg,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Inc,
        OpCode::New,
        OpCode::NewArray,
        OpCode::ALoad,
        OpCode::AStore,
        OpCode::BALoad,
        OpCode::BAStore,
        OpCode::ArrayLength,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Dup2,
        OpCode::Jmp,
        OpCode::Jeq,
        OpCode::Jne,
        OpCode::Jlt,
        OpCode::Jle,
        OpCode::Jgt,
        OpCode::Jge,
        OpCode::Call,
        OpCode::Return,
        OpCode::Enter,
        OpCode::Exit,
        OpCode::Read,
        OpCode::Print,
        OpCode::BRead,
        OpCode::BPrint,
        OpCode::Trap,
        OpCode::Nop,
    ];

    pub fn from_byte(byte: u8) -> Option<OpCode> {
        // opcodes are numbered 1..=58 without gaps
        Self::ALL.get(usize::from(byte).checked_sub(1)?).copied()
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn operands(self) -> Operands {
        use OpCode::*;
        match self {
            Load | Store | NewArray | Trap => Operands::Byte,
            Inc | Enter => Operands::TwoBytes,
            GetStatic | PutStatic | GetField | PutField | New => Operands::Short,
            Jmp | Jeq | Jne | Jlt | Jle | Jgt | Jge | Call => Operands::Offset,
            Const => Operands::Word,
            _ => Operands::None,
        }
    }

    /// Total encoded size of the instruction including its opcode byte.
    pub fn size(self) -> usize {
        1 + self.operands().width()
    }

    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            Load => "load",
            Load0 => "load_0",
            Load1 => "load_1",
            Load2 => "load_2",
            Load3 => "load_3",
            Store => "store",
            Store0 => "store_0",
            Store1 => "store_1",
            Store2 => "store_2",
            Store3 => "store_3",
            GetStatic => "getstatic",
            PutStatic => "putstatic",
            GetField => "getfield",
            PutField => "putfield",
            Const0 => "const_0",
            Const1 => "const_1",
            Const2 => "const_2",
            Const3 => "const_3",
            Const4 => "const_4",
            Const5 => "const_5",
            ConstM1 => "const_m1",
            Const => "const",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Rem => "rem",
            Neg => "neg",
            Shl => "shl",
            Shr => "shr",
            Inc => "inc",
            New => "new",
            NewArray => "newarray",
            ALoad => "aload",
            AStore => "astore",
            BALoad => "baload",
            BAStore => "bastore",
            ArrayLength => "arraylength",
            Pop => "pop",
            Dup => "dup",
            Dup2 => "dup2",
            Jmp => "jmp",
            Jeq => "jeq",
            Jne => "jne",
            Jlt => "jlt",
            Jle => "jle",
            Jgt => "jgt",
            Jge => "jge",
            Call => "call",
            Return => "return",
            Enter => "enter",
            Exit => "exit",
            Read => "read",
            Print => "print",
            BRead => "bread",
            BPrint => "bprint",
            Trap => "trap",
            Nop => "nop",
        }
    }

    pub fn is_jump(self) -> bool {
        self.operands() == Operands::Offset && self != OpCode::Call
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

// =============================================================================
// COMPOP - relational operators of conditions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    /// The operator that holds exactly when `self` does not.
    pub fn invert(self) -> CompOp {
        match self {
            CompOp::Eq => CompOp::Ne,
            CompOp::Ne => CompOp::Eq,
            CompOp::Lt => CompOp::Ge,
            CompOp::Le => CompOp::Gt,
            CompOp::Gt => CompOp::Le,
            CompOp::Ge => CompOp::Lt,
        }
    }

    /// The conditional jump taken when the comparison holds.
    pub fn jump(self) -> OpCode {
        match self {
            CompOp::Eq => OpCode::Jeq,
            CompOp::Ne => OpCode::Jne,
            CompOp::Lt => OpCode::Jlt,
            CompOp::Le => OpCode::Jle,
            CompOp::Gt => OpCode::Jgt,
            CompOp::Ge => OpCode::Jge,
        }
    }

    /// Only equality tests are allowed on references.
    pub fn is_equality(self) -> bool {
        matches!(self, CompOp::Eq | CompOp::Ne)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_roundtrip_covers_all_opcodes() {
        for byte in 1..=58u8 {
            let op = OpCode::from_byte(byte).unwrap();
            assert_eq!(op.byte(), byte);
        }
        assert_eq!(OpCode::from_byte(0), None);
        assert_eq!(OpCode::from_byte(59), None);
    }

    #[test]
    fn test_instruction_sizes() {
        assert_eq!(OpCode::Load0.size(), 1);
        assert_eq!(OpCode::Load.size(), 2);
        assert_eq!(OpCode::Inc.size(), 3);
        assert_eq!(OpCode::GetStatic.size(), 3);
        assert_eq!(OpCode::Jmp.size(), 3);
        assert_eq!(OpCode::Const.size(), 5);
    }

    #[test]
    fn test_invert_is_involution() {
        for op in [CompOp::Eq, CompOp::Ne, CompOp::Lt, CompOp::Le, CompOp::Gt, CompOp::Ge] {
            assert_eq!(op.invert().invert(), op);
            assert_ne!(op.invert(), op);
        }
        assert_eq!(CompOp::Lt.invert().jump(), OpCode::Jge);
    }

    #[test]
    fn test_jump_classification() {
        assert!(OpCode::Jle.is_jump());
        assert!(!OpCode::Call.is_jump());
        assert!(!OpCode::Add.is_jump());
    }
}
