use serde::{Deserialize, Serialize};

use crate::bytecode::label::absolute_target;
use crate::bytecode::object::ObjectFile;
use crate::bytecode::op::OpCode;
use crate::runtime::runtime_error::{Fault, RuntimeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub max_call_depth: usize,
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
    /// Total words (or bytes, for char arrays) the heap may hand out.
    pub max_heap_size: usize,
    /// Widest field `print`/`bprint` will pad to.
    pub max_print_width: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 1000,
            max_steps: None,
            max_stack_size: 10_000,
            max_heap_size: 1 << 22,
            max_print_width: 1 << 20,
        }
    }
}

#[derive(Debug, Clone)]
enum HeapObject {
    Record(Vec<i32>),
    Words(Vec<i32>),
    Bytes(Vec<u8>),
}

impl HeapObject {
    fn len(&self) -> usize {
        match self {
            HeapObject::Record(v) | HeapObject::Words(v) => v.len(),
            HeapObject::Bytes(v) => v.len(),
        }
    }
}

/// Reference interpreter for compiled MicroJava programs.
///
/// References are 1-based heap indices so that 0 can stand for `null`.
/// Nothing is ever freed.
pub struct Vm {
    config: VmConfig,
    globals: Vec<i32>,
    stack: Vec<i32>,
    frames: Vec<Vec<i32>>,
    /// Return addresses.
    calls: Vec<usize>,
    heap: Vec<HeapObject>,
    heap_used: usize,
    input: Vec<char>,
    input_pos: usize,
    output: String,
    steps: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        Vm {
            config,
            globals: Vec::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            calls: Vec::new(),
            heap: Vec::new(),
            heap_used: 0,
            input: Vec::new(),
            input_pos: 0,
            output: String::new(),
            steps: 0,
        }
    }

    /// Expression stack left over by the last run.
    pub fn stack(&self) -> &[i32] {
        &self.stack
    }

    pub fn globals(&self) -> &[i32] {
        &self.globals
    }

    fn reset(&mut self, obj: &ObjectFile, input: &str) {
        self.globals = vec![0; obj.data_size.max(0) as usize];
        self.stack.clear();
        self.frames.clear();
        self.calls.clear();
        self.heap.clear();
        self.heap_used = 0;
        self.input = input.chars().collect();
        self.input_pos = 0;
        self.output.clear();
        self.steps = 0;
    }

    /// Runs `obj` from its `main` method until the outermost `return`.
    ///
    /// `input` feeds `read`/`bread`; everything printed is returned.
    pub fn run(&mut self, obj: &ObjectFile, input: &str) -> Result<String, RuntimeError> {
        self.reset(obj, input);
        let mut pc = obj.main_pc().ok_or(RuntimeError::new(0, Fault::NoMain))?;
        tracing::debug!(main = pc, data = obj.data_size, "vm start");

        loop {
            let at = pc;
            match self.step(&obj.code, &mut pc) {
                Ok(true) => {}
                Ok(false) => break,
                Err(fault) => {
                    tracing::debug!(pc = at, %fault, "vm fault");
                    return Err(RuntimeError::new(at, fault));
                }
            }
        }

        tracing::debug!(steps = self.steps, "vm halted");
        Ok(std::mem::take(&mut self.output))
    }

    fn check_limits(&mut self) -> Result<(), Fault> {
        self.steps += 1;
        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(Fault::StepLimitExceeded(max));
            }
        }
        if self.stack.len() > self.config.max_stack_size {
            return Err(Fault::StackOverflow(self.config.max_stack_size));
        }
        Ok(())
    }

    /// Executes one instruction. Returns `false` once the program has halted.
    fn step(&mut self, code: &[u8], pc: &mut usize) -> Result<bool, Fault> {
        self.check_limits()?;

        let start = *pc;
        let byte = *code.get(start).ok_or(Fault::PcOutOfRange)?;
        let op = OpCode::from_byte(byte).ok_or(Fault::BadOpcode(byte))?;
        let imm = code
            .get(start + 1..start + op.size())
            .ok_or(Fault::PcOutOfRange)?;
        *pc = start + op.size();

        let byte_arg = || usize::from(imm[0]);
        let short_arg = || usize::from(u16::from_be_bytes([imm[0], imm[1]]));
        let jump_target = || {
            let offset = i16::from_be_bytes([imm[0], imm[1]]);
            usize::try_from(absolute_target(offset, start + 1)).map_err(|_| Fault::PcOutOfRange)
        };

        match op {
            OpCode::Load => self.push(self.local(byte_arg())?),
            OpCode::Load0 | OpCode::Load1 | OpCode::Load2 | OpCode::Load3 => {
                let slot = usize::from(byte - OpCode::Load0.byte());
                self.push(self.local(slot)?);
            }
            OpCode::Store => {
                let v = self.pop()?;
                *self.local_mut(byte_arg())? = v;
            }
            OpCode::Store0 | OpCode::Store1 | OpCode::Store2 | OpCode::Store3 => {
                let slot = usize::from(byte - OpCode::Store0.byte());
                let v = self.pop()?;
                *self.local_mut(slot)? = v;
            }

            OpCode::GetStatic => {
                let s = short_arg();
                let v = *self.globals.get(s).ok_or(Fault::BadGlobal(s))?;
                self.push(v);
            }
            OpCode::PutStatic => {
                let s = short_arg();
                let v = self.pop()?;
                *self.globals.get_mut(s).ok_or(Fault::BadGlobal(s))? = v;
            }
            OpCode::GetField => {
                let s = short_arg();
                let r = self.pop()?;
                let v = match self.object(r)? {
                    HeapObject::Record(fields) => *fields.get(s).ok_or(Fault::BadField(s))?,
                    _ => return Err(Fault::BadReference(r)),
                };
                self.push(v);
            }
            OpCode::PutField => {
                let s = short_arg();
                let v = self.pop()?;
                let r = self.pop()?;
                match self.object_mut(r)? {
                    HeapObject::Record(fields) => *fields.get_mut(s).ok_or(Fault::BadField(s))? = v,
                    _ => return Err(Fault::BadReference(r)),
                }
            }

            OpCode::Const0
            | OpCode::Const1
            | OpCode::Const2
            | OpCode::Const3
            | OpCode::Const4
            | OpCode::Const5 => self.push(i32::from(byte - OpCode::Const0.byte())),
            OpCode::ConstM1 => self.push(-1),
            OpCode::Const => self.push(i32::from_be_bytes([imm[0], imm[1], imm[2], imm[3]])),

            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem | OpCode::Shl | OpCode::Shr => {
                let y = self.pop()?;
                let x = self.pop()?;
                let v = match op {
                    OpCode::Add => x.wrapping_add(y),
                    OpCode::Sub => x.wrapping_sub(y),
                    OpCode::Mul => x.wrapping_mul(y),
                    OpCode::Div if y == 0 => return Err(Fault::DivisionByZero),
                    OpCode::Div => x.wrapping_div(y),
                    OpCode::Rem if y == 0 => return Err(Fault::DivisionByZero),
                    OpCode::Rem => x.wrapping_rem(y),
                    OpCode::Shl => x.wrapping_shl(y as u32),
                    _ => x.wrapping_shr(y as u32),
                };
                self.push(v);
            }
            OpCode::Neg => {
                let x = self.pop()?;
                self.push(x.wrapping_neg());
            }
            OpCode::Inc => {
                let delta = i32::from(imm[1] as i8);
                let slot = self.local_mut(byte_arg())?;
                *slot = slot.wrapping_add(delta);
            }

            OpCode::New => {
                let n = short_arg();
                let r = self.alloc(HeapObject::Record(vec![0; n]), n)?;
                self.push(r);
            }
            OpCode::NewArray => {
                let n = self.pop()?;
                let len = usize::try_from(n).map_err(|_| Fault::NegativeArraySize(n))?;
                let obj = if imm[0] == 0 {
                    HeapObject::Bytes(vec![0; len])
                } else {
                    HeapObject::Words(vec![0; len])
                };
                let r = self.alloc(obj, len)?;
                self.push(r);
            }
            OpCode::ALoad | OpCode::BALoad => {
                let i = self.pop()?;
                let r = self.pop()?;
                let v = match self.object(r)? {
                    HeapObject::Words(words) => words[index(i, words.len())?],
                    HeapObject::Bytes(bytes) => i32::from(bytes[index(i, bytes.len())?]),
                    HeapObject::Record(_) => return Err(Fault::BadReference(r)),
                };
                self.push(v);
            }
            OpCode::AStore | OpCode::BAStore => {
                let v = self.pop()?;
                let i = self.pop()?;
                let r = self.pop()?;
                match self.object_mut(r)? {
                    HeapObject::Words(words) => {
                        let at = index(i, words.len())?;
                        words[at] = v;
                    }
                    HeapObject::Bytes(bytes) => {
                        let at = index(i, bytes.len())?;
                        bytes[at] = v as u8;
                    }
                    HeapObject::Record(_) => return Err(Fault::BadReference(r)),
                }
            }
            OpCode::ArrayLength => {
                let r = self.pop()?;
                let len = self.object(r)?.len();
                self.push(len as i32);
            }

            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let x = self.pop()?;
                self.push(x);
                self.push(x);
            }
            OpCode::Dup2 => {
                let y = self.pop()?;
                let x = self.pop()?;
                self.stack.extend_from_slice(&[x, y, x, y]);
            }

            OpCode::Jmp => *pc = jump_target()?,
            OpCode::Jeq | OpCode::Jne | OpCode::Jlt | OpCode::Jle | OpCode::Jgt | OpCode::Jge => {
                let y = self.pop()?;
                let x = self.pop()?;
                let taken = match op {
                    OpCode::Jeq => x == y,
                    OpCode::Jne => x != y,
                    OpCode::Jlt => x < y,
                    OpCode::Jle => x <= y,
                    OpCode::Jgt => x > y,
                    _ => x >= y,
                };
                if taken {
                    *pc = jump_target()?;
                }
            }

            OpCode::Call => {
                if self.calls.len() >= self.config.max_call_depth {
                    return Err(Fault::CallDepthExceeded(self.config.max_call_depth));
                }
                self.calls.push(*pc);
                *pc = jump_target()?;
            }
            OpCode::Return => match self.calls.pop() {
                Some(ret) => *pc = ret,
                None => return Ok(false),
            },
            OpCode::Enter => {
                let n_pars = usize::from(imm[0]);
                let n_vars = usize::from(imm[1]).max(n_pars);
                let mut frame = vec![0; n_vars];
                for slot in frame[..n_pars].iter_mut().rev() {
                    *slot = self.pop()?;
                }
                self.frames.push(frame);
            }
            OpCode::Exit => {
                self.frames.pop().ok_or(Fault::NoFrame)?;
            }

            OpCode::Read => {
                let v = self.read_int()?;
                self.push(v);
            }
            OpCode::BRead => {
                let ch = *self.input.get(self.input_pos).ok_or(Fault::EndOfInput)?;
                self.input_pos += 1;
                self.push(ch as i32);
            }
            OpCode::Print => {
                let width = self.pop()?;
                let v = self.pop()?;
                self.write_padded(&v.to_string(), width)?;
            }
            OpCode::BPrint => {
                let width = self.pop()?;
                let v = self.pop()?;
                let ch = char::from_u32(v as u32).unwrap_or('?');
                self.write_padded(ch.encode_utf8(&mut [0; 4]), width)?;
            }

            OpCode::Trap if imm[0] == 1 => return Err(Fault::MissingReturn),
            OpCode::Trap => return Err(Fault::Trap(imm[0])),
            OpCode::Nop => {}
        }
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // helpers
    // -------------------------------------------------------------------------

    fn push(&mut self, v: i32) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Result<i32, Fault> {
        self.stack.pop().ok_or(Fault::StackUnderflow)
    }

    /// Appends `text` right-aligned in a field of `width` characters.
    fn write_padded(&mut self, text: &str, width: i32) -> Result<(), Fault> {
        let width = usize::try_from(width).unwrap_or(0);
        if width > self.config.max_print_width {
            return Err(Fault::PrintWidth(width));
        }
        let len = text.chars().count();
        self.output
            .extend(std::iter::repeat_n(' ', width.saturating_sub(len)));
        self.output.push_str(text);
        Ok(())
    }

    fn local(&self, slot: usize) -> Result<i32, Fault> {
        let frame = self.frames.last().ok_or(Fault::NoFrame)?;
        frame.get(slot).copied().ok_or(Fault::BadLocal(slot))
    }

    fn local_mut(&mut self, slot: usize) -> Result<&mut i32, Fault> {
        let frame = self.frames.last_mut().ok_or(Fault::NoFrame)?;
        frame.get_mut(slot).ok_or(Fault::BadLocal(slot))
    }

    fn alloc(&mut self, obj: HeapObject, size: usize) -> Result<i32, Fault> {
        if self.heap_used + size > self.config.max_heap_size {
            return Err(Fault::HeapExhausted);
        }
        self.heap_used += size;
        self.heap.push(obj);
        Ok(self.heap.len() as i32)
    }

    fn object(&self, r: i32) -> Result<&HeapObject, Fault> {
        if r == 0 {
            return Err(Fault::NullReference);
        }
        usize::try_from(r - 1)
            .ok()
            .and_then(|i| self.heap.get(i))
            .ok_or(Fault::BadReference(r))
    }

    fn object_mut(&mut self, r: i32) -> Result<&mut HeapObject, Fault> {
        if r == 0 {
            return Err(Fault::NullReference);
        }
        usize::try_from(r - 1)
            .ok()
            .and_then(|i| self.heap.get_mut(i))
            .ok_or(Fault::BadReference(r))
    }

    /// Reads an optionally signed decimal integer, skipping leading whitespace.
    fn read_int(&mut self) -> Result<i32, Fault> {
        while self
            .input
            .get(self.input_pos)
            .is_some_and(|c| c.is_whitespace())
        {
            self.input_pos += 1;
        }
        if self.input_pos >= self.input.len() {
            return Err(Fault::EndOfInput);
        }

        let mut text = String::new();
        if self.input[self.input_pos] == '-' {
            text.push('-');
            self.input_pos += 1;
        }
        while let Some(c) = self.input.get(self.input_pos).filter(|c| c.is_ascii_digit()) {
            text.push(*c);
            self.input_pos += 1;
        }
        text.parse().map_err(|_| Fault::InvalidInput)
    }
}

fn index(i: i32, len: usize) -> Result<usize, Fault> {
    usize::try_from(i)
        .ok()
        .filter(|&at| at < len)
        .ok_or(Fault::IndexOutOfBounds { index: i, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use pretty_assertions::assert_eq;

    fn run(source: &str, input: &str) -> Result<String, RuntimeError> {
        let out = Compiler::new().compile_source(source).unwrap();
        assert!(out.is_ok(), "unexpected diagnostics: {:?}", out.diagnostics);
        Vm::new().run(&out.object, input)
    }

    fn raw(code: Vec<u8>) -> ObjectFile {
        ObjectFile {
            data_size: 0,
            main_pc: 0,
            code,
        }
    }

    #[test]
    fn test_arithmetic_and_print_width() {
        let out = run(
            "program P { void main() { print(7 * 6 - 2, 4); print(-9 / 2); print(9 % 4); } }",
            "",
        );
        assert_eq!(out.unwrap(), "  40-41");
    }

    #[test]
    fn test_char_output() {
        let out = run("program P { void main() { print('h'); print('i', 2); } }", "");
        assert_eq!(out.unwrap(), "h i");
    }

    #[test]
    fn test_wide_print_fields() {
        let out = run("program P { void main() { print(1, 70000); print('x', 65536); } }", "")
            .unwrap();
        assert_eq!(out.len(), 70000 + 65536);
        assert!(out.starts_with("   "));
        assert_eq!(&out[69999..70000], "1");
        assert!(out.ends_with(" x"));

        let err = run("program P { void main() { print(1, 400000000); } }", "").unwrap_err();
        assert_eq!(err.fault, Fault::PrintWidth(400000000));
        assert_eq!(err.pc, 3 + 1 + 5);
    }

    #[test]
    fn test_read_values() {
        let out = run(
            "program P { void main() int a, b; char c; { read(a); read(b); read(c); read(c); print(a + b); print(c); } }",
            "  12 -5 x",
        );
        assert_eq!(out.unwrap(), "7x");
    }

    #[test]
    fn test_read_past_end() {
        let err = run("program P { void main() int a; { read(a); } }", "  ").unwrap_err();
        assert_eq!(err.fault, Fault::EndOfInput);
    }

    #[test]
    fn test_division_by_zero_reports_pc() {
        let err = run("program P { void main() int z; { print(1 / z); } }", "").unwrap_err();
        assert_eq!(err.fault, Fault::DivisionByZero);
        // enter(3) const_1 load_0 div
        assert_eq!(err.pc, 5);
    }

    #[test]
    fn test_index_out_of_bounds() {
        let err = run(
            "program P { void main() int[] a; { a = new int[2]; a[2] = 1; } }",
            "",
        )
        .unwrap_err();
        assert_eq!(err.fault, Fault::IndexOutOfBounds { index: 2, len: 2 });
    }

    #[test]
    fn test_null_dereference() {
        let err = run(
            "program P class C { int f; } { void main() C c; { c.f = 1; } }",
            "",
        )
        .unwrap_err();
        assert_eq!(err.fault, Fault::NullReference);
    }

    #[test]
    fn test_missing_return_traps() {
        let err = run(
            "program P { int f(int x) { if (x > 0) return x; } void main() { print(f(0)); } }",
            "",
        )
        .unwrap_err();
        assert_eq!(err.fault, Fault::MissingReturn);
    }

    #[test]
    fn test_recursion() {
        let out = run(
            "program P { int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); } \
             void main() { print(fact(10)); } }",
            "",
        );
        assert_eq!(out.unwrap(), "3628800");
    }

    #[test]
    fn test_call_depth_limit() {
        let out = Compiler::new()
            .compile_source("program P { void f() { f(); } void main() { f(); } }")
            .unwrap();
        let config = VmConfig {
            max_call_depth: 50,
            ..VmConfig::default()
        };
        let err = Vm::with_config(config).run(&out.object, "").unwrap_err();
        assert_eq!(err.fault, Fault::CallDepthExceeded(50));
    }

    #[test]
    fn test_step_limit() {
        let out = Compiler::new()
            .compile_source("program P { void main() { while (1 == 1) ; } }")
            .unwrap();
        let config = VmConfig {
            max_steps: Some(100),
            ..VmConfig::default()
        };
        let err = Vm::with_config(config).run(&out.object, "").unwrap_err();
        assert_eq!(err.fault, Fault::StepLimitExceeded(100));
    }

    #[test]
    fn test_no_main() {
        let obj = ObjectFile {
            data_size: 0,
            main_pc: -1,
            code: vec![],
        };
        assert_eq!(
            Vm::new().run(&obj, ""),
            Err(RuntimeError::new(0, Fault::NoMain))
        );
    }

    #[test]
    fn test_bad_opcode_and_underflow() {
        assert_eq!(
            Vm::new().run(&raw(vec![0]), "").unwrap_err().fault,
            Fault::BadOpcode(0)
        );
        assert_eq!(
            Vm::new().run(&raw(vec![23]), "").unwrap_err().fault,
            Fault::StackUnderflow
        );
    }

    #[test]
    fn test_dup2_and_globals() {
        // const_2 const_3 dup2 add putstatic 0 add putstatic 1 return
        let obj = ObjectFile {
            data_size: 2,
            main_pc: 0,
            code: vec![17, 18, 41, 23, 12, 0, 0, 23, 12, 0, 1, 50],
        };
        let mut vm = Vm::new();
        vm.run(&obj, "").unwrap();
        assert_eq!(vm.globals(), &[5, 5]);
        assert!(vm.stack().is_empty());
    }
}
