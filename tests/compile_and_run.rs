use mjc::frontend::token::TokenKind;
use mjc::{Compilation, Compiler, Fault, Message, ObjectFile, Vm};
use pretty_assertions::assert_eq;

fn compile(source: &str) -> Compilation {
    Compiler::new().compile_source(source).unwrap()
}

fn run(source: &str, input: &str) -> String {
    let out = compile(source);
    assert!(out.is_ok(), "unexpected diagnostics: {:?}", out.diagnostics);
    Vm::new().run(&out.object, input).unwrap()
}

fn messages(out: &Compilation) -> Vec<Message> {
    out.diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn test_if_else_inside_loop() {
    let src = "
program Parity {
  void main() int i, n; {
    read(n);
    i = 0;
    while (i < n) {
      if (i % 2 == 0) print(i); else print(-i);
      i++;
    }
  }
}";
    assert_eq!(run(src, "4"), "0-12-3");
    assert_eq!(run(src, "  0 "), "");
}

#[test]
fn test_break_and_continue_affect_innermost_loop() {
    let src = "
program Loops {
  void main() int i, j; {
    i = 0;
    while (i < 3) {
      j = 0;
      while (j < 10) {
        j++;
        if (j == 2) continue;
        if (j > 3) break;
        print(j, 2);
      }
      print(i, 3);
      i++;
    }
  }
}";
    assert_eq!(run(src, ""), " 1 3  0 1 3  1 1 3  2");
}

#[test]
fn test_short_circuit_conditions() {
    let src = "
program Cond {
  void main() int i; {
    i = 0;
    while (i < 6) {
      if (i == 1 || i == 4 && i > 3) print(i);
      if (i > 1 && i < 4 || i == 5) print(i, 2);
      i++;
    }
  }
}";
    assert_eq!(run(src, ""), "1 2 34 5");
}

#[test]
fn test_recursive_function() {
    let src = "
program Fact {
  int fact(int n) {
    if (n <= 1) return 1;
    return n * fact(n - 1);
  }
  void main() int n; {
    read(n);
    print(fact(n));
  }
}";
    assert_eq!(run(src, "5\n"), "120");
    assert_eq!(run(src, "-3"), "1");
}

#[test]
fn test_chars_widen_to_int() {
    let src = "
program Chars
  char[] s;
{
  void main() int i, sum, v; char c; {
    s = new char[3];
    s[0] = 'a';
    s[1] = 'b';
    s[2] = chr(ord(s[1]) + 1);
    i = 0;
    sum = 0;
    while (i < len(s)) {
      print(s[i]);
      v = s[i];
      sum += v;
      i++;
    }
    print(' ');
    print(sum);
    if (chr(ord(c)) == c) print('!');
  }
}";
    assert_eq!(run(src, ""), "abc 294!");
}

#[test]
fn test_chr_ord_round_trip_for_every_byte() {
    let src = "
program Round
  char[] s;
{
  void main() int i, bad; char c; {
    s = new char[1];
    i = 0;
    bad = 0;
    while (i <= 255) {
      c = chr(i);
      if (ord(chr(ord(c))) != i) bad++;
      if (chr(ord(c)) != c) bad++;
      s[0] = c;
      if (ord(chr(ord(s[0]))) != i) bad++;
      if (chr(ord(s[0])) != s[0]) bad++;
      if (s[0] != c) bad++;
      i++;
    }
    print(bad);
    print(' ');
    print(i);
  }
}";
    assert_eq!(run(src, ""), "0 256");
}

#[test]
fn test_read_chars_and_ints() {
    let src = "
program Echo {
  void main() char a, b; int n; {
    read(a);
    read(b);
    read(n);
    print(b);
    print(a);
    print(n + 1, 5);
  }
}";
    assert_eq!(run(src, "xy 41"), "yx   42");
}

#[test]
fn test_compound_assignment_on_fields_and_elements() {
    let src = "
program Acc
  class Counter { int n; int[] hist; }
{
  void main() Counter c; int i; {
    c = new Counter;
    c.hist = new int[3];
    i = 0;
    while (i < 3) {
      c.n += i + 1;
      c.hist[i] = c.n;
      c.hist[i] *= 10;
      i++;
    }
    c.n -= 1;
    print(c.n);
    print(' ');
    print(c.hist[0]);
    print(c.hist[1], 4);
    print(c.hist[2], 4);
    if (c != null) print('.');
  }
}";
    assert_eq!(run(src, ""), "5 10  30  60.");
}

#[test]
fn test_arrays_of_arrays_at_runtime() {
    let src = "
program Matrix {
  void main() int[][] m; int i; {
    m = new int[][2];
    i = 0;
    while (i < len(m)) {
      m[i] = new int[3];
      m[i][2] = i + 7;
      i++;
    }
    print(m[0][2]);
    print(m[1][2]);
    print(len(m[1]));
  }
}";
    assert_eq!(run(src, ""), "783");
}

#[test]
fn test_malformed_statement_reports_once_and_compiles_the_rest() {
    let out = compile("program P { void main() int x; { x = 1 2; x = 3; print(x); } }");
    assert_eq!(messages(&out), vec![Message::TokenExpected(TokenKind::Semicolon)]);
    assert_eq!((out.diagnostics[0].line, out.diagnostics[0].col), (1, 40));

    // the object is still produced and runs the statements after the error
    let output = Vm::new().run(&out.object, "").unwrap();
    assert_eq!(output, "3");
}

#[test]
fn test_incompatible_classes_are_rejected() {
    let out = compile(
        "
program P
  class A { int x; }
  class B { int x; }
{
  void main() A a; B b; {
    a = new A;
    b = new B;
    if (a == b) print(1);
  }
}",
    );
    assert_eq!(messages(&out), vec![Message::IncompTypes]);
    assert_eq!(out.diagnostics[0].line, 9);
}

#[test]
fn test_object_file_round_trip_runs_the_same() {
    let src = "
program Sum
  int total;
{
  void add(int v) { total += v; }
  void main() int i; {
    i = 1;
    while (i <= 10) { add(i); i++; }
    print(total);
  }
}";
    let out = compile(src);
    assert!(out.is_ok(), "{:?}", out.diagnostics);

    let binary = ObjectFile::decode(&out.object.encode()).unwrap();
    assert_eq!(binary, out.object);
    assert_eq!(Vm::new().run(&binary, "").unwrap(), "55");

    let postcard = ObjectFile::from_postcard(&out.object.to_postcard().unwrap()).unwrap();
    assert_eq!(Vm::new().run(&postcard, "").unwrap(), "55");
}

#[test]
fn test_runtime_faults() {
    let out = compile("program P { void main() int[] a; { a = new int[3]; a[3] = 1; } }");
    let err = Vm::new().run(&out.object, "").unwrap_err();
    assert_eq!(err.fault, Fault::IndexOutOfBounds { index: 3, len: 3 });

    let out = compile("program P { int f() { } void main() { print(f()); } }");
    let err = Vm::new().run(&out.object, "").unwrap_err();
    assert_eq!(err.fault, Fault::MissingReturn);

    let out = compile("program P { void main() int x; { read(x); print(10 / x); } }");
    let err = Vm::new().run(&out.object, "0").unwrap_err();
    assert_eq!(err.fault, Fault::DivisionByZero);
}
