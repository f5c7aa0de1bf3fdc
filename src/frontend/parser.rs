use crate::bytecode::code::Code;
use crate::bytecode::compile::{Compilation, CompilerConfig};
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::label::Label;
use crate::bytecode::op::{CompOp, OpCode};
use crate::bytecode::operand::{Condition, Operand, OperandKind};
use crate::diagnostics::{Diagnostics, Message};
use crate::frontend::token::{Token, TokenKind, TokenSource};
use crate::symtab::{Intrinsic, SymbolId, SymbolKind, SymbolTable, TypeId};

fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LBrace
            | TokenKind::Ident
            | TokenKind::If
            | TokenKind::While
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Return
            | TokenKind::Read
            | TokenKind::Print
            | TokenKind::Semicolon
    )
}

/// Synchronization points after a broken statement.
fn follows_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eof
            | TokenKind::Semicolon
            | TokenKind::If
            | TokenKind::While
            | TokenKind::Break
            | TokenKind::Return
            | TokenKind::Read
            | TokenKind::Print
            | TokenKind::RBrace
    )
}

/// Synchronization points after a broken global declaration.
fn follows_decl(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::LBrace | TokenKind::Final | TokenKind::Class | TokenKind::Ident | TokenKind::Eof
    )
}

fn starts_expr(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Number
            | TokenKind::CharConst
            | TokenKind::New
            | TokenKind::LPar
            | TokenKind::Minus
    )
}

/// Jump targets of the innermost enclosing `while`.
#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    /// Target of `break`.
    exit: Label,
    /// Target of `continue`: the re-evaluation of the loop condition.
    top: Label,
}

/// Single-pass translator for MicroJava.
///
/// There is no syntax tree: every production checks its semantics against
/// the [`SymbolTable`] and emits into the [`Code`] buffer as soon as it has
/// recognized enough input. Values that are not yet materialized travel
/// between productions as [`Operand`]s.
///
/// Errors never stop the pass. A diagnostic is only recorded if at least
/// `min_error_distance` tokens were consumed since the previous error, which
/// keeps one mistake from producing a cascade of follow-up reports.
pub struct Parser<S: TokenSource> {
    tokens: S,
    config: CompilerConfig,
    /// Most recently consumed token.
    t: Token,
    /// Look-ahead token.
    la: Token,
    error_distance: usize,
    diag: Diagnostics,
    tab: SymbolTable,
    code: Code,
    cur_method: Option<SymbolId>,
    loops: Vec<LoopLabels>,
    main_seen: bool,
    code_size_reported: bool,
    internal: Option<CompileError>,
}

impl<S: TokenSource> Parser<S> {
    pub fn new(tokens: S, config: CompilerConfig) -> Self {
        let code = Code::new(config.max_code_size);
        let error_distance = config.min_error_distance;
        Parser {
            tokens,
            config,
            t: Token::new(TokenKind::None, 1, 1),
            la: Token::new(TokenKind::None, 1, 1),
            error_distance,
            diag: Diagnostics::new(),
            tab: SymbolTable::new(),
            code,
            cur_method: None,
            loops: Vec::new(),
            main_seen: false,
            code_size_reported: false,
            internal: None,
        }
    }

    /// Translates the whole token stream.
    ///
    /// Source errors end up in [`Compilation::diagnostics`]; `Err` is reserved
    /// for broken translator invariants.
    pub fn parse(mut self) -> Result<Compilation, CompileError> {
        self.scan();
        self.program();
        self.check(TokenKind::Eof);
        self.check_code_size();

        if let Some(err) = self.internal.take() {
            return Err(err);
        }
        Ok(Compilation {
            object: self.code.into_object(),
            diagnostics: self.diag.into_vec(),
        })
    }

    // =========================================================================
    // TOKENS & ERRORS
    // =========================================================================

    fn scan(&mut self) {
        let next = self.tokens.next_token(&mut self.diag);
        self.t = std::mem::replace(&mut self.la, next);
        self.error_distance = self.error_distance.saturating_add(1);
    }

    fn sym(&self) -> TokenKind {
        self.la.kind
    }

    /// Consumes the look-ahead if it has the expected kind.
    fn check(&mut self, expected: TokenKind) -> bool {
        if self.sym() == expected {
            self.scan();
            true
        } else {
            self.error(Message::TokenExpected(expected));
            false
        }
    }

    /// Reports at the look-ahead position, subject to the error distance.
    fn error(&mut self, message: Message) {
        if self.error_distance >= self.config.min_error_distance {
            self.diag.report(self.la.line, self.la.col, message);
        }
        self.error_distance = 0;
    }

    fn check_code_size(&mut self) {
        if self.code.overflowed() && !self.code_size_reported {
            self.code_size_reported = true;
            self.diag
                .report(self.la.line, self.la.col, Message::CodeTooLarge);
        }
    }

    // =========================================================================
    // EMISSION HELPERS
    // =========================================================================

    fn put(&mut self, op: OpCode) {
        self.code.put_op(op);
    }

    /// Defines `label` at the current pc. Only the first internal error is kept.
    fn here(&mut self, label: Label) {
        if let Err(source) = self.code.define(label) {
            if self.internal.is_none() {
                self.internal = Some(CompileError::Label {
                    line: self.t.line,
                    col: self.t.col,
                    source,
                });
            }
        }
    }

    fn load(&mut self, x: &mut Operand) {
        if let Err(message) = self.code.load(x) {
            self.error(message);
        }
    }

    fn store(&mut self, x: &Operand) {
        if let Err(message) = self.code.store(x) {
            self.error(message);
        }
    }

    fn new_condition(&mut self, op: CompOp) -> Condition {
        Condition {
            op,
            t_label: self.code.new_label(),
            f_label: self.code.new_label(),
        }
    }

    // =========================================================================
    // SYMBOLS
    // =========================================================================

    fn declare(&mut self, kind: SymbolKind, name: &str, ty: TypeId) -> SymbolId {
        let (id, err) = self.tab.insert(kind, name, ty);
        if let Some(message) = err {
            self.error(message);
        }
        id
    }

    /// Resolves the identifier just consumed, falling back to the error symbol.
    fn lookup(&mut self) -> SymbolId {
        let name = self.t.text.clone();
        match self.tab.find(&name) {
            Ok(id) => id,
            Err(message) => {
                self.error(message);
                self.tab.no_obj()
            }
        }
    }

    fn operand_for(&mut self, id: SymbolId) -> Operand {
        let sym = self.tab.symbol(id);
        let (kind, ty, val, adr, level) = (sym.kind, sym.ty, sym.val, sym.adr, sym.level);
        let kind = match kind {
            SymbolKind::Constant => OperandKind::Con(val),
            SymbolKind::Variable if level == 0 => OperandKind::Static(adr),
            SymbolKind::Variable => OperandKind::Local(adr),
            SymbolKind::Method => OperandKind::Meth(id),
            SymbolKind::Type | SymbolKind::Program => {
                self.error(Message::NoOperand);
                return Operand::stack(TypeId::NONE);
            }
        };
        Operand { kind, ty }
    }

    fn method_type(&self) -> TypeId {
        self.cur_method
            .map_or(TypeId::NONE, |id| self.tab.symbol(id).ty)
    }

    // =========================================================================
    // DECLARATIONS
    // =========================================================================

    /// `"program" ident { ConstDecl | VarDecl | ClassDecl } "{" { MethodDecl } "}"`
    fn program(&mut self) {
        self.check(TokenKind::Program);
        self.check(TokenKind::Ident);
        let name = self.t.text.clone();
        let prog = self.declare(SymbolKind::Program, &name, TypeId::PROGRAM);
        self.tab.open_scope();

        loop {
            match self.sym() {
                TokenKind::Final => self.const_decl(),
                TokenKind::Ident => self.var_decl(),
                TokenKind::Class => self.class_decl(),
                TokenKind::LBrace | TokenKind::Eof => break,
                _ => self.recover_decl(),
            }
        }
        if self.tab.n_vars() > self.config.max_globals {
            self.error(Message::TooManyGlobals);
        }

        self.check(TokenKind::LBrace);
        while self.sym() != TokenKind::RBrace && self.sym() != TokenKind::Eof {
            if matches!(self.sym(), TokenKind::Ident | TokenKind::Void) {
                self.method_decl();
            } else {
                self.recover_method();
            }
        }
        if !self.main_seen {
            self.error(Message::MethNotFound(self.config.main_method.clone()));
        }

        self.code.data_size = self.tab.n_vars();
        self.check(TokenKind::RBrace);
        let closed = self.tab.close_scope();
        self.tab.symbol_mut(prog).locals = closed.locals;
    }

    /// `"final" Type ident "=" ( number | charConst ) ";"`
    fn const_decl(&mut self) {
        self.check(TokenKind::Final);
        let ty = self.type_();
        self.check(TokenKind::Ident);
        let name = self.t.text.clone();
        self.check(TokenKind::Assign);

        let id = self.declare(SymbolKind::Constant, &name, ty);
        match self.sym() {
            TokenKind::Number | TokenKind::CharConst => {
                let matches_type = (self.sym() == TokenKind::Number && ty == TypeId::INT)
                    || (self.sym() == TokenKind::CharConst && ty == TypeId::CHAR);
                self.scan();
                if matches_type {
                    self.tab.symbol_mut(id).val = self.t.val;
                } else {
                    self.error(Message::ConstType);
                }
            }
            _ => self.error(Message::ConstDecl),
        }
        self.check(TokenKind::Semicolon);
    }

    /// `Type ident { "," ident } ";"`
    fn var_decl(&mut self) {
        let ty = self.type_();
        loop {
            if self.check(TokenKind::Ident) {
                let name = self.t.text.clone();
                self.declare(SymbolKind::Variable, &name, ty);
            }
            if self.sym() != TokenKind::Comma {
                break;
            }
            self.scan();
        }
        self.check(TokenKind::Semicolon);
    }

    /// `"class" ident "{" { VarDecl } "}"`
    fn class_decl(&mut self) {
        self.check(TokenKind::Class);
        self.check(TokenKind::Ident);
        let name = self.t.text.clone();
        let ty = self.tab.types.new_class();
        self.declare(SymbolKind::Type, &name, ty);

        self.check(TokenKind::LBrace);
        self.tab.open_scope();
        while self.sym() == TokenKind::Ident {
            self.var_decl();
        }
        if self.tab.n_vars() > self.config.max_fields {
            self.error(Message::TooManyFields);
        }
        self.check(TokenKind::RBrace);

        let closed = self.tab.close_scope();
        self.tab
            .types
            .finalize_class(ty, closed.locals, closed.n_vars);
    }

    /// `( Type | "void" ) ident "(" [ FormPars ] ")" { VarDecl } Block`
    fn method_decl(&mut self) {
        let ty = match self.sym() {
            TokenKind::Ident => self.type_(),
            TokenKind::Void => {
                self.scan();
                TypeId::NONE
            }
            _ => {
                self.error(Message::MethDecl);
                TypeId::NONE
            }
        };
        self.check(TokenKind::Ident);
        let name = self.t.text.clone();
        let meth = self.declare(SymbolKind::Method, &name, ty);
        let start = self.code.pc();
        self.tab.symbol_mut(meth).adr = start as i32;
        self.cur_method = Some(meth);

        self.tab.open_scope();
        self.check(TokenKind::LPar);
        if self.sym() == TokenKind::Ident {
            self.form_pars();
        }
        self.check(TokenKind::RPar);

        let n_pars = self.tab.n_vars();
        self.tab.symbol_mut(meth).n_pars = n_pars;
        if name == self.config.main_method {
            self.main_seen = true;
            self.code.main_pc = Some(start);
            if n_pars > 0 {
                self.error(Message::MainWithParams);
            } else if ty != TypeId::NONE {
                self.error(Message::MainNotVoid);
            }
        }

        while self.sym() == TokenKind::Ident {
            self.var_decl();
        }
        let n_vars = self.tab.n_vars();
        if n_vars > self.config.max_locals {
            self.error(Message::TooManyLocals);
        }
        // parameters must be visible to recursive calls in the body
        self.tab.symbol_mut(meth).locals = self.tab.locals().clone();

        tracing::debug!(method = %name, adr = start, n_pars, n_vars, "method");
        self.put(OpCode::Enter);
        self.code.put(n_pars as u8);
        self.code.put(n_vars as u8);

        self.block();

        if ty == TypeId::NONE {
            self.put(OpCode::Exit);
            self.put(OpCode::Return);
        } else {
            // falling off the end of a function is a runtime error
            self.put(OpCode::Trap);
            self.code.put(1);
        }

        let closed = self.tab.close_scope();
        self.tab.symbol_mut(meth).locals = closed.locals;
        self.cur_method = None;
        self.check_code_size();
    }

    /// `Type ident { "," Type ident }`
    fn form_pars(&mut self) {
        loop {
            let ty = self.type_();
            if self.check(TokenKind::Ident) {
                let name = self.t.text.clone();
                self.declare(SymbolKind::Variable, &name, ty);
            }
            if self.sym() != TokenKind::Comma {
                break;
            }
            self.scan();
        }
    }

    /// `ident { "[" "]" }`
    fn type_(&mut self) -> TypeId {
        if !self.check(TokenKind::Ident) {
            return TypeId::NONE;
        }
        let id = self.lookup();
        let sym = self.tab.symbol(id);
        let mut ty = if sym.kind == SymbolKind::Type {
            sym.ty
        } else {
            self.error(Message::NoType);
            TypeId::NONE
        };

        while self.sym() == TokenKind::LBrack {
            self.scan();
            self.check(TokenKind::RBrack);
            if ty != TypeId::NONE {
                ty = self.tab.types.array_of(ty);
            }
        }
        ty
    }

    // =========================================================================
    // RECOVERY
    // =========================================================================

    fn recover_decl(&mut self) {
        self.error(Message::InvalidDecl);
        loop {
            self.scan();
            if follows_decl(self.sym()) {
                break;
            }
        }
        self.error_distance = 0;
    }

    /// Skips to the next plausible method start: `void`, a type name, or `}`.
    fn recover_method(&mut self) {
        self.error(Message::MethDecl);
        loop {
            match self.sym() {
                TokenKind::Void | TokenKind::RBrace | TokenKind::Eof => break,
                TokenKind::Ident if self.names_type(&self.la.text) => break,
                _ => self.scan(),
            }
        }
        if self.sym() == TokenKind::RBrace {
            self.scan();
        }
        self.error_distance = 0;
    }

    fn names_type(&self, name: &str) -> bool {
        self.tab
            .find(name)
            .is_ok_and(|id| self.tab.symbol(id).kind == SymbolKind::Type)
    }

    fn recover_stat(&mut self) {
        self.error(Message::InvalidStat);
        while !follows_statement(self.sym()) {
            self.scan();
        }
        self.error_distance = 0;
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    /// `"{" { Statement } "}"`
    fn block(&mut self) {
        self.check(TokenKind::LBrace);
        while self.sym() != TokenKind::RBrace && self.sym() != TokenKind::Eof {
            if starts_statement(self.sym()) {
                self.statement();
            } else {
                self.recover_stat();
            }
        }
        self.check(TokenKind::RBrace);
    }

    fn statement(&mut self) {
        match self.sym() {
            TokenKind::Ident => self.designator_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Print => self.print_statement(),
            TokenKind::LBrace => self.block(),
            TokenKind::Semicolon => self.scan(),
            _ => self.error(Message::InvalidStat),
        }
    }

    /// `Designator ( Assignop Expr | ActPars | "++" | "--" ) ";"`
    fn designator_statement(&mut self) {
        self.scan();
        let mut x = self.designator();

        match self.sym() {
            TokenKind::Assign => {
                self.scan();
                let mut y = self.expr();
                if self.tab.types.assignable_to(y.ty, x.ty) {
                    self.load(&mut y);
                    self.store(&x);
                } else {
                    self.error(Message::IncompTypes);
                }
            }
            TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::TimesAssign
            | TokenKind::SlashAssign
            | TokenKind::RemAssign => {
                let op = self.assign_op();
                self.compound_assign(&x, op);
            }
            TokenKind::LPar => {
                self.act_pars(&mut x);
                if x.ty != TypeId::NONE {
                    // discard the unused result
                    self.put(OpCode::Pop);
                }
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let delta = if self.sym() == TokenKind::PlusPlus { 1 } else { -1 };
                if x.ty != TypeId::INT {
                    self.error(Message::NoInt);
                }
                if let Err(message) = self.code.increment(&x, delta) {
                    self.error(message);
                }
                self.scan();
            }
            _ => self.error(Message::DesignFollow),
        }
        self.check(TokenKind::Semicolon);
    }

    fn assign_op(&mut self) -> OpCode {
        let op = match self.sym() {
            TokenKind::PlusAssign => OpCode::Add,
            TokenKind::MinusAssign => OpCode::Sub,
            TokenKind::TimesAssign => OpCode::Mul,
            TokenKind::SlashAssign => OpCode::Div,
            TokenKind::RemAssign => OpCode::Rem,
            _ => {
                self.error(Message::AssignOp);
                return OpCode::Nop;
            }
        };
        self.scan();
        op
    }

    /// `x op= e`: the address of `x` is computed once and duplicated.
    fn compound_assign(&mut self, x: &Operand, op: OpCode) {
        if !x.is_assignable() {
            self.error(Message::NoVar);
        }
        match x.kind {
            OperandKind::Field(_) => self.put(OpCode::Dup),
            OperandKind::Elem => self.put(OpCode::Dup2),
            _ => {}
        }
        let mut current = x.clone();
        self.load(&mut current);

        let mut y = self.expr();
        if x.ty == TypeId::INT && y.ty == TypeId::INT {
            self.load(&mut y);
            self.put(op);
            self.store(x);
        } else {
            self.error(Message::NoIntOp);
        }
    }

    /// `"if" "(" Condition ")" Statement [ "else" Statement ]`
    fn if_statement(&mut self) {
        self.scan();
        self.check(TokenKind::LPar);
        let cond = self.condition();
        self.code.false_jump(&cond);
        self.here(cond.t_label);
        self.check(TokenKind::RPar);
        self.statement();

        if self.sym() == TokenKind::Else {
            self.scan();
            let end = self.code.new_label();
            self.code.jump(end);
            self.here(cond.f_label);
            self.statement();
            self.here(end);
        } else {
            self.here(cond.f_label);
        }
    }

    /// `"while" "(" Condition ")" Statement`
    fn while_statement(&mut self) {
        self.scan();
        self.check(TokenKind::LPar);
        let top = self.code.new_label();
        self.here(top);
        let exit = self.code.new_label();
        self.loops.push(LoopLabels { exit, top });

        let cond = self.condition();
        self.code.false_jump(&cond);
        self.here(cond.t_label);
        self.check(TokenKind::RPar);
        self.statement();
        self.code.jump(top);

        self.here(cond.f_label);
        self.here(exit);
        self.loops.pop();
    }

    fn break_statement(&mut self) {
        self.scan();
        match self.loops.last().copied() {
            Some(labels) => self.code.jump(labels.exit),
            None => self.error(Message::NoLoopBreak),
        }
        self.check(TokenKind::Semicolon);
    }

    fn continue_statement(&mut self) {
        self.scan();
        match self.loops.last().copied() {
            Some(labels) => self.code.jump(labels.top),
            None => self.error(Message::NoLoopContinue),
        }
        self.check(TokenKind::Semicolon);
    }

    /// `"return" [ Expr ] ";"`
    fn return_statement(&mut self) {
        self.scan();
        let ret = self.method_type();
        if starts_expr(self.sym()) {
            if ret == TypeId::NONE {
                self.error(Message::ReturnVoid);
            }
            let mut x = self.expr();
            self.load(&mut x);
            if ret != TypeId::NONE && !self.tab.types.assignable_to(x.ty, ret) {
                self.error(Message::ReturnType);
            }
        } else if ret != TypeId::NONE {
            self.error(Message::ReturnNoVal);
        }
        self.put(OpCode::Exit);
        self.put(OpCode::Return);
        self.check(TokenKind::Semicolon);
    }

    /// `"read" "(" Designator ")" ";"`
    fn read_statement(&mut self) {
        self.scan();
        self.check(TokenKind::LPar);
        self.check(TokenKind::Ident);
        let x = self.designator();
        match x.ty {
            TypeId::INT => self.put(OpCode::Read),
            TypeId::CHAR => self.put(OpCode::BRead),
            _ => self.error(Message::ReadValue),
        }
        self.store(&x);
        self.check(TokenKind::RPar);
        self.check(TokenKind::Semicolon);
    }

    /// `"print" "(" Expr [ "," number ] ")" ";"`
    fn print_statement(&mut self) {
        self.scan();
        self.check(TokenKind::LPar);
        let mut x = self.expr();
        let mut width = 0;
        if self.sym() == TokenKind::Comma {
            self.scan();
            if self.check(TokenKind::Number) {
                width = self.t.val;
            }
        }

        self.load(&mut x);
        self.code.load_const(width);
        match x.ty {
            TypeId::INT => self.put(OpCode::Print),
            TypeId::CHAR => self.put(OpCode::BPrint),
            _ => self.error(Message::PrintValue),
        }
        self.check(TokenKind::RPar);
        self.check(TokenKind::Semicolon);
    }

    /// `"(" [ Expr { "," Expr } ] ")"`; leaves the call result on the stack.
    fn act_pars(&mut self, x: &mut Operand) {
        self.check(TokenKind::LPar);
        let meth = match x.kind {
            OperandKind::Meth(id) => Some(id),
            _ => {
                self.error(Message::NoMeth);
                None
            }
        };
        let (formals, ret, adr) = match meth {
            Some(id) => {
                let sym = self.tab.symbol(id);
                let formals: Vec<TypeId> = sym.params().map(|p| self.tab.symbol(p).ty).collect();
                (formals, sym.ty, sym.adr)
            }
            None => (Vec::new(), TypeId::NONE, 0),
        };

        let mut n_actual = 0;
        if starts_expr(self.sym()) {
            loop {
                let mut arg = self.expr();
                self.load(&mut arg);
                if let Some(&formal) = formals.get(n_actual) {
                    if !self.tab.types.assignable_to(arg.ty, formal) {
                        self.error(Message::ParamType);
                    }
                }
                n_actual += 1;
                if self.sym() != TokenKind::Comma {
                    break;
                }
                self.scan();
            }
        }

        if let Some(id) = meth {
            if n_actual > formals.len() {
                self.error(Message::MoreActualParams);
            } else if n_actual < formals.len() {
                self.error(Message::LessActualParams);
            }
            match self.tab.intrinsic(id) {
                Some(Intrinsic::Chr) | Some(Intrinsic::Ord) => {}
                Some(Intrinsic::Len) => self.put(OpCode::ArrayLength),
                None => self.code.call(adr.max(0) as usize),
            }
        }
        *x = Operand::stack(ret);
        self.check(TokenKind::RPar);
    }

    // =========================================================================
    // CONDITIONS
    // =========================================================================

    /// `CondTerm { "||" CondTerm }`
    ///
    /// Every term but the last jumps to the true label when it holds; a
    /// failing term falls through to the next one.
    fn condition(&mut self) -> Condition {
        let mut x = self.cond_term();
        while self.sym() == TokenKind::Or {
            self.code.true_jump(&x);
            self.scan();
            self.here(x.f_label);
            let y = self.cond_term();
            x.f_label = y.f_label;
            x.op = y.op;
        }
        x
    }

    /// `CondFact { "&&" CondFact }`
    fn cond_term(&mut self) -> Condition {
        let mut x = self.cond_fact();
        while self.sym() == TokenKind::And {
            self.code.false_jump(&x);
            self.scan();
            let y = self.cond_fact();
            x.op = y.op;
        }
        x
    }

    /// `Expr Relop Expr`
    fn cond_fact(&mut self) -> Condition {
        let mut x = self.expr();
        self.load(&mut x);
        let op = self.relop();
        let mut y = self.expr();
        self.load(&mut y);

        let types = &self.tab.types;
        let compatible = types.compatible_with(x.ty, y.ty);
        let refs = types.is_ref_type(x.ty) || types.is_ref_type(y.ty);
        if !compatible {
            self.error(Message::IncompTypes);
        } else if refs && !op.is_equality() {
            self.error(Message::EqCheck);
        }
        self.new_condition(op)
    }

    fn relop(&mut self) -> CompOp {
        let op = match self.sym() {
            TokenKind::Eql => CompOp::Eq,
            TokenKind::Neq => CompOp::Ne,
            TokenKind::Lss => CompOp::Lt,
            TokenKind::Leq => CompOp::Le,
            TokenKind::Gtr => CompOp::Gt,
            TokenKind::Geq => CompOp::Ge,
            _ => {
                self.error(Message::RelOp);
                return CompOp::Eq;
            }
        };
        self.scan();
        op
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    /// `[ "-" ] Term { Addop Term }`
    fn expr(&mut self) -> Operand {
        let negative = self.sym() == TokenKind::Minus;
        if negative {
            self.scan();
        }
        let mut x = self.term();

        if negative {
            if x.ty != TypeId::INT {
                self.error(Message::NoIntOp);
            } else if let OperandKind::Con(val) = x.kind {
                x.kind = OperandKind::Con(val.wrapping_neg());
            } else {
                self.load(&mut x);
                self.put(OpCode::Neg);
            }
        }

        while matches!(self.sym(), TokenKind::Plus | TokenKind::Minus) {
            let op = if self.sym() == TokenKind::Plus {
                OpCode::Add
            } else {
                OpCode::Sub
            };
            self.scan();
            self.load(&mut x);
            let mut y = self.term();
            self.load(&mut y);
            if x.ty != TypeId::INT || y.ty != TypeId::INT {
                self.error(Message::NoIntOp);
            }
            self.put(op);
        }
        x
    }

    /// `Factor { Mulop Factor }`
    fn term(&mut self) -> Operand {
        let mut x = self.factor();
        while matches!(
            self.sym(),
            TokenKind::Times | TokenKind::Slash | TokenKind::Rem
        ) {
            let op = match self.sym() {
                TokenKind::Times => OpCode::Mul,
                TokenKind::Slash => OpCode::Div,
                _ => OpCode::Rem,
            };
            self.scan();
            self.load(&mut x);
            let mut y = self.factor();
            self.load(&mut y);
            if x.ty != TypeId::INT || y.ty != TypeId::INT {
                self.error(Message::NoIntOp);
            }
            self.put(op);
        }
        x
    }

    fn factor(&mut self) -> Operand {
        match self.sym() {
            TokenKind::Ident => {
                self.scan();
                let mut x = self.designator();
                if self.sym() == TokenKind::LPar {
                    if x.is_method() && x.ty == TypeId::NONE {
                        self.error(Message::InvalidCall);
                    }
                    self.act_pars(&mut x);
                } else if x.is_method() {
                    self.error(Message::NoVal);
                    x = Operand::stack(TypeId::NONE);
                }
                x
            }
            TokenKind::Number => {
                self.scan();
                Operand::constant(self.t.val)
            }
            TokenKind::CharConst => {
                self.scan();
                Operand {
                    kind: OperandKind::Con(self.t.val),
                    ty: TypeId::CHAR,
                }
            }
            TokenKind::New => self.allocation(),
            TokenKind::LPar => {
                self.scan();
                let x = self.expr();
                self.check(TokenKind::RPar);
                x
            }
            _ => {
                self.error(Message::InvalidFact);
                Operand::stack(TypeId::NONE)
            }
        }
    }

    /// `"new" ident [ { "[" "]" } "[" Expr "]" ]`
    fn allocation(&mut self) -> Operand {
        self.scan();
        self.check(TokenKind::Ident);
        let id = self.lookup();
        let sym = self.tab.symbol(id);
        let mut ty = if sym.kind == SymbolKind::Type {
            sym.ty
        } else {
            self.error(Message::NoType);
            TypeId::NONE
        };

        if self.sym() != TokenKind::LBrack {
            if !self.tab.types.is_class(ty) {
                self.error(Message::NoClassType);
            }
            let n_fields = self.tab.types.n_fields(ty);
            self.put(OpCode::New);
            self.code.put2(n_fields as i32);
            return Operand::stack(ty);
        }

        self.scan();
        // `new T[][n]` allocates n references to `T[]`
        while self.sym() == TokenKind::RBrack {
            self.scan();
            ty = self.tab.types.array_of(ty);
            self.check(TokenKind::LBrack);
        }
        let mut len = self.expr();
        if len.ty != TypeId::INT {
            self.error(Message::ArraySize);
        }
        self.check(TokenKind::RBrack);
        self.load(&mut len);
        self.put(OpCode::NewArray);
        self.code.put(if ty == TypeId::CHAR { 0 } else { 1 });
        Operand::stack(self.tab.types.array_of(ty))
    }

    /// `ident { "." ident | "[" Expr "]" }`, the leading identifier already consumed.
    fn designator(&mut self) -> Operand {
        let id = self.lookup();
        let mut x = self.operand_for(id);

        loop {
            match self.sym() {
                TokenKind::Period => {
                    if !self.tab.types.is_class(x.ty) {
                        self.error(Message::NoClass);
                    }
                    self.load(&mut x);
                    self.scan();
                    self.check(TokenKind::Ident);
                    let name = self.t.text.clone();
                    let field = match self.tab.find_field(&name, x.ty) {
                        Ok(field) => field,
                        Err(message) => {
                            self.error(message);
                            self.tab.no_obj()
                        }
                    };
                    let sym = self.tab.symbol(field);
                    x = Operand {
                        kind: OperandKind::Field(sym.adr),
                        ty: sym.ty,
                    };
                }
                TokenKind::LBrack => {
                    self.load(&mut x);
                    self.scan();
                    let mut index = self.expr();
                    let elem = match self.tab.types.elem_type(x.ty) {
                        Some(elem) => elem,
                        None => {
                            self.error(Message::NoArray);
                            TypeId::NONE
                        }
                    };
                    if index.ty != TypeId::INT {
                        self.error(Message::ArrayIndex);
                    }
                    self.load(&mut index);
                    x = Operand {
                        kind: OperandKind::Elem,
                        ty: elem,
                    };
                    self.check(TokenKind::RBrack);
                }
                _ => return x,
            }
        }
    }
}
