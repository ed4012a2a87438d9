//! The statement and block interpreter.
//!
//! [`Interp::interpret_block`] drives one statement or braced block and
//! reports how it ended through [`Flow`]: normally, via `break`, or via
//! `return`. Loops are executed by resetting the cursor to a saved state
//! and letting the block dispatcher re-enter the construct, so a `while`
//! iterates by being dispatched again rather than by looping internally.
//!
//! This file also carries the declaration paths (local and global), the
//! prescan that registers every top-level symbol before execution, and
//! the user/builtin call machinery.

use tracing::trace;

use qc_lex::token::{id, Token};
use qc_util::{ErrorKind, Exec};

use crate::atom::Atom;
use crate::function::{FnBody, Function};
use crate::interp::{Interp, ARG_CAPACITY, NUM_PARAMS};
use crate::value;
use crate::variable::{Variable, VF_ARRAY};

/// Largest array size in a local declaration.
pub const LARRAY_MAX: usize = 1024;

/// Largest array size in a global declaration.
pub const GARRAY_MAX: usize = 1000;

/// How a block ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Return,
}

impl Interp {
    /// Interprets a single statement or braced block.
    pub(crate) fn interpret_block(&mut self) -> Exec<Flow> {
        let mut depth = 0i32;
        loop {
            self.lex()?;
            match self.tok.id() {
                // Not a keyword: an expression statement. A leading `*`
                // is a pointer-target assignment.
                id::IDENTIFIER | id::MUL => {
                    self.putback();
                    self.expression()?;
                    if self.tok.id() != id::SEMI {
                        return Err(self.fault(ErrorKind::SemiExpected));
                    }
                }
                id::OPENBR => depth += 1,
                id::CLOSEBR => depth -= 1,
                id::RETURN => {
                    self.ufunc_ret()?;
                    return Ok(Flow::Return);
                }
                id::IF => match self.exec_if()? {
                    Flow::Normal => {}
                    // An `if` is the one construct a nested `break`
                    // escapes through to the enclosing loop.
                    Flow::Break => return Ok(Flow::Break),
                    Flow::Return => return Ok(Flow::Return),
                },
                id::ELSE => {
                    // The matching `if` already ran its consequent; skip
                    // the alternate.
                    self.find_eob()?;
                }
                id::WHILE => {
                    if self.exec_while()? == Flow::Return {
                        return Ok(Flow::Return);
                    }
                }
                id::DO => {
                    if self.exec_do()? == Flow::Return {
                        return Ok(Flow::Return);
                    }
                }
                id::FOR => {
                    if self.exec_for()? == Flow::Return {
                        return Ok(Flow::Return);
                    }
                }
                id::BREAK => return Ok(Flow::Break),
                _ => {
                    if self.tok.is_type() {
                        self.putback();
                        self.decl_local()?;
                    }
                }
            }
            if self.tok.id() == id::FINISHED || depth == 0 {
                return Ok(Flow::Normal);
            }
        }
    }

    /// Evaluates the `return` expression into the return slot.
    fn ufunc_ret(&mut self) -> Exec<()> {
        let a = self.expression()?;
        self.ret_val = a;
        Ok(())
    }

    fn exec_if(&mut self) -> Exec<Flow> {
        let cond = self.expression()?;
        if cond.is_truthy() {
            self.interpret_block()
        } else {
            self.find_eob()?;
            self.lex()?;
            if self.tok.id() != id::ELSE {
                self.putback();
                Ok(Flow::Normal)
            } else {
                self.interpret_block()
            }
        }
    }

    /// One iteration of a `while`. On a true condition the body runs and
    /// the cursor rewinds to before the `while`, so the block dispatcher
    /// re-enters the loop; anything else skips past the body.
    fn exec_while(&mut self) -> Exec<Flow> {
        self.putback();
        let save = self.program_save();
        self.lex()?; // the `while` again
        let cond = self.expression()?;
        if !cond.is_truthy() {
            self.find_eob()?;
            return Ok(Flow::Normal);
        }
        match self.interpret_block()? {
            Flow::Normal => {
                self.program_restore(save);
                Ok(Flow::Normal)
            }
            Flow::Break => {
                self.program_restore(save);
                self.find_eob()?;
                Ok(Flow::Normal)
            }
            Flow::Return => Ok(Flow::Return),
        }
    }

    /// One pass of a `do` loop: run the body, require `while (cond)`,
    /// and rewind for another pass while the condition holds.
    fn exec_do(&mut self) -> Exec<Flow> {
        self.putback();
        let save = self.program_save();
        self.lex()?; // the `do` again
        match self.interpret_block()? {
            Flow::Break => {
                self.program_restore(save);
                self.find_eob()?;
                Ok(Flow::Normal)
            }
            Flow::Return => Ok(Flow::Return),
            Flow::Normal => {
                self.lex()?;
                if self.tok.id() != id::WHILE {
                    return Err(self.fault(ErrorKind::WhileExpected));
                }
                let cond = self.expression()?;
                if cond.is_truthy() {
                    self.program_restore(save);
                }
                Ok(Flow::Normal)
            }
        }
    }

    /// An expression followed by a required `;`, which is consumed.
    fn semi_expression(&mut self) -> Exec<Atom> {
        let a = self.expression()?;
        if self.tok.id() != id::SEMI {
            return Err(self.fault(ErrorKind::SemiExpected));
        }
        self.lex()?;
        Ok(a)
    }

    /// `for (init; cond; step) body`. The condition and step positions
    /// are snapshotted once and replayed each iteration.
    fn exec_for(&mut self) -> Exec<Flow> {
        self.lex()?;
        if self.tok.id() != id::OPENPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        self.semi_expression()?; // init, evaluated once
        let cond_state = self.program_save();
        loop {
            let cond = self.semi_expression()?;
            let step_state = self.program_save();
            self.skip_balanced(id::OPENPAREN, id::CLOSEPAREN, ErrorKind::UnbalParens)?;
            if !cond.is_truthy() {
                self.find_eob()?;
                return Ok(Flow::Normal);
            }
            let body_state = self.program_save();
            match self.interpret_block()? {
                Flow::Normal => {}
                Flow::Break => {
                    self.program_restore(body_state);
                    self.find_eob()?;
                    return Ok(Flow::Normal);
                }
                Flow::Return => return Ok(Flow::Return),
            }
            self.program_restore(step_state);
            self.expression()?; // the step clause
            self.program_restore(cond_state.clone());
        }
    }

    // ------------------------------------------------------------------
    // Skipping
    // ------------------------------------------------------------------

    /// Skips tokens until a bracket pair balances, assuming one `open`
    /// has already been consumed.
    pub(crate) fn skip_balanced(&mut self, open: u16, close: u16, err: ErrorKind) -> Exec<()> {
        let mut depth = 1i32;
        while depth > 0 {
            self.lex()?;
            let t = self.tok.id();
            if t == open {
                depth += 1;
            } else if t == close {
                depth -= 1;
            } else if t == id::FINISHED {
                return Err(self.fault(err));
            }
        }
        Ok(())
    }

    /// Skips one statement or braced block, handling nested control
    /// constructs with or without braces.
    pub(crate) fn find_eob(&mut self) -> Exec<()> {
        self.lex()?;
        match self.tok.id() {
            id::OPENBR => self.skip_balanced(id::OPENBR, id::CLOSEBR, ErrorKind::UnbalBraces),
            id::IF | id::FOR | id::WHILE => {
                self.lex()?;
                if self.tok.id() != id::OPENPAREN {
                    return Err(self.fault(ErrorKind::ParenExpected));
                }
                self.skip_balanced(id::OPENPAREN, id::CLOSEPAREN, ErrorKind::UnbalParens)?;
                self.find_eob()
            }
            id::ELSE => self.find_eob(),
            id::DO => {
                self.find_eob()?;
                self.lex()?;
                if self.tok.id() != id::WHILE {
                    return Err(self.fault(ErrorKind::WhileExpected));
                }
                self.lex()?;
                if self.tok.id() != id::OPENPAREN {
                    return Err(self.fault(ErrorKind::ParenExpected));
                }
                self.skip_balanced(id::OPENPAREN, id::CLOSEPAREN, ErrorKind::UnbalParens)?;
                self.lex()?;
                if self.tok.id() != id::SEMI {
                    return Err(self.fault(ErrorKind::SemiExpected));
                }
                Ok(())
            }
            _ => {
                // Single-line statement: consume up to its `;`. The
                // statement may be empty, so the current token may
                // already be the semicolon.
                while self.tok.id() != id::SEMI {
                    if self.tok.id() == id::FINISHED {
                        return Err(self.fault(ErrorKind::SemiExpected));
                    }
                    self.lex()?;
                }
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// Reads a type specifier: optional `static`, optional `unsigned`,
    /// then a type keyword. Returns `None` when no type is present.
    pub(crate) fn get_type(&mut self) -> Exec<Option<Token>> {
        self.lex()?;
        let mut extra = 0u16;
        if self.tok.is_static() {
            extra |= Token::STATIC;
            self.lex()?;
        }
        if !self.tok.is_signed() {
            extra |= Token::UNSIGNED;
            self.lex()?;
            if !self.tok.is_type() {
                // Bare `unsigned` means unsigned int; the token after it
                // belongs to the declarator.
                self.putback();
                return Ok(Some(
                    Token::of(id::INT).with(Token::TYPE | extra),
                ));
            }
        }
        if !self.tok.is_type() {
            return Ok(None);
        }
        Ok(Some(Token(self.tok.storage().bits() | extra | Token::TYPE)))
    }

    /// Parses an array size literal.
    fn array_size(&mut self, max: usize) -> Exec<usize> {
        self.lex()?;
        if self.tok.id() != id::NUMBER {
            return Err(self.fault(ErrorKind::ArraySizeNotLit));
        }
        let size = match crate::eval::parse_number(&self.text) {
            Some(a) => a.val.as_int().map_err(|k| self.fault(k))?,
            None => return Err(self.fault(ErrorKind::ArraySizeNotLit)),
        };
        if size < 1 {
            return Err(self.fault(ErrorKind::ArraySizeNotLit));
        }
        if size as usize > max {
            return Err(self.fault(ErrorKind::ArrayTooBig));
        }
        self.lex()?;
        if self.tok.id() != id::CLOSESQU {
            return Err(self.fault(ErrorKind::SqubraceExpected));
        }
        self.lex()?;
        Ok(size as usize)
    }

    /// Declares local variables at runtime: a comma list of declarators,
    /// each optionally an array or (scalars only) initialized. Arrays
    /// expand to consecutive stack slots.
    pub(crate) fn decl_local(&mut self) -> Exec<()> {
        let Some(base) = self.get_type()? else {
            return Err(self.fault(ErrorKind::TypeExpected));
        };
        loop {
            let mut ty = base.storage();
            self.lex()?;
            if self.tok.id() == id::MUL {
                ty = ty.with(Token::PTR);
                self.lex()?;
                if self.tok.id() == id::MUL {
                    return Err(self.fault(ErrorKind::DblPtr));
                }
            } else {
                ty = Token(ty.bits() & !Token::PTR);
            }
            if self.tok.id() != id::IDENTIFIER {
                return Err(self.fault(ErrorKind::IdentifierExpected));
            }
            let name = self.text.clone();
            self.lex()?;

            let (flags, size) = if self.tok.id() == id::OPENSQU {
                (VF_ARRAY, self.array_size(LARRAY_MAX)?)
            } else {
                (0, 1)
            };

            for idx in 0..size {
                self.push_local(Variable {
                    name: name.clone(),
                    flags,
                    aidx: idx,
                    asize: size,
                    datum: Atom::zero_of(ty),
                    array: None,
                })?;
            }

            if self.tok.id() == id::ASSIGN {
                if flags & VF_ARRAY != 0 {
                    return Err(self.fault(ErrorKind::ArrayInitializer));
                }
                // Earlier declarators are visible to later initializers.
                let a = self.expression()?;
                self.assign_named(&name, &a)?;
                self.lex()?;
            }

            if self.tok.id() != id::COMMA {
                break;
            }
        }
        if self.tok.id() != id::SEMI {
            return Err(self.fault(ErrorKind::SemiExpected));
        }
        Ok(())
    }

    /// Declares file-scope or process-wide globals during the prescan.
    /// Arrays get heap backing; scalar initializers evaluate immediately.
    pub(crate) fn decl_global(&mut self) -> Exec<()> {
        let Some(base) = self.get_type()? else {
            return Err(self.fault(ErrorKind::Syntax));
        };
        let is_static = base.is_static();
        loop {
            let mut ty = base.storage();
            self.lex()?;
            if self.tok.id() == id::MUL {
                ty = ty.with(Token::PTR);
                self.lex()?;
                if self.tok.id() == id::MUL {
                    return Err(self.fault(ErrorKind::DblPtr));
                }
            } else {
                ty = Token(ty.bits() & !Token::PTR);
            }
            if self.tok.id() != id::IDENTIFIER {
                return Err(self.fault(ErrorKind::IdentifierExpected));
            }
            let name = self.text.clone();
            self.lex()?;

            let (flags, asize, array) = if self.tok.id() == id::OPENSQU {
                let size = self.array_size(GARRAY_MAX)?;
                (VF_ARRAY, size, Some(vec![Atom::zero_of(ty); size]))
            } else {
                (0, 1, None)
            };

            let v = Variable {
                name: name.clone(),
                flags,
                aidx: 0,
                asize,
                datum: Atom::zero_of(ty),
                array,
            };
            let r = if is_static {
                let nsi = self.cur_ns_index()?;
                self.namespaces
                    .get_index_mut(nsi)
                    .map(|(_, ns)| &mut ns.variables)
                    .ok_or(ErrorKind::Fatal)
                    .and_then(|t| t.insert(v))
            } else {
                self.globals.insert(v)
            };
            r.map_err(|k| self.fault(k))?;
            trace!(variable = %name, is_static, "registered global");

            if self.tok.id() == id::ASSIGN {
                if flags & VF_ARRAY != 0 {
                    return Err(self.fault(ErrorKind::ArrayInitializer));
                }
                let a = self.expression()?;
                self.assign_named(&name, &a)?;
                self.lex()?;
            }

            if self.tok.id() != id::COMMA {
                break;
            }
        }
        if self.tok.id() != id::SEMI {
            return Err(self.fault(ErrorKind::SemiExpected));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Prescan
    // ------------------------------------------------------------------

    /// Walks the top level of the program, registering every function and
    /// global variable before anything executes. The cursor is restored
    /// to where it started.
    pub(crate) fn prescan(&mut self) -> Exec<()> {
        let start = self.pos;
        let mut brace = 0i32;
        loop {
            while brace > 0 {
                self.lex()?;
                match self.tok.id() {
                    id::OPENBR => brace += 1,
                    id::CLOSEBR => brace -= 1,
                    id::FINISHED => return Err(self.fault(ErrorKind::UnbalBraces)),
                    _ => {}
                }
            }
            self.lex()?;
            if self.tok.is_type() {
                self.putback();
                let decl = self.program_save();
                // Slide past the type tokens and any `*` to find what the
                // declarator introduces.
                while self.tok.is_type() || self.tok.id() == id::MUL {
                    self.lex()?;
                }
                if self.tok.id() != id::IDENTIFIER {
                    return Err(self.fault(ErrorKind::Syntax));
                }
                self.lex()?;
                let next = self.tok.id();
                self.program_restore(decl);
                match next {
                    id::SEMI | id::ASSIGN | id::OPENSQU | id::COMMA => self.decl_global()?,
                    id::OPENPAREN => self.declare_function()?,
                    _ => return Err(self.fault(ErrorKind::Syntax)),
                }
            } else if self.tok.id() == id::IDENTIFIER {
                return Err(self.fault(ErrorKind::Syntax));
            } else if self.tok.id() == id::OPENBR {
                brace += 1;
            }
            if self.tok.id() == id::FINISHED {
                break;
            }
        }
        self.pos = start;
        self.saved_pos = start;
        Ok(())
    }

    /// Registers one function during the prescan: return type, name, the
    /// offset of its parameter list, and the parameter count. The body is
    /// not entered here.
    fn declare_function(&mut self) -> Exec<()> {
        let Some(base) = self.get_type()? else {
            return Err(self.fault(ErrorKind::TypeExpected));
        };
        let is_static = base.is_static();
        let mut ret = base.storage();
        self.lex()?;
        if self.tok.id() == id::MUL {
            ret = ret.with(Token::PTR);
            self.lex()?;
        }
        if self.tok.id() != id::IDENTIFIER {
            return Err(self.fault(ErrorKind::IdentifierExpected));
        }
        let name = self.text.clone();
        self.lex()?;
        if self.tok.id() != id::OPENPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        // The call path re-enters at the `(` itself.
        let body = self.saved_pos;

        let mut args: u8 = 0;
        self.lex()?;
        if self.tok.id() != id::CLOSEPAREN {
            self.putback();
            loop {
                let Some(pt) = self.get_type()? else {
                    return Err(self.fault(ErrorKind::TypeExpected));
                };
                if pt.is_void() {
                    while self.tok.id() != id::CLOSEPAREN {
                        if self.tok.id() == id::FINISHED {
                            return Err(self.fault(ErrorKind::UnbalParens));
                        }
                        self.lex()?;
                    }
                    break;
                }
                self.lex()?;
                if self.tok.id() == id::MUL {
                    self.lex()?;
                }
                if self.tok.id() != id::IDENTIFIER {
                    return Err(self.fault(ErrorKind::IdentifierExpected));
                }
                args += 1;
                self.lex()?;
                if self.tok.id() != id::COMMA {
                    break;
                }
            }
            if self.tok.id() != id::CLOSEPAREN {
                return Err(self.fault(ErrorKind::ParenExpected));
            }
        }

        let nsi = self.cur_ns_index()?;
        let f = Function {
            name: name.clone(),
            body: FnBody::User { ns: nsi, body },
            ret,
            min_args: args,
            max_args: args,
        };
        let r = if is_static {
            self.namespaces
                .get_index_mut(nsi)
                .map(|(_, ns)| &mut ns.functions)
                .ok_or(ErrorKind::Fatal)
                .and_then(|t| t.insert(f))
        } else {
            self.functions.insert(f)
        };
        r.map_err(|k| self.fault(k))?;
        trace!(function = %name, args, is_static, "registered function");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Dispatches a call through one interface for both kinds. The cursor
    /// is at the call's argument list.
    pub(crate) fn call(&mut self, out: &mut Atom, f: &Function) -> Exec<()> {
        trace!(function = %f.name, "call");
        match f.body {
            FnBody::Builtin(native) => {
                let nargs = self.read_builtin_args()?;
                if nargs < f.min_args as usize || nargs > f.max_args as usize {
                    return Err(self.fault(ErrorKind::ArgCount));
                }
                *out = Atom::zero_of(f.ret.storage());
                native(self, out)?;
                self.args.clear();
                Ok(())
            }
            FnBody::User { ns, body } => self.call_user(f, ns, body, out),
        }
    }

    /// Evaluates a builtin's actual arguments onto the argument stack in
    /// reverse, so the builtin pops them left to right. String literals
    /// pass through without evaluation.
    fn read_builtin_args(&mut self) -> Exec<usize> {
        self.lex()?;
        if self.tok.id() != id::OPENPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        let mut params: Vec<Atom> = Vec::new();
        loop {
            self.lex()?;
            if self.tok.id() == id::CLOSEPAREN {
                break;
            }
            let a = if self.tok.id() == id::STRING {
                let ns = self.cur_ns_index()?;
                let idx = self.cur_str.ok_or_else(|| self.fault(ErrorKind::Fatal))?;
                Atom {
                    ty: Token::of(id::CHAR).with(Token::PTR),
                    val: crate::atom::Value::Ptr(crate::atom::PtrVal::Str { ns, idx }),
                }
            } else {
                self.putback();
                self.expression()?
            };
            params.push(a);
            if params.len() > NUM_PARAMS {
                return Err(self.fault(ErrorKind::Syntax));
            }
            self.lex()?;
            if self.tok.id() != id::COMMA {
                break;
            }
        }
        if self.tok.id() != id::CLOSEPAREN {
            return Err(self.fault(ErrorKind::UnbalParens));
        }
        for a in params.iter().rev() {
            if self.args.len() >= ARG_CAPACITY {
                return Err(self.fault(ErrorKind::TooManyArgs));
            }
            let mut pushed = *a;
            pushed.ty = pushed.ty.with(Token::ARG);
            self.args.push(pushed);
        }
        Ok(params.len())
    }

    /// Calls a user function: arguments evaluate in the caller's
    /// namespace, then the cursor jumps into the callee's parameter list,
    /// the pushed slots take the parameter names, and the body runs.
    fn call_user(&mut self, f: &Function, fns: usize, body: usize, out: &mut Atom) -> Exec<()> {
        let bottom = self.locals.len();
        let nargs = self.push_user_args()?;
        if nargs < f.min_args as usize || nargs > f.max_args as usize {
            return Err(self.fault(ErrorKind::ParamErr));
        }
        let saved = self.program_save();
        let saved_ns = self.cur_ns;
        self.push_frame(bottom)?;
        self.cur_ns = Some(fns);
        self.pos = body;
        self.saved_pos = body;
        self.bind_params()?;
        self.interpret_block()?;
        self.cur_ns = saved_ns;
        self.program_restore(saved);
        let b = self.pop_frame()?;
        self.locals.truncate(b);
        *out = self.ret_val;
        Ok(())
    }

    /// Evaluates the comma-separated actual arguments (caller's scope)
    /// and pushes them as anonymous slots, in reverse, onto the local
    /// stack.
    fn push_user_args(&mut self) -> Exec<usize> {
        self.lex()?;
        if self.tok.id() != id::OPENPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        let mut vals: Vec<Atom> = Vec::new();
        self.lex()?;
        if self.tok.id() != id::CLOSEPAREN {
            self.putback();
            loop {
                let a = self.expression()?;
                vals.push(a);
                if vals.len() > NUM_PARAMS {
                    return Err(self.fault(ErrorKind::Syntax));
                }
                self.lex()?;
                if self.tok.id() != id::COMMA {
                    break;
                }
            }
            if self.tok.id() != id::CLOSEPAREN {
                return Err(self.fault(ErrorKind::UnbalParens));
            }
        }
        for a in vals.iter().rev() {
            let mut datum = *a;
            datum.ty = datum.ty.with(Token::ARG);
            self.push_local(Variable {
                name: String::new(),
                flags: 0,
                aidx: 0,
                asize: 1,
                datum,
                array: None,
            })?;
        }
        Ok(vals.len())
    }

    /// Walks the callee's parameter list, renaming the freshly pushed
    /// argument slots to the parameter names and converting each value to
    /// the declared parameter type. A `void` (or empty) list binds
    /// nothing.
    pub(crate) fn bind_params(&mut self) -> Exec<()> {
        self.lex()?;
        if self.tok.id() != id::OPENPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        self.lex()?;
        if self.tok.id() == id::CLOSEPAREN {
            return Ok(());
        }
        self.putback();
        let bottom = match self.frames.last() {
            Some(&b) => b,
            None => return Err(self.fault(ErrorKind::RetNoCall)),
        };
        let mut slot = self.locals.len();
        loop {
            let Some(pt) = self.get_type()? else {
                return Err(self.fault(ErrorKind::TypeExpected));
            };
            if pt.is_void() {
                while self.tok.id() != id::CLOSEPAREN {
                    if self.tok.id() == id::FINISHED {
                        return Err(self.fault(ErrorKind::UnbalParens));
                    }
                    self.lex()?;
                }
                return Ok(());
            }
            let mut ty = pt.storage();
            self.lex()?;
            if self.tok.id() == id::MUL {
                ty = ty.with(Token::PTR);
                self.lex()?;
            }
            if self.tok.id() != id::IDENTIFIER {
                return Err(self.fault(ErrorKind::IdentifierExpected));
            }
            if slot == bottom {
                return Err(self.fault(ErrorKind::ParamErr));
            }
            slot -= 1;
            let name = self.text.clone();
            {
                let mut converted = Atom::zero_of(ty);
                let cur = self.locals[slot].datum;
                value::mov(&mut converted, &cur).map_err(|k| self.fault(k))?;
                let v = &mut self.locals[slot];
                v.datum = converted;
                v.name = name;
                v.set_init();
            }
            self.lex()?;
            if self.tok.id() != id::COMMA {
                break;
            }
        }
        if self.tok.id() != id::CLOSEPAREN {
            return Err(self.fault(ErrorKind::ParenExpected));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(src: &str) -> i64 {
        let mut i = Interp::with_output(Box::new(std::io::sink()));
        i.load_source(PathBuf::from("t.qc"), src).expect("load");
        let a = i.execute("main").expect("run").expect("main exists");
        a.val.as_int().expect("integer result")
    }

    fn run_err(src: &str) -> ErrorKind {
        let mut i = Interp::with_output(Box::new(std::io::sink()));
        match i.load_source(PathBuf::from("t.qc"), src) {
            Err(e) => return e.kind,
            Ok(()) => {}
        }
        i.execute("main").expect_err("script must fail").kind
    }

    #[test]
    fn test_return_constant() {
        assert_eq!(run("int main(void) { return 3; }"), 3);
    }

    #[test]
    fn test_empty_parens_accepted() {
        assert_eq!(run("int main() { return 5; }"), 5);
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(run("int main() { return 2 + 3 * 4; }"), 14);
        assert_eq!(run("int main() { return (2 + 3) * 4; }"), 20);
        assert_eq!(run("int main() { return 10 - 2 - 3; }"), 5);
        assert_eq!(run("int main() { return 7 % 3 + 10 / 2; }"), 6);
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(run("int main() { int x; x = 5; return -x + 8; }"), 3);
        assert_eq!(run("int main() { return !0; }"), 1);
        assert_eq!(run("int main() { return !7; }"), 0);
        assert_eq!(run("int main() { return ~0; }"), -1);
    }

    #[test]
    fn test_for_sum() {
        let src = "int main(){ int i,s; s=0; for(i=1;i<=10;i=i+1) s+=i; return s; }";
        assert_eq!(run(src), 55);
    }

    #[test]
    fn test_array_squares() {
        let src = "int main(){ int a[5],i; for(i=0;i<5;i=i+1) a[i]=i*i; return a[4]; }";
        assert_eq!(run(src), 16);
    }

    #[test]
    fn test_recursive_fibonacci() {
        let src = "int f(int n){ if(n<2) return n; return f(n-1)+f(n-2); } \
                   int main(){ return f(10); }";
        assert_eq!(run(src), 55);
    }

    #[test]
    fn test_pointer_write_through_weakly_typed_int() {
        let src = "int main(){ int x,y; x=7; y=&x; *y=42; return x; }";
        assert_eq!(run(src), 42);
    }

    #[test]
    fn test_shift_loop() {
        let src = "int main(){ int i; i=1; while(i<1000) i<<=1; return i; }";
        assert_eq!(run(src), 1024);
    }

    #[test]
    fn test_array_bounds_diagnostic() {
        assert_eq!(
            run_err("int main(){ int a[3]; return a[5]; }"),
            ErrorKind::ArrayBounds
        );
    }

    #[test]
    fn test_uninitialized_read_diagnostic() {
        assert_eq!(
            run_err("int main(){ int x; return x; }"),
            ErrorKind::Uninit
        );
    }

    #[test]
    fn test_while_loop_with_break() {
        let src = "int main(){ int i; i=0; while(1) { i = i + 1; if (i == 7) break; } return i; }";
        assert_eq!(run(src), 7);
    }

    #[test]
    fn test_break_exits_one_loop_only() {
        let src = "int main(){ int i, j, n; n = 0; \
                   for (i = 0; i < 3; i = i + 1) { \
                       j = 0; \
                       while (1) { j = j + 1; if (j == 2) break; } \
                       n = n + j; \
                   } \
                   return n; }";
        assert_eq!(run(src), 6);
    }

    #[test]
    fn test_do_while() {
        let src = "int main(){ int i, s; i = 0; s = 0; \
                   do { s = s + i; i = i + 1; } while (i < 5); \
                   return s; }";
        assert_eq!(run(src), 10);
    }

    #[test]
    fn test_do_while_runs_body_at_least_once() {
        let src = "int main(){ int i; i = 9; do i = i + 1; while (0); return i; }";
        assert_eq!(run(src), 10);
    }

    #[test]
    fn test_if_else_chain() {
        let src = "int pick(int n){ if (n < 5) return 1; else if (n == 5) return 2; else return 3; } \
                   int main(){ return pick(1) * 100 + pick(5) * 10 + pick(9); }";
        assert_eq!(run(src), 123);
    }

    #[test]
    fn test_else_branch_skipped_when_true() {
        let src = "int main(){ int x; x = 0; if (1) x = 4; else x = 9; return x; }";
        assert_eq!(run(src), 4);
    }

    #[test]
    fn test_nested_braces_and_locals() {
        let src = "int main(){ int x; x = 1; { int y; y = 2; x = x + y; } return x; }";
        assert_eq!(run(src), 3);
    }

    #[test]
    fn test_compound_assignment_operators() {
        let src = "int main(){ int x; x = 12; x += 3; x -= 1; x *= 2; x /= 4; x %= 5; return x; }";
        assert_eq!(run(src), 2);
    }

    #[test]
    fn test_bitwise_operators() {
        assert_eq!(run("int main(){ return (12 & 10) + (12 | 10) + (12 ^ 10); }"), 28);
        assert_eq!(run("int main(){ int x; x = 6; x &= 3; return x; }"), 2);
        assert_eq!(run("int main(){ int x; x = 6; x |= 9; return x; }"), 15);
        assert_eq!(run("int main(){ int x; x = 6; x ^= 5; return x; }"), 3);
    }

    #[test]
    fn test_increment_decrement() {
        assert_eq!(run("int main(){ int x; x = 5; x++; return x; }"), 6);
        assert_eq!(run("int main(){ int x; x = 5; x--; return x; }"), 4);
        assert_eq!(run("int main(){ int x; x = 5; ++x; return x; }"), 6);
        assert_eq!(run("int main(){ int x; x = 5; --x; return x; }"), 4);
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(run("int main(){ return 1 && 2; }"), 1);
        assert_eq!(run("int main(){ return 1 && 0; }"), 0);
        assert_eq!(run("int main(){ return 0 || 3; }"), 1);
        assert_eq!(run("int main(){ return 0 || 0; }"), 0);
    }

    #[test]
    fn test_division_by_zero_yields_zero() {
        assert_eq!(run("int main(){ int x; x = 0; return 7 / x; }"), 0);
        assert_eq!(run("int main(){ int x; x = 0; return 7 % x; }"), 0);
    }

    #[test]
    fn test_char_arithmetic_wraps() {
        let src = "int main(){ char c; c = 127; c += 1; return c; }";
        assert_eq!(run(src), -128);
    }

    #[test]
    fn test_unsigned_char_wraps() {
        let src = "int main(){ unsigned char c; c = 255; c += 1; return c; }";
        assert_eq!(run(src), 0);
    }

    #[test]
    fn test_global_variables() {
        let src = "int total;\n\
                   int bump(int n){ total = total + n; return total; }\n\
                   int main(){ total = 0; bump(4); bump(6); return total; }";
        assert_eq!(run(src), 10);
    }

    #[test]
    fn test_global_initializer() {
        let src = "int base = 40;\nint main(){ return base + 2; }";
        assert_eq!(run(src), 42);
    }

    #[test]
    fn test_global_array() {
        let src = "int table[4];\n\
                   int main(){ int i; for (i = 0; i < 4; i = i + 1) table[i] = i * 3; \
                   return table[3]; }";
        assert_eq!(run(src), 9);
    }

    #[test]
    fn test_static_function_and_variable() {
        let src = "static int seed = 3;\n\
                   static int twice(int n) { return n * 2; }\n\
                   int main(){ return twice(seed); }";
        assert_eq!(run(src), 6);
    }

    #[test]
    fn test_comma_declaration_list() {
        let src = "int main(){ int a, b, c; a = 1; b = 2; c = 3; return a + b + c; }";
        assert_eq!(run(src), 6);
    }

    #[test]
    fn test_local_initializers_see_earlier_declarators() {
        let src = "int main(){ int a = 5, b = a + 2; return b; }";
        assert_eq!(run(src), 7);
    }

    #[test]
    fn test_array_initializer_rejected() {
        assert_eq!(
            run_err("int main(){ int a[3] = 1; return 0; }"),
            ErrorKind::ArrayInitializer
        );
    }

    #[test]
    fn test_array_size_must_be_literal() {
        assert_eq!(
            run_err("int main(){ int n; n = 3; int a[n]; return 0; }"),
            ErrorKind::ArraySizeNotLit
        );
    }

    #[test]
    fn test_double_pointer_rejected() {
        assert_eq!(
            run_err("int main(){ int **p; return 0; }"),
            ErrorKind::DblPtr
        );
    }

    #[test]
    fn test_pointer_into_array_walks_elements() {
        let src = "int main(){ int a[4], *p, i, s; \
                   for (i = 0; i < 4; i = i + 1) a[i] = i + 1; \
                   p = &a[0]; s = 0; \
                   for (i = 0; i < 4; i = i + 1) s = s + *(p + i); \
                   return s; }";
        assert_eq!(run(src), 10);
    }

    #[test]
    fn test_address_of_element_matches_stepped_pointer() {
        let src = "int main(){ int a[3], *p, *q; a[2] = 9; \
                   p = &a[0]; p = p + 2; q = &a[2]; \
                   if (p == q) return *p; return 0; }";
        assert_eq!(run(src), 9);
    }

    #[test]
    fn test_dereference_non_pointer_diagnostic() {
        assert_eq!(
            run_err("int main(){ int x; x = 5; return *x; }"),
            ErrorKind::Deref
        );
    }

    #[test]
    fn test_address_of_requires_identifier() {
        assert_eq!(
            run_err("int main(){ return &5; }"),
            ErrorKind::IdentifierExpected
        );
    }

    #[test]
    fn test_chained_assignment() {
        let src = "int main(){ int a, b; a = b = 21; return a + b; }";
        assert_eq!(run(src), 42);
    }

    #[test]
    fn test_assignment_inside_parens() {
        let src = "int main(){ int a, b; a = 3; b = (a = 10) + 1; return a + b; }";
        assert_eq!(run(src), 21);
    }

    #[test]
    fn test_double_arithmetic() {
        let src = "int main(){ double d; int n; d = 1.5; d = d * 4.0; n = d > 5.9; return n; }";
        assert_eq!(run(src), 1);
    }

    #[test]
    fn test_duplicate_global_names_rejected() {
        assert_eq!(
            run_err("int x;\nint x;\nint main(){ return 0; }"),
            ErrorKind::NamesMatch
        );
    }

    #[test]
    fn test_missing_semicolon_diagnostic() {
        assert_eq!(
            run_err("int main(){ int x; x = 1 return x; }"),
            ErrorKind::SemiExpected
        );
    }

    #[test]
    fn test_call_with_wrong_arity_diagnostic() {
        assert_eq!(
            run_err("int f(int a, int b){ return a + b; } int main(){ return f(1); }"),
            ErrorKind::ParamErr
        );
    }

    #[test]
    fn test_deep_recursion_overflows_frame_stack() {
        let src = "int f(int n){ return f(n + 1); } int main(){ return f(0); }";
        assert_eq!(run_err(src), ErrorKind::NestFunc);
    }

    #[test]
    fn test_locals_shadow_globals() {
        let src = "int x = 1;\nint main(){ int x; x = 2; return x; }";
        assert_eq!(run(src), 2);
    }

    #[test]
    fn test_caller_locals_not_visible_in_callee() {
        let src = "int f(void){ return hidden; }\n\
                   int main(){ int hidden; hidden = 5; return f(); }";
        assert_eq!(run_err(src), ErrorKind::Syntax);
    }

    #[test]
    fn test_insane_shift_diagnostic() {
        assert_eq!(
            run_err("int main(){ int x; x = 1; return x << 5000; }"),
            ErrorKind::InsaneShift
        );
    }

    #[test]
    fn test_unbalanced_comment_diagnostic() {
        assert_eq!(
            run_err("int main(){ return 0; } /* trailing"),
            ErrorKind::UnbalComment
        );
    }

    #[test]
    fn test_exit_code_beyond_byte_range_is_preserved() {
        // Values wider than a process exit status stay intact inside the
        // interpreter.
        assert_eq!(run("int main(){ return 1024; }"), 1024);
    }
}
