//! The interpreter owner.
//!
//! [`Interp`] owns every piece of state the original design kept as
//! process globals: the namespace registry, the process-wide symbol
//! tables, the local-variable stack and frame stack, the builtin argument
//! stack, the open-file table, the return-value slot, and the cursor
//! state of the scanner (position, putback position, current token and
//! its text). One interpreter instance is one single-threaded execution
//! environment.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use qc_lex::lexer::{scan, TokenText};
use qc_lex::source::load_program;
use qc_lex::token::Token;
use qc_util::{Diagnostic, ErrorKind, Exec, Interrupt, QcError};

use crate::atom::{Atom, Space, Value, VarRef};
use crate::builtins;
use crate::function::{FnBody, Function};
use crate::namespace::Namespace;
use crate::symtab::SymTable;
use crate::value;
use crate::variable::Variable;

/// Capacity of the local-variable stack.
pub const LVAR_CAPACITY: usize = 1024;

/// Capacity of the frame-pointer stack (maximum call nesting).
pub const FRAME_CAPACITY: usize = 31;

/// Capacity of the builtin argument stack.
pub const ARG_CAPACITY: usize = 10;

/// Maximum number of arguments in any call expression.
pub const NUM_PARAMS: usize = 31;

/// Snapshot of the scanner state, for the places single-token putback is
/// not enough: the evaluator's optimistic assignment parse and the
/// replayed clauses of `for`.
#[derive(Debug, Clone)]
pub(crate) struct ProgramState {
    pos: usize,
    saved_pos: usize,
    tok: Token,
    text: String,
    cur_str: Option<usize>,
}

/// The interpreter instance.
pub struct Interp {
    pub(crate) namespaces: IndexMap<PathBuf, Namespace>,
    /// Process-wide functions (builtins and non-static user functions).
    pub(crate) functions: SymTable<Function>,
    /// Process-wide (non-static) global variables.
    pub(crate) globals: SymTable<Variable>,
    /// The local-variable stack; call frames are windows into it.
    pub(crate) locals: Vec<Variable>,
    /// Saved local-stack tops, one per active user call.
    pub(crate) frames: Vec<usize>,
    /// Builtin argument stack, pushed in reverse call order.
    pub(crate) args: Vec<Atom>,
    /// Where `return` leaves its value.
    pub(crate) ret_val: Atom,
    pub(crate) files: Vec<Option<std::fs::File>>,
    pub(crate) cur_ns: Option<usize>,

    // Scanner state.
    pub(crate) pos: usize,
    pub(crate) saved_pos: usize,
    pub(crate) tok: Token,
    pub(crate) text: String,
    /// Intern index when the current token is a string literal.
    pub(crate) cur_str: Option<usize>,

    pub(crate) out: Box<dyn Write>,
}

impl Interp {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Builds an interpreter writing script output (`printf`, `puts`) to
    /// `out` instead of stdout.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let mut functions = SymTable::new();
        for f in builtins::table() {
            // Builtin names are distinct by construction.
            let _ = functions.insert(f);
        }
        Self {
            namespaces: IndexMap::new(),
            functions,
            globals: SymTable::new(),
            locals: Vec::new(),
            frames: Vec::new(),
            args: Vec::new(),
            ret_val: Atom::int(0),
            files: (0..builtins::NFILES).map(|_| None).collect(),
            cur_ns: None,
            pos: 0,
            saved_pos: 0,
            tok: Token::default(),
            text: String::new(),
            cur_str: None,
            out,
        }
    }

    /// Loads and prescans a source file, then runs its `__init__`
    /// function if one is declared.
    pub fn load_file(&mut self, path: &Path) -> Result<(), QcError> {
        let src = std::fs::read_to_string(path).map_err(|_| QcError::new(ErrorKind::NoFile))?;
        self.load_source(path.to_path_buf(), &src)
    }

    /// Loads QC source text under the given path label.
    pub fn load_source(&mut self, path: PathBuf, src: &str) -> Result<(), QcError> {
        let prog = load_program(src)?;
        debug!(
            path = %path.display(),
            bytes = prog.text.len(),
            strings = prog.strings.len(),
            "loaded program"
        );
        let ns = Namespace::new(path.clone(), prog);
        let (nsi, _) = self.namespaces.insert_full(path, ns);
        self.cur_ns = Some(nsi);
        self.pos = 0;
        self.saved_pos = 0;

        match self.prescan() {
            Ok(()) => {}
            Err(Interrupt::Fault(e)) => return Err(e),
            Err(Interrupt::Exit(_)) => return Ok(()),
        }

        // A file-scope initializer runs once, right after the prescan.
        self.execute("__init__")?;
        Ok(())
    }

    /// Runs a zero-argument function by name and returns its result, or
    /// `None` when no such function is declared.
    ///
    /// A script calling `exit(n)` surfaces as a normal result carrying
    /// `n`. A diagnostic aborts with the positioned error; render it with
    /// [`Interp::diagnostic`].
    pub fn execute(&mut self, name: &str) -> Result<Option<Atom>, QcError> {
        let Some(f) = self.lookup_fn(name) else {
            return Ok(None);
        };
        debug!(function = name, "executing");
        match self.invoke_toplevel(&f) {
            Ok(a) => Ok(Some(a)),
            Err(Interrupt::Exit(code)) => Ok(Some(Atom::int(code))),
            Err(Interrupt::Fault(e)) => Err(e),
        }
    }

    fn invoke_toplevel(&mut self, f: &Function) -> Exec<Atom> {
        let FnBody::User { ns, body } = f.body else {
            return Err(self.fault(ErrorKind::Fatal));
        };
        if f.min_args > 0 {
            return Err(self.fault(ErrorKind::ParamErr));
        }
        let bottom = self.locals.len();
        self.push_frame(bottom)?;
        self.cur_ns = Some(ns);
        self.pos = body;
        self.saved_pos = body;
        self.ret_val = Atom::int(0);
        self.bind_params()?;
        self.interpret_block()?;
        let b = self.pop_frame()?;
        self.locals.truncate(b);
        Ok(self.ret_val)
    }

    /// Renders an error against the loaded program it points into.
    pub fn diagnostic(&self, err: &QcError) -> String {
        let src = err
            .ns
            .and_then(|i| self.namespaces.get_index(i))
            .map(|(_, ns)| ns.program.as_str());
        Diagnostic::new(err, src).to_string()
    }

    /// Current depth of the local-variable stack. Zero outside any call.
    pub fn local_depth(&self) -> usize {
        self.locals.len()
    }

    /// Current depth of the frame stack. Zero outside any call.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ------------------------------------------------------------------
    // Scanner plumbing
    // ------------------------------------------------------------------

    pub(crate) fn ns_at(&self, i: usize) -> Exec<&Namespace> {
        self.namespaces
            .get_index(i)
            .map(|(_, ns)| ns)
            .ok_or_else(|| ErrorKind::Fatal.into())
    }

    pub(crate) fn cur_ns_index(&self) -> Exec<usize> {
        self.cur_ns.ok_or_else(|| ErrorKind::Fatal.into())
    }

    /// Reads the next token into the interpreter's token state.
    pub(crate) fn lex(&mut self) -> Exec<Token> {
        let nsi = self.cur_ns_index()?;
        let (tok, start, pos, text, cur_str) = {
            let ns = self.ns_at(nsi)?;
            let s = scan(&ns.program, &ns.strings, self.pos).map_err(|mut e| {
                e.ns = Some(nsi);
                Interrupt::Fault(e)
            })?;
            let (text, cur_str) = match &s.text {
                TokenText::None => (String::new(), None),
                TokenText::Span(r) => (ns.program[r.clone()].to_string(), None),
                TokenText::Interned(i) => (ns.strings[*i].decoded.clone(), Some(*i)),
            };
            (s.tok, s.start, s.pos, text, cur_str)
        };
        self.tok = tok;
        self.saved_pos = start;
        self.pos = pos;
        self.text = text;
        self.cur_str = cur_str;
        Ok(tok)
    }

    /// Returns the most recent token to the input stream. Only a single
    /// step is supported; deeper rewinds use [`ProgramState`] snapshots.
    pub(crate) fn putback(&mut self) {
        self.pos = self.saved_pos;
    }

    pub(crate) fn program_save(&self) -> ProgramState {
        ProgramState {
            pos: self.pos,
            saved_pos: self.saved_pos,
            tok: self.tok,
            text: self.text.clone(),
            cur_str: self.cur_str,
        }
    }

    pub(crate) fn program_restore(&mut self, st: ProgramState) {
        self.pos = st.pos;
        self.saved_pos = st.saved_pos;
        self.tok = st.tok;
        self.text = st.text;
        self.cur_str = st.cur_str;
    }

    /// Builds a positioned fault at the current cursor.
    pub(crate) fn fault(&self, kind: ErrorKind) -> Interrupt {
        Interrupt::Fault(QcError {
            kind,
            ns: self.cur_ns,
            offset: Some(self.pos),
        })
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    fn var_table(&self, space: Space) -> Exec<&SymTable<Variable>> {
        match space {
            Space::Process => Ok(&self.globals),
            Space::Ns(i) => Ok(&self.ns_at(i)?.variables),
        }
    }

    fn var_table_mut(&mut self, space: Space) -> Result<&mut SymTable<Variable>, ErrorKind> {
        match space {
            Space::Process => Ok(&mut self.globals),
            Space::Ns(i) => self
                .namespaces
                .get_index_mut(i)
                .map(|(_, ns)| &mut ns.variables)
                .ok_or(ErrorKind::Fatal),
        }
    }

    /// The descriptor a reference points at (for locals, the referenced
    /// slot itself).
    pub(crate) fn var(&self, vr: VarRef) -> Exec<&Variable> {
        match vr {
            VarRef::Local { slot } => self
                .locals
                .get(slot)
                .ok_or_else(|| self.fault(ErrorKind::BoundErr)),
            VarRef::Global { space, slot, .. } => self
                .var_table(space)?
                .get(slot)
                .ok_or_else(|| self.fault(ErrorKind::BoundErr)),
        }
    }

    /// Reads the atom a reference designates.
    pub(crate) fn datum(&self, vr: VarRef) -> Exec<Atom> {
        match vr {
            VarRef::Local { slot } => Ok(self
                .locals
                .get(slot)
                .ok_or_else(|| self.fault(ErrorKind::BoundErr))?
                .datum),
            VarRef::Global { space, slot, elem } => {
                let v = self
                    .var_table(space)?
                    .get(slot)
                    .ok_or_else(|| self.fault(ErrorKind::BoundErr))?;
                if let Some(arr) = &v.array {
                    arr.get(elem)
                        .copied()
                        .ok_or_else(|| self.fault(ErrorKind::ArrayBounds))
                } else if elem == 0 {
                    Ok(v.datum)
                } else {
                    Err(self.fault(ErrorKind::BoundErr))
                }
            }
        }
    }

    /// Stores `src` into the referenced variable, converting to the
    /// variable's declared type and marking it initialized.
    pub(crate) fn store(&mut self, vr: VarRef, src: &Atom) -> Exec<()> {
        let res: Result<(), ErrorKind> = (|| {
            match vr {
                VarRef::Local { slot } => {
                    let v = self.locals.get_mut(slot).ok_or(ErrorKind::BoundErr)?;
                    value::mov(&mut v.datum, src)?;
                    v.set_init();
                }
                VarRef::Global { space, slot, elem } => {
                    let v = self
                        .var_table_mut(space)?
                        .get_mut(slot)
                        .ok_or(ErrorKind::BoundErr)?;
                    if let Some(arr) = v.array.as_mut() {
                        let cell = arr.get_mut(elem).ok_or(ErrorKind::ArrayBounds)?;
                        value::mov(cell, src)?;
                    } else if elem == 0 {
                        value::mov(&mut v.datum, src)?;
                    } else {
                        return Err(ErrorKind::BoundErr);
                    }
                    v.set_init();
                }
            }
            Ok(())
        })();
        res.map_err(|k| self.fault(k))
    }

    /// Looks a variable up: current frame's locals from the top down,
    /// then the current namespace's statics, then the process globals.
    /// A match on a local array slot resolves to the array's base slot.
    pub(crate) fn lookup_var(&self, name: &str) -> Option<VarRef> {
        if let Some(&bottom) = self.frames.last() {
            for i in (bottom..self.locals.len()).rev() {
                if self.locals[i].name == name {
                    let base = i - self.locals[i].aidx;
                    return Some(VarRef::Local { slot: base });
                }
            }
        }
        if let Some(nsi) = self.cur_ns {
            if let Some((_, ns)) = self.namespaces.get_index(nsi) {
                if let Some(slot) = ns.variables.find(name) {
                    return Some(VarRef::Global {
                        space: Space::Ns(nsi),
                        slot,
                        elem: 0,
                    });
                }
            }
        }
        self.globals.find(name).map(|slot| VarRef::Global {
            space: Space::Process,
            slot,
            elem: 0,
        })
    }

    /// Assigns by name, as declaration initializers do.
    pub(crate) fn assign_named(&mut self, name: &str, a: &Atom) -> Exec<()> {
        let Some(vr) = self.lookup_var(name) else {
            return Err(self.fault(ErrorKind::NotVar));
        };
        self.store(vr, a)
    }

    /// Looks a function up: the current namespace's statics first, then
    /// the process table. Returns a cloned descriptor.
    pub(crate) fn lookup_fn(&self, name: &str) -> Option<Function> {
        if let Some(nsi) = self.cur_ns {
            if let Some((_, ns)) = self.namespaces.get_index(nsi) {
                if let Some(slot) = ns.functions.find(name) {
                    return ns.functions.get(slot).cloned();
                }
            }
        }
        self.functions
            .find(name)
            .and_then(|slot| self.functions.get(slot).cloned())
    }

    // ------------------------------------------------------------------
    // Stacks
    // ------------------------------------------------------------------

    pub(crate) fn push_local(&mut self, v: Variable) -> Exec<()> {
        if self.locals.len() >= LVAR_CAPACITY {
            return Err(self.fault(ErrorKind::TooManyLvars));
        }
        self.locals.push(v);
        Ok(())
    }

    pub(crate) fn push_frame(&mut self, bottom: usize) -> Exec<()> {
        if self.frames.len() >= FRAME_CAPACITY {
            return Err(self.fault(ErrorKind::NestFunc));
        }
        self.frames.push(bottom);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) -> Exec<usize> {
        self.frames
            .pop()
            .ok_or_else(|| self.fault(ErrorKind::RetNoCall))
    }

    /// Pops the next builtin argument, left to right.
    pub fn arg_pop(&mut self) -> Exec<Atom> {
        match self.args.pop() {
            Some(a) => Ok(a),
            None => Err(self.fault(ErrorKind::TooManyArgs)),
        }
    }

    /// Resolves a string-valued atom to its interned text.
    pub(crate) fn str_of(&self, a: &Atom) -> Exec<String> {
        match a.val {
            Value::Ptr(crate::atom::PtrVal::Str { ns, idx }) => {
                let entry = self
                    .ns_at(ns)?
                    .strings
                    .get(idx)
                    .ok_or_else(|| self.fault(ErrorKind::Fatal))?;
                Ok(entry.decoded.clone())
            }
            _ => Err(self.fault(ErrorKind::Syntax)),
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Tracks an open file, returning its handle, or `None` when the
    /// table is full.
    pub(crate) fn file_insert(&mut self, f: std::fs::File) -> Option<usize> {
        let slot = self.files.iter().position(|s| s.is_none())?;
        self.files[slot] = Some(f);
        Some(slot)
    }

    pub(crate) fn file_close(&mut self, handle: usize) -> bool {
        match self.files.get_mut(handle) {
            Some(slot @ Some(_)) => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn file_mut(&mut self, handle: usize) -> Option<&mut std::fs::File> {
        self.files.get_mut(handle).and_then(|s| s.as_mut())
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
