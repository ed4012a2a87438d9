//! The native library functions callable from scripts.
//!
//! Each builtin pops its fully evaluated arguments from the interpreter's
//! argument stack (left to right) and writes its result into the return
//! atom, whose type tag was preset from the descriptor's declared return
//! type.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};

use qc_lex::token::{id, Token};
use qc_util::{ErrorKind, Exec, Interrupt};

use crate::atom::{Atom, PtrVal, Value};
use crate::function::{FnBody, Function};
use crate::interp::Interp;
use crate::print;

/// Size of the open-file table.
pub const NFILES: usize = 20;

fn builtin(name: &str, native: crate::function::BuiltinFn, min: u8, max: u8, ret: Token) -> Function {
    Function {
        name: name.into(),
        body: FnBody::Builtin(native),
        ret,
        min_args: min,
        max_args: max,
    }
}

/// The builtin function table, installed into the process function table
/// at interpreter construction.
pub(crate) fn table() -> Vec<Function> {
    let int_t = Token::of(id::INT).with(Token::TYPE);
    let charp_t = Token::of(id::CHAR).with(Token::TYPE | Token::PTR);
    let filep_t = Token::of(id::FILE).with(Token::TYPE | Token::PTR);
    vec![
        builtin("fopen", qc_fopen, 2, 2, filep_t),
        builtin("fclose", qc_fclose, 1, 1, int_t),
        builtin("fputs", qc_fputs, 2, 2, int_t),
        builtin("exit", qc_exit, 1, 1, int_t),
        builtin("puts", qc_puts, 1, 1, charp_t),
        builtin("printf", qc_printf, 1, 9, int_t),
        builtin("getchar", qc_getchar, 0, 0, int_t),
    ]
}

fn open_with_mode(path: &str, mode: &str) -> Option<File> {
    let mut opts = OpenOptions::new();
    let plus = mode.contains('+');
    match mode.chars().next()? {
        'r' => {
            opts.read(true);
            if plus {
                opts.write(true);
            }
        }
        'w' => {
            opts.write(true).create(true).truncate(true);
            if plus {
                opts.read(true);
            }
        }
        'a' => {
            opts.append(true).create(true);
            if plus {
                opts.read(true);
            }
        }
        _ => return None,
    }
    opts.open(path).ok()
}

/// `fopen(path, mode)`: returns a FILE handle, or NULL when the file
/// cannot be opened or the file table is full.
fn qc_fopen(interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let path_a = interp.arg_pop()?;
    let mode_a = interp.arg_pop()?;
    let path = interp.str_of(&path_a)?;
    let mode = interp.str_of(&mode_a)?;
    ret.val = match open_with_mode(&path, &mode).and_then(|f| interp.file_insert(f)) {
        Some(handle) => Value::Ptr(PtrVal::File(handle)),
        None => Value::Ptr(PtrVal::Null),
    };
    Ok(())
}

/// `fclose(fp)`: removes the handle from the file table. Returns 0 on
/// success, -1 for an unknown or already-closed handle.
fn qc_fclose(interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let a = interp.arg_pop()?;
    let ok = match a.val {
        Value::Ptr(PtrVal::File(h)) => interp.file_close(h),
        Value::Ptr(PtrVal::Null) => false,
        _ => return Err(interp.fault(ErrorKind::FileNotPtr)),
    };
    ret.val = Value::Int(if ok { 0 } else { -1 });
    Ok(())
}

/// `fputs(s, fp)`: writes a string to an open file. Returns 0 on
/// success, -1 on error.
fn qc_fputs(interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let s_a = interp.arg_pop()?;
    let fp_a = interp.arg_pop()?;
    let s = interp.str_of(&s_a)?;
    let Value::Ptr(PtrVal::File(h)) = fp_a.val else {
        return Err(interp.fault(ErrorKind::FileNotPtr));
    };
    let Some(f) = interp.file_mut(h) else {
        return Err(interp.fault(ErrorKind::FileNotPtr));
    };
    ret.val = Value::Int(match f.write_all(s.as_bytes()) {
        Ok(()) => 0,
        Err(_) => -1,
    });
    Ok(())
}

/// `puts(s)`: writes the string and a newline to the program output.
fn qc_puts(interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let a = interp.arg_pop()?;
    let s = interp.str_of(&a)?;
    let r = writeln!(interp.out, "{s}");
    ret.val = Value::Int(if r.is_ok() { 0 } else { -1 });
    Ok(())
}

/// `printf(fmt, ...)`: formatted print. Returns the number of bytes
/// written.
fn qc_printf(interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let fmt_a = interp.arg_pop()?;
    let fmt = interp.str_of(&fmt_a)?;
    // Remaining stack entries pop off left to right.
    let mut rest: Vec<Atom> = Vec::new();
    while let Some(a) = interp.args.pop() {
        rest.push(a);
    }
    let resolved: Vec<print::FmtArg> = rest
        .iter()
        .map(|a| match a.val {
            Value::Ptr(PtrVal::Str { .. }) => {
                print::FmtArg::Str(interp.str_of(a).unwrap_or_default())
            }
            _ => print::FmtArg::Int(a.val.as_int().unwrap_or(0)),
        })
        .collect();
    let text = print::format_message(&fmt, &resolved);
    let count = text.len();
    if interp.out.write_all(text.as_bytes()).is_err() || interp.out.flush().is_err() {
        ret.val = Value::Int(-1);
        return Ok(());
    }
    ret.val = Value::Int(count as i32);
    Ok(())
}

/// `getchar()`: one byte from standard input, or -1 at end of input.
fn qc_getchar(_interp: &mut Interp, ret: &mut Atom) -> Exec<()> {
    let mut buf = [0u8; 1];
    let n = std::io::stdin().read(&mut buf).unwrap_or(0);
    ret.val = Value::Int(if n == 1 { i32::from(buf[0]) } else { -1 });
    Ok(())
}

/// `exit(code)`: unwinds the whole script.
fn qc_exit(interp: &mut Interp, _ret: &mut Atom) -> Exec<()> {
    let a = interp.arg_pop()?;
    let code = a.val.as_int().map_err(|k| interp.fault(k))?;
    Err(Interrupt::Exit(code as i32))
}
