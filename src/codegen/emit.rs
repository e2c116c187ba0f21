//! Textual IR emission: operand formatting, instruction writing, fresh
//! temporaries and blocks, and the pooled output written at finish time.
//!
//! Output is built in two buffers: aggregate type declarations go into the
//! types prelude, everything else into the code body; the two are
//! concatenated when a translation succeeds.

use super::Compiler;
use crate::types::{union_largest, ConcreteType};
use std::fmt;
use std::mem;

/// One operand of an IR instruction, rendering itself in IR syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Temp(u32),
    Global(String),
    Block(u32),
    Const(i64),
    Call(Box<CallOperand>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(n) => write!(f, "%t{n}"),
            Operand::Global(name) => write!(f, "${name}"),
            Operand::Block(n) => write!(f, "@b{n}"),
            Operand::Const(v) => write!(f, "{v}"),
            Operand::Call(c) => c.fmt(f),
        }
    }
}

/// A call with typed arguments: `$f(w 1, l %t2, ...)`. Sub-word argument
/// types are promoted to `w`; the callee narrows on entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOperand {
    pub func: Operand,
    pub args: Vec<(String, Operand)>,
    pub variadic: bool,
}

impl fmt::Display for CallOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func)?;
        for (i, (ty, arg)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", promote(ty), arg)?;
        }
        if self.variadic {
            write!(f, ", ...")?;
        }
        write!(f, ")")
    }
}

/// Sub-word parameter types are rewritten to `w` in signatures and calls.
pub(crate) fn promote(ty: &str) -> &str {
    match ty {
        "b" | "h" => "w",
        _ => ty,
    }
}

/// One `(type, repeat)` entry of an aggregate ABI layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEntry {
    pub ty: String,
    pub n: u64,
}

/// The ABI layout of an aggregate passed or returned by value. Two source
/// types with the same layout share one IR aggregate type.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLayout(pub Vec<CompositeEntry>);

impl CompositeLayout {
    /// Canonical identifier: entry types concatenated, multi-character
    /// entries wrapped in `X`/`Y` acting as parentheses, repeat counts >1
    /// appended.
    pub fn ident(&self) -> String {
        let mut b = String::from(":");
        for entry in &self.0 {
            if entry.ty.len() > 1 {
                b.push('X');
                b.push_str(&entry.ty);
                b.push('Y');
            } else {
                b.push_str(&entry.ty);
            }
            if entry.n > 1 {
                b.push_str(&entry.n.to_string());
            }
        }
        b
    }

    fn body(&self) -> String {
        let mut b = String::from("{ ");
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                b.push_str(", ");
            }
            b.push_str(&entry.ty);
            if entry.n > 1 {
                b.push_str(&format!(" {}", entry.n));
            }
        }
        b.push_str(" }");
        b
    }
}

/// Serialize string bytes as an IR data definition body: printable ASCII
/// as contiguous `b "…"` runs, everything else (including the trailing
/// NUL) as individual `b N` entries.
pub(crate) fn string_data(bytes: &[u8]) -> String {
    let mut b = String::from("{");
    let mut in_str = false;
    let mut all = bytes.to_vec();
    all.push(0);
    for (i, &ch) in all.iter().enumerate() {
        if (b' '..=b'~').contains(&ch) {
            if !in_str {
                if i > 0 {
                    b.push(',');
                }
                b.push_str(" b \"");
                in_str = true;
            }
            b.push(ch as char);
        } else {
            if in_str {
                b.push('"');
                in_str = false;
            }
            if i > 0 {
                b.push(',');
            }
            b.push_str(&format!(" b {ch}"));
        }
    }
    b.push_str(" }");
    b
}

impl Compiler {
    pub(crate) fn temp(&mut self) -> u32 {
        self.temp += 1;
        self.temp
    }

    pub(crate) fn block(&mut self) -> u32 {
        self.blk += 1;
        self.blk
    }

    /// Write one instruction, optionally binding a result temporary with
    /// the given class letter (or `:aggregate` name). Everything after a
    /// `ret` is unreachable and silently dropped until the next block
    /// label.
    pub(crate) fn insn(&mut self, ret: Option<(u32, &str)>, op: &str, operands: &[Operand]) {
        if self.terminated {
            return;
        }
        let mut b = String::from(op);
        for (i, operand) in operands.iter().enumerate() {
            if i > 0 {
                b.push(',');
            }
            b.push(' ');
            b.push_str(&operand.to_string());
        }
        match ret {
            None => self.code_out.push_str(&format!("\t{b}\n")),
            Some((t, cls)) => self.code_out.push_str(&format!("\t%t{t} ={cls} {b}\n")),
        }
        self.terminated = op == "ret";
    }

    pub(crate) fn start_block(&mut self, blk: u32) {
        self.code_out.push_str(&format!("@b{blk}\n"));
        self.terminated = false;
    }

    /// Intern a string literal; identical contents share one global.
    pub(crate) fn intern_string(&mut self, bytes: &[u8]) -> Operand {
        let i = match self.str_map.get(bytes) {
            Some(&i) => i,
            None => {
                let i = self.strs.len();
                self.str_map.insert(bytes.to_vec(), i);
                self.strs.push(bytes.to_vec());
                i
            }
        };
        Operand::Global(format!("str{i}"))
    }

    /// Register an aggregate layout, keeping the pool sorted by identifier
    /// and deduplicated.
    pub(crate) fn register_composite(&mut self, layout: CompositeLayout) -> String {
        let ident = layout.ident();
        for i in 0..self.comp.len() {
            match self.comp[i].ident().cmp(&ident) {
                std::cmp::Ordering::Equal => return ident,
                std::cmp::Ordering::Greater => {
                    self.comp.insert(i, layout);
                    return ident;
                }
                std::cmp::Ordering::Less => {}
            }
        }
        self.comp.push(layout);
        ident
    }

    /// Compute and register the ABI layout of an aggregate, returning its
    /// identifier. Nested aggregates register recursively.
    pub(crate) fn composite_ident(&mut self, ty: &ConcreteType) -> String {
        let layout = CompositeLayout(self.layout_entries(ty));
        self.register_composite(layout)
    }

    fn layout_entries(&mut self, ty: &ConcreteType) -> Vec<CompositeEntry> {
        let ty = ty.peel(&self.store).clone();
        match ty {
            ConcreteType::Struct(fields) => {
                let mut entries: Vec<CompositeEntry> = Vec::new();
                for field in &fields {
                    let et = self.entry_ty(&field.ty);
                    match entries.last_mut() {
                        Some(last) if last.ty == et => last.n += 1,
                        _ => entries.push(CompositeEntry { ty: et, n: 1 }),
                    }
                }
                entries
            }
            // A union shares the ABI of its largest member.
            ConcreteType::Union(fields) => {
                if fields.is_empty() {
                    return Vec::new();
                }
                let largest = union_largest(&fields, &self.store).ty.clone();
                self.layout_entries(&largest)
            }
            ConcreteType::Array(elem, n) => vec![CompositeEntry {
                ty: self.entry_ty(&elem),
                n,
            }],
            prim => vec![CompositeEntry {
                ty: prim
                    .ir_storage(&self.store)
                    .expect("[compiler bug] aggregate handled above")
                    .to_string(),
                n: 1,
            }],
        }
    }

    fn entry_ty(&mut self, ty: &ConcreteType) -> String {
        if ty.is_aggregate(&self.store) {
            self.composite_ident(ty)
        } else {
            self.ir_type_name(ty)
        }
    }

    /// The IR type of a value of `ty` as written in signatures, loads and
    /// stores: a storage letter for primitives, the registered aggregate
    /// identifier otherwise.
    pub(crate) fn ir_type_name(&mut self, ty: &ConcreteType) -> String {
        if ty.is_aggregate(&self.store) {
            self.composite_ident(ty)
        } else {
            ty.ir_storage(&self.store)
                .expect("[compiler bug] primitive type without storage letter")
                .to_string()
        }
    }

    /// Flush the pools: aggregate type declarations into the prelude, then
    /// string data and zero-initialized globals after the code body.
    pub(crate) fn finish(&mut self) {
        let comp = mem::take(&mut self.comp);
        for layout in &comp {
            self.types_out
                .push_str(&format!("type {} = {}\n", layout.ident(), layout.body()));
        }

        let strs = mem::take(&mut self.strs);
        for (i, s) in strs.iter().enumerate() {
            self.code_out
                .push_str(&format!("data $str{} = {}\n", i, string_data(s)));
        }

        let data = mem::take(&mut self.data);
        for (name, ty) in &data {
            let m = ty.metrics(&self.store);
            self.code_out.push_str(&format!(
                "data ${} = align {} {{ z {} }}\n",
                name, m.align, m.size
            ));
        }
    }
}
