//! The compiler: symbol tables, namespaces, per-function state and the
//! driver walk over top-level declarations.
//!
//! One `Compiler` owns all tables for a single translation. `compile`
//! resets per-translation state afterwards, so an instance can be reused;
//! on failure the partial output buffers are discarded.

use crate::ast::{FuncDecl, Item, Program, TypeExpr};
use crate::types::{ConcreteType, Field, FuncType, TypeStore};
use anyhow::{bail, Result};
use std::collections::HashMap;

pub mod emit;
mod expr;
mod stmt;

use emit::{promote, CompositeLayout, Operand};

pub struct Compiler {
    types_out: String,
    code_out: String,

    temp: u32,
    blk: u32,
    /// True while the last emitted instruction was `ret`.
    terminated: bool,

    loops: Vec<LoopBlocks>,
    namespaces: Vec<NamespaceData>,
    ns_stack: Vec<usize>,
    vars: HashMap<String, LocalVar>,
    cur_ret: Option<ConcreteType>,

    comp: Vec<CompositeLayout>,
    strs: Vec<Vec<u8>>,
    str_map: HashMap<Vec<u8>, usize>,
    data: Vec<(String, ConcreteType)>,

    pub(crate) store: TypeStore,
}

/// Innermost loop targets for `continue` and `break`.
struct LoopBlocks {
    cont: u32,
    end: u32,
}

struct LocalVar {
    loc: u32,
    ty: ConcreteType,
}

/// A namespace: dotted name prefix plus value and type bindings. Namespaces
/// live in an arena indexed by id so a closed namespace stays reachable
/// through its parent.
struct NamespaceData {
    prefix: String,
    vars: HashMap<String, Binding>,
    typs: HashMap<String, ConcreteType>,
}

enum Binding {
    Ns(usize),
    Var(ConcreteType),
}

/// What a (possibly dotted) name resolves to.
pub(crate) enum Place {
    Local(u32, ConcreteType),
    Global(String, ConcreteType),
    Ns(usize),
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        let mut root = NamespaceData {
            prefix: String::new(),
            vars: HashMap::new(),
            typs: HashMap::new(),
        };
        let base_types = [
            ("I64", ConcreteType::I64),
            ("I32", ConcreteType::I32),
            ("I16", ConcreteType::I16),
            ("I8", ConcreteType::I8),
            ("U64", ConcreteType::U64),
            ("U32", ConcreteType::U32),
            ("U16", ConcreteType::U16),
            ("U8", ConcreteType::U8),
            ("F64", ConcreteType::F64),
            ("F32", ConcreteType::F32),
            ("Bool", ConcreteType::Bool),
        ];
        for (name, ty) in base_types {
            root.typs.insert(name.to_string(), ty);
        }

        Compiler {
            types_out: String::new(),
            code_out: String::new(),
            temp: 0,
            blk: 0,
            terminated: false,
            loops: Vec::new(),
            namespaces: vec![root],
            ns_stack: vec![0],
            vars: HashMap::new(),
            cur_ret: None,
            comp: Vec::new(),
            strs: Vec::new(),
            str_map: HashMap::new(),
            data: Vec::new(),
            store: TypeStore::new(),
        }
    }

    /// Compile one program to IR text. The instance is reset afterwards
    /// whether or not the translation succeeded.
    pub fn compile(&mut self, prog: &Program) -> Result<String> {
        let result = self.compile_program(prog);
        match result {
            Ok(()) => {
                self.finish();
                let out = format!("{}{}", self.types_out, self.code_out);
                *self = Compiler::new();
                Ok(out)
            }
            Err(err) => {
                *self = Compiler::new();
                Err(err)
            }
        }
    }

    fn compile_program(&mut self, prog: &Program) -> Result<()> {
        for item in &prog.items {
            self.compile_item(item)?;
        }
        Ok(())
    }

    fn compile_item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::Function(f) => self.compile_fn(f),
            Item::GlobalVar { extern_, names, ty } => {
                let ct = self.resolve_type(ty)?;
                for name in names {
                    self.declare_global(*extern_, name, ct.clone())?;
                }
                Ok(())
            }
            Item::TypeDef { name, ty } => {
                // Bind the slot first so the body may refer to the type
                // through a pointer.
                let id = self.declare_named_type(name)?;
                let underlying = self.resolve_type(ty)?;
                self.store.assign(id, underlying);
                Ok(())
            }
            Item::TypeAlias { name, ty } => {
                let target = self.resolve_type(ty)?;
                self.declare_alias(name, target)
            }
            Item::Namespace { name, items } => {
                self.start_namespace(name);
                for item in items {
                    self.compile_item(item)?;
                }
                self.end_namespace()
            }
        }
    }

    fn compile_fn(&mut self, f: &FuncDecl) -> Result<()> {
        let mut params = Vec::with_capacity(f.params.len());
        for p in &f.params {
            params.push((p.name.clone(), self.resolve_type(&p.ty)?));
        }
        let ret = match &f.ret {
            Some(t) => Some(self.resolve_type(t)?),
            None => None,
        };
        let fty = ConcreteType::Func(FuncType {
            params: params.iter().map(|(_, t)| t.clone()).collect(),
            ret: ret.clone().map(Box::new),
            variadic: f.variadic,
        });
        self.declare_global(true, &f.name, fty)?;

        if let Some(body) = &f.body {
            self.cur_ret = ret.clone();
            self.start_function(f.export, &f.name, &params, ret.as_ref())?;
            self.lower_stmts(body)?;
            self.end_function();
        }
        Ok(())
    }

    // ---- namespaces and declarations ----

    fn cur_ns(&self) -> &NamespaceData {
        &self.namespaces[*self.ns_stack.last().unwrap()]
    }

    fn start_namespace(&mut self, name: &str) {
        let parent = *self.ns_stack.last().unwrap();
        let prefix = format!("{}{}.", self.namespaces[parent].prefix, name);
        let id = self.namespaces.len();
        self.namespaces.push(NamespaceData {
            prefix,
            vars: HashMap::new(),
            typs: HashMap::new(),
        });
        self.namespaces[parent]
            .vars
            .insert(name.to_string(), Binding::Ns(id));
        self.ns_stack.push(id);
    }

    fn end_namespace(&mut self) -> Result<()> {
        self.ns_stack.pop();
        if self.ns_stack.is_empty() {
            bail!("[compiler bug] End of global namespace");
        }
        Ok(())
    }

    fn declare_global(&mut self, extern_: bool, name: &str, ty: ConcreteType) -> Result<()> {
        let cur = *self.ns_stack.last().unwrap();
        if self.namespaces[cur].vars.contains_key(name) {
            bail!("Variable already exists");
        }
        let full = format!("{}{}", self.namespaces[cur].prefix, name);
        self.namespaces[cur]
            .vars
            .insert(name.to_string(), Binding::Var(ty.clone()));
        if !extern_ {
            self.data.push((full, ty));
        }
        Ok(())
    }

    pub(crate) fn declare_local(&mut self, name: &str, ty: ConcreteType) -> Result<()> {
        if self.vars.contains_key(name) {
            bail!("Variable already exists");
        }
        let loc = self.temp();
        self.vars.insert(
            name.to_string(),
            LocalVar {
                loc,
                ty: ty.clone(),
            },
        );
        self.alloc_local(loc, &ty)?;
        self.gen_zero(&ty, &Operand::Temp(loc));
        Ok(())
    }

    fn declare_named_type(&mut self, name: &str) -> Result<usize> {
        let cur = *self.ns_stack.last().unwrap();
        if self.namespaces[cur].typs.contains_key(name) {
            bail!("Type already exists");
        }
        let id = self.store.alloc(name);
        self.namespaces[cur]
            .typs
            .insert(name.to_string(), ConcreteType::Named(id));
        Ok(id)
    }

    fn declare_alias(&mut self, name: &str, target: ConcreteType) -> Result<()> {
        let cur = *self.ns_stack.last().unwrap();
        if self.namespaces[cur].typs.contains_key(name) {
            bail!("Type already exists");
        }
        self.namespaces[cur].typs.insert(name.to_string(), target);
        Ok(())
    }

    /// Resolve a single name: the local frame first, then the current
    /// namespace, then the root.
    pub(crate) fn lookup_name(&self, name: &str) -> Result<Place> {
        if let Some(v) = self.vars.get(name) {
            return Ok(Place::Local(v.loc, v.ty.clone()));
        }
        let cur = *self.ns_stack.last().unwrap();
        for ns in [cur, 0] {
            match self.namespaces[ns].vars.get(name) {
                Some(Binding::Var(ty)) => {
                    return Ok(Place::Global(
                        format!("{}{}", self.namespaces[ns].prefix, name),
                        ty.clone(),
                    ))
                }
                Some(Binding::Ns(id)) => return Ok(Place::Ns(*id)),
                None => {}
            }
        }
        bail!("Undefined variable: {name}");
    }

    /// Resolve a member of a namespace reached through a dotted path.
    pub(crate) fn ns_member(&self, ns: usize, name: &str) -> Result<Place> {
        let data = &self.namespaces[ns];
        match data.vars.get(name) {
            Some(Binding::Var(ty)) => Ok(Place::Global(
                format!("{}{}", data.prefix, name),
                ty.clone(),
            )),
            Some(Binding::Ns(id)) => Ok(Place::Ns(*id)),
            None => bail!("Undefined variable: {}{}", data.prefix, name),
        }
    }

    fn lookup_type(&self, path: &[String]) -> Result<ConcreteType> {
        let (name, prefix) = path.split_last().unwrap();
        if prefix.is_empty() {
            if let Some(ty) = self.cur_ns().typs.get(name) {
                return Ok(ty.clone());
            }
        }
        let mut ns = 0usize;
        for elem in prefix {
            match self.namespaces[ns].vars.get(elem) {
                Some(Binding::Ns(id)) => ns = *id,
                _ => bail!("{elem} is not a namespace"),
            }
        }
        match self.namespaces[ns].typs.get(name) {
            Some(ty) => Ok(ty.clone()),
            None => bail!("Unknown type: {name}"),
        }
    }

    pub(crate) fn resolve_type(&mut self, t: &TypeExpr) -> Result<ConcreteType> {
        Ok(match t {
            TypeExpr::Name(path) => self.lookup_type(path)?,
            TypeExpr::Pointer(None) => ConcreteType::Pointer(None),
            TypeExpr::Pointer(Some(inner)) => {
                ConcreteType::Pointer(Some(Box::new(self.resolve_type(inner)?)))
            }
            TypeExpr::Array(elem, n) => {
                ConcreteType::Array(Box::new(self.resolve_type(elem)?), *n)
            }
            TypeExpr::Func { params, ret } => {
                let mut ps = Vec::with_capacity(params.len());
                for p in params {
                    ps.push(self.resolve_type(p)?);
                }
                let ret = match ret {
                    Some(r) => Some(Box::new(self.resolve_type(r)?)),
                    None => None,
                };
                ConcreteType::Func(FuncType {
                    params: ps,
                    ret,
                    variadic: false,
                })
            }
            TypeExpr::Struct(groups) => ConcreteType::Struct(self.resolve_fields(groups)?),
            TypeExpr::Union(groups) => ConcreteType::Union(self.resolve_fields(groups)?),
        })
    }

    fn resolve_fields(&mut self, groups: &[crate::ast::FieldGroup]) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        for group in groups {
            let ty = self.resolve_type(&group.ty)?;
            for name in &group.names {
                fields.push(Field {
                    name: name.clone(),
                    ty: ty.clone(),
                });
            }
        }
        Ok(fields)
    }

    // ---- functions ----

    fn start_function(
        &mut self,
        export: bool,
        name: &str,
        params: &[(String, ConcreteType)],
        ret: Option<&ConcreteType>,
    ) -> Result<()> {
        let prefix = if export { "export " } else { "" };

        let mut pbuild = String::new();
        let mut ptemps = Vec::with_capacity(params.len());
        for (i, (_, pty)) in params.iter().enumerate() {
            if i > 0 {
                pbuild.push_str(", ");
            }
            let tn = self.ir_type_name(pty);
            pbuild.push_str(promote(&tn));
            let t = self.temp();
            ptemps.push(t);
            pbuild.push_str(&format!(" %t{t}"));
        }

        let ret_s = match ret {
            Some(rt) => {
                let tn = self.ir_type_name(rt);
                format!("{} ", promote(&tn))
            }
            None => String::new(),
        };

        let full = format!("{}{}", self.cur_ns().prefix, name);
        self.code_out
            .push_str(&format!("{prefix}function {ret_s}${full}({pbuild}) {{\n@start\n"));

        // Primitive parameters are spilled to a slot so they are
        // addressable; aggregate parameters bind their incoming pointer.
        for ((pname, pty), &pt) in params.iter().zip(&ptemps) {
            if pty.ir_base(&self.store).is_some() {
                let loc = self.temp();
                self.alloc_local(loc, pty)?;
                let st = format!("store{}", self.ir_type_name(pty));
                self.insn(None, &st, &[Operand::Temp(pt), Operand::Temp(loc)]);
                self.vars.insert(
                    pname.clone(),
                    LocalVar {
                        loc,
                        ty: pty.clone(),
                    },
                );
            } else {
                self.vars.insert(
                    pname.clone(),
                    LocalVar {
                        loc: pt,
                        ty: pty.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    fn end_function(&mut self) {
        if !self.terminated {
            self.insn(None, "ret", &[]);
        }
        self.code_out.push_str("}\n");

        self.temp = 0;
        self.blk = 0;
        self.terminated = false;
        self.vars.clear();
        self.cur_ret = None;
    }

    pub(crate) fn alloc_local(&mut self, loc: u32, ty: &ConcreteType) -> Result<()> {
        let m = ty.metrics(&self.store);
        let op = match m.align {
            0..=4 => "alloc4",
            5..=8 => "alloc8",
            9..=16 => "alloc16",
            _ => bail!("Invalid alignment"),
        };
        self.insn(Some((loc, "l")), op, &[Operand::Const(m.size as i64)]);
        Ok(())
    }
}
