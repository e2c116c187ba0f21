//! Type checking and expression lowering.
//!
//! Every expression lowers to either a value temporary of some register
//! class, or — for aggregates — a pointer to its storage. `gen_expr`
//! produces values, `gen_addr` produces lvalue addresses; aggregate-typed
//! places are their own value.

use super::emit::{CallOperand, Operand};
use super::{Compiler, Place};
use crate::ast::{BinOp, Expr, PrefixOp, TypeExpr};
use crate::types::{
    compatible, struct_offsets, ConcreteType, Type,
};
use anyhow::{anyhow, bail, Result};

/// How a field is reached from its receiver.
enum FieldBase {
    /// The receiver is the struct or union itself.
    Direct,
    /// The receiver is a pointer; dereference implicitly.
    ViaPointer,
}

impl Compiler {
    // ---- type checking ----

    /// The type of an expression, or `None` for calls of void functions.
    pub(crate) fn type_of(&mut self, e: &Expr) -> Result<Option<Type>> {
        match e {
            Expr::Int(_) => Ok(Some(Type::IntLit)),
            Expr::Float(_) => Ok(Some(Type::FloatLit)),
            Expr::Str(_) => Ok(Some(Type::Concrete(ConcreteType::Pointer(Some(
                Box::new(ConcreteType::I8),
            ))))),
            Expr::Var(name) => match self.lookup_name(name)? {
                Place::Local(_, ty) | Place::Global(_, ty) => Ok(Some(Type::Concrete(ty))),
                Place::Ns(_) => bail!("{name} is not a variable"),
            },
            Expr::Field(recv, fname) => {
                if let Some(place) = self.resolve_place(e)? {
                    return match place {
                        Place::Local(_, ty) | Place::Global(_, ty) => {
                            Ok(Some(Type::Concrete(ty)))
                        }
                        Place::Ns(_) => bail!("{} is not a variable", path_name(e)),
                    };
                }
                let (_, ty, _) = self.field_of(recv, fname)?;
                Ok(Some(Type::Concrete(ty)))
            }
            Expr::Ref(inner) => match self.value_type_of(inner)? {
                Type::Concrete(c) => Ok(Some(Type::Concrete(ConcreteType::Pointer(Some(
                    Box::new(c),
                ))))),
                _ => bail!("Expression is not an lvalue"),
            },
            Expr::Deref(inner) => {
                let ty = self.value_type_of(inner)?;
                let c = match ty {
                    Type::Concrete(c) => c,
                    _ => bail!("Dereference of non-pointer type"),
                };
                match c.peel(&self.store) {
                    ConcreteType::Pointer(None) => {
                        bail!("Generic pointer may not be dereferenced")
                    }
                    ConcreteType::Pointer(Some(to)) => Ok(Some(Type::Concrete((**to).clone()))),
                    ConcreteType::Array(elem, _) => Ok(Some(Type::Concrete((**elem).clone()))),
                    _ => bail!("Dereference of non-pointer type"),
                }
            }
            Expr::Prefix(_, inner) => Ok(Some(self.value_type_of(inner)?)),
            Expr::Binary(op, l, r) => Ok(Some(self.binary_type(*op, l, r)?)),
            Expr::Call(f, _) => {
                let fty = self.callee_type(f)?;
                Ok(fty.ret.map(|r| Type::Concrete(*r)))
            }
            Expr::Cast(_, texpr) => {
                let target = self.resolve_type(texpr)?;
                Ok(Some(Type::Concrete(target)))
            }
        }
    }

    /// `type_of`, where a value is required.
    pub(crate) fn value_type_of(&mut self, e: &Expr) -> Result<Type> {
        self.type_of(e)?
            .ok_or_else(|| anyhow!("Cannot use void value in expression"))
    }

    /// Resolve a `Var`/`Field` chain through the symbol tables. `Some` for
    /// plain variables and namespace members; `None` when the chain is an
    /// actual field access (or not a name chain at all).
    pub(crate) fn resolve_place(&mut self, e: &Expr) -> Result<Option<Place>> {
        match e {
            Expr::Var(name) => Ok(Some(self.lookup_name(name)?)),
            Expr::Field(recv, fname) => match self.resolve_place(recv)? {
                Some(Place::Ns(id)) => Ok(Some(self.ns_member(id, fname)?)),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Offset, type and access mode of a struct or union field. Union
    /// members all live at offset zero.
    fn field_of(&mut self, recv: &Expr, fname: &str) -> Result<(u64, ConcreteType, FieldBase)> {
        let rt = self.value_type_of(recv)?;
        let c = match rt {
            Type::Concrete(c) => c,
            _ => bail!("Field access on non-struct type"),
        };
        let peeled = c.peel(&self.store).clone();
        let (target, base) = match peeled {
            ConcreteType::Struct(_) | ConcreteType::Union(_) => (peeled, FieldBase::Direct),
            ConcreteType::Pointer(Some(inner)) => {
                ((*inner).peel(&self.store).clone(), FieldBase::ViaPointer)
            }
            _ => bail!("Field access on non-struct type"),
        };
        match target {
            ConcreteType::Struct(fields) => {
                let offsets = struct_offsets(&fields, &self.store);
                for (field, off) in fields.iter().zip(offsets) {
                    if field.name == fname {
                        return Ok((off, field.ty.clone(), base));
                    }
                }
                bail!("Unknown field: {fname}");
            }
            ConcreteType::Union(fields) => {
                for field in &fields {
                    if field.name == fname {
                        return Ok((0, field.ty.clone(), base));
                    }
                }
                bail!("Unknown field: {fname}");
            }
            _ => bail!("Field access on non-struct type"),
        }
    }

    /// If `t` may stand on the pointer side of pointer arithmetic, the
    /// resulting pointer type: pointers stay themselves, arrays decay to a
    /// pointer to their element.
    fn as_pointer_arith(&self, t: &Type) -> Option<ConcreteType> {
        if let Type::Concrete(c) = t {
            match c.peel(&self.store) {
                ConcreteType::Pointer(_) => Some(c.clone()),
                ConcreteType::Array(elem, _) => Some(ConcreteType::Pointer(Some(elem.clone()))),
                _ => None,
            }
        } else {
            None
        }
    }

    fn is_integer_operand(&self, t: &Type) -> bool {
        match t {
            Type::IntLit => true,
            Type::Concrete(c) => c.peel(&self.store).is_integer(),
            Type::FloatLit => false,
        }
    }

    /// The type of a binary expression, after validating operand
    /// compatibility and the operator's operand-kind rules.
    pub(crate) fn binary_type(&mut self, op: BinOp, l: &Expr, r: &Expr) -> Result<Type> {
        let lt = self.value_type_of(l)?;
        let rt = self.value_type_of(r)?;

        // Pointer arithmetic: pointer ± integer, scaled by element size.
        let lp = self.as_pointer_arith(&lt);
        let rp = self.as_pointer_arith(&rt);
        if lp.is_some() || rp.is_some() {
            if lp.is_some() && rp.is_some() {
                bail!("Arithmetic between two pointers is not supported");
            }
            let ptr_on_left = lp.is_some();
            let (result, int_ty) = match lp {
                Some(res) => (res, &rt),
                None => (rp.unwrap(), &lt),
            };
            match op {
                BinOp::Add => {}
                // Only pointer-minus-integer makes sense.
                BinOp::Sub if ptr_on_left => {}
                _ => bail!("Operands of binary expression are incompatible"),
            }
            if !self.is_integer_operand(int_ty) {
                bail!("Operands of binary expression are incompatible");
            }
            return Ok(Type::Concrete(result));
        }

        if !compatible(&lt, &rt, &self.store) {
            bail!("Operands of binary expression are incompatible");
        }

        let result = if lt.is_concrete() {
            lt
        } else if rt.is_concrete() {
            rt.clone()
        } else {
            lt
        };

        let concrete = result.concrete();
        let peeled = concrete.peel(&self.store);
        if !peeled.is_numeric() {
            bail!("Operand of binary expression is of non-numeric type");
        }
        if !op.is_arithmetic() && !peeled.is_integer() {
            bail!("Operand of binary expression must be of integer type");
        }
        if op.is_shift() {
            if let Type::Concrete(c) = &rt {
                if c.metrics(&self.store).size > 4 {
                    bail!("Shift amount must fit in a word");
                }
            }
        }
        Ok(result)
    }

    /// The function type a call target must have: a function, or a pointer
    /// to one.
    fn callee_type(&mut self, f: &Expr) -> Result<crate::types::FuncType> {
        let ty = self.value_type_of(f)?;
        let c = match ty {
            Type::Concrete(c) => c,
            _ => bail!("Invalid function type"),
        };
        match c.peel(&self.store) {
            ConcreteType::Func(ft) => Ok(ft.clone()),
            ConcreteType::Pointer(Some(to)) => match to.peel(&self.store) {
                ConcreteType::Func(ft) => Ok(ft.clone()),
                _ => bail!("Invalid function type"),
            },
            _ => bail!("Invalid function type"),
        }
    }

    // ---- lowering ----

    /// Lower an expression to a value operand. `ctx` supplies the concrete
    /// type literal operands inherit; aggregate-typed places yield the
    /// pointer to their storage.
    pub(crate) fn gen_expr(&mut self, e: &Expr, ctx: Option<&ConcreteType>) -> Result<Operand> {
        match e {
            Expr::Int(n) => Ok(Operand::Const(*n)),
            Expr::Float(_) => bail!("Float literals are not supported"),
            Expr::Str(bytes) => Ok(self.intern_string(bytes)),
            Expr::Var(_) | Expr::Field(..) | Expr::Deref(_) => {
                let ty = match self.value_type_of(e)? {
                    Type::Concrete(c) => c,
                    _ => bail!("Expression is not an lvalue"),
                };
                if ty.is_aggregate(&self.store) {
                    return self.gen_addr(e);
                }
                let addr = self.gen_addr(e)?;
                let base = ty
                    .ir_base(&self.store)
                    .expect("[compiler bug] primitive type without register class");
                let op = ty.load_op(&self.store).unwrap();
                let t = self.temp();
                self.insn(Some((t, &base.to_string())), op, &[addr]);
                Ok(Operand::Temp(t))
            }
            Expr::Ref(inner) => self.gen_addr(inner),
            Expr::Prefix(op, inner) => self.gen_prefix(*op, inner, ctx),
            Expr::Binary(op, l, r) => self.gen_binary(*op, l, r, ctx),
            Expr::Call(f, args) => {
                let (val, _) = self.gen_call(f, args)?;
                val.ok_or_else(|| anyhow!("Cannot use void value in expression"))
            }
            Expr::Cast(inner, texpr) => self.gen_cast(inner, texpr),
        }
    }

    /// Lower an lvalue expression to the address of its storage.
    pub(crate) fn gen_addr(&mut self, e: &Expr) -> Result<Operand> {
        match e {
            Expr::Var(name) => match self.lookup_name(name)? {
                Place::Local(loc, _) => Ok(Operand::Temp(loc)),
                Place::Global(full, _) => Ok(Operand::Global(full)),
                Place::Ns(_) => bail!("{name} is not a variable"),
            },
            Expr::Field(recv, fname) => {
                if let Some(place) = self.resolve_place(e)? {
                    return match place {
                        Place::Local(loc, _) => Ok(Operand::Temp(loc)),
                        Place::Global(full, _) => Ok(Operand::Global(full)),
                        Place::Ns(_) => bail!("{} is not a variable", path_name(e)),
                    };
                }
                let (off, _, mode) = self.field_of(recv, fname)?;
                let base = match mode {
                    FieldBase::Direct => self.gen_addr(recv)?,
                    FieldBase::ViaPointer => self.gen_expr(recv, None)?,
                };
                Ok(self.offset_addr(&base, off))
            }
            Expr::Deref(inner) => {
                // Validates pointee-ness and rejects the generic pointer.
                self.type_of(e)?;
                self.gen_expr(inner, None)
            }
            _ => bail!("Expression is not an lvalue"),
        }
    }

    /// `base + off`, skipping the add at offset zero.
    pub(crate) fn offset_addr(&mut self, base: &Operand, off: u64) -> Operand {
        if off == 0 {
            return base.clone();
        }
        let t = self.temp();
        self.insn(
            Some((t, "l")),
            "add",
            &[base.clone(), Operand::Const(off as i64)],
        );
        Operand::Temp(t)
    }

    fn gen_prefix(&mut self, op: PrefixOp, inner: &Expr, ctx: Option<&ConcreteType>) -> Result<Operand> {
        let ity = self.value_type_of(inner)?;
        let cty = match (&ity, ctx) {
            (Type::Concrete(c), _) => c.clone(),
            (_, Some(c)) => (*c).clone(),
            _ => ity.concrete(),
        };
        let base = cty
            .ir_base(&self.store)
            .ok_or_else(|| anyhow!("Operand of binary expression is of non-numeric type"))?;
        let v = self.gen_expr(inner, Some(&cty))?;
        let cls = base.to_string();
        let t = self.temp();
        match op {
            PrefixOp::Not => {
                let opcode = format!("ceq{base}");
                self.insn(Some((t, &cls)), &opcode, &[Operand::Const(0), v]);
            }
            PrefixOp::BitNot => self.insn(Some((t, &cls)), "xor", &[Operand::Const(-1), v]),
            PrefixOp::Neg => self.insn(Some((t, &cls)), "sub", &[Operand::Const(0), v]),
            PrefixOp::Plus => self.insn(Some((t, &cls)), "copy", &[v]),
        }
        Ok(Operand::Temp(t))
    }

    /// A value used to index a pointer: loaded, then widened to `l` when
    /// its type is narrower than 64 bits.
    fn gen_index_value(&mut self, e: &Expr) -> Result<Operand> {
        let ity = self.value_type_of(e)?;
        let v = self.gen_expr(e, None)?;
        if let Type::Concrete(c) = ity {
            let p = c.peel(&self.store);
            if p.is_integer() && p.metrics(&self.store).size < 8 {
                let op = if p.is_signed_int() { "extsw" } else { "extuw" };
                let t = self.temp();
                self.insn(Some((t, "l")), op, &[v]);
                return Ok(Operand::Temp(t));
            }
        }
        Ok(v)
    }

    /// Pointer ± integer with element-size scaling. `addr`-free: operates
    /// on the already-evaluated pointer value.
    pub(crate) fn gen_pointer_offset(
        &mut self,
        op: BinOp,
        pval: Operand,
        result_ty: &ConcreteType,
        index: &Expr,
    ) -> Result<Operand> {
        let elem_size = match result_ty.peel(&self.store) {
            ConcreteType::Pointer(Some(to)) => to.metrics(&self.store).size,
            _ => 1,
        };
        let n = self.gen_index_value(index)?;
        let scaled = if elem_size > 1 {
            let t = self.temp();
            self.insn(
                Some((t, "l")),
                "mul",
                &[Operand::Const(elem_size as i64), n],
            );
            Operand::Temp(t)
        } else {
            n
        };
        let opcode = if op == BinOp::Sub { "sub" } else { "add" };
        let t = self.temp();
        self.insn(Some((t, "l")), opcode, &[pval, scaled]);
        Ok(Operand::Temp(t))
    }

    fn gen_binary(
        &mut self,
        op: BinOp,
        l: &Expr,
        r: &Expr,
        ctx: Option<&ConcreteType>,
    ) -> Result<Operand> {
        let ty = self.binary_type(op, l, r)?;

        // Pointer arithmetic lowers through the scaling path.
        if let Type::Concrete(c) = &ty {
            if matches!(c.peel(&self.store), ConcreteType::Pointer(_))
                && matches!(op, BinOp::Add | BinOp::Sub)
            {
                let lt = self.value_type_of(l)?;
                let (ptr_side, int_side) = if self.as_pointer_arith(&lt).is_some() {
                    (l, r)
                } else {
                    (r, l)
                };
                let c = c.clone();
                let pv = self.gen_expr(ptr_side, None)?;
                return self.gen_pointer_offset(op, pv, &c, int_side);
            }
        }

        let cty = match &ty {
            Type::Concrete(c) => c.clone(),
            _ => match ctx {
                Some(c) => (*c).clone(),
                None => ty.concrete(),
            },
        };
        let base = cty
            .ir_base(&self.store)
            .ok_or_else(|| anyhow!("Operand of binary expression is of non-numeric type"))?;
        let cls = base.to_string();
        let unsigned = cty.peel(&self.store).is_unsigned_int();

        if matches!(op, BinOp::LAnd | BinOp::LOr) {
            // Short-circuit: the same temporary is bound on both arms.
            let lv = self.gen_expr(l, Some(&cty))?;
            let t = self.temp();
            self.insn(Some((t, &cls)), "copy", &[lv]);
            let rhs_b = self.block();
            let end_b = self.block();
            match op {
                BinOp::LAnd => self.insn(
                    None,
                    "jnz",
                    &[Operand::Temp(t), Operand::Block(rhs_b), Operand::Block(end_b)],
                ),
                _ => self.insn(
                    None,
                    "jnz",
                    &[Operand::Temp(t), Operand::Block(end_b), Operand::Block(rhs_b)],
                ),
            }
            self.start_block(rhs_b);
            let rv = self.gen_expr(r, Some(&cty))?;
            self.insn(Some((t, &cls)), "copy", &[rv]);
            self.start_block(end_b);
            return Ok(Operand::Temp(t));
        }

        let lv = self.gen_expr(l, Some(&cty))?;
        let rv = self.gen_expr(r, Some(&cty))?;
        let opcode = binop_opcode(op, base, unsigned);
        let t = self.temp();
        self.insn(Some((t, &cls)), &opcode, &[lv, rv]);
        Ok(Operand::Temp(t))
    }

    pub(crate) fn gen_call(
        &mut self,
        f: &Expr,
        args: &[Expr],
    ) -> Result<(Option<Operand>, Option<ConcreteType>)> {
        let fty = self.callee_type(f)?;
        let name = path_name(f);

        // Declared functions are called through their global directly;
        // anything else evaluates to a function address first.
        let callee = match self.resolve_place(f)? {
            Some(Place::Global(full, ty))
                if matches!(ty.peel(&self.store), ConcreteType::Func(_)) =>
            {
                Operand::Global(full)
            }
            _ => self.gen_expr(f, None)?,
        };

        if args.len() < fty.params.len() || (!fty.variadic && args.len() > fty.params.len()) {
            bail!("Wrong number of arguments in call to {name}");
        }

        let mut cargs = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let pty = if i < fty.params.len() {
                let pty = fty.params[i].clone();
                let at = self.value_type_of(arg)?;
                if !compatible(&at, &Type::Concrete(pty.clone()), &self.store) {
                    bail!(
                        "Type error in call to {}: {} is not {}",
                        name,
                        at.display(&self.store),
                        pty.display(&self.store)
                    );
                }
                pty
            } else {
                // Variadic extras take their own expression type.
                self.value_type_of(arg)?.concrete()
            };
            let letter = self.ir_type_name(&pty);
            let v = self.gen_expr(arg, Some(&pty))?;
            cargs.push((letter, v));
        }

        let callop = Operand::Call(Box::new(CallOperand {
            func: callee,
            args: cargs,
            variadic: fty.variadic,
        }));

        match fty.ret {
            None => {
                self.insn(None, "call", &[callop]);
                Ok((None, None))
            }
            Some(rt) => {
                let rt = *rt;
                let cls = if rt.is_aggregate(&self.store) {
                    self.composite_ident(&rt)
                } else {
                    rt.ir_base(&self.store)
                        .expect("[compiler bug] primitive type without register class")
                        .to_string()
                };
                let t = self.temp();
                self.insn(Some((t, &cls)), "call", &[callop]);
                Ok((Some(Operand::Temp(t)), Some(rt)))
            }
        }
    }

    /// The one primitive cast: integer to integer. Same-size casts
    /// reinterpret, widening extends by source signedness, narrowing to a
    /// sub-word type round-trips through a slot at the narrow width.
    fn gen_cast(&mut self, inner: &Expr, texpr: &TypeExpr) -> Result<Operand> {
        let target = self.resolve_type(texpr)?;
        let tp = target.peel(&self.store).clone();
        if !tp.is_integer() && tp != ConcreteType::Bool {
            bail!("Invalid cast");
        }

        let src = self.value_type_of(inner)?;
        let sc = match &src {
            Type::Concrete(c) => c.clone(),
            // A literal simply adopts the target type.
            Type::IntLit => return self.gen_expr(inner, Some(&target)),
            Type::FloatLit => bail!("Invalid cast"),
        };
        let sp = sc.peel(&self.store).clone();
        if !sp.is_integer() && sp != ConcreteType::Bool {
            bail!("Invalid cast");
        }

        let v = self.gen_expr(inner, Some(&sc))?;
        let ss = sp.metrics(&self.store).size;
        let ts = tp.metrics(&self.store).size;

        if ts == 8 && ss < 8 {
            let op = if sp.is_signed_int() { "extsw" } else { "extuw" };
            let t = self.temp();
            self.insn(Some((t, "l")), op, &[v]);
            Ok(Operand::Temp(t))
        } else if ts < 4 && ts < ss {
            let slot = self.temp();
            self.insn(Some((slot, "l")), "alloc4", &[Operand::Const(ts as i64)]);
            let st = format!("store{}", tp.ir_storage(&self.store).unwrap());
            self.insn(None, &st, &[v, Operand::Temp(slot)]);
            let t = self.temp();
            self.insn(
                Some((t, "w")),
                tp.load_op(&self.store).unwrap(),
                &[Operand::Temp(slot)],
            );
            Ok(Operand::Temp(t))
        } else {
            // Same size, or a wide value used at a narrower register
            // class: the bits pass through.
            Ok(v)
        }
    }
}

/// Source rendering of a callee or place path, for diagnostics.
pub(crate) fn path_name(e: &Expr) -> String {
    match e {
        Expr::Var(name) => name.clone(),
        Expr::Field(recv, f) => format!("{}.{}", path_name(recv), f),
        _ => "function".to_string(),
    }
}

/// Pick the opcode for a non-short-circuit binary operator at the given
/// register class, using the unsigned families where the operand type asks
/// for them.
pub(crate) fn binop_opcode(op: BinOp, base: char, unsigned: bool) -> String {
    match op {
        BinOp::Add => "add".into(),
        BinOp::Sub => "sub".into(),
        BinOp::Mul => "mul".into(),
        BinOp::Div => if unsigned { "udiv" } else { "div" }.into(),
        BinOp::Rem => if unsigned { "urem" } else { "rem" }.into(),
        BinOp::Or => "or".into(),
        BinOp::Xor => "xor".into(),
        BinOp::And => "and".into(),
        BinOp::Shl => "shl".into(),
        BinOp::Shr => if unsigned { "shr" } else { "sar" }.into(),
        BinOp::Eq => format!("ceq{base}"),
        BinOp::Ne => format!("cne{base}"),
        BinOp::Lt => format!("c{}lt{base}", if unsigned { 'u' } else { 's' }),
        BinOp::Gt => format!("c{}gt{base}", if unsigned { 'u' } else { 's' }),
        BinOp::Le => format!("c{}le{base}", if unsigned { 'u' } else { 's' }),
        BinOp::Ge => format!("c{}ge{base}", if unsigned { 'u' } else { 's' }),
        BinOp::LAnd | BinOp::LOr => {
            unreachable!("short-circuit operators lower through blocks")
        }
    }
}
