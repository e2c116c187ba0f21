//! Statement and control-flow lowering.
//!
//! Block plumbing follows a fixed shape: `if` allocates a then/else/end
//! triple, loops a header/body/end triple (plus a post block when the loop
//! has a post clause, which is also where `continue` lands). A `jmp` or
//! `jnz` never ends emission — only `ret` does — so statements following
//! `break`/`continue` open a fresh block.

use super::emit::Operand;
use super::{Compiler, LoopBlocks};
use crate::ast::{BinOp, ElseArm, Expr, IfStmt, Stmt};
use crate::types::{struct_offsets, union_largest, ConcreteType, Type};
use anyhow::{anyhow, bail, Result};

impl Compiler {
    pub(crate) fn lower_stmts(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Var { names, ty } => {
                let ct = self.resolve_type(ty)?;
                for name in names {
                    self.declare_local(name, ct.clone())?;
                }
                Ok(())
            }
            Stmt::Assign { target, value } => self.lower_assign(target, value),
            Stmt::OpAssign { op, target, value } => self.lower_op_assign(*op, target, value),
            Stmt::IncDec { target, inc } => {
                let one = Expr::Int(1);
                let op = if *inc { BinOp::Add } else { BinOp::Sub };
                self.lower_op_assign(op, target, &one)
            }
            Stmt::Expr { expr, discard } => {
                let ty = self.type_of(expr)?;
                if ty.is_some() && !discard {
                    bail!("Expression returning non-void cannot be used as statement");
                }
                if let Expr::Call(f, args) = expr {
                    self.gen_call(f, args)?;
                } else if ty.is_some() {
                    self.gen_expr(expr, None)?;
                }
                Ok(())
            }
            Stmt::If(ifs) => self.lower_if(ifs),
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => self.lower_for(init.as_deref(), cond.as_ref(), post.as_deref(), body),
            Stmt::Break => {
                let end = self
                    .loops
                    .last()
                    .ok_or_else(|| anyhow!("Break outside of loop"))?
                    .end;
                self.insn(None, "jmp", &[Operand::Block(end)]);
                let b = self.block();
                self.start_block(b);
                Ok(())
            }
            Stmt::Continue => {
                let cont = self
                    .loops
                    .last()
                    .ok_or_else(|| anyhow!("Continue outside of loop"))?
                    .cont;
                self.insn(None, "jmp", &[Operand::Block(cont)]);
                let b = self.block();
                self.start_block(b);
                Ok(())
            }
            Stmt::Return(value) => self.lower_return(value.as_ref()),
        }
    }

    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> Result<()> {
        let lt = match self.type_of(target)? {
            Some(Type::Concrete(c)) => c,
            _ => bail!("Lvalue of non-concrete type"),
        };
        let rt = self.value_type_of(value)?;
        if !crate::types::compatible(&Type::Concrete(lt.clone()), &rt, &self.store) {
            bail!("Operands of assignment are incompatible");
        }

        let addr = self.gen_addr(target)?;
        if lt.is_aggregate(&self.store) {
            let src = self.gen_expr(value, Some(&lt))?;
            let size = lt.metrics(&self.store).size;
            self.insn(None, "blit", &[src, addr, Operand::Const(size as i64)]);
        } else {
            let v = self.gen_expr(value, Some(&lt))?;
            let st = format!("store{}", lt.ir_storage(&self.store).unwrap());
            self.insn(None, &st, &[v, addr]);
        }
        Ok(())
    }

    /// `x op= y` as load-modify-store; pointer targets scale the right
    /// operand by the element size.
    fn lower_op_assign(&mut self, op: BinOp, target: &Expr, value: &Expr) -> Result<()> {
        let lt = match self.type_of(target)? {
            Some(Type::Concrete(c)) => c,
            _ => bail!("Lvalue of non-concrete type"),
        };
        if matches!(lt.peel(&self.store), ConcreteType::Array(..)) {
            bail!("Cannot assign to an array");
        }
        let result = self.binary_type(op, target, value)?;

        let addr = self.gen_addr(target)?;
        if matches!(lt.peel(&self.store), ConcreteType::Pointer(_)) {
            let result = result.concrete();
            let t = self.temp();
            self.insn(Some((t, "l")), "loadl", &[addr.clone()]);
            let new = self.gen_pointer_offset(op, Operand::Temp(t), &result, value)?;
            self.insn(None, "storel", &[new, addr]);
            return Ok(());
        }

        let base = lt
            .ir_base(&self.store)
            .ok_or_else(|| anyhow!("Operand of binary expression is of non-numeric type"))?;
        let cls = base.to_string();
        let unsigned = lt.peel(&self.store).is_unsigned_int();
        let t = self.temp();
        self.insn(
            Some((t, &cls)),
            lt.load_op(&self.store).unwrap(),
            &[addr.clone()],
        );
        let rv = self.gen_expr(value, Some(&lt))?;
        let opcode = super::expr::binop_opcode(op, base, unsigned);
        let t2 = self.temp();
        self.insn(Some((t2, &cls)), &opcode, &[Operand::Temp(t), rv]);
        let st = format!("store{}", lt.ir_storage(&self.store).unwrap());
        self.insn(None, &st, &[Operand::Temp(t2), addr]);
        Ok(())
    }

    fn lower_if(&mut self, ifs: &IfStmt) -> Result<()> {
        let cv = self.gen_expr(&ifs.cond, None)?;
        let then_b = self.block();
        let else_b = self.block();
        let end_b = self.block();
        self.insn(
            None,
            "jnz",
            &[cv, Operand::Block(then_b), Operand::Block(else_b)],
        );

        self.start_block(then_b);
        self.lower_stmts(&ifs.then)?;
        self.insn(None, "jmp", &[Operand::Block(end_b)]);

        self.start_block(else_b);
        match &ifs.els {
            None => {}
            Some(ElseArm::Else(stmts)) => self.lower_stmts(stmts)?,
            Some(ElseArm::ElseIf(inner)) => self.lower_if(inner)?,
        }
        self.start_block(end_b);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &[Stmt],
    ) -> Result<()> {
        if let Some(stmt) = init {
            self.lower_stmt(stmt)?;
        }

        let header = self.block();
        self.start_block(header);
        let (body_b, end_b) = match cond {
            Some(c) => {
                let cv = self.gen_expr(c, None)?;
                let body_b = self.block();
                let end_b = self.block();
                self.insn(
                    None,
                    "jnz",
                    &[cv, Operand::Block(body_b), Operand::Block(end_b)],
                );
                (body_b, end_b)
            }
            // No condition: fall straight through into the body.
            None => (self.block(), self.block()),
        };

        self.start_block(body_b);
        let post_b = post.map(|_| self.block());
        self.loops.push(LoopBlocks {
            cont: post_b.unwrap_or(header),
            end: end_b,
        });
        self.lower_stmts(body)?;
        self.loops.pop();

        if let Some(pb) = post_b {
            self.start_block(pb);
            self.lower_stmt(post.unwrap())?;
        }
        self.insn(None, "jmp", &[Operand::Block(header)]);
        self.start_block(end_b);
        Ok(())
    }

    /// Returned values adopt the function's return type as their literal
    /// context. An aggregate return yields the pointer to its storage; a
    /// non-void fall-through is not diagnosed.
    fn lower_return(&mut self, value: Option<&Expr>) -> Result<()> {
        match value {
            Some(e) => {
                let rt = self.cur_ret.clone();
                let v = self.gen_expr(e, rt.as_ref())?;
                self.insn(None, "ret", &[v]);
            }
            None => self.insn(None, "ret", &[]),
        }
        Ok(())
    }

    /// Zero-initialize freshly allocated storage, field by field. Unions
    /// zero through their largest member; array elements zero one by one.
    pub(crate) fn gen_zero(&mut self, ty: &ConcreteType, loc: &Operand) {
        let peeled = ty.peel(&self.store).clone();
        match peeled {
            ConcreteType::Struct(fields) => {
                let offsets = struct_offsets(&fields, &self.store);
                for (field, off) in fields.iter().zip(offsets) {
                    let at = self.offset_addr(loc, off);
                    self.gen_zero(&field.ty, &at);
                }
            }
            ConcreteType::Union(fields) => {
                if !fields.is_empty() {
                    let largest = union_largest(&fields, &self.store).ty.clone();
                    self.gen_zero(&largest, loc);
                }
            }
            ConcreteType::Array(elem, n) => {
                let elem_size = elem.metrics(&self.store).size;
                for i in 0..n {
                    let at = self.offset_addr(loc, i * elem_size);
                    self.gen_zero(&elem, &at);
                }
            }
            prim => {
                // Floats zero through same-width integer stores; the bit
                // pattern of 0.0 is all zeroes.
                let letter = match prim {
                    ConcreteType::F32 => 'w',
                    ConcreteType::F64 => 'l',
                    _ => prim.ir_storage(&self.store).unwrap(),
                };
                let st = format!("store{letter}");
                self.insn(None, &st, &[Operand::Const(0), loc.clone()]);
            }
        }
    }
}
