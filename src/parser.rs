//! Recursive-descent parser producing the AST in `crate::ast`.
//!
//! Statements and top-level items are separated by newlines or `;`. Grouped
//! declarators (`a, b I32, c U64`) are resolved by noting that a name is
//! always followed by either a comma or the start of its group's type.

use crate::ast::*;
use crate::lexer::{Tok, Token};
use anyhow::{bail, Result};

pub fn parse(tokens: &[Token]) -> Result<Program> {
    let mut p = Parser { toks: tokens, i: 0 };
    let mut items = Vec::new();
    p.skip_seps();
    while !p.at(&Tok::Eof) {
        items.push(p.parse_item()?);
        p.skip_seps();
    }
    Ok(Program { items })
}

struct Parser<'a> {
    toks: &'a [Token],
    i: usize,
}

impl<'a> Parser<'a> {
    fn cur(&self) -> &'a Token {
        self.toks
            .get(self.i)
            .unwrap_or_else(|| self.toks.last().unwrap())
    }

    fn peek(&self) -> &'a Tok {
        &self.cur().tok
    }

    fn peek_at(&self, n: usize) -> &'a Tok {
        &self
            .toks
            .get(self.i + n)
            .unwrap_or_else(|| self.toks.last().unwrap())
            .tok
    }

    fn at(&self, t: &Tok) -> bool {
        self.peek() == t
    }

    fn bump(&mut self) -> &'a Tok {
        let t = self.cur();
        self.i = (self.i + 1).min(self.toks.len() - 1);
        &t.tok
    }

    fn eat(&mut self, t: &Tok) -> bool {
        if self.at(t) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error<T>(&self, msg: &str) -> Result<T> {
        let t = self.cur();
        bail!("{}:{}: {}, found {:?}", t.line, t.col, msg, t.tok)
    }

    fn expect(&mut self, t: &Tok, what: &str) -> Result<()> {
        if self.eat(t) {
            Ok(())
        } else {
            self.error(&format!("expected {what}"))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Tok::Ident(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => self.error("expected identifier"),
        }
    }

    fn skip_seps(&mut self) {
        while matches!(self.peek(), Tok::Newline | Tok::Semi) {
            self.bump();
        }
    }

    /// Consume one statement terminator; `}` and EOF terminate without
    /// consuming anything.
    fn stmt_end(&mut self) -> Result<()> {
        match self.peek() {
            Tok::Newline | Tok::Semi => {
                self.bump();
                self.skip_seps();
                Ok(())
            }
            Tok::RBrace | Tok::Eof => Ok(()),
            _ => self.error("expected end of statement"),
        }
    }

    fn type_starts(&self) -> bool {
        matches!(self.peek(), Tok::Ident(_) | Tok::LBrack | Tok::Fn)
    }

    // ---- items ----

    fn parse_item(&mut self) -> Result<Item> {
        let export = self.eat(&Tok::Pub);
        let variadic = self.eat(&Tok::Variadic);
        if self.eat(&Tok::Extern) {
            self.expect(&Tok::Var, "`var` after `extern`")?;
            return self.parse_global_var(true);
        }
        match self.peek() {
            Tok::Fn => self.parse_fn(export, variadic).map(Item::Function),
            Tok::Var => {
                self.bump();
                self.parse_global_var(false)
            }
            Tok::Type => self.parse_type_decl(),
            Tok::Ns => self.parse_namespace(),
            _ => self.error("expected declaration"),
        }
    }

    fn parse_fn(&mut self, export: bool, variadic: bool) -> Result<FuncDecl> {
        self.bump(); // fn
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let ret = if self.type_starts() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = if self.at(&Tok::LBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            export,
            variadic,
            name,
            params,
            ret,
            body,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect(&Tok::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.at(&Tok::RParen) {
            loop {
                let (names, ty) = self.parse_name_group()?;
                for name in names {
                    params.push(Param {
                        name,
                        ty: ty.clone(),
                    });
                }
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        self.expect(&Tok::RParen, "`)`")?;
        Ok(params)
    }

    /// `a, b T` — names accumulate while each ident is followed by a comma;
    /// an ident followed by a type-start token ends the group.
    fn parse_name_group(&mut self) -> Result<(Vec<String>, TypeExpr)> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&Tok::Comma) {
            names.push(self.expect_ident()?);
        }
        let ty = self.parse_type()?;
        Ok((names, ty))
    }

    /// The `var` keyword has already been consumed.
    fn parse_global_var(&mut self, extern_: bool) -> Result<Item> {
        let (names, ty) = self.parse_name_group()?;
        Ok(Item::GlobalVar { extern_, names, ty })
    }

    fn parse_type_decl(&mut self) -> Result<Item> {
        self.bump(); // type
        let name = self.expect_ident()?;
        if self.eat(&Tok::Assign) {
            let ty = self.parse_type()?;
            return Ok(Item::TypeAlias { name, ty });
        }
        let ty = self.parse_type()?;
        Ok(Item::TypeDef { name, ty })
    }

    fn parse_namespace(&mut self) -> Result<Item> {
        self.bump(); // ns
        let name = self.expect_ident()?;
        self.expect(&Tok::LBrace, "`{`")?;
        self.skip_seps();
        let mut items = Vec::new();
        while !self.at(&Tok::RBrace) {
            if self.at(&Tok::Eof) {
                return self.error("unterminated namespace");
            }
            items.push(self.parse_item()?);
            self.skip_seps();
        }
        self.bump(); // }
        Ok(Item::Namespace { name, items })
    }

    // ---- types ----

    fn parse_type(&mut self) -> Result<TypeExpr> {
        match self.peek() {
            Tok::Ident(_) => {
                let mut path = vec![self.expect_ident()?];
                while self.eat(&Tok::Dot) {
                    path.push(self.expect_ident()?);
                }
                Ok(TypeExpr::Name(path))
            }
            Tok::LBrack => {
                self.bump();
                if self.eat(&Tok::RBrack) {
                    return Ok(TypeExpr::Pointer(None));
                }
                let inner = self.parse_type()?;
                if let Tok::Int(n) = *self.peek() {
                    self.bump();
                    if n < 0 {
                        return self.error("array length must be non-negative");
                    }
                    self.expect(&Tok::RBrack, "`]`")?;
                    return Ok(TypeExpr::Array(Box::new(inner), n as u64));
                }
                self.expect(&Tok::RBrack, "`]`")?;
                Ok(TypeExpr::Pointer(Some(Box::new(inner))))
            }
            Tok::Fn => {
                self.bump();
                self.expect(&Tok::LParen, "`(`")?;
                let mut params = Vec::new();
                if !self.at(&Tok::RParen) {
                    loop {
                        params.push(self.parse_type()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Tok::RParen, "`)`")?;
                let ret = if self.type_starts() {
                    Some(Box::new(self.parse_type()?))
                } else {
                    None
                };
                Ok(TypeExpr::Func { params, ret })
            }
            Tok::Struct => {
                self.bump();
                Ok(TypeExpr::Struct(self.parse_field_groups()?))
            }
            Tok::Union => {
                self.bump();
                Ok(TypeExpr::Union(self.parse_field_groups()?))
            }
            _ => self.error("expected type"),
        }
    }

    fn parse_field_groups(&mut self) -> Result<Vec<FieldGroup>> {
        self.expect(&Tok::LBrace, "`{`")?;
        self.skip_seps();
        let mut groups = Vec::new();
        while !self.at(&Tok::RBrace) {
            let (names, ty) = self.parse_name_group()?;
            groups.push(FieldGroup { names, ty });
            match self.peek() {
                Tok::Semi | Tok::Newline => self.skip_seps(),
                Tok::RBrace => break,
                _ => return self.error("expected `;` or `}`"),
            }
        }
        self.bump(); // }
        Ok(groups)
    }

    // ---- statements ----

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Tok::LBrace, "`{`")?;
        self.skip_seps();
        let mut stmts = Vec::new();
        while !self.at(&Tok::RBrace) {
            if self.at(&Tok::Eof) {
                return self.error("unterminated block");
            }
            stmts.push(self.parse_stmt()?);
            self.stmt_end()?;
        }
        self.bump(); // }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Tok::Var => {
                self.bump();
                let (names, ty) = self.parse_name_group()?;
                Ok(Stmt::Var { names, ty })
            }
            Tok::If => {
                self.bump();
                Ok(Stmt::If(self.parse_if()?))
            }
            Tok::For => self.parse_for(),
            Tok::Break => {
                self.bump();
                Ok(Stmt::Break)
            }
            Tok::Continue => {
                self.bump();
                Ok(Stmt::Continue)
            }
            Tok::Return => {
                self.bump();
                let value = match self.peek() {
                    Tok::Newline | Tok::Semi | Tok::RBrace | Tok::Eof => None,
                    _ => Some(self.parse_expr()?),
                };
                Ok(Stmt::Return(value))
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Assignments, compound assignments, `++`/`--`, `_ = e` discards and
    /// bare expression statements — the forms allowed in `for` clauses.
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        if let Tok::Ident(name) = self.peek() {
            if name == "_" && *self.peek_at(1) == Tok::Assign {
                self.bump();
                self.bump();
                let expr = self.parse_expr()?;
                return Ok(Stmt::Expr {
                    expr,
                    discard: true,
                });
            }
        }
        let target = self.parse_expr()?;
        let op = match self.peek() {
            Tok::Assign => {
                self.bump();
                let value = self.parse_expr()?;
                return Ok(Stmt::Assign { target, value });
            }
            Tok::PlusPlus => {
                self.bump();
                return Ok(Stmt::IncDec { target, inc: true });
            }
            Tok::MinusMinus => {
                self.bump();
                return Ok(Stmt::IncDec {
                    target,
                    inc: false,
                });
            }
            Tok::PlusEq => BinOp::Add,
            Tok::MinusEq => BinOp::Sub,
            Tok::StarEq => BinOp::Mul,
            Tok::SlashEq => BinOp::Div,
            Tok::PercentEq => BinOp::Rem,
            Tok::PipeEq => BinOp::Or,
            Tok::CaretEq => BinOp::Xor,
            Tok::AmpEq => BinOp::And,
            Tok::ShlEq => BinOp::Shl,
            Tok::ShrEq => BinOp::Shr,
            _ => {
                return Ok(Stmt::Expr {
                    expr: target,
                    discard: false,
                })
            }
        };
        self.bump();
        let value = self.parse_expr()?;
        Ok(Stmt::OpAssign { op, target, value })
    }

    fn parse_if(&mut self) -> Result<IfStmt> {
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;
        let save = self.i;
        self.skip_seps();
        let els = if self.eat(&Tok::Else) {
            if self.eat(&Tok::If) {
                Some(ElseArm::ElseIf(Box::new(self.parse_if()?)))
            } else {
                Some(ElseArm::Else(self.parse_block()?))
            }
        } else {
            self.i = save;
            None
        };
        Ok(IfStmt { cond, then, els })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.bump(); // for
        if self.at(&Tok::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
            });
        }

        let init = if self.eat(&Tok::Semi) {
            None
        } else {
            let st = self.parse_simple_stmt()?;
            if self.at(&Tok::LBrace) {
                // `for cond { ... }`
                let cond = match st {
                    Stmt::Expr {
                        expr,
                        discard: false,
                    } => expr,
                    _ => return self.error("expected loop body"),
                };
                let body = self.parse_block()?;
                return Ok(Stmt::For {
                    init: None,
                    cond: Some(cond),
                    post: None,
                    body,
                });
            }
            self.expect(&Tok::Semi, "`;`")?;
            Some(Box::new(st))
        };

        let cond = if self.at(&Tok::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&Tok::Semi, "`;`")?;
        let post = if self.at(&Tok::LBrace) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt()?))
        };
        let body = self.parse_block()?;
        Ok(Stmt::For {
            init,
            cond,
            post,
            body,
        })
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(1)
    }

    fn binop(&self) -> Option<(BinOp, u8)> {
        let (op, prec) = match self.peek() {
            Tok::OrOr => (BinOp::LOr, 1),
            Tok::AndAnd => (BinOp::LAnd, 2),
            Tok::EqEq => (BinOp::Eq, 3),
            Tok::Ne => (BinOp::Ne, 3),
            Tok::Lt => (BinOp::Lt, 3),
            Tok::Gt => (BinOp::Gt, 3),
            Tok::Le => (BinOp::Le, 3),
            Tok::Ge => (BinOp::Ge, 3),
            Tok::Plus => (BinOp::Add, 4),
            Tok::Minus => (BinOp::Sub, 4),
            Tok::Pipe => (BinOp::Or, 4),
            Tok::Caret => (BinOp::Xor, 4),
            Tok::Star => (BinOp::Mul, 5),
            Tok::Slash => (BinOp::Div, 5),
            Tok::Percent => (BinOp::Rem, 5),
            Tok::Shl => (BinOp::Shl, 5),
            Tok::Shr => (BinOp::Shr, 5),
            Tok::Amp => (BinOp::And, 5),
            _ => return None,
        };
        Some((op, prec))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = self.binop() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Tok::Not => Some(PrefixOp::Not),
            Tok::Caret => Some(PrefixOp::BitNot),
            Tok::Minus => Some(PrefixOp::Neg),
            Tok::Plus => Some(PrefixOp::Plus),
            Tok::Amp => {
                self.bump();
                let inner = self.parse_unary()?;
                return Ok(Expr::Ref(Box::new(inner)));
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::Prefix(op, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut e = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let field = self.expect_ident()?;
                    e = Expr::Field(Box::new(e), field);
                }
                Tok::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if !self.at(&Tok::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&Tok::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&Tok::RParen, "`)`")?;
                    e = Expr::Call(Box::new(e), args);
                }
                _ => return Ok(e),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Tok::Int(n) => {
                self.bump();
                Ok(Expr::Int(n))
            }
            Tok::Float(f) => {
                self.bump();
                Ok(Expr::Float(f))
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Expr::Str(s))
            }
            Tok::Ident(name) => {
                self.bump();
                Ok(Expr::Var(name))
            }
            Tok::Cast => {
                self.bump();
                self.expect(&Tok::LParen, "`(`")?;
                let e = self.parse_expr()?;
                self.expect(&Tok::Comma, "`,`")?;
                let ty = self.parse_type()?;
                self.expect(&Tok::RParen, "`)`")?;
                Ok(Expr::Cast(Box::new(e), ty))
            }
            Tok::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(&Tok::RParen, "`)`")?;
                Ok(e)
            }
            Tok::LBrack => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(&Tok::RBrack, "`]`")?;
                Ok(Expr::Deref(Box::new(e)))
            }
            _ => self.error("expected expression"),
        }
    }
}
