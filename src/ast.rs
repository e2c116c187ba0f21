//! AST node types produced by the parser and consumed by codegen.
//!
//! Nodes are tagged variants walked by match; the compiler keeps one
//! lowering arm per variant so the dispatch stays total.

#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Function(FuncDecl),
    /// `var a, b T` at the top level; `extern` suppresses data emission.
    GlobalVar {
        extern_: bool,
        names: Vec<String>,
        ty: TypeExpr,
    },
    /// `type Name Underlying` — a nominally fresh wrapper.
    TypeDef { name: String, ty: TypeExpr },
    /// `type Name = Underlying` — fully transparent.
    TypeAlias { name: String, ty: TypeExpr },
    Namespace { name: String, items: Vec<Item> },
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub export: bool,
    pub variadic: bool,
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    /// `None` for external declarations without a body.
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// Dotted named path, e.g. `I32` or `foo.Bar`.
    Name(Vec<String>),
    /// `[T]`, or `[]` for the generic pointer.
    Pointer(Option<Box<TypeExpr>>),
    /// `[T N]`
    Array(Box<TypeExpr>, u64),
    /// `fn(T1, T2) Ret`
    Func {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
    },
    /// Only valid in `type Name struct { ... }` declarations.
    Struct(Vec<FieldGroup>),
    Union(Vec<FieldGroup>),
}

/// One `a, b T` group inside a struct or union body.
#[derive(Debug, Clone)]
pub struct FieldGroup {
    pub names: Vec<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        names: Vec<String>,
        ty: TypeExpr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    OpAssign {
        op: BinOp,
        target: Expr,
        value: Expr,
    },
    IncDec {
        target: Expr,
        inc: bool,
    },
    /// Bare expression statement; `discard` is the explicit `_ = e` form.
    Expr {
        expr: Expr,
        discard: bool,
    },
    If(IfStmt),
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub els: Option<ElseArm>,
}

#[derive(Debug, Clone)]
pub enum ElseArm {
    Else(Vec<Stmt>),
    ElseIf(Box<IfStmt>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Float(f64),
    /// String literal bytes after escape processing; may be arbitrary bytes.
    Str(Vec<u8>),
    Var(String),
    Field(Box<Expr>, String),
    /// `&lv`
    Ref(Box<Expr>),
    /// `[p]`
    Deref(Box<Expr>),
    Prefix(PrefixOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    /// `cast(e, T)`
    Cast(Box<Expr>, TypeExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Or,
    Xor,
    And,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LAnd,
    LOr,
}

impl BinOp {
    /// Operators that accept float operands; everything else is
    /// integer-only.
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// `!x` — logical not
    Not,
    /// `^x` — bitwise complement
    BitNot,
    /// `-x`
    Neg,
    /// `+x`
    Plus,
}
