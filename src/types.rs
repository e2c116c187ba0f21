//! The Tern type model: concrete types, literal types, metrics and layout.
//!
//! Named types are nominal wrappers stored in a `TypeStore` arena and
//! referenced by index, which lets a struct refer to itself through a
//! pointer before its body has been resolved. Aliases are resolved eagerly
//! and bind the target type value directly, so they never appear here.

/// Index of a named-type slot in the [`TypeStore`].
pub type TypeId = usize;

/// Arena of named-type slots. A slot is allocated (and bound in its
/// namespace) before the underlying type is resolved, then assigned once.
#[derive(Debug, Default)]
pub struct TypeStore {
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    name: String,
    ty: Option<ConcreteType>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn alloc(&mut self, name: &str) -> TypeId {
        self.slots.push(Slot {
            name: name.to_string(),
            ty: None,
        });
        self.slots.len() - 1
    }

    pub fn assign(&mut self, id: TypeId, ty: ConcreteType) {
        self.slots[id].ty = Some(ty);
    }

    pub fn get(&self, id: TypeId) -> &ConcreteType {
        self.slots[id]
            .ty
            .as_ref()
            .expect("[compiler bug] named type used before its body was resolved")
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.slots[id].name
    }
}

/// A type as seen by the checker: either concrete, or one of the two
/// literal-polymorphic types produced by numeric literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Concrete(ConcreteType),
    IntLit,
    FloatLit,
}

impl Type {
    pub fn is_concrete(&self) -> bool {
        matches!(self, Type::Concrete(_))
    }

    /// The concrete type this resolves to without further context:
    /// literals default to the widest matching base type.
    pub fn concrete(&self) -> ConcreteType {
        match self {
            Type::Concrete(t) => t.clone(),
            Type::IntLit => ConcreteType::I64,
            Type::FloatLit => ConcreteType::F64,
        }
    }

    pub fn display(&self, store: &TypeStore) -> String {
        match self {
            Type::Concrete(t) => t.display(store),
            Type::IntLit => "integer literal".to_string(),
            Type::FloatLit => "float literal".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: ConcreteType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<ConcreteType>,
    pub ret: Option<Box<ConcreteType>>,
    pub variadic: bool,
}

/// The closed family of concrete types. `Pointer(None)` is the generic
/// pointer: assignable to and from any pointer, never dereferenceable.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Pointer(Option<Box<ConcreteType>>),
    Array(Box<ConcreteType>, u64),
    Struct(Vec<Field>),
    Union(Vec<Field>),
    Func(FuncType),
    Named(TypeId),
}

/// Size and alignment of a type, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub size: u64,
    pub align: u64,
}

impl ConcreteType {
    /// Strip named wrappers down to the underlying structural type.
    pub fn peel<'a>(&'a self, store: &'a TypeStore) -> &'a ConcreteType {
        let mut t = self;
        while let ConcreteType::Named(id) = t {
            t = store.get(*id);
        }
        t
    }

    pub fn metrics(&self, store: &TypeStore) -> Metrics {
        use ConcreteType::*;
        match self {
            I8 | U8 | Bool => Metrics { size: 1, align: 1 },
            I16 | U16 => Metrics { size: 2, align: 2 },
            I32 | U32 | F32 => Metrics { size: 4, align: 4 },
            I64 | U64 | F64 => Metrics { size: 8, align: 8 },
            Pointer(_) | Func(_) => Metrics { size: 8, align: 8 },
            Array(elem, n) => {
                let m = elem.metrics(store);
                Metrics {
                    size: m.size * n,
                    align: m.align,
                }
            }
            Struct(fields) => struct_metrics(fields, store),
            Union(fields) => union_metrics(fields, store),
            Named(id) => store.get(*id).metrics(store),
        }
    }

    /// The IR register class this type occupies, or `None` for aggregates
    /// that are passed by reference to their storage.
    pub fn ir_base(&self, store: &TypeStore) -> Option<char> {
        use ConcreteType::*;
        match self {
            I8 | I16 | I32 | U8 | U16 | U32 | Bool => Some('w'),
            I64 | U64 | Pointer(_) | Func(_) => Some('l'),
            F32 => Some('s'),
            F64 => Some('d'),
            Array(..) | Struct(_) | Union(_) => None,
            Named(id) => store.get(*id).ir_base(store),
        }
    }

    /// The storage letter used for loads, stores and aggregate entries, or
    /// `None` for aggregates.
    pub fn ir_storage(&self, store: &TypeStore) -> Option<char> {
        use ConcreteType::*;
        match self {
            I8 | U8 | Bool => Some('b'),
            I16 | U16 => Some('h'),
            I32 | U32 => Some('w'),
            I64 | U64 | Pointer(_) | Func(_) => Some('l'),
            F32 => Some('s'),
            F64 => Some('d'),
            Array(..) | Struct(_) | Union(_) => None,
            Named(id) => store.get(*id).ir_storage(store),
        }
    }

    /// The load opcode for this type, picking signedness for sub-word
    /// integers. Aggregates are never loaded whole.
    pub fn load_op(&self, store: &TypeStore) -> Option<&'static str> {
        use ConcreteType::*;
        match self {
            I8 => Some("loadsb"),
            I16 => Some("loadsh"),
            U8 | Bool => Some("loadub"),
            U16 => Some("loaduh"),
            I32 | U32 => Some("loadw"),
            I64 | U64 | Pointer(_) | Func(_) => Some("loadl"),
            F32 => Some("loads"),
            F64 => Some("loadd"),
            Array(..) | Struct(_) | Union(_) => None,
            Named(id) => store.get(*id).load_op(store),
        }
    }

    pub fn is_signed_int(&self) -> bool {
        use ConcreteType::*;
        matches!(self, I8 | I16 | I32 | I64)
    }

    pub fn is_unsigned_int(&self) -> bool {
        use ConcreteType::*;
        matches!(self, U8 | U16 | U32 | U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ConcreteType::F32 | ConcreteType::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_aggregate(&self, store: &TypeStore) -> bool {
        matches!(
            self.peel(store),
            ConcreteType::Struct(_) | ConcreteType::Union(_) | ConcreteType::Array(..)
        )
    }

    /// Render the type in source syntax, for diagnostics.
    pub fn display(&self, store: &TypeStore) -> String {
        use ConcreteType::*;
        match self {
            I8 => "I8".into(),
            I16 => "I16".into(),
            I32 => "I32".into(),
            I64 => "I64".into(),
            U8 => "U8".into(),
            U16 => "U16".into(),
            U32 => "U32".into(),
            U64 => "U64".into(),
            F32 => "F32".into(),
            F64 => "F64".into(),
            Bool => "Bool".into(),
            Pointer(None) => "[]".into(),
            Pointer(Some(t)) => format!("[{}]", t.display(store)),
            Array(t, n) => format!("[{} {}]", t.display(store), n),
            Func(f) => {
                let params: Vec<String> = f.params.iter().map(|p| p.display(store)).collect();
                match &f.ret {
                    Some(r) => format!("fn({}) {}", params.join(", "), r.display(store)),
                    None => format!("fn({})", params.join(", ")),
                }
            }
            Struct(_) => "struct".into(),
            Union(_) => "union".into(),
            Named(id) => store.name(*id).to_string(),
        }
    }
}

/// Field offsets of a struct, in declaration order. Each field sits at the
/// smallest offset past the running cursor that satisfies its alignment.
pub fn struct_offsets(fields: &[Field], store: &TypeStore) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(fields.len());
    let mut cursor = 0u64;
    for field in fields {
        let m = field.ty.metrics(store);
        let off = cursor.next_multiple_of(m.align.max(1));
        offsets.push(off);
        cursor = off + m.size;
    }
    offsets
}

pub fn struct_metrics(fields: &[Field], store: &TypeStore) -> Metrics {
    let mut cursor = 0u64;
    let mut align = 1u64;
    for field in fields {
        let m = field.ty.metrics(store);
        align = align.max(m.align);
        cursor = cursor.next_multiple_of(m.align.max(1)) + m.size;
    }
    Metrics {
        size: cursor.next_multiple_of(align),
        align,
    }
}

pub fn union_metrics(fields: &[Field], store: &TypeStore) -> Metrics {
    let mut size = 0u64;
    let mut align = 1u64;
    for field in fields {
        let m = field.ty.metrics(store);
        size = size.max(m.size);
        align = align.max(m.align);
    }
    Metrics { size, align }
}

/// The union member every access and zero-store goes through: the largest
/// one, first declared winning ties.
pub fn union_largest<'a>(fields: &'a [Field], store: &TypeStore) -> &'a Field {
    let mut best = &fields[0];
    let mut best_size = best.ty.metrics(store).size;
    for field in &fields[1..] {
        let size = field.ty.metrics(store).size;
        if size > best_size {
            best = field;
            best_size = size;
        }
    }
    best
}

/// Whether two types may meet in an assignment, argument or binary
/// expression. Reflexive and symmetric: nominal identity for named types,
/// structural equality otherwise, literal types against any matching
/// numeric family, and the generic pointer against any pointer.
pub fn compatible(a: &Type, b: &Type, store: &TypeStore) -> bool {
    match (a, b) {
        (Type::IntLit, Type::IntLit) | (Type::FloatLit, Type::FloatLit) => true,
        (Type::IntLit, Type::FloatLit) | (Type::FloatLit, Type::IntLit) => false,
        (Type::IntLit, Type::Concrete(c)) | (Type::Concrete(c), Type::IntLit) => {
            c.peel(store).is_numeric()
        }
        (Type::FloatLit, Type::Concrete(c)) | (Type::Concrete(c), Type::FloatLit) => {
            c.peel(store).is_float()
        }
        (Type::Concrete(x), Type::Concrete(y)) => compatible_concrete(x, y, store),
    }
}

pub fn compatible_concrete(a: &ConcreteType, b: &ConcreteType, store: &TypeStore) -> bool {
    use ConcreteType::*;

    // Equal nominal identity.
    if let (Named(x), Named(y)) = (a, b) {
        if x == y {
            return true;
        }
    }

    // The generic pointer meets any pointer, seen through named wrappers.
    let pa = a.peel(store);
    let pb = b.peel(store);
    match (pa, pb) {
        (Pointer(None), Pointer(_)) | (Pointer(_), Pointer(None)) => return true,
        _ => {}
    }

    // Otherwise named types keep their fresh identity.
    if matches!(a, Named(_)) || matches!(b, Named(_)) {
        return false;
    }

    match (a, b) {
        (Pointer(Some(x)), Pointer(Some(y))) => compatible_concrete(x, y, store),
        // A function value meets a pointer to the same function type.
        (Func(f), Pointer(Some(p))) | (Pointer(Some(p)), Func(f)) => match p.peel(store) {
            Func(g) => compatible_func(f, g, store),
            _ => false,
        },
        (Func(f), Func(g)) => compatible_func(f, g, store),
        (Array(x, n), Array(y, m)) => n == m && compatible_concrete(x, y, store),
        (Struct(xs), Struct(ys)) | (Union(xs), Union(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| compatible_concrete(&x.ty, &y.ty, store))
        }
        _ => a == b,
    }
}

fn compatible_func(f: &FuncType, g: &FuncType, store: &TypeStore) -> bool {
    if f.params.len() != g.params.len() || f.variadic != g.variadic {
        return false;
    }
    if !f
        .params
        .iter()
        .zip(&g.params)
        .all(|(x, y)| compatible_concrete(x, y, store))
    {
        return false;
    }
    match (&f.ret, &g.ret) {
        (None, None) => true,
        (Some(x), Some(y)) => compatible_concrete(x, y, store),
        _ => false,
    }
}
