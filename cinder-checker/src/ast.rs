use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq)
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div => 6,
        }
    }
}

/// An l-value: any construct denoting a storage location.
#[derive(Debug, Clone)]
pub enum Place {
    Id(String),
    Deref(Box<Exp>),
    ArrayAccess { array: Box<Exp>, index: Box<Exp> },
    FieldAccess { base: Box<Exp>, field: String },
}

#[derive(Debug, Clone)]
pub enum Exp {
    /// A place read as an r-value. The only way a place enters expression
    /// position.
    Val(Box<Place>),
    Num(i64),
    Nil,
    Select {
        guard: Box<Exp>,
        tt: Box<Exp>,
        ff: Box<Exp>,
    },
    UnOp {
        op: UnaryOp,
        operand: Box<Exp>,
    },
    BinOp {
        op: BinaryOp,
        left: Box<Exp>,
        right: Box<Exp>,
    },
    NewSingle(Type),
    NewArray {
        element: Type,
        count: Box<Exp>,
    },
    Call(FunCall),
}

#[derive(Debug, Clone)]
pub struct FunCall {
    pub callee: Box<Exp>,
    pub args: Vec<Exp>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Vec<Stmt>),
    Assign {
        target: Place,
        value: Exp,
    },
    Call(FunCall),
    If {
        guard: Exp,
        then_body: Box<Stmt>,
        else_body: Option<Box<Stmt>>,
    },
    While {
        guard: Exp,
        body: Box<Stmt>,
    },
    Return(Option<Exp>),
    Break,
    Continue,
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct ExternDecl {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Decl>,
    pub return_type: Type,
    pub locals: Vec<Decl>,
    pub body: Stmt,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub structs: Vec<StructDef>,
    pub externs: Vec<ExternDecl>,
    pub functions: Vec<FunctionDef>,
}

// Diagnostic rendering. Expressions are printed back in source syntax with
// parentheses inserted only where the precedence of a child falls below what
// its context requires. Levels, tightest last: select < or < and < equality
// < comparison < additive < multiplicative < unary and `new` < postfix
// (deref, index, field, call) < atoms.

impl Place {
    pub fn describe(&self) -> String {
        self.render(0)
    }

    fn precedence(&self) -> u8 {
        match self {
            Place::Id(_) => 9,
            Place::Deref(_) | Place::ArrayAccess { .. } | Place::FieldAccess { .. } => 8,
        }
    }

    fn render(&self, min: u8) -> String {
        let rendered = match self {
            Place::Id(name) => name.clone(),
            Place::Deref(exp) => format!("{}.*", exp.render(8)),
            Place::ArrayAccess { array, index } => {
                format!("{}[{}]", array.render(8), index.render(0))
            }
            Place::FieldAccess { base, field } => format!("{}.{field}", base.render(8)),
        };
        if self.precedence() < min {
            format!("({rendered})")
        } else {
            rendered
        }
    }
}

impl Exp {
    pub fn describe(&self) -> String {
        self.render(0)
    }

    fn precedence(&self) -> u8 {
        match self {
            Exp::Val(place) => place.precedence(),
            Exp::Num(_) | Exp::Nil | Exp::NewArray { .. } => 9,
            Exp::Select { .. } => 0,
            Exp::UnOp { .. } | Exp::NewSingle(_) => 7,
            Exp::BinOp { op, .. } => op.precedence(),
            Exp::Call(_) => 8,
        }
    }

    fn render(&self, min: u8) -> String {
        let rendered = match self {
            // Transparent: a place read prints as the place itself.
            Exp::Val(place) => return place.render(min),
            Exp::Num(value) => value.to_string(),
            Exp::Nil => "nil".to_string(),
            Exp::Select { guard, tt, ff } => format!(
                "{} ? {} : {}",
                guard.render(1),
                tt.render(1),
                ff.render(1)
            ),
            Exp::UnOp { op, operand } => format!("{}{}", op.symbol(), operand.render(7)),
            Exp::BinOp { op, left, right } => {
                let prec = op.precedence();
                format!(
                    "{} {} {}",
                    left.render(prec),
                    op.symbol(),
                    right.render(prec + 1)
                )
            }
            Exp::NewSingle(ty) => format!("new {}", ty.describe()),
            Exp::NewArray { element, count } => {
                format!("[{}; {}]", element.describe(), count.render(0))
            }
            Exp::Call(call) => call.describe(),
        };
        if self.precedence() < min {
            format!("({rendered})")
        } else {
            rendered
        }
    }
}

impl FunCall {
    pub fn describe(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|arg| arg.render(0))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({args})", self.callee.render(8))
    }
}
