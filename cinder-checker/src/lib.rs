mod ast;
mod env;
mod parser;
mod typechecker;
mod types;

pub use crate::ast::{
    BinaryOp, Decl, Exp, ExternDecl, FunCall, FunctionDef, Place, Program, Stmt, StructDef,
    UnaryOp,
};
pub use crate::env::{Scope, StructTable};
pub use crate::parser::{parse_program, AstError};
pub use crate::typechecker::{check_program, TypeError};
pub use crate::types::{compatible, pick_non_nil, Type};

/// The outcome of a completed analysis: the program is well typed, or it was
/// rejected with a diagnostic. Malformed input never reaches a verdict; it
/// surfaces as an [`AstError`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

/// Runs the whole pipeline on a JSON document: parse the text, rebuild the
/// syntax tree, and type-check it.
pub fn analyze_source(source: &str) -> Result<Verdict, AstError> {
    let value: serde_json::Value = serde_json::from_str(source)?;
    let program = parse_program(&value)?;
    match check_program(&program) {
        Ok(()) => Ok(Verdict::Valid),
        Err(error) => Ok(Verdict::Invalid(error.to_string())),
    }
}
