use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::{
    BinaryOp, Decl, Exp, ExternDecl, FunCall, FunctionDef, Place, Program, Stmt, StructDef,
    UnaryOp,
};
use crate::types::Type;

/// Malformed-input failures raised while rebuilding the syntax tree. These
/// are a different class from type errors: they never produce an `invalid:`
/// verdict.
#[derive(Debug, Error)]
pub enum AstError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed {node} node: expected {expected}, found {found}")]
    Malformed {
        node: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("missing key {key:?} in {node} node")]
    MissingKey {
        node: &'static str,
        key: &'static str,
    },
    #[error("unknown {kind} {name:?}")]
    UnknownTag { kind: &'static str, name: String },
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let clipped: String = text.chars().take(60).collect();
        format!("{clipped}...")
    } else {
        text
    }
}

fn malformed(node: &'static str, expected: &'static str, value: &Value) -> AstError {
    AstError::Malformed {
        node,
        expected,
        found: preview(value),
    }
}

fn as_object<'a>(
    value: &'a Value,
    node: &'static str,
) -> Result<&'a Map<String, Value>, AstError> {
    value
        .as_object()
        .ok_or_else(|| malformed(node, "an object", value))
}

fn as_array<'a>(value: &'a Value, node: &'static str) -> Result<&'a Vec<Value>, AstError> {
    value
        .as_array()
        .ok_or_else(|| malformed(node, "an array", value))
}

fn as_str<'a>(value: &'a Value, node: &'static str) -> Result<&'a str, AstError> {
    value
        .as_str()
        .ok_or_else(|| malformed(node, "a string", value))
}

fn get<'a>(
    object: &'a Map<String, Value>,
    node: &'static str,
    key: &'static str,
) -> Result<&'a Value, AstError> {
    object
        .get(key)
        .ok_or(AstError::MissingKey { node, key })
}

/// Splits a single-key object `{"Tag": payload}` into its tag and payload.
fn sole_entry<'a>(
    value: &'a Value,
    node: &'static str,
) -> Result<(&'a str, &'a Value), AstError> {
    let object = as_object(value, node)?;
    if object.len() != 1 {
        return Err(malformed(node, "a single-key object", value));
    }
    let (key, payload) = object.iter().next().expect("len checked above");
    Ok((key.as_str(), payload))
}

pub fn parse_program(value: &Value) -> Result<Program, AstError> {
    let object = as_object(value, "program")?;
    let mut program = Program::default();
    for entry in as_array(get(object, "program", "structs")?, "program")? {
        program.structs.push(parse_struct(entry)?);
    }
    for entry in as_array(get(object, "program", "externs")?, "program")? {
        program.externs.push(parse_extern(entry)?);
    }
    for entry in as_array(get(object, "program", "functions")?, "program")? {
        program.functions.push(parse_function(entry)?);
    }
    Ok(program)
}

fn parse_struct(value: &Value) -> Result<StructDef, AstError> {
    let object = as_object(value, "struct")?;
    let name = as_str(get(object, "struct", "name")?, "struct")?.to_string();
    let mut fields = Vec::new();
    for field in as_array(get(object, "struct", "fields")?, "struct")? {
        fields.push(parse_decl(field)?);
    }
    Ok(StructDef { name, fields })
}

fn parse_extern(value: &Value) -> Result<ExternDecl, AstError> {
    let object = as_object(value, "extern")?;
    let name = as_str(get(object, "extern", "name")?, "extern")?.to_string();
    let typ = get(object, "extern", "typ")?;
    match parse_type(typ)? {
        Type::Fn(params, return_type) => Ok(ExternDecl {
            name,
            params,
            return_type: *return_type,
        }),
        _ => Err(malformed("extern", "a function type", typ)),
    }
}

fn parse_function(value: &Value) -> Result<FunctionDef, AstError> {
    let object = as_object(value, "function")?;
    let name = as_str(get(object, "function", "name")?, "function")?.to_string();
    let mut params = Vec::new();
    for param in as_array(get(object, "function", "prms")?, "function")? {
        params.push(parse_decl(param)?);
    }
    let return_type = parse_type(get(object, "function", "rettyp")?)?;
    let mut locals = Vec::new();
    for local in as_array(get(object, "function", "locals")?, "function")? {
        locals.push(parse_decl(local)?);
    }
    // The body is always one statement: the raw statement array becomes a
    // single block.
    let mut body = Vec::new();
    for stmt in as_array(get(object, "function", "stmts")?, "function")? {
        body.push(parse_stmt(stmt)?);
    }
    Ok(FunctionDef {
        name,
        params,
        return_type,
        locals,
        body: Stmt::Block(body),
    })
}

fn parse_decl(value: &Value) -> Result<Decl, AstError> {
    let object = as_object(value, "decl")?;
    Ok(Decl {
        name: as_str(get(object, "decl", "name")?, "decl")?.to_string(),
        ty: parse_type(get(object, "decl", "typ")?)?,
    })
}

fn parse_type(value: &Value) -> Result<Type, AstError> {
    if let Some(name) = value.as_str() {
        return match name {
            "Int" => Ok(Type::Int),
            "Nil" => Ok(Type::Nil),
            _ => Err(AstError::UnknownTag {
                kind: "type",
                name: name.to_string(),
            }),
        };
    }

    let (key, payload) = sole_entry(value, "type")?;
    match key {
        "Struct" => Ok(Type::Struct(as_str(payload, "type")?.to_string())),
        "Ptr" => Ok(Type::Ptr(Box::new(parse_type(payload)?))),
        "Array" => Ok(Type::Array(Box::new(parse_type(payload)?))),
        "Fn" => {
            let signature = as_array(payload, "type")?;
            if signature.len() != 2 {
                return Err(malformed("type", "a [params, return] pair", payload));
            }
            let mut params = Vec::new();
            for param in as_array(&signature[0], "type")? {
                params.push(parse_type(param)?);
            }
            Ok(Type::Fn(params, Box::new(parse_type(&signature[1])?)))
        }
        _ => Err(AstError::UnknownTag {
            kind: "type",
            name: key.to_string(),
        }),
    }
}

fn place_from_entry(key: &str, payload: &Value) -> Result<Option<Place>, AstError> {
    match key {
        "Id" => Ok(Some(Place::Id(as_str(payload, "place")?.to_string()))),
        "Deref" => Ok(Some(Place::Deref(Box::new(parse_exp(payload)?)))),
        "ArrayAccess" => {
            let object = as_object(payload, "place")?;
            Ok(Some(Place::ArrayAccess {
                array: Box::new(parse_exp(get(object, "place", "array")?)?),
                index: Box::new(parse_exp(get(object, "place", "idx")?)?),
            }))
        }
        "FieldAccess" => {
            let object = as_object(payload, "place")?;
            Ok(Some(Place::FieldAccess {
                base: Box::new(parse_exp(get(object, "place", "ptr")?)?),
                field: as_str(get(object, "place", "field")?, "place")?.to_string(),
            }))
        }
        _ => Ok(None),
    }
}

fn parse_place(value: &Value) -> Result<Place, AstError> {
    let (key, payload) = sole_entry(value, "place")?;
    place_from_entry(key, payload)?.ok_or_else(|| AstError::UnknownTag {
        kind: "place",
        name: key.to_string(),
    })
}

fn parse_exp(value: &Value) -> Result<Exp, AstError> {
    if let Some(name) = value.as_str() {
        return match name {
            "Nil" => Ok(Exp::Nil),
            _ => Err(AstError::UnknownTag {
                kind: "expression",
                name: name.to_string(),
            }),
        };
    }

    let (key, payload) = sole_entry(value, "expression")?;

    // A place kind in expression position is an implicit r-value read.
    if let Some(place) = place_from_entry(key, payload)? {
        return Ok(Exp::Val(Box::new(place)));
    }

    match key {
        "Num" => payload
            .as_i64()
            .map(Exp::Num)
            .ok_or_else(|| malformed("expression", "an integer", payload)),
        "Nil" => Ok(Exp::Nil),
        "Select" => {
            let object = as_object(payload, "expression")?;
            Ok(Exp::Select {
                guard: Box::new(parse_exp(get(object, "expression", "guard")?)?),
                tt: Box::new(parse_exp(get(object, "expression", "tt")?)?),
                ff: Box::new(parse_exp(get(object, "expression", "ff")?)?),
            })
        }
        "UnOp" => {
            let parts = as_array(payload, "expression")?;
            if parts.len() != 2 {
                return Err(malformed("expression", "an [op, exp] pair", payload));
            }
            let op = match as_str(&parts[0], "expression")? {
                "Neg" => UnaryOp::Neg,
                "Not" => UnaryOp::Not,
                other => {
                    return Err(AstError::UnknownTag {
                        kind: "unary operator",
                        name: other.to_string(),
                    })
                }
            };
            Ok(Exp::UnOp {
                op,
                operand: Box::new(parse_exp(&parts[1])?),
            })
        }
        "BinOp" => {
            let object = as_object(payload, "expression")?;
            let op = parse_binary_op(as_str(get(object, "expression", "op")?, "expression")?)?;
            Ok(Exp::BinOp {
                op,
                left: Box::new(parse_exp(get(object, "expression", "left")?)?),
                right: Box::new(parse_exp(get(object, "expression", "right")?)?),
            })
        }
        "NewSingle" => Ok(Exp::NewSingle(parse_type(payload)?)),
        "NewArray" => {
            let parts = as_array(payload, "expression")?;
            if parts.len() != 2 {
                return Err(malformed("expression", "a [type, exp] pair", payload));
            }
            Ok(Exp::NewArray {
                element: parse_type(&parts[0])?,
                count: Box::new(parse_exp(&parts[1])?),
            })
        }
        "Call" => Ok(Exp::Call(parse_funcall(payload)?)),
        "Val" => Ok(Exp::Val(Box::new(parse_place(payload)?))),
        _ => Err(AstError::UnknownTag {
            kind: "expression",
            name: key.to_string(),
        }),
    }
}

fn parse_binary_op(name: &str) -> Result<BinaryOp, AstError> {
    match name {
        "Add" => Ok(BinaryOp::Add),
        "Sub" => Ok(BinaryOp::Sub),
        "Mul" => Ok(BinaryOp::Mul),
        "Div" => Ok(BinaryOp::Div),
        "And" => Ok(BinaryOp::And),
        "Or" => Ok(BinaryOp::Or),
        "Eq" => Ok(BinaryOp::Eq),
        "NotEq" => Ok(BinaryOp::NotEq),
        "Lt" => Ok(BinaryOp::Lt),
        "Lte" => Ok(BinaryOp::Lte),
        "Gt" => Ok(BinaryOp::Gt),
        "Gte" => Ok(BinaryOp::Gte),
        _ => Err(AstError::UnknownTag {
            kind: "binary operator",
            name: name.to_string(),
        }),
    }
}

fn parse_funcall(value: &Value) -> Result<FunCall, AstError> {
    let object = as_object(value, "call")?;
    let callee = Box::new(parse_exp(get(object, "call", "callee")?)?);
    let mut args = Vec::new();
    for arg in as_array(get(object, "call", "args")?, "call")? {
        args.push(parse_exp(arg)?);
    }
    Ok(FunCall { callee, args })
}

fn parse_stmt(value: &Value) -> Result<Stmt, AstError> {
    // A bare array is an implicit block.
    if let Some(elements) = value.as_array() {
        let mut stmts = Vec::new();
        for element in elements {
            stmts.push(parse_stmt(element)?);
        }
        return Ok(Stmt::Block(stmts));
    }

    if let Some(name) = value.as_str() {
        return match name {
            "Break" => Ok(Stmt::Break),
            "Continue" => Ok(Stmt::Continue),
            _ => Err(AstError::UnknownTag {
                kind: "statement",
                name: name.to_string(),
            }),
        };
    }

    let (key, payload) = sole_entry(value, "statement")?;
    match key {
        "Assign" => {
            let parts = as_array(payload, "statement")?;
            if parts.len() != 2 {
                return Err(malformed("statement", "a [place, exp] pair", payload));
            }
            Ok(Stmt::Assign {
                target: parse_place(&parts[0])?,
                value: parse_exp(&parts[1])?,
            })
        }
        "Call" => Ok(Stmt::Call(parse_funcall(payload)?)),
        "If" => {
            let object = as_object(payload, "statement")?;
            let guard = parse_exp(get(object, "statement", "guard")?)?;
            let then_body = Box::new(parse_stmt(get(object, "statement", "tt")?)?);
            // `ff` may be absent, null, or an empty array; all mean no else.
            let else_body = match object.get("ff") {
                None | Some(Value::Null) => None,
                Some(Value::Array(elements)) if elements.is_empty() => None,
                Some(ff) => Some(Box::new(parse_stmt(ff)?)),
            };
            Ok(Stmt::If {
                guard,
                then_body,
                else_body,
            })
        }
        "While" => {
            let parts = as_array(payload, "statement")?;
            if parts.len() != 2 {
                return Err(malformed("statement", "a [guard, body] pair", payload));
            }
            Ok(Stmt::While {
                guard: parse_exp(&parts[0])?,
                body: Box::new(parse_stmt(&parts[1])?),
            })
        }
        "Return" => {
            if payload.is_null() {
                Ok(Stmt::Return(None))
            } else {
                Ok(Stmt::Return(Some(parse_exp(payload)?)))
            }
        }
        "Stmts" => {
            let mut stmts = Vec::new();
            for element in as_array(payload, "statement")? {
                stmts.push(parse_stmt(element)?);
            }
            Ok(Stmt::Block(stmts))
        }
        _ => Err(AstError::UnknownTag {
            kind: "statement",
            name: key.to_string(),
        }),
    }
}
