use std::collections::HashSet;

use thiserror::Error;

use crate::ast::{Exp, FunCall, FunctionDef, Place, Program, Stmt, StructDef};
use crate::env::{Scope, StructTable};
use crate::types::{compatible, pick_non_nil, Type};

/// A typing-rule rejection. The first one raised terminates checking; its
/// message becomes the `invalid: <message>` verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TypeError {
    message: String,
}

impl TypeError {
    fn new(message: impl Into<String>) -> Self {
        TypeError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Everything a statement rule needs besides the scope: the enclosing
/// function's return type and whether the statement sits inside a loop.
#[derive(Clone, Copy)]
struct StmtContext<'a> {
    return_type: &'a Type,
    in_loop: bool,
}

pub fn check_program(program: &Program) -> Result<(), TypeError> {
    // Top-level names share one namespace: structs, externs, and functions
    // may not collide with each other or themselves.
    let mut top_level = HashSet::new();
    let names = program
        .structs
        .iter()
        .map(|s| s.name.as_str())
        .chain(program.externs.iter().map(|e| e.name.as_str()))
        .chain(program.functions.iter().map(|f| f.name.as_str()));
    for name in names {
        if !top_level.insert(name) {
            return Err(TypeError::new(format!("Duplicate name: {name}")));
        }
    }

    let mut main_found = false;
    for function in &program.functions {
        if function.name == "main" {
            if function.params.is_empty() && function.return_type == Type::Int {
                main_found = true;
            } else {
                return Err(TypeError::new(
                    "function 'main' exists but has wrong type, should be '() -> int'",
                ));
            }
        }
    }
    if !main_found {
        return Err(TypeError::new(
            "no 'main' function with type '() -> int' exists",
        ));
    }

    let checker = TypeChecker {
        globals: Scope::global(&program.externs, &program.functions),
        structs: StructTable::from_defs(&program.structs),
    };
    for def in &program.structs {
        checker.check_struct(def)?;
    }
    for function in &program.functions {
        checker.check_function(function)?;
    }
    Ok(())
}

struct TypeChecker {
    globals: Scope,
    structs: StructTable,
}

impl TypeChecker {
    fn check_struct(&self, def: &StructDef) -> Result<(), TypeError> {
        if def.fields.is_empty() {
            return Err(TypeError::new(format!("empty struct {}", def.name)));
        }
        let mut seen = HashSet::new();
        for field in &def.fields {
            if !field.ty.is_storable() {
                return Err(TypeError::new(format!(
                    "invalid type {} for struct field {}::{}",
                    field.ty.describe(),
                    def.name,
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(TypeError::new(format!(
                    "Duplicate field name '{}' in struct '{}'",
                    field.name, def.name
                )));
            }
        }
        Ok(())
    }

    fn check_function(&self, function: &FunctionDef) -> Result<(), TypeError> {
        let mut scope = self.globals.child();
        let mut seen = HashSet::new();
        for decl in function.params.iter().chain(function.locals.iter()) {
            if !decl.ty.is_storable() {
                return Err(TypeError::new(format!(
                    "invalid type {} for variable {} in function {}",
                    decl.ty.describe(),
                    decl.name,
                    function.name
                )));
            }
            if !seen.insert(decl.name.as_str()) {
                return Err(TypeError::new(format!(
                    "Duplicate parameter/local name '{}' in function '{}'",
                    decl.name, function.name
                )));
            }
            scope.bind(decl.name.clone(), decl.ty.clone());
        }

        match &function.body {
            Stmt::Block(stmts) if !stmts.is_empty() => {}
            _ => {
                return Err(TypeError::new(format!(
                    "function {} has an empty body",
                    function.name
                )))
            }
        }

        let ctx = StmtContext {
            return_type: &function.return_type,
            in_loop: false,
        };
        if !self.check_stmt(&scope, &function.body, ctx)? {
            return Err(TypeError::new(format!(
                "function {} may not execute a return",
                function.name
            )));
        }
        Ok(())
    }

    /// Checks one statement and reports whether it definitely executes a
    /// return on every path that completes normally.
    fn check_stmt(&self, scope: &Scope, stmt: &Stmt, ctx: StmtContext) -> Result<bool, TypeError> {
        match stmt {
            Stmt::Block(stmts) => {
                let mut returns = false;
                // Statements after a guaranteed return are still checked;
                // only the flag stops changing.
                for stmt in stmts {
                    returns |= self.check_stmt(scope, stmt, ctx)?;
                }
                Ok(returns)
            }
            Stmt::Assign { target, value } => {
                let target_type = self.check_place(scope, target)?;
                let value_type = self.check_exp(scope, value)?;
                if !target_type.is_storable() {
                    return Err(TypeError::new(format!(
                        "invalid type {} for left-hand side of assignment '{} = {}'",
                        target_type.describe(),
                        target.describe(),
                        value.describe()
                    )));
                }
                if !compatible(&target_type, &value_type) {
                    return Err(TypeError::new(format!(
                        "incompatible types {} vs {} for assignment '{} = {}'",
                        target_type.describe(),
                        value_type.describe(),
                        target.describe(),
                        value.describe()
                    )));
                }
                Ok(false)
            }
            Stmt::Call(call) => {
                self.check_call(scope, call)?;
                Ok(false)
            }
            Stmt::If {
                guard,
                then_body,
                else_body,
            } => {
                let guard_type = self.check_exp(scope, guard)?;
                if !compatible(&guard_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int type {} for if guard '{}'",
                        guard_type.describe(),
                        guard.describe()
                    )));
                }
                let then_returns = self.check_stmt(scope, then_body, ctx)?;
                let else_returns = match else_body {
                    Some(else_body) => self.check_stmt(scope, else_body, ctx)?,
                    None => false,
                };
                Ok(then_returns && else_returns)
            }
            Stmt::While { guard, body } => {
                let guard_type = self.check_exp(scope, guard)?;
                if !compatible(&guard_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int type {} for while guard '{}'",
                        guard_type.describe(),
                        guard.describe()
                    )));
                }
                self.check_stmt(
                    scope,
                    body,
                    StmtContext {
                        in_loop: true,
                        ..ctx
                    },
                )?;
                // The loop may run zero times, so it never guarantees a
                // return on its own.
                Ok(false)
            }
            Stmt::Return(Some(exp)) => {
                let exp_type = self.check_exp(scope, exp)?;
                if !compatible(&exp_type, ctx.return_type) {
                    return Err(TypeError::new(format!(
                        "incompatible return type {} for 'return {}', should be {}",
                        exp_type.describe(),
                        exp.describe(),
                        ctx.return_type.describe()
                    )));
                }
                Ok(true)
            }
            Stmt::Return(None) => Err(TypeError::new(
                "return statement requires an expression in this function",
            )),
            Stmt::Break => {
                if !ctx.in_loop {
                    return Err(TypeError::new("break outside loop"));
                }
                Ok(false)
            }
            Stmt::Continue => {
                if !ctx.in_loop {
                    return Err(TypeError::new("continue outside loop"));
                }
                Ok(false)
            }
        }
    }

    fn check_place(&self, scope: &Scope, place: &Place) -> Result<Type, TypeError> {
        match place {
            Place::Id(name) => scope.lookup(name).cloned().ok_or_else(|| {
                TypeError::new(format!("id {name} does not exist in this scope"))
            }),
            Place::Deref(exp) => {
                let exp_type = self.check_exp(scope, exp)?;
                match exp_type {
                    Type::Ptr(pointee) => Ok(*pointee),
                    other => Err(TypeError::new(format!(
                        "non-pointer type {} for dereference '{}'",
                        other.describe(),
                        place.describe()
                    ))),
                }
            }
            Place::ArrayAccess { array, index } => {
                let array_type = self.check_exp(scope, array)?;
                let index_type = self.check_exp(scope, index)?;
                if !compatible(&index_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int index type {} for array access '{}'",
                        index_type.describe(),
                        place.describe()
                    )));
                }
                match array_type {
                    Type::Array(element) => Ok(*element),
                    other => Err(TypeError::new(format!(
                        "non-array type {} for array access '{}'",
                        other.describe(),
                        place.describe()
                    ))),
                }
            }
            Place::FieldAccess { base, field } => {
                let base_type = self.check_exp(scope, base)?;
                let Type::Ptr(pointee) = &base_type else {
                    return Err(TypeError::new(format!(
                        "<{}> is not a struct pointer type in field access '{}'",
                        base_type.describe(),
                        place.describe()
                    )));
                };
                let Type::Struct(struct_name) = pointee.as_ref() else {
                    return Err(TypeError::new(format!(
                        "pointer type <{}> does not point to a struct in field access '{}'",
                        base_type.describe(),
                        place.describe()
                    )));
                };
                if !self.structs.contains(struct_name) {
                    return Err(TypeError::new(format!(
                        "non-existent struct type {} in field access '{}'",
                        struct_name,
                        place.describe()
                    )));
                }
                match self.structs.field(struct_name, field) {
                    Some(field_type) => Ok(field_type.clone()),
                    None => Err(TypeError::new(format!(
                        "non-existent field {}::{} in field access '{}'",
                        struct_name,
                        field,
                        place.describe()
                    ))),
                }
            }
        }
    }

    fn check_exp(&self, scope: &Scope, exp: &Exp) -> Result<Type, TypeError> {
        match exp {
            Exp::Val(place) => self.check_place(scope, place),
            Exp::Num(value) => {
                if *value >= 0 {
                    Ok(Type::Int)
                } else {
                    Err(TypeError::new(format!(
                        "negative number {value} is not allowed"
                    )))
                }
            }
            Exp::Nil => Ok(Type::Nil),
            Exp::Select { guard, tt, ff } => {
                let guard_type = self.check_exp(scope, guard)?;
                if !compatible(&guard_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int type {} for select guard '{}'",
                        guard_type.describe(),
                        guard.describe()
                    )));
                }
                let tt_type = self.check_exp(scope, tt)?;
                let ff_type = self.check_exp(scope, ff)?;
                if !compatible(&tt_type, &ff_type) {
                    return Err(TypeError::new(format!(
                        "incompatible types {} vs {} in select branches '{}' vs '{}'",
                        tt_type.describe(),
                        ff_type.describe(),
                        tt.describe(),
                        ff.describe()
                    )));
                }
                Ok(pick_non_nil(&tt_type, &ff_type).clone())
            }
            Exp::UnOp { operand, .. } => {
                let operand_type = self.check_exp(scope, operand)?;
                if !compatible(&operand_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int operand type {} in unary op '{}'",
                        operand_type.describe(),
                        exp.describe()
                    )));
                }
                Ok(Type::Int)
            }
            Exp::BinOp { op, left, right } => {
                let left_type = self.check_exp(scope, left)?;
                let right_type = self.check_exp(scope, right)?;
                if op.is_equality() {
                    if !compatible(&left_type, &right_type) {
                        return Err(TypeError::new(format!(
                            "incompatible types {} vs {} in binary op '{}'",
                            left_type.describe(),
                            right_type.describe(),
                            exp.describe()
                        )));
                    }
                    // Struct and function values have no identity to compare.
                    for operand_type in [&left_type, &right_type] {
                        if matches!(operand_type, Type::Struct(_) | Type::Fn(..)) {
                            return Err(TypeError::new(format!(
                                "invalid type {} used in binary op '{}'",
                                operand_type.describe(),
                                exp.describe()
                            )));
                        }
                    }
                } else {
                    if !compatible(&left_type, &Type::Int) {
                        return Err(TypeError::new(format!(
                            "non-int type {} for left operand of binary op '{}'",
                            left_type.describe(),
                            exp.describe()
                        )));
                    }
                    if !compatible(&right_type, &Type::Int) {
                        return Err(TypeError::new(format!(
                            "right operand of binary op '{}' has type {}, should be int",
                            exp.describe(),
                            right_type.describe()
                        )));
                    }
                }
                Ok(Type::Int)
            }
            Exp::NewSingle(ty) => {
                if matches!(ty, Type::Nil | Type::Fn(..)) {
                    return Err(TypeError::new(format!(
                        "invalid type used for allocation '{}'",
                        exp.describe()
                    )));
                }
                if let Type::Struct(name) = ty {
                    if !self.structs.contains(name) {
                        return Err(TypeError::new(format!(
                            "allocating non-existent struct type '{}'",
                            exp.describe()
                        )));
                    }
                }
                Ok(Type::Ptr(Box::new(ty.clone())))
            }
            Exp::NewArray { element, count } => {
                let count_type = self.check_exp(scope, count)?;
                if !compatible(&count_type, &Type::Int) {
                    return Err(TypeError::new(format!(
                        "non-int type {} used for second argument of allocation '{}'",
                        count_type.describe(),
                        exp.describe()
                    )));
                }
                if !element.is_storable() {
                    return Err(TypeError::new(format!(
                        "invalid type used for first argument of allocation '{}'",
                        exp.describe()
                    )));
                }
                Ok(Type::Array(Box::new(element.clone())))
            }
            Exp::Call(call) => self.check_call(scope, call),
        }
    }

    fn check_call(&self, scope: &Scope, call: &FunCall) -> Result<Type, TypeError> {
        // A direct call to `main` is rejected before the callee is even
        // looked up; `main` is never bound in the global scope.
        if let Exp::Val(place) = call.callee.as_ref() {
            if matches!(place.as_ref(), Place::Id(name) if name == "main") {
                return Err(TypeError::new("trying to call 'main'"));
            }
        }

        let callee_type = self.check_exp(scope, &call.callee)?;
        // Externs are bound at their raw function type, defined functions
        // and function-typed places as pointers to one; accept both shapes.
        let (params, return_type) = match &callee_type {
            Type::Fn(params, return_type) => (params, return_type),
            Type::Ptr(pointee) => match pointee.as_ref() {
                Type::Fn(params, return_type) => (params, return_type),
                _ => {
                    return Err(TypeError::new(format!(
                        "trying to call type {} as function pointer in call '{}'",
                        callee_type.describe(),
                        call.describe()
                    )))
                }
            },
            _ => {
                return Err(TypeError::new(format!(
                    "trying to call type {} as function pointer in call '{}'",
                    callee_type.describe(),
                    call.describe()
                )))
            }
        };

        if call.args.len() != params.len() {
            return Err(TypeError::new(format!(
                "incorrect number of arguments ({} vs {}) in call '{}'",
                call.args.len(),
                params.len(),
                call.describe()
            )));
        }
        for (arg, param_type) in call.args.iter().zip(params.iter()) {
            let arg_type = self.check_exp(scope, arg)?;
            if !compatible(&arg_type, param_type) {
                return Err(TypeError::new(format!(
                    "incompatible argument type {} vs parameter type {} for argument '{}' in call '{}'",
                    arg_type.describe(),
                    param_type.describe(),
                    arg.describe(),
                    call.describe()
                )));
            }
        }
        Ok(return_type.as_ref().clone())
    }
}
