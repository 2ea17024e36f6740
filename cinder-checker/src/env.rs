use std::collections::HashMap;

use crate::ast::{ExternDecl, FunctionDef, StructDef};
use crate::types::Type;

/// The value environment: identifier to type. The global scope is built once
/// per program; each function check extends a value copy, so bindings cannot
/// leak back out.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Type>,
}

impl Scope {
    /// Seeds the global scope. Externs are bound at their raw function type;
    /// defined functions are bound as pointers to their function type, which
    /// is what lets them flow into function-pointer places. `main` is not
    /// bound at all.
    pub fn global(externs: &[ExternDecl], functions: &[FunctionDef]) -> Self {
        let mut scope = Scope::default();
        for ext in externs {
            scope.bind(
                ext.name.clone(),
                Type::Fn(ext.params.clone(), Box::new(ext.return_type.clone())),
            );
        }
        for function in functions {
            if function.name == "main" {
                continue;
            }
            let params = function
                .params
                .iter()
                .map(|param| param.ty.clone())
                .collect();
            let signature = Type::Fn(params, Box::new(function.return_type.clone()));
            scope.bind(function.name.clone(), Type::Ptr(Box::new(signature)));
        }
        scope
    }

    pub fn child(&self) -> Scope {
        self.clone()
    }

    pub fn bind(&mut self, name: String, ty: Type) {
        self.bindings.insert(name, ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }
}

/// The struct environment: struct name to its field table.
#[derive(Debug, Clone, Default)]
pub struct StructTable {
    structs: HashMap<String, HashMap<String, Type>>,
}

impl StructTable {
    pub fn from_defs(structs: &[StructDef]) -> Self {
        let mut table = StructTable::default();
        for def in structs {
            let mut fields = HashMap::new();
            for field in &def.fields {
                fields.insert(field.name.clone(), field.ty.clone());
            }
            table.structs.insert(def.name.clone(), fields);
        }
        table
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn field(&self, struct_name: &str, field: &str) -> Option<&Type> {
        self.structs.get(struct_name)?.get(field)
    }
}
