// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{MethodSignature, Type, CONSTRUCTOR_NAME};
use super::{ClassId, FileId, MethodId, StmtId, ValueId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Body {
    /// Locals declared by this body, by name.
    pub locals: BTreeMap<String, ValueId>,
    pub stmts: Vec<StmtId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Method {
    pub id: MethodId,
    pub name: String,
    pub class: ClassId,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub is_abstract: bool,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub body: Option<Body>,
    /// The lexically enclosing method of a closure or nested function.
    pub outer_method: Option<MethodId>,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn declares(&self, value: ValueId) -> bool {
        self.body
            .as_ref()
            .map_or(false, |body| body.locals.values().any(|v| *v == value))
    }

    pub fn local_by_name(&self, name: &str) -> Option<ValueId> {
        self.body.as_ref().and_then(|body| body.locals.get(name).copied())
    }

    pub fn stmts(&self) -> &[StmtId] {
        self.body.as_ref().map_or(&[], |body| &body.stmts)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub super_class: Option<String>,
    pub file: FileId,
    pub namespace: Option<String>,
    /// Declared by the platform SDK; its methods have no bodies.
    pub is_sdk: bool,
    pub methods: BTreeMap<String, MethodId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub from: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    pub name: String,
    pub default_class: ClassId,
    pub default_method: MethodId,
    /// Exported name to the module-level local holding it.
    pub exports: BTreeMap<String, ValueId>,
    /// Local name to its origin.
    pub imports: BTreeMap<String, ImportInfo>,
}
