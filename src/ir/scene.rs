// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The program fact base the analysis runs on.

use std::collections::{HashMap, HashSet, VecDeque};

use log::*;
use serde::{Deserialize, Serialize};

use super::known_names::GLOBAL_THIS;
use super::method::{Class, File, Method};
use super::stmt::{Stmt, StmtKind};
use super::types::{MethodSignature, Type};
use super::value::Value;
use super::{ClassId, FileId, MethodId, StmtId, ValueId};
use crate::error::{PtaError, PtaResult};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    pub(crate) files: Vec<File>,
    pub(crate) classes: Vec<Class>,
    pub(crate) methods: Vec<Method>,
    pub(crate) stmts: Vec<Stmt>,
    pub(crate) values: Vec<Value>,

    #[serde(skip)]
    class_by_name: HashMap<String, ClassId>,
    #[serde(skip)]
    method_by_sig: HashMap<MethodSignature, MethodId>,
    #[serde(skip)]
    direct_subclasses: HashMap<ClassId, Vec<ClassId>>,
}

impl Scene {
    /// Loads a scene serialized as JSON.
    pub fn from_json(json: &str) -> PtaResult<Scene> {
        let mut scene: Scene =
            serde_json::from_str(json).map_err(|e| PtaError::SceneLoad(e.to_string()))?;
        scene.rebuild_indexes();
        Ok(scene)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Recomputes the lookup tables derived from the arenas.
    pub fn rebuild_indexes(&mut self) {
        self.class_by_name.clear();
        self.method_by_sig.clear();
        self.direct_subclasses.clear();
        for class in &self.classes {
            if self.class_by_name.insert(class.name.clone(), class.id).is_some() {
                warn!("Duplicate class name {}", class.name);
            }
        }
        for method in &self.methods {
            self.method_by_sig.insert(method.signature.clone(), method.id);
        }
        for class in &self.classes {
            if let Some(super_name) = &class.super_class {
                match self.class_by_name.get(super_name) {
                    Some(super_id) => self
                        .direct_subclasses
                        .entry(*super_id)
                        .or_default()
                        .push(class.id),
                    None => debug!("Superclass {} of {} is not in the scene", super_name, class.name),
                }
            }
        }
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.as_usize()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.as_usize()]
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.as_usize()]
    }

    #[inline]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.as_usize()]
    }

    #[inline]
    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.as_usize()]
    }

    /// The property name of `globalThis.<name>` references.
    pub fn global_property(&self, id: ValueId) -> Option<&str> {
        match self.value(id) {
            Value::InstanceField { base, field } if self.value(*base).local_name() == Some(GLOBAL_THIS) => {
                Some(&field.name)
            }
            _ => None,
        }
    }

    /// Field and array references through a heap object. Global properties
    /// are plain global variables.
    pub fn is_heap_ref(&self, id: ValueId) -> bool {
        self.value(id).is_field_like() && self.global_property(id).is_none()
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.iter()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_by_name.get(name).copied()
    }

    pub fn method_by_sig(&self, sig: &MethodSignature) -> Option<MethodId> {
        self.method_by_sig.get(sig).copied()
    }

    pub fn class_of_method(&self, method: MethodId) -> &Class {
        self.class(self.method(method).class)
    }

    pub fn file_of_method(&self, method: MethodId) -> &File {
        self.file(self.class_of_method(method).file)
    }

    /// Looks a file up by its name, ignoring a trailing extension.
    pub fn file_by_name(&self, name: &str) -> Option<FileId> {
        let stem = |s: &str| s.rsplit_once('.').map_or(s, |(stem, _)| stem).to_string();
        let wanted = stem(name.trim_start_matches("./"));
        self.files
            .iter()
            .find(|f| f.name == name || stem(&f.name) == wanted || stem(&f.name).ends_with(&format!("/{}", wanted)))
            .map(|f| f.id)
    }

    /// Finds a method by `Class.method` signature or by a file name, which
    /// denotes that file's default method.
    pub fn find_method(&self, name: &str) -> Option<MethodId> {
        if let Some((class, method)) = name.rsplit_once('.') {
            if let Some(m) = self.method_by_sig(&MethodSignature::new(class, method)) {
                return Some(m);
            }
        }
        if let Some(file) = self.file_by_name(name) {
            return Some(self.file(file).default_method);
        }
        let mut by_name = self.methods.iter().filter(|m| m.name == name);
        match (by_name.next(), by_name.next()) {
            (Some(m), None) => Some(m.id),
            _ => None,
        }
    }

    pub fn super_class(&self, class: ClassId) -> Option<ClassId> {
        self.class(class)
            .super_class
            .as_ref()
            .and_then(|name| self.class_by_name(name))
    }

    /// The class followed by its superclasses, nearest first.
    pub fn super_chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = vec![class];
        let mut cur = class;
        while let Some(sup) = self.super_class(cur) {
            if chain.contains(&sup) {
                warn!("Cyclic class hierarchy at {}", self.class(sup).name);
                break;
            }
            chain.push(sup);
            cur = sup;
        }
        chain
    }

    /// First method called `name` found walking up from `class`.
    pub fn find_method_in_hierarchy(&self, class: ClassId, name: &str) -> Option<MethodId> {
        self.super_chain(class)
            .into_iter()
            .find_map(|c| self.class(c).methods.get(name).copied())
    }

    /// All transitive subclasses of `class`.
    pub fn subclasses(&self, class: ClassId) -> Vec<ClassId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ClassId> = VecDeque::from([class]);
        while let Some(c) = queue.pop_front() {
            for sub in self.direct_subclasses.get(&c).into_iter().flatten() {
                if visited.insert(*sub) {
                    result.push(*sub);
                    queue.push_back(*sub);
                }
            }
        }
        result
    }

    pub fn is_declared_in(&self, method: MethodId, value: ValueId) -> bool {
        self.method(method).declares(value)
    }

    /// Resolves a local used in `method` but declared elsewhere. Enclosing
    /// methods are searched first, then the module-level code of the file,
    /// then the file's imports.
    pub fn resolve_external_local(
        &self,
        method: MethodId,
        value: ValueId,
    ) -> Option<(MethodId, ValueId)> {
        let name = self.value(value).local_name()?;
        let mut outer = self.method(method).outer_method;
        let mut visited = HashSet::new();
        while let Some(m) = outer {
            if !visited.insert(m) {
                break;
            }
            if let Some(v) = self.method(m).local_by_name(name) {
                return Some((m, v));
            }
            outer = self.method(m).outer_method;
        }

        let file = self.file_of_method(method);
        if file.default_method != method {
            if let Some(v) = self.method(file.default_method).local_by_name(name) {
                return Some((file.default_method, v));
            }
        }

        let import = file.imports.get(name)?;
        let Some(from) = self.file_by_name(&import.from) else {
            warn!("Import source {} of {} not found", import.from, name);
            return None;
        };
        let from = self.file(from);
        match from.exports.get(&import.name) {
            Some(v) => Some((from.default_method, *v)),
            None => {
                warn!("{} does not export {}", from.name, import.name);
                None
            }
        }
    }

    /// The invoke expression of a call statement.
    pub fn invoke_expr(&self, stmt: StmtId) -> Option<ValueId> {
        match self.stmt(stmt).kind {
            StmtKind::Invoke { expr } => Some(expr),
            StmtKind::Assign { rhs, .. } if self.value(rhs).is_invoke() => Some(rhs),
            _ => None,
        }
    }

    /// The `this = this: C` statement of an instance method.
    pub fn this_assign_stmt(&self, method: MethodId) -> Option<StmtId> {
        self.method(method).stmts().iter().copied().find(|s| {
            self.stmt(*s)
                .rhs()
                .map_or(false, |rhs| matches!(self.value(rhs), Value::This { .. }))
        })
    }

    pub fn this_local(&self, method: MethodId) -> Option<ValueId> {
        self.this_assign_stmt(method).and_then(|s| self.stmt(s).lhs())
    }

    /// Locals receiving formal parameters, indexed by parameter position.
    pub fn param_locals(&self, method: MethodId) -> Vec<Option<ValueId>> {
        let m = self.method(method);
        let mut params = vec![None; m.params.len()];
        for stmt in m.stmts() {
            let stmt = self.stmt(*stmt);
            if let StmtKind::Assign { lhs, rhs } = stmt.kind {
                if let Value::Parameter { index, .. } = self.value(rhs) {
                    if *index >= params.len() {
                        params.resize(*index + 1, None);
                    }
                    params[*index] = Some(lhs);
                }
            }
        }
        params
    }

    pub fn return_stmts(&self, method: MethodId) -> Vec<StmtId> {
        self.method(method)
            .stmts()
            .iter()
            .copied()
            .filter(|s| matches!(self.stmt(*s).kind, StmtKind::Return { .. }))
            .collect()
    }

    pub fn value_type(&self, value: ValueId) -> Type {
        match self.value(value) {
            Value::Local { ty, .. } | Value::Parameter { ty, .. } => ty.clone(),
            Value::This { class } | Value::New { class } => Type::Class(class.clone()),
            Value::NewArray { elem_ty } => Type::Array(Box::new(elem_ty.clone())),
            Value::FunctionRef { method } => Type::Function(self.method(*method).signature.clone()),
            Value::Constant(_) => Type::Primitive("constant".to_string()),
            _ => Type::Unknown,
        }
    }

    /// Human readable rendering used by dumps and logs.
    pub fn value_to_string(&self, value: ValueId) -> String {
        match self.value(value) {
            Value::Local { name, .. } => name.clone(),
            Value::Parameter { index, .. } => format!("parameter{}", index),
            Value::This { class } => format!("this: {}", class),
            Value::InstanceField { base, field } => {
                format!("{}.{}", self.value_to_string(*base), field.name)
            }
            Value::StaticField { field } => field.to_string(),
            Value::ArrayRef { base, index } => format!(
                "{}[{}]",
                self.value_to_string(*base),
                self.value_to_string(*index)
            ),
            Value::New { class } => format!("new {}", class),
            Value::NewArray { elem_ty } => format!("new {}[]", elem_ty),
            Value::Constant(c) => format!("{:?}", c),
            Value::FunctionRef { method } => format!("fn {}", self.method(*method).signature),
            Value::InstanceInvoke { base, method, .. } => {
                format!("{}.<{}>()", self.value_to_string(*base), method)
            }
            Value::StaticInvoke { method, .. } => format!("<{}>()", method),
            Value::PtrInvoke { ptr, .. } => format!("{}()", self.value_to_string(*ptr)),
            Value::Expr { .. } => "expr".to_string(),
        }
    }
}
