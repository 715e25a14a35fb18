// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Programmatic construction of scenes.
//!
//! Mirrors what the front end emits: instance methods start with
//! `this = this: C`, every method assigns its formals with `p = parameterN`,
//! and `new C(args)` becomes an allocation followed by a `constructor` call.

use std::collections::{BTreeMap, HashMap};

use super::method::{Body, Class, File, ImportInfo, Method};
use super::scene::Scene;
use super::stmt::{Stmt, StmtKind};
use super::types::{FieldSignature, MethodSignature, Type, CONSTRUCTOR_NAME, DEFAULT_NAME};
use super::value::{Constant, Value};
use super::{ClassId, FileId, MethodId, StmtId, ValueId};

const SDK_FILE: &str = "%sdk";

#[derive(Default)]
pub struct SceneBuilder {
    scene: Scene,
    sdk_file: Option<FileId>,
    this_locals: HashMap<MethodId, ValueId>,
    param_locals: HashMap<MethodId, Vec<ValueId>>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source file together with its default class and method.
    pub fn add_file(&mut self, name: &str) -> FileId {
        let file_id = FileId::from_u32(self.scene.files.len() as u32);
        let class_name = format!("@{}/{}", name, DEFAULT_NAME);
        let class_id = self.push_class(&class_name, None, file_id, None, false);
        self.scene.files.push(File {
            id: file_id,
            name: name.to_string(),
            default_class: class_id,
            default_method: MethodId::from_u32(0),
            exports: BTreeMap::new(),
            imports: BTreeMap::new(),
        });
        let dflt = self.push_method(class_id, DEFAULT_NAME, true, false, &[], Type::Void, true, None);
        self.scene.files[file_id.as_usize()].default_method = dflt;
        file_id
    }

    pub fn default_method(&self, file: FileId) -> MethodId {
        self.scene.files[file.as_usize()].default_method
    }

    pub fn add_class(&mut self, file: FileId, name: &str, super_class: Option<&str>) -> ClassId {
        self.push_class(name, super_class, file, None, false)
    }

    /// Adds a body-less platform class.
    pub fn add_sdk_class(
        &mut self,
        name: &str,
        super_class: Option<&str>,
        namespace: Option<&str>,
    ) -> ClassId {
        let file = match self.sdk_file {
            Some(file) => file,
            None => {
                let file = self.add_file(SDK_FILE);
                self.sdk_file = Some(file);
                file
            }
        };
        self.push_class(name, super_class, file, namespace, true)
    }

    pub fn add_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        self.push_method(class, name, false, false, params, ret, true, None)
    }

    pub fn add_static_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        self.push_method(class, name, true, false, params, ret, true, None)
    }

    /// Adds a top-level function of `file`.
    pub fn add_function(
        &mut self,
        file: FileId,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        let class = self.scene.files[file.as_usize()].default_class;
        let outer = self.scene.files[file.as_usize()].default_method;
        self.push_method(class, name, true, false, params, ret, true, Some(outer))
    }

    /// Adds a closure lexically nested in `outer`.
    pub fn add_closure(
        &mut self,
        outer: MethodId,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        let class = self.scene.methods[outer.as_usize()].class;
        self.push_method(class, name, true, false, params, ret, true, Some(outer))
    }

    pub fn add_abstract_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        self.push_method(class, name, false, true, params, ret, false, None)
    }

    /// Adds a body-less method to a platform class.
    pub fn add_sdk_method(
        &mut self,
        class: ClassId,
        name: &str,
        is_static: bool,
        params: &[(&str, Type)],
        ret: Type,
    ) -> MethodId {
        self.push_method(class, name, is_static, false, params, ret, false, None)
    }

    pub fn this_local(&self, method: MethodId) -> ValueId {
        self.this_locals[&method]
    }

    pub fn param(&self, method: MethodId, index: usize) -> ValueId {
        self.param_locals[&method][index]
    }

    /// Declares (or returns the already declared) local `name` of `method`.
    pub fn local(&mut self, method: MethodId, name: &str, ty: Type) -> ValueId {
        if let Some(v) = self.scene.methods[method.as_usize()].local_by_name(name) {
            return v;
        }
        let v = self.add_value(Value::Local { name: name.to_string(), ty });
        if let Some(body) = self.scene.methods[method.as_usize()].body.as_mut() {
            body.locals.insert(name.to_string(), v);
        }
        v
    }

    /// A local that is used without being declared, i.e. captured from an
    /// enclosing scope or imported.
    pub fn free_local(&mut self, name: &str, ty: Type) -> ValueId {
        self.add_value(Value::Local { name: name.to_string(), ty })
    }

    pub fn add_value(&mut self, value: Value) -> ValueId {
        let id = ValueId::from_u32(self.scene.values.len() as u32);
        self.scene.values.push(value);
        id
    }

    pub fn new_expr(&mut self, class: &str) -> ValueId {
        self.add_value(Value::New { class: class.to_string() })
    }

    pub fn new_array_expr(&mut self, elem_ty: Type) -> ValueId {
        self.add_value(Value::NewArray { elem_ty })
    }

    pub fn str_const(&mut self, s: &str) -> ValueId {
        self.add_value(Value::Constant(Constant::Str(s.to_string())))
    }

    pub fn num_const(&mut self, n: &str) -> ValueId {
        self.add_value(Value::Constant(Constant::Number(n.to_string())))
    }

    pub fn field(&mut self, base: ValueId, class: &str, name: &str) -> ValueId {
        self.add_value(Value::InstanceField { base, field: FieldSignature::new(class, name) })
    }

    pub fn static_field(&mut self, class: &str, name: &str) -> ValueId {
        self.add_value(Value::StaticField { field: FieldSignature::new(class, name) })
    }

    pub fn array_elem(&mut self, base: ValueId, index: ValueId) -> ValueId {
        self.add_value(Value::ArrayRef { base, index })
    }

    pub fn function_ref(&mut self, method: MethodId) -> ValueId {
        self.add_value(Value::FunctionRef { method })
    }

    pub fn expr(&mut self, operands: Vec<ValueId>) -> ValueId {
        self.add_value(Value::Expr { operands })
    }

    pub fn assign(&mut self, method: MethodId, lhs: ValueId, rhs: ValueId) -> StmtId {
        self.push_stmt(method, StmtKind::Assign { lhs, rhs })
    }

    pub fn call_instance(
        &mut self,
        method: MethodId,
        lhs: Option<ValueId>,
        base: ValueId,
        sig: MethodSignature,
        args: Vec<ValueId>,
    ) -> StmtId {
        let expr = self.add_value(Value::InstanceInvoke { base, method: sig, args });
        self.push_call(method, lhs, expr)
    }

    pub fn call_static(
        &mut self,
        method: MethodId,
        lhs: Option<ValueId>,
        sig: MethodSignature,
        args: Vec<ValueId>,
    ) -> StmtId {
        let expr = self.add_value(Value::StaticInvoke { method: sig, args });
        self.push_call(method, lhs, expr)
    }

    pub fn call_ptr(
        &mut self,
        method: MethodId,
        lhs: Option<ValueId>,
        ptr: ValueId,
        args: Vec<ValueId>,
    ) -> StmtId {
        let expr = self.add_value(Value::PtrInvoke { ptr, args });
        self.push_call(method, lhs, expr)
    }

    /// Emits `lhs = new C` followed by `lhs.constructor(args)` when the class
    /// hierarchy declares a constructor. Returns the allocation statement.
    pub fn new_object(
        &mut self,
        method: MethodId,
        lhs: ValueId,
        class: &str,
        args: Vec<ValueId>,
    ) -> StmtId {
        let new = self.new_expr(class);
        let alloc = self.assign(method, lhs, new);
        if self.has_constructor(class) {
            self.call_instance(method, None, lhs, MethodSignature::new(class, CONSTRUCTOR_NAME), args);
        }
        alloc
    }

    pub fn ret(&mut self, method: MethodId, value: ValueId) -> StmtId {
        self.push_stmt(method, StmtKind::Return { op: value })
    }

    pub fn ret_void(&mut self, method: MethodId) -> StmtId {
        self.push_stmt(method, StmtKind::ReturnVoid)
    }

    pub fn export(&mut self, file: FileId, name: &str, local: ValueId) {
        self.scene.files[file.as_usize()].exports.insert(name.to_string(), local);
    }

    pub fn import(&mut self, file: FileId, local_name: &str, from: &str, name: &str) {
        self.scene.files[file.as_usize()].imports.insert(
            local_name.to_string(),
            ImportInfo { from: from.to_string(), name: name.to_string() },
        );
    }

    pub fn finish(mut self) -> Scene {
        self.scene.rebuild_indexes();
        self.scene
    }

    fn has_constructor(&self, class: &str) -> bool {
        let mut cur = self.scene.classes.iter().find(|c| c.name == class);
        let mut depth = 0;
        while let Some(c) = cur {
            if c.methods.contains_key(CONSTRUCTOR_NAME) {
                return true;
            }
            depth += 1;
            if depth > self.scene.classes.len() {
                break;
            }
            cur = c
                .super_class
                .as_ref()
                .and_then(|s| self.scene.classes.iter().find(|c| &c.name == s));
        }
        false
    }

    fn push_class(
        &mut self,
        name: &str,
        super_class: Option<&str>,
        file: FileId,
        namespace: Option<&str>,
        is_sdk: bool,
    ) -> ClassId {
        let id = ClassId::from_u32(self.scene.classes.len() as u32);
        self.scene.classes.push(Class {
            id,
            name: name.to_string(),
            super_class: super_class.map(|s| s.to_string()),
            file,
            namespace: namespace.map(|s| s.to_string()),
            is_sdk,
            methods: BTreeMap::new(),
        });
        id
    }

    #[allow(clippy::too_many_arguments)]
    fn push_method(
        &mut self,
        class: ClassId,
        name: &str,
        is_static: bool,
        is_abstract: bool,
        params: &[(&str, Type)],
        ret: Type,
        with_body: bool,
        outer_method: Option<MethodId>,
    ) -> MethodId {
        let id = MethodId::from_u32(self.scene.methods.len() as u32);
        let class_name = self.scene.classes[class.as_usize()].name.clone();
        self.scene.methods.push(Method {
            id,
            name: name.to_string(),
            class,
            signature: MethodSignature::new(class_name.clone(), name),
            is_static,
            is_abstract,
            params: params.iter().map(|(_, ty)| ty.clone()).collect(),
            return_type: ret,
            body: if with_body { Some(Body::default()) } else { None },
            outer_method,
        });
        self.scene.classes[class.as_usize()].methods.insert(name.to_string(), id);

        if with_body {
            if !is_static {
                let this = self.local(id, "this", Type::Class(class_name.clone()));
                let this_ref = self.add_value(Value::This { class: class_name });
                self.assign(id, this, this_ref);
                self.this_locals.insert(id, this);
            }
            let mut locals = Vec::new();
            for (index, (pname, ty)) in params.iter().enumerate() {
                let local = self.local(id, pname, ty.clone());
                let param = self.add_value(Value::Parameter { index, ty: ty.clone() });
                self.assign(id, local, param);
                locals.push(local);
            }
            self.param_locals.insert(id, locals);
        }
        id
    }

    fn push_call(&mut self, method: MethodId, lhs: Option<ValueId>, expr: ValueId) -> StmtId {
        match lhs {
            Some(lhs) => self.assign(method, lhs, expr),
            None => self.push_stmt(method, StmtKind::Invoke { expr }),
        }
    }

    fn push_stmt(&mut self, method: MethodId, kind: StmtKind) -> StmtId {
        let id = StmtId::from_u32(self.scene.stmts.len() as u32);
        self.scene.stmts.push(Stmt { method, kind });
        if let Some(body) = self.scene.methods[method.as_usize()].body.as_mut() {
            body.stmts.push(id);
        }
        id
    }
}
