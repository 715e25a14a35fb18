// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Read-only model of the analysed program: files, classes, methods and their
//! three-address bodies, all stored in arenas indexed by newtyped ids.

pub mod known_names;
pub mod method;
pub mod scene;
pub mod scene_builder;
pub mod stmt;
pub mod types;
pub mod value;

use crate::util::newtype_index;

newtype_index! {
    pub struct ClassId { DEBUG_FORMAT = "class{}" }
}

newtype_index! {
    pub struct MethodId { DEBUG_FORMAT = "method{}" }
}

newtype_index! {
    pub struct StmtId { DEBUG_FORMAT = "stmt{}" }
}

newtype_index! {
    pub struct ValueId { DEBUG_FORMAT = "value{}" }
}

newtype_index! {
    pub struct FileId { DEBUG_FORMAT = "file{}" }
}

/// Functions are identified by their method.
pub type FuncId = MethodId;

pub use method::{Body, Class, File, ImportInfo, Method};
pub use scene::Scene;
pub use scene_builder::SceneBuilder;
pub use stmt::{Stmt, StmtKind};
pub use types::{FieldSignature, MethodSignature, Type};
pub use value::{Constant, Value};

#[cfg(test)]
mod test {
    use super::*;

    fn closure_scene() -> (Scene, MethodId, ValueId, ValueId) {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let outer = sb.add_function(file, "outer", &[], Type::Void);
        let x = sb.local(outer, "x", Type::class("Foo"));
        let inner = sb.add_closure(outer, "%AM0", &[], Type::Void);
        let x_use = sb.free_local("x", Type::class("Foo"));
        let y = sb.local(inner, "y", Type::class("Foo"));
        sb.assign(inner, y, x_use);
        (sb.finish(), inner, x, x_use)
    }

    #[test]
    fn resolves_captured_local_to_enclosing_method() {
        let (scene, inner, x, x_use) = closure_scene();
        assert!(!scene.is_declared_in(inner, x_use));
        let (decl_method, decl) = scene.resolve_external_local(inner, x_use).unwrap();
        assert_eq!(decl, x);
        assert_eq!(scene.method(decl_method).name, "outer");
    }

    #[test]
    fn resolves_imported_local_through_exports() {
        let mut sb = SceneBuilder::new();
        let lib = sb.add_file("lib.ets");
        let lib_dflt = sb.default_method(lib);
        let shared = sb.local(lib_dflt, "shared", Type::class("Foo"));
        sb.export(lib, "shared", shared);
        let main = sb.add_file("main.ets");
        sb.import(main, "s", "lib", "shared");
        let f = sb.add_function(main, "f", &[], Type::Void);
        let s_use = sb.free_local("s", Type::class("Foo"));
        let scene = sb.finish();
        assert_eq!(scene.resolve_external_local(f, s_use), Some((lib_dflt, shared)));
    }

    #[test]
    fn hierarchy_queries() {
        let mut sb = SceneBuilder::new();
        let file = sb.add_file("main.ets");
        let base = sb.add_class(file, "Base", None);
        let a = sb.add_class(file, "A", Some("Base"));
        let b = sb.add_class(file, "B", Some("A"));
        let foo = sb.add_method(base, "foo", &[], Type::Void);
        let scene = sb.finish();
        assert_eq!(scene.super_chain(b), vec![b, a, base]);
        assert_eq!(scene.find_method_in_hierarchy(b, "foo"), Some(foo));
        assert_eq!(scene.subclasses(base), vec![a, b]);
        assert!(scene.this_local(foo).is_some());
        assert_eq!(scene.find_method("Base.foo"), Some(foo));
    }
}
