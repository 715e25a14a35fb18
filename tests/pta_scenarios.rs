// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;

use arkpta::error::PtaError;
use arkpta::ir::known_names::GLOBAL_THIS;
use arkpta::ir::types::UNKNOWN_CLASS;
use arkpta::ir::{MethodId, MethodSignature, Scene, SceneBuilder, Type, ValueId};
use arkpta::pta::context::DUMMY_CID;
use arkpta::pta::context_strategy::ContextType;
use arkpta::pta::PointerAnalysis;
use arkpta::pts_set::points_to::PtsCollectionType;
use arkpta::util::options::{AnalysisOptions, AnalysisScale};
use arkpta::util::results_dumper;

/// Class of the top-level functions of `app.ets`.
const APP: &str = "@app.ets/%dflt";

fn options(entries: &[&str]) -> AnalysisOptions {
    AnalysisOptions {
        entries: entries.iter().map(|e| e.to_string()).collect(),
        ..AnalysisOptions::default()
    }
}

fn with_context(entries: &[&str], context_type: ContextType, depth: u32) -> AnalysisOptions {
    AnalysisOptions {
        context_type,
        context_depth: depth,
        ..options(entries)
    }
}

fn run<'s>(scene: &'s Scene, options: AnalysisOptions) -> PointerAnalysis<'s> {
    let mut pta = PointerAnalysis::new(scene, options);
    pta.analyze().unwrap();
    pta
}

fn app_fn(name: &str) -> MethodSignature {
    MethodSignature::new(APP, name)
}

/// Classes of the objects `value` points to, over all contexts.
fn classes(pta: &PointerAnalysis<'_>, value: ValueId) -> BTreeSet<String> {
    pta.points_to_by_value(value)
        .into_iter()
        .filter_map(|obj| pta.pag().node(obj).obj_class().map(|c| c.to_string()))
        .collect()
}

/// Functions `value` points to, over all contexts.
fn funcs(pta: &PointerAnalysis<'_>, value: ValueId) -> BTreeSet<MethodId> {
    pta.points_to_by_value(value)
        .into_iter()
        .filter_map(|obj| pta.pag().node(obj).func_info().map(|f| f.method))
        .collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// A test of allocation, copy, store and load.
#[test]
fn objects_flow_through_locals_and_fields() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    sb.add_class(file, "Bar", None);
    let main = sb.add_function(file, "main", &[], Type::Void);
    let a = sb.local(main, "a", Type::class("Foo"));
    let b = sb.local(main, "b", Type::class("Foo"));
    let c = sb.local(main, "c", Type::class("Bar"));
    let d = sb.local(main, "d", Type::class("Foo"));
    sb.new_object(main, a, "Foo", vec![]);
    sb.assign(main, b, a);
    sb.new_object(main, c, "Bar", vec![]);
    let store = sb.field(c, "Bar", "f");
    sb.assign(main, store, b);
    let load = sb.field(c, "Bar", "f");
    sb.assign(main, d, load);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, b), set(&["Foo"]));
    assert_eq!(classes(&pta, c), set(&["Bar"]));
    assert_eq!(classes(&pta, d), set(&["Foo"]));
    assert!(pta.rounds() >= 1);
}

// A test of module code being the default entry.
#[test]
fn module_code_of_every_file_is_analysed_without_entries() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    let dflt = sb.default_method(file);
    let x = sb.local(dflt, "x", Type::class("Foo"));
    sb.new_object(dflt, x, "Foo", vec![]);
    let scene = sb.finish();

    let pta = run(&scene, AnalysisOptions::default());
    assert_eq!(classes(&pta, x), set(&["Foo"]));
    assert_eq!(pta.builder().entries().len(), 1);
}

#[test]
fn unknown_entries_are_rejected() {
    let mut sb = SceneBuilder::new();
    sb.add_file("app.ets");
    let scene = sb.finish();

    let mut pta = PointerAnalysis::new(&scene, options(&["nowhere"]));
    match pta.analyze() {
        Err(PtaError::UnknownEntry(name)) => assert_eq!(name, "nowhere"),
        other => panic!("unexpected result {:?}", other),
    }
}

/// `id(p) { r = p; return r }` called with a `B` and with a `C`.
fn identity_scene() -> (Scene, MethodId, ValueId, ValueId) {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "B", None);
    sb.add_class(file, "C", None);
    let id = sb.add_function(file, "id", &[("p", Type::Any)], Type::Any);
    let r = sb.local(id, "r", Type::Any);
    let p = sb.param(id, 0);
    sb.assign(id, r, p);
    sb.ret(id, r);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let b = sb.local(main, "b", Type::class("B"));
    let c = sb.local(main, "c", Type::class("C"));
    let r1 = sb.local(main, "r1", Type::Any);
    let r2 = sb.local(main, "r2", Type::Any);
    sb.new_object(main, b, "B", vec![]);
    sb.new_object(main, c, "C", vec![]);
    sb.call_static(main, Some(r1), app_fn("id"), vec![b]);
    sb.call_static(main, Some(r2), app_fn("id"), vec![c]);
    (sb.finish(), id, r1, r2)
}

// A test of call site sensitivity keeping two calls of one function apart.
#[test]
fn call_site_contexts_separate_calls() {
    let (scene, id, r1, r2) = identity_scene();

    let pta = run(&scene, with_context(&["main"], ContextType::CallSite, 1));
    assert_eq!(classes(&pta, r1), set(&["B"]));
    assert_eq!(classes(&pta, r2), set(&["C"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&id));

    let pta = run(&scene, with_context(&["main"], ContextType::CallSite, 0));
    assert_eq!(classes(&pta, r1), set(&["B", "C"]));
    assert_eq!(classes(&pta, r2), set(&["B", "C"]));
}

// A test of deeper contexts never adding points-to facts.
#[test]
fn deeper_contexts_only_refine_results() {
    let (scene, id, r1, r2) = identity_scene();
    let p = scene.param_locals(id)[0].unwrap();
    let results: Vec<Vec<BTreeSet<String>>> = [0, 1, 2]
        .iter()
        .map(|k| {
            let pta = run(&scene, with_context(&["main"], ContextType::CallSite, *k));
            vec![classes(&pta, r1), classes(&pta, r2), classes(&pta, p)]
        })
        .collect();
    for pair in results.windows(2) {
        for (coarse, fine) in pair[0].iter().zip(pair[1].iter()) {
            assert!(fine.is_subset(coarse));
        }
    }
}

#[test]
fn points_to_set_representations_agree() {
    let (scene, _, r1, r2) = identity_scene();
    let bitvec = run(&scene, options(&["main"]));
    let hashset = run(
        &scene,
        AnalysisOptions {
            pts_collection: PtsCollectionType::HashSet,
            ..options(&["main"])
        },
    );
    assert_eq!(classes(&bitvec, r1), classes(&hashset, r1));
    assert_eq!(classes(&bitvec, r2), classes(&hashset, r2));
}

/// Abstract `A.foo` overridden by `B` and `C`, and `A.me` with a single
/// implementation. Both return `this`. `z` holds objects of both classes.
fn dispatch_scene() -> (Scene, [MethodId; 3], [ValueId; 5]) {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    let a = sb.add_class(file, "A", None);
    sb.add_abstract_method(a, "foo", &[], Type::Any);
    let me = sb.add_method(a, "me", &[], Type::class("A"));
    let this = sb.this_local(me);
    sb.ret(me, this);

    let mut foos = Vec::new();
    for name in ["B", "C"] {
        let class = sb.add_class(file, name, Some("A"));
        let foo = sb.add_method(class, "foo", &[], Type::Any);
        let r = sb.local(foo, "r", Type::Any);
        let this = sb.this_local(foo);
        sb.assign(foo, r, this);
        sb.ret(foo, r);
        foos.push(foo);
    }

    let main = sb.add_function(file, "main", &[], Type::Void);
    let x = sb.local(main, "x", Type::class("A"));
    let y = sb.local(main, "y", Type::class("A"));
    let rx = sb.local(main, "rx", Type::Any);
    let ry = sb.local(main, "ry", Type::Any);
    let sx = sb.local(main, "sx", Type::Any);
    let sy = sb.local(main, "sy", Type::Any);
    sb.new_object(main, x, "B", vec![]);
    sb.new_object(main, y, "C", vec![]);
    sb.call_instance(main, Some(rx), x, MethodSignature::new("A", "foo"), vec![]);
    sb.call_instance(main, Some(ry), y, MethodSignature::new("A", "foo"), vec![]);
    sb.call_instance(main, Some(sx), x, MethodSignature::new("A", "me"), vec![]);
    sb.call_instance(main, Some(sy), y, MethodSignature::new("A", "me"), vec![]);

    let z = sb.local(main, "z", Type::class("A"));
    let rz = sb.local(main, "rz", Type::Any);
    sb.new_object(main, z, "B", vec![]);
    sb.new_object(main, z, "C", vec![]);
    sb.call_instance(main, Some(rz), z, MethodSignature::new("A", "foo"), vec![]);
    (sb.finish(), [foos[0], foos[1], me], [rx, ry, sx, sy, rz])
}

// A test of dispatch on the class of each receiver object.
#[test]
fn virtual_calls_dispatch_on_receiver_objects() {
    let (scene, [b_foo, c_foo, me], [rx, ry, sx, sy, rz]) = dispatch_scene();
    for context_type in [ContextType::CallSite, ContextType::Obj] {
        let pta = run(&scene, with_context(&["main"], context_type, 1));
        let main = scene.find_method("main").unwrap();
        let callees = pta.call_graph().callees_of(main);
        assert!(callees.contains(&b_foo), "{:?}", context_type);
        assert!(callees.contains(&c_foo), "{:?}", context_type);
        assert!(callees.contains(&me), "{:?}", context_type);

        assert_eq!(classes(&pta, rx), set(&["B"]), "{:?}", context_type);
        assert_eq!(classes(&pta, ry), set(&["C"]), "{:?}", context_type);
        assert_eq!(classes(&pta, sx), set(&["B"]), "{:?}", context_type);
        assert_eq!(classes(&pta, sy), set(&["C"]), "{:?}", context_type);
        assert_eq!(classes(&pta, rz), set(&["B", "C"]), "{:?}", context_type);

        let b_this = scene.this_local(b_foo).unwrap();
        assert_eq!(classes(&pta, b_this), set(&["B"]), "{:?}", context_type);
    }
}

// A test of function pointers to a function that calls itself.
#[test]
fn recursive_pointer_calls_are_not_reinstantiated() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    let rec = sb.add_function(file, "rec", &[("p", Type::Any)], Type::Void);
    let fp = sb.local(rec, "fp", Type::Any);
    let rec_ref = sb.function_ref(rec);
    sb.assign(rec, fp, rec_ref);
    let p = sb.param(rec, 0);
    sb.call_ptr(rec, None, fp, vec![p]);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let x = sb.local(main, "x", Type::class("Foo"));
    let g = sb.local(main, "g", Type::Any);
    sb.new_object(main, x, "Foo", vec![]);
    let rec_ref = sb.function_ref(rec);
    sb.assign(main, g, rec_ref);
    sb.call_ptr(main, None, g, vec![x]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&rec));
    assert!(pta.call_graph().callees_of(rec).contains(&rec));
    assert_eq!(funcs(&pta, g), BTreeSet::from([rec]));
    assert_eq!(classes(&pta, p), set(&["Foo"]));
    // main, and rec under the context of the call from main.
    assert_eq!(pta.builder().num_handled_funcs(), 2);
}

// A test of singleton accessors sharing one instance across call sites.
#[test]
fn singleton_accessors_share_their_instance() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    let foo = sb.add_class(file, "Foo", None);

    let get = sb.add_static_method(foo, "getInstance", &[], Type::class("Foo"));
    let t = sb.local(get, "t", Type::class("Foo"));
    let r = sb.local(get, "r", Type::class("Foo"));
    sb.new_object(get, t, "Foo", vec![]);
    let inst = sb.static_field("Foo", "inst");
    sb.assign(get, inst, t);
    let inst = sb.static_field("Foo", "inst");
    sb.assign(get, r, inst);
    sb.ret(get, r);

    let make = sb.add_static_method(foo, "make", &[], Type::class("Foo"));
    let m = sb.local(make, "m", Type::class("Foo"));
    sb.new_object(make, m, "Foo", vec![]);
    sb.ret(make, m);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let vars: Vec<ValueId> = ["a", "b", "c", "d"]
        .iter()
        .map(|n| sb.local(main, n, Type::class("Foo")))
        .collect();
    sb.call_static(main, Some(vars[0]), MethodSignature::new("Foo", "getInstance"), vec![]);
    sb.call_static(main, Some(vars[1]), MethodSignature::new("Foo", "getInstance"), vec![]);
    sb.call_static(main, Some(vars[2]), MethodSignature::new("Foo", "make"), vec![]);
    sb.call_static(main, Some(vars[3]), MethodSignature::new("Foo", "make"), vec![]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    let a = pta.points_to_by_value(vars[0]);
    assert_eq!(a.len(), 1);
    assert_eq!(a, pta.points_to_by_value(vars[1]));

    let c = pta.points_to_by_value(vars[2]);
    let d = pta.points_to_by_value(vars[3]);
    assert_eq!(c.len(), 1);
    assert_eq!(d.len(), 1);
    assert_ne!(c, d);
}

// A test of arrays and maps sharing one element slot per allocation.
#[test]
fn container_elements_flow_to_reads_and_callbacks() {
    let mut sb = SceneBuilder::new();
    let array = sb.add_sdk_class("Array", None, None);
    sb.add_sdk_method(array, "push", false, &[("items", Type::Any)], Type::Primitive("number".into()));
    sb.add_sdk_method(array, "pop", false, &[], Type::Any);
    sb.add_sdk_method(array, "slice", false, &[], Type::class("Array"));
    sb.add_sdk_method(array, "forEach", false, &[("callbackfn", Type::Any)], Type::Void);
    let map = sb.add_sdk_class("Map", None, None);
    sb.add_sdk_method(map, "set", false, &[("key", Type::Any), ("value", Type::Any)], Type::class("Map"));
    sb.add_sdk_method(map, "get", false, &[("key", Type::Any)], Type::Any);

    let file = sb.add_file("app.ets");
    for class in ["Foo", "Key", "Val"] {
        sb.add_class(file, class, None);
    }
    let visit = sb.add_function(file, "visit", &[("e", Type::Any)], Type::Void);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let arr = sb.local(main, "arr", Type::class("Array"));
    let x = sb.local(main, "x", Type::class("Foo"));
    let popped = sb.local(main, "popped", Type::Any);
    let cb = sb.local(main, "cb", Type::Any);
    let copy = sb.local(main, "copy", Type::class("Array"));
    let from_copy = sb.local(main, "fromCopy", Type::Any);
    sb.new_object(main, arr, "Array", vec![]);
    sb.new_object(main, x, "Foo", vec![]);
    sb.call_instance(main, None, arr, MethodSignature::new("Array", "push"), vec![x]);
    sb.call_instance(main, Some(popped), arr, MethodSignature::new("Array", "pop"), vec![]);
    let visit_ref = sb.function_ref(visit);
    sb.assign(main, cb, visit_ref);
    sb.call_instance(main, None, arr, MethodSignature::new("Array", "forEach"), vec![cb]);
    sb.call_instance(main, Some(copy), arr, MethodSignature::new("Array", "slice"), vec![]);
    sb.call_instance(main, Some(from_copy), copy, MethodSignature::new("Array", "pop"), vec![]);

    let m = sb.local(main, "m", Type::class("Map"));
    let k = sb.local(main, "k", Type::class("Key"));
    let v = sb.local(main, "v", Type::class("Val"));
    let w = sb.local(main, "w", Type::Any);
    sb.new_object(main, m, "Map", vec![]);
    sb.new_object(main, k, "Key", vec![]);
    sb.new_object(main, v, "Val", vec![]);
    sb.call_instance(main, None, m, MethodSignature::new("Map", "set"), vec![k, v]);
    sb.call_instance(main, Some(w), m, MethodSignature::new("Map", "get"), vec![k]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, popped), set(&["Foo"]));
    assert_eq!(classes(&pta, sb_param(&scene, visit)), set(&["Foo"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&visit));
    assert_eq!(classes(&pta, copy), set(&["Array"]));
    assert_eq!(classes(&pta, from_copy), set(&["Foo"]));
    // Keys are not stored.
    assert_eq!(classes(&pta, w), set(&["Val"]));
}

fn sb_param(scene: &Scene, method: MethodId) -> ValueId {
    scene.param_locals(method)[0].unwrap()
}

// A test of `call`, `apply` and `bind` on function values.
#[test]
fn reflective_calls_bind_receiver_and_arguments() {
    let mut sb = SceneBuilder::new();
    let function = sb.add_sdk_class("Function", None, None);
    for name in ["call", "apply", "bind"] {
        sb.add_sdk_method(function, name, false, &[("thisArg", Type::Any), ("args", Type::Any)], Type::Any);
    }

    let file = sb.add_file("app.ets");
    for class in ["Foo", "Bar", "Baz"] {
        sb.add_class(file, class, None);
    }
    let id = sb.add_function(file, "id", &[("p", Type::Any)], Type::Any);
    let p = sb.param(id, 0);
    sb.ret(id, p);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let f = sb.local(main, "f", Type::Any);
    let o = sb.local(main, "o", Type::class("Bar"));
    let a = sb.local(main, "a", Type::class("Foo"));
    let g = sb.local(main, "g", Type::Any);
    let args = sb.local(main, "args", Type::Array(Box::new(Type::Any)));
    let z = sb.local(main, "z", Type::class("Baz"));
    let results: Vec<ValueId> = ["r1", "r2", "r3"]
        .iter()
        .map(|n| sb.local(main, n, Type::Any))
        .collect();

    let id_ref = sb.function_ref(id);
    sb.assign(main, f, id_ref);
    sb.new_object(main, o, "Bar", vec![]);
    sb.new_object(main, a, "Foo", vec![]);
    sb.call_instance(main, Some(results[0]), f, MethodSignature::new("Function", "call"), vec![o, a]);

    sb.call_instance(main, Some(g), f, MethodSignature::new("Function", "bind"), vec![o, a]);
    sb.call_ptr(main, Some(results[1]), g, vec![]);

    let new_array = sb.new_array_expr(Type::Any);
    sb.assign(main, args, new_array);
    sb.new_object(main, z, "Baz", vec![]);
    let zero = sb.num_const("0");
    let slot = sb.array_elem(args, zero);
    sb.assign(main, slot, z);
    sb.call_instance(main, Some(results[2]), f, MethodSignature::new("Function", "apply"), vec![o, args]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, results[0]), set(&["Foo"]));
    assert_eq!(classes(&pta, results[1]), set(&["Foo"]));
    assert_eq!(classes(&pta, results[2]), set(&["Baz"]));
    assert!(funcs(&pta, g).contains(&id));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&id));
}

// A test of values shared through UI state stores.
#[test]
fn storage_keys_connect_writers_and_readers() {
    let mut sb = SceneBuilder::new();
    let storage = sb.add_sdk_class("AppStorage", None, None);
    let key = ("propName", Type::Primitive("string".into()));
    sb.add_sdk_method(storage, "setOrCreate", true, &[key.clone(), ("newValue", Type::Any)], Type::Void);
    sb.add_sdk_method(storage, "get", true, &[key.clone()], Type::Any);
    sb.add_sdk_method(storage, "link", true, &[key], Type::Any);

    let file = sb.add_file("app.ets");
    sb.add_class(file, "User", None);
    sb.add_class(file, "Theme", None);

    let reader = sb.add_function(file, "reader", &[], Type::Any);
    let v = sb.local(reader, "v", Type::Any);
    let user_key = sb.str_const("user");
    sb.call_static(reader, Some(v), MethodSignature::new("AppStorage", "get"), vec![user_key]);
    sb.ret(reader, v);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let u = sb.local(main, "u", Type::class("User"));
    let got = sb.local(main, "got", Type::Any);
    let linked = sb.local(main, "linked", Type::Any);
    let theme = sb.local(main, "theme", Type::class("Theme"));
    let seen = sb.local(main, "seen", Type::Any);
    sb.new_object(main, u, "User", vec![]);
    let user_key = sb.str_const("user");
    sb.call_static(main, None, MethodSignature::new("AppStorage", "setOrCreate"), vec![user_key, u]);
    sb.call_static(main, Some(got), app_fn("reader"), vec![]);

    let theme_key = sb.str_const("theme");
    sb.call_static(main, Some(linked), MethodSignature::new("AppStorage", "link"), vec![theme_key]);
    sb.new_object(main, theme, "Theme", vec![]);
    sb.assign(main, linked, theme);
    let theme_key = sb.str_const("theme");
    sb.call_static(main, Some(seen), MethodSignature::new("AppStorage", "get"), vec![theme_key]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, v), set(&["User"]));
    assert_eq!(classes(&pta, got), set(&["User"]));
    assert_eq!(classes(&pta, seen), set(&["Theme"]));

    let linked_node = pta.pag().get_node_by_value(&scene, DUMMY_CID, linked).unwrap();
    let link = pta.pag().node(linked_node).local_info().and_then(|info| info.storage_link.clone());
    assert_eq!(link, Some(("AppStorage".to_string(), "theme".to_string())));
}

// A test of functions run by the task pool.
#[test]
fn task_pool_runs_its_function_argument() {
    let mut sb = SceneBuilder::new();
    let taskpool = sb.add_sdk_class("taskpool", None, None);
    sb.add_sdk_method(taskpool, "execute", true, &[("func", Type::Any), ("args", Type::Any)], Type::Any);
    sb.add_sdk_method(
        taskpool,
        "executeDelayed",
        true,
        &[("delayTime", Type::Primitive("number".into())), ("func", Type::Any), ("args", Type::Any)],
        Type::Any,
    );

    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    sb.add_class(file, "Bar", None);
    let task = sb.add_function(file, "task", &[("p", Type::Any)], Type::Void);
    let delayed = sb.add_function(file, "delayed", &[("q", Type::Any)], Type::Void);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let f = sb.local(main, "f", Type::Any);
    let g = sb.local(main, "g", Type::Any);
    let a = sb.local(main, "a", Type::class("Foo"));
    let b = sb.local(main, "b", Type::class("Bar"));
    let task_ref = sb.function_ref(task);
    sb.assign(main, f, task_ref);
    let delayed_ref = sb.function_ref(delayed);
    sb.assign(main, g, delayed_ref);
    sb.new_object(main, a, "Foo", vec![]);
    sb.new_object(main, b, "Bar", vec![]);
    sb.call_static(main, None, MethodSignature::new("taskpool", "execute"), vec![f, a]);
    let delay = sb.num_const("10");
    sb.call_static(main, None, MethodSignature::new("taskpool", "executeDelayed"), vec![delay, g, b]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, sb_param(&scene, task)), set(&["Foo"]));
    assert_eq!(classes(&pta, sb_param(&scene, delayed)), set(&["Bar"]));
    let main = scene.find_method("main").unwrap();
    let callees = pta.call_graph().callees_of(main);
    assert!(callees.contains(&task));
    assert!(callees.contains(&delayed));
}

// A test of messages posted from the host to a worker script.
#[test]
fn worker_messages_reach_the_handler() {
    let mut sb = SceneBuilder::new();
    let worker = sb.add_sdk_class("ThreadWorker", None, None);
    sb.add_sdk_method(worker, "constructor", false, &[("scriptURL", Type::Primitive("string".into()))], Type::Void);
    sb.add_sdk_method(worker, "postMessage", false, &[("message", Type::Any)], Type::Void);
    let scope = sb.add_sdk_class("ThreadWorkerGlobalScope", None, None);
    sb.add_sdk_method(scope, "onmessage", false, &[("handler", Type::Any)], Type::Void);

    let script = sb.add_file("workers/worker.ets");
    let on_msg = sb.add_function(script, "onMsg", &[("e", Type::Any)], Type::Void);
    let script_dflt = sb.default_method(script);
    let port = sb.local(script_dflt, "port", Type::class("ThreadWorkerGlobalScope"));
    let handler = sb.local(script_dflt, "handler", Type::Any);
    sb.new_object(script_dflt, port, "ThreadWorkerGlobalScope", vec![]);
    let on_msg_ref = sb.function_ref(on_msg);
    sb.assign(script_dflt, handler, on_msg_ref);
    sb.call_instance(
        script_dflt,
        None,
        port,
        MethodSignature::new("ThreadWorkerGlobalScope", "onmessage"),
        vec![handler],
    );

    let file = sb.add_file("app.ets");
    sb.add_class(file, "Msg", None);
    let main = sb.add_function(file, "main", &[], Type::Void);
    let w = sb.local(main, "w", Type::class("ThreadWorker"));
    let data = sb.local(main, "data", Type::class("Msg"));
    let url = sb.str_const("workers/worker.ets");
    sb.new_object(main, w, "ThreadWorker", vec![url]);
    sb.new_object(main, data, "Msg", vec![]);
    sb.call_instance(main, None, w, MethodSignature::new("ThreadWorker", "postMessage"), vec![data]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(pta.builder().entries().len(), 2);
    assert_eq!(classes(&pta, sb_param(&scene, on_msg)), set(&["Msg"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&script_dflt));
}

// A test of body-less platform methods.
#[test]
fn platform_methods_return_objects_and_call_back() {
    let mut sb = SceneBuilder::new();
    let http = sb.add_sdk_class("http", None, None);
    sb.add_sdk_method(http, "request", true, &[("url", Type::Primitive("string".into()))], Type::class("Response"));
    sb.add_sdk_class("Response", None, None);
    let button = sb.add_sdk_class("Button", None, None);
    sb.add_sdk_method(button, "onClick", false, &[("event", Type::Any)], Type::class("Button"));

    let file = sb.add_file("app.ets");
    let clicked = sb.add_function(file, "clicked", &[], Type::Void);
    let main = sb.add_function(file, "main", &[], Type::Void);
    let resp = sb.local(main, "resp", Type::Any);
    let btn = sb.local(main, "btn", Type::class("Button"));
    let h = sb.local(main, "h", Type::Function(app_fn("clicked")));
    let url = sb.str_const("https://example.com");
    sb.call_static(main, Some(resp), MethodSignature::new("http", "request"), vec![url]);
    sb.new_object(main, btn, "Button", vec![]);
    let clicked_ref = sb.function_ref(clicked);
    sb.assign(main, h, clicked_ref);
    sb.call_instance(main, None, btn, MethodSignature::new("Button", "onClick"), vec![h]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, resp), set(&["Response"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&clicked));
    assert!(pta.builder().unhandled_funcs().is_empty());
}

// A test of captured and imported variables.
#[test]
fn captured_and_imported_locals_see_their_definitions() {
    let mut sb = SceneBuilder::new();
    let lib = sb.add_file("lib.ets");
    sb.add_class(lib, "Foo", None);
    let lib_dflt = sb.default_method(lib);
    let shared = sb.local(lib_dflt, "shared", Type::class("Foo"));
    sb.new_object(lib_dflt, shared, "Foo", vec![]);
    sb.export(lib, "shared", shared);

    let file = sb.add_file("app.ets");
    sb.import(file, "s", "lib", "shared");
    sb.add_class(file, "Bar", None);
    let main = sb.add_function(file, "main", &[], Type::Void);
    let y = sb.local(main, "y", Type::class("Foo"));
    let s = sb.free_local("s", Type::class("Foo"));
    sb.assign(main, y, s);

    let x = sb.local(main, "x", Type::class("Bar"));
    sb.new_object(main, x, "Bar", vec![]);
    let inner = sb.add_closure(main, "inner", &[], Type::Void);
    let z = sb.local(inner, "z", Type::class("Bar"));
    let captured = sb.free_local("x", Type::class("Bar"));
    sb.assign(inner, z, captured);
    let h = sb.local(main, "h", Type::Any);
    let inner_ref = sb.function_ref(inner);
    sb.assign(main, h, inner_ref);
    sb.call_ptr(main, None, h, vec![]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, y), set(&["Foo"]));
    assert_eq!(classes(&pta, z), set(&["Bar"]));
    // The exporting module code became an entry.
    assert_eq!(pta.builder().entries().len(), 2);
}

// A test of analysing one method on its own.
#[test]
fn method_level_analysis_fabricates_inputs() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    let foo = sb.add_class(file, "Foo", None);
    let bar = sb.add_method(foo, "bar", &[], Type::Void);
    let a = sb.add_class(file, "A", None);
    let run_method = sb.add_method(a, "run", &[("p", Type::class("Foo")), ("n", Type::Primitive("number".into()))], Type::Void);
    let p = sb.param(run_method, 0);
    let q = sb.local(run_method, "q", Type::class("Foo"));
    sb.assign(run_method, q, p);
    sb.call_instance(run_method, None, q, MethodSignature::new("Foo", "bar"), vec![]);
    let scene = sb.finish();

    let pta = run(
        &scene,
        AnalysisOptions {
            analysis_scale: AnalysisScale::MethodLevel,
            ..options(&["A.run"])
        },
    );
    assert_eq!(classes(&pta, q), set(&["Foo"]));
    assert_eq!(classes(&pta, scene.this_local(run_method).unwrap()), set(&["A"]));
    assert!(classes(&pta, sb_param(&scene, run_method)).contains("Foo"));
    assert!(pta.call_graph().callees_of(run_method).contains(&bar));

    let whole = run(&scene, options(&["A.run"]));
    assert!(classes(&whole, q).is_empty());
}

// A test of the statistics and the dumped results.
#[test]
fn statistics_and_dumps_describe_the_results() {
    let (scene, _, _, _) = identity_scene();
    let dir = std::env::temp_dir().join(format!("arkpta-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let pts_path = dir.join("pts.txt");
    let cg_path = dir.join("cg.dot");
    let pta = run(
        &scene,
        AnalysisOptions {
            dump_stats: true,
            pts_output: Some(pts_path.to_string_lossy().to_string()),
            call_graph_output: Some(cg_path.to_string_lossy().to_string()),
            ..options(&["main"])
        },
    );

    let mut stats = pta.stats();
    stats.do_stat();
    assert_eq!(stats.cg_stat.num_reachable_funcs, 2);
    assert!(stats.num_pointers > 0);
    assert!(stats.num_ci_pointers <= stats.num_pointers);
    assert!(stats.get_stat().contains("#Reachable functions: 2"));

    results_dumper::dump_results(&pta).unwrap();
    let pts = std::fs::read_to_string(&pts_path).unwrap();
    assert!(pts.contains("@app.ets/%dflt.main"));
    assert!(pts.contains("@app.ets/%dflt.id"));
    let dot = std::fs::read_to_string(&cg_path).unwrap();
    assert!(dot.starts_with("digraph"));
    std::fs::remove_dir_all(&dir).unwrap();
}

// A test of values shared through properties of `globalThis`.
#[test]
fn global_properties_connect_writers_and_readers() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);

    let writer = sb.add_function(file, "writer", &[], Type::Void);
    let a = sb.local(writer, "a", Type::class("Foo"));
    sb.new_object(writer, a, "Foo", vec![]);
    let g = sb.free_local(GLOBAL_THIS, Type::Any);
    let gx = sb.field(g, "Object", "x");
    sb.assign(writer, gx, a);

    let reader = sb.add_function(file, "reader", &[], Type::Void);
    let b = sb.local(reader, "b", Type::Any);
    let g = sb.free_local(GLOBAL_THIS, Type::Any);
    let gx = sb.field(g, "Object", "x");
    sb.assign(reader, b, gx);

    let main = sb.add_function(file, "main", &[], Type::Void);
    sb.call_static(main, None, app_fn("writer"), vec![]);
    sb.call_static(main, None, app_fn("reader"), vec![]);
    let scene = sb.finish();

    for depth in [0, 1, 2] {
        let pta = run(&scene, with_context(&["main"], ContextType::CallSite, depth));
        assert_eq!(classes(&pta, b), set(&["Foo"]), "k = {}", depth);
    }
}

// A test of singleton accessors keeping their instance in a global.
#[test]
fn global_singletons_share_their_instance() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    let foo = sb.add_class(file, "Foo", None);
    let get = sb.add_static_method(foo, "getInstance", &[], Type::class("Foo"));
    let t = sb.local(get, "t", Type::class("Foo"));
    let r = sb.local(get, "r", Type::class("Foo"));
    sb.new_object(get, t, "Foo", vec![]);
    let g = sb.free_local(GLOBAL_THIS, Type::Any);
    let inst = sb.field(g, "Object", "inst");
    sb.assign(get, inst, t);
    let inst = sb.field(g, "Object", "inst");
    sb.assign(get, r, inst);
    sb.ret(get, r);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let a = sb.local(main, "a", Type::class("Foo"));
    let b = sb.local(main, "b", Type::class("Foo"));
    sb.call_static(main, Some(a), MethodSignature::new("Foo", "getInstance"), vec![]);
    sb.call_static(main, Some(b), MethodSignature::new("Foo", "getInstance"), vec![]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    let pts = pta.points_to_by_value(a);
    assert_eq!(pts.len(), 1);
    assert_eq!(pts, pta.points_to_by_value(b));
}

// A test of allocations stored straight into a field.
#[test]
fn allocations_stored_into_fields_are_loaded_back() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    sb.add_class(file, "Bar", None);
    let init = sb.add_function(file, "init", &[("o", Type::class("Bar"))], Type::Void);
    let o = sb.param(init, 0);
    let of = sb.field(o, "Bar", "f");
    let new_foo = sb.new_expr("Foo");
    sb.assign(init, of, new_foo);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let bar = sb.local(main, "bar", Type::class("Bar"));
    let d = sb.local(main, "d", Type::Any);
    sb.new_object(main, bar, "Bar", vec![]);
    sb.call_static(main, None, app_fn("init"), vec![bar]);
    let load = sb.field(bar, "Bar", "f");
    sb.assign(main, d, load);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, d), set(&["Foo"]));
}

/// `g = id.bind(o)`, followed by a call of `g` if `call_bound` is set.
fn bind_scene(call_bound: bool) -> (Scene, MethodId, ValueId) {
    let mut sb = SceneBuilder::new();
    let function = sb.add_sdk_class("Function", None, None);
    sb.add_sdk_method(function, "bind", false, &[("thisArg", Type::Any)], Type::Any);

    let file = sb.add_file("app.ets");
    sb.add_class(file, "Bar", None);
    let id = sb.add_function(file, "id", &[("p", Type::Any)], Type::Any);
    let p = sb.param(id, 0);
    sb.ret(id, p);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let f = sb.local(main, "f", Type::Any);
    let o = sb.local(main, "o", Type::class("Bar"));
    let g = sb.local(main, "g", Type::Any);
    let id_ref = sb.function_ref(id);
    sb.assign(main, f, id_ref);
    sb.new_object(main, o, "Bar", vec![]);
    sb.call_instance(main, Some(g), f, MethodSignature::new("Function", "bind"), vec![o]);
    if call_bound {
        sb.call_ptr(main, None, g, vec![o]);
    }
    (sb.finish(), id, g)
}

// A test of `bind` creating a function value without calling it.
#[test]
fn binding_a_function_does_not_call_it() {
    let (scene, id, g) = bind_scene(false);
    let pta = run(&scene, options(&["main"]));
    assert_eq!(funcs(&pta, g), BTreeSet::from([id]));
    let main = scene.find_method("main").unwrap();
    assert!(!pta.call_graph().callees_of(main).contains(&id));
    assert_eq!(pta.builder().num_handled_funcs(), 1);

    let (scene, id, g) = bind_scene(true);
    let pta = run(&scene, options(&["main"]));
    assert_eq!(funcs(&pta, g), BTreeSet::from([id]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&id));
    assert_eq!(classes(&pta, sb_param(&scene, id)), set(&["Bar"]));
}

// A test of virtual self-calls through `this` under every context kind.
#[test]
fn recursive_virtual_calls_are_not_reinstantiated() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    let a = sb.add_class(file, "A", None);
    sb.add_abstract_method(a, "foo", &[], Type::Void);
    let mut foos = Vec::new();
    for name in ["B", "C"] {
        let class = sb.add_class(file, name, Some("A"));
        let foo = sb.add_method(class, "foo", &[], Type::Void);
        let this = sb.this_local(foo);
        sb.call_instance(foo, None, this, MethodSignature::new("A", "foo"), vec![]);
        foos.push(foo);
    }

    let main = sb.add_function(file, "main", &[], Type::Void);
    let x = sb.local(main, "x", Type::class("A"));
    let y = sb.local(main, "y", Type::class("A"));
    sb.new_object(main, x, "B", vec![]);
    sb.new_object(main, y, "C", vec![]);
    sb.call_instance(main, None, x, MethodSignature::new("A", "foo"), vec![]);
    sb.call_instance(main, None, y, MethodSignature::new("A", "foo"), vec![]);
    let scene = sb.finish();
    let main = scene.find_method("main").unwrap();

    let configs = [
        (ContextType::CallSite, 1),
        (ContextType::CallSite, 3),
        (ContextType::Obj, 2),
        (ContextType::Func, 2),
    ];
    for (context_type, depth) in configs {
        let pta = run(&scene, with_context(&["main"], context_type, depth));
        let cg = pta.call_graph();
        for foo in &foos {
            assert!(cg.callees_of(main).contains(foo), "{:?}", context_type);
            assert!(cg.callees_of(*foo).contains(foo), "{:?}", context_type);
        }
        assert!(!cg.callees_of(foos[0]).contains(&foos[1]), "{:?}", context_type);
        // main, and each foo once; the self-calls add no instances.
        assert_eq!(pta.builder().num_handled_funcs(), 3, "{:?} k = {}", context_type, depth);
    }
}

// A test of calls on receivers of unknown type resolved through a field.
#[test]
fn unknown_calls_dispatch_through_fields() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Holder", None);
    sb.add_class(file, "Arg", None);
    let cb = sb.add_function(file, "cb", &[("p", Type::Any)], Type::Void);

    let main = sb.add_function(file, "main", &[], Type::Void);
    let h = sb.local(main, "h", Type::class("Holder"));
    let f = sb.local(main, "f", Type::Any);
    let u = sb.local(main, "u", Type::Unknown);
    let arg = sb.local(main, "arg", Type::class("Arg"));
    sb.new_object(main, h, "Holder", vec![]);
    let cb_ref = sb.function_ref(cb);
    sb.assign(main, f, cb_ref);
    let run_field = sb.field(h, "Holder", "run");
    sb.assign(main, run_field, f);
    sb.new_object(main, arg, "Arg", vec![]);
    sb.assign(main, u, h);
    sb.call_instance(main, None, u, MethodSignature::new(UNKNOWN_CLASS, "run"), vec![arg]);
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    let main = scene.find_method("main").unwrap();
    assert!(pta.call_graph().callees_of(main).contains(&cb));
    assert_eq!(classes(&pta, sb_param(&scene, cb)), set(&["Arg"]));
}

// A test of two workers exchanging messages with the host.
#[test]
fn workers_keep_their_channels_apart() {
    let mut sb = SceneBuilder::new();
    let worker = sb.add_sdk_class("ThreadWorker", None, None);
    sb.add_sdk_method(worker, "constructor", false, &[("scriptURL", Type::Primitive("string".into()))], Type::Void);
    sb.add_sdk_method(worker, "postMessage", false, &[("message", Type::Any)], Type::Void);
    sb.add_sdk_method(worker, "onmessage", false, &[("handler", Type::Any)], Type::Void);
    let scope = sb.add_sdk_class("ThreadWorkerGlobalScope", None, None);
    sb.add_sdk_method(scope, "postMessage", false, &[("message", Type::Any)], Type::Void);
    sb.add_sdk_method(scope, "onmessage", false, &[("handler", Type::Any)], Type::Void);

    let mut handlers = Vec::new();
    for (script, reply_class) in [("workers/a.ets", "ReplyA"), ("workers/b.ets", "ReplyB")] {
        let file = sb.add_file(script);
        sb.add_class(file, reply_class, None);
        let on_msg = sb.add_function(file, "onMsg", &[("e", Type::Any)], Type::Void);
        let dflt = sb.default_method(file);
        let port = sb.local(dflt, "port", Type::class("ThreadWorkerGlobalScope"));
        let handler = sb.local(dflt, "handler", Type::Any);
        let reply = sb.local(dflt, "reply", Type::class(reply_class));
        sb.new_object(dflt, port, "ThreadWorkerGlobalScope", vec![]);
        let on_msg_ref = sb.function_ref(on_msg);
        sb.assign(dflt, handler, on_msg_ref);
        sb.call_instance(dflt, None, port, MethodSignature::new("ThreadWorkerGlobalScope", "onmessage"), vec![handler]);
        sb.new_object(dflt, reply, reply_class, vec![]);
        sb.call_instance(dflt, None, port, MethodSignature::new("ThreadWorkerGlobalScope", "postMessage"), vec![reply]);
        handlers.push(on_msg);
    }

    let file = sb.add_file("app.ets");
    let mut host_handlers = Vec::new();
    for name in ["onReplyA", "onReplyB"] {
        host_handlers.push(sb.add_function(file, name, &[("e", Type::Any)], Type::Void));
    }
    let main = sb.add_function(file, "main", &[], Type::Void);
    let workers = [("wa", "workers/a.ets", "MsgA"), ("wb", "workers/b.ets", "MsgB")];
    for (i, &(local, script, msg_class)) in workers.iter().enumerate() {
        sb.add_class(file, msg_class, None);
        let w = sb.local(main, local, Type::class("ThreadWorker"));
        let data = sb.local(main, &format!("data{}", i), Type::class(msg_class));
        let handler = sb.local(main, &format!("h{}", i), Type::Any);
        let url = sb.str_const(script);
        sb.new_object(main, w, "ThreadWorker", vec![url]);
        sb.new_object(main, data, msg_class, vec![]);
        sb.call_instance(main, None, w, MethodSignature::new("ThreadWorker", "postMessage"), vec![data]);
        let handler_ref = sb.function_ref(host_handlers[i]);
        sb.assign(main, handler, handler_ref);
        sb.call_instance(main, None, w, MethodSignature::new("ThreadWorker", "onmessage"), vec![handler]);
    }
    let scene = sb.finish();

    let pta = run(&scene, options(&["main"]));
    assert_eq!(classes(&pta, sb_param(&scene, handlers[0])), set(&["MsgA"]));
    assert_eq!(classes(&pta, sb_param(&scene, handlers[1])), set(&["MsgB"]));
    assert_eq!(classes(&pta, sb_param(&scene, host_handlers[0])), set(&["ReplyA"]));
    assert_eq!(classes(&pta, sb_param(&scene, host_handlers[1])), set(&["ReplyB"]));
}

// A test of nested closures used without running their enclosing functions.
#[test]
fn owners_of_captured_variables_are_analysed() {
    let mut sb = SceneBuilder::new();
    let file = sb.add_file("app.ets");
    sb.add_class(file, "Foo", None);
    let outer = sb.add_function(file, "outer", &[], Type::Void);
    let v = sb.local(outer, "v", Type::class("Foo"));
    sb.new_object(outer, v, "Foo", vec![]);

    let mid = sb.add_closure(outer, "mid", &[], Type::Void);
    let w = sb.local(mid, "w", Type::class("Foo"));
    let captured_v = sb.free_local("v", Type::class("Foo"));
    sb.assign(mid, w, captured_v);

    let inner = sb.add_closure(mid, "inner", &[], Type::Void);
    let z = sb.local(inner, "z", Type::class("Foo"));
    let captured_w = sb.free_local("w", Type::class("Foo"));
    sb.assign(inner, z, captured_w);
    let scene = sb.finish();

    let pta = run(&scene, options(&["inner"]));
    assert_eq!(classes(&pta, w), set(&["Foo"]));
    assert_eq!(classes(&pta, z), set(&["Foo"]));
    assert_eq!(pta.builder().entries().len(), 3);
}
