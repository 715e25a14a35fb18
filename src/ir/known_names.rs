// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

/// Well known platform APIs that are modelled specially.
#[derive(Clone, Copy, Debug, Eq, PartialOrd, PartialEq, Hash, Ord)]
pub enum KnownNames {
    /// This is not a known name
    None,

    // Function reflection
    FunctionCall,
    FunctionApply,
    FunctionBind,

    // Containers
    ArrayPush,
    ArrayUnshift,
    ArrayFill,
    ArraySplice,
    ArrayPop,
    ArrayShift,
    ArrayAt,
    ArrayFind,
    ArrayFindLast,
    ArraySlice,
    ArrayConcat,
    ArrayValues,
    ArrayForEach,
    SetAdd,
    SetValues,
    SetForEach,
    MapSet,
    MapGet,
    MapValues,
    MapForEach,

    // UI state stores
    StorageSet,
    StorageSetOrCreate,
    StorageSetAndLink,
    StorageSetAndProp,
    StorageGet,
    StorageLink,
    StorageProp,

    // Concurrency
    TaskPoolExecute,
    TaskPoolExecuteDelayed,
    TaskPoolExecutePeriodically,
    TaskConstructor,
    WorkerConstructor,
    WorkerPostMessage,
    WorkerAddEventListener,
    WorkerOn,
    WorkerOnMessage,
}

pub const FUNCTION_CLASS: &str = "Function";
pub const ARRAY_CLASS: &str = "Array";
pub const SET_CLASS: &str = "Set";
pub const MAP_CLASS: &str = "Map";
pub const TASKPOOL_CLASS: &str = "taskpool";
pub const TASK_CLASS: &str = "Task";
pub const THREAD_WORKER_CLASS: &str = "ThreadWorker";
pub const WORKER_SCOPE_CLASS: &str = "ThreadWorkerGlobalScope";
pub const GLOBAL_THIS: &str = "globalThis";

lazy_static! {
    pub static ref CONTAINER_CLASSES: HashSet<&'static str> =
        HashSet::from([ARRAY_CLASS, SET_CLASS, MAP_CLASS]);

    pub static ref STORAGE_CLASSES: HashSet<&'static str> =
        HashSet::from(["AppStorage", "LocalStorage", "PersistentStorage"]);

    pub static ref WORKER_CLASSES: HashSet<&'static str> =
        HashSet::from([THREAD_WORKER_CLASS, WORKER_SCOPE_CLASS]);

    static ref KNOWN_METHODS: HashMap<(&'static str, &'static str), KnownNames> = {
        let mut map = HashMap::new();
        map.insert((FUNCTION_CLASS, "call"), KnownNames::FunctionCall);
        map.insert((FUNCTION_CLASS, "apply"), KnownNames::FunctionApply);
        map.insert((FUNCTION_CLASS, "bind"), KnownNames::FunctionBind);

        map.insert((ARRAY_CLASS, "push"), KnownNames::ArrayPush);
        map.insert((ARRAY_CLASS, "unshift"), KnownNames::ArrayUnshift);
        map.insert((ARRAY_CLASS, "fill"), KnownNames::ArrayFill);
        map.insert((ARRAY_CLASS, "splice"), KnownNames::ArraySplice);
        map.insert((ARRAY_CLASS, "pop"), KnownNames::ArrayPop);
        map.insert((ARRAY_CLASS, "shift"), KnownNames::ArrayShift);
        map.insert((ARRAY_CLASS, "at"), KnownNames::ArrayAt);
        map.insert((ARRAY_CLASS, "find"), KnownNames::ArrayFind);
        map.insert((ARRAY_CLASS, "findLast"), KnownNames::ArrayFindLast);
        map.insert((ARRAY_CLASS, "slice"), KnownNames::ArraySlice);
        map.insert((ARRAY_CLASS, "concat"), KnownNames::ArrayConcat);
        map.insert((ARRAY_CLASS, "values"), KnownNames::ArrayValues);
        map.insert((ARRAY_CLASS, "forEach"), KnownNames::ArrayForEach);
        map.insert((SET_CLASS, "add"), KnownNames::SetAdd);
        map.insert((SET_CLASS, "values"), KnownNames::SetValues);
        map.insert((SET_CLASS, "forEach"), KnownNames::SetForEach);
        map.insert((MAP_CLASS, "set"), KnownNames::MapSet);
        map.insert((MAP_CLASS, "get"), KnownNames::MapGet);
        map.insert((MAP_CLASS, "values"), KnownNames::MapValues);
        map.insert((MAP_CLASS, "forEach"), KnownNames::MapForEach);

        for storage in ["AppStorage", "LocalStorage", "PersistentStorage"] {
            map.insert((storage, "set"), KnownNames::StorageSet);
            map.insert((storage, "setOrCreate"), KnownNames::StorageSetOrCreate);
            map.insert((storage, "setAndLink"), KnownNames::StorageSetAndLink);
            map.insert((storage, "setAndProp"), KnownNames::StorageSetAndProp);
            map.insert((storage, "get"), KnownNames::StorageGet);
            map.insert((storage, "link"), KnownNames::StorageLink);
            map.insert((storage, "prop"), KnownNames::StorageProp);
        }

        map.insert((TASKPOOL_CLASS, "execute"), KnownNames::TaskPoolExecute);
        map.insert((TASKPOOL_CLASS, "executeDelayed"), KnownNames::TaskPoolExecuteDelayed);
        map.insert((TASKPOOL_CLASS, "executePeriodically"), KnownNames::TaskPoolExecutePeriodically);
        map.insert((TASK_CLASS, "constructor"), KnownNames::TaskConstructor);

        for worker in [THREAD_WORKER_CLASS, WORKER_SCOPE_CLASS] {
            map.insert((worker, "postMessage"), KnownNames::WorkerPostMessage);
            map.insert((worker, "addEventListener"), KnownNames::WorkerAddEventListener);
            map.insert((worker, "on"), KnownNames::WorkerOn);
            map.insert((worker, "onmessage"), KnownNames::WorkerOnMessage);
        }
        map.insert((THREAD_WORKER_CLASS, "constructor"), KnownNames::WorkerConstructor);
        map
    };
}

impl KnownNames {
    /// Classifies `class.method`.
    pub fn of(class: &str, method: &str) -> KnownNames {
        KNOWN_METHODS
            .get(&(class, method))
            .copied()
            .unwrap_or(KnownNames::None)
    }

    pub fn is_container_write(self) -> bool {
        matches!(
            self,
            KnownNames::ArrayPush
                | KnownNames::ArrayUnshift
                | KnownNames::ArrayFill
                | KnownNames::ArraySplice
                | KnownNames::SetAdd
                | KnownNames::MapSet
        )
    }

    pub fn is_container_read(self) -> bool {
        matches!(
            self,
            KnownNames::ArrayPop
                | KnownNames::ArrayShift
                | KnownNames::ArrayAt
                | KnownNames::ArrayFind
                | KnownNames::ArrayFindLast
                | KnownNames::ArrayValues
                | KnownNames::SetValues
                | KnownNames::MapValues
        )
    }

    /// Reads that return a new container holding the receiver's elements.
    pub fn is_container_copy(self) -> bool {
        matches!(self, KnownNames::ArraySlice | KnownNames::ArrayConcat)
    }

    pub fn is_foreach(self) -> bool {
        matches!(
            self,
            KnownNames::ArrayForEach | KnownNames::SetForEach | KnownNames::MapForEach
        )
    }

    pub fn is_storage_write(self) -> bool {
        matches!(
            self,
            KnownNames::StorageSet
                | KnownNames::StorageSetOrCreate
                | KnownNames::StorageSetAndLink
                | KnownNames::StorageSetAndProp
        )
    }

    pub fn is_storage_read(self) -> bool {
        matches!(
            self,
            KnownNames::StorageGet
                | KnownNames::StorageLink
                | KnownNames::StorageProp
                | KnownNames::StorageSetAndLink
                | KnownNames::StorageSetAndProp
        )
    }
}

/// Container methods are dispatched on the receiver object so that the
/// element slot of each allocation can be found.
pub fn is_receiver_dependent_class(class: &str) -> bool {
    CONTAINER_CLASSES.contains(class) || class == FUNCTION_CLASS
}
