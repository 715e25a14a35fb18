// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Body-less platform methods.
//!
//! A call returns one fabricated object per call site when the declared
//! return type is a class, and every callback argument is assumed to be
//! invoked by the platform.

use log::*;

use super::PagPlugin;
use crate::builder::pag_builder::PagBuilder;
use crate::error::PtaResult;
use crate::graph::call_site::{CallArg, CallSite};
use crate::graph::pag::{NodeId, SyntheticObj};
use crate::ir::known_names::{is_receiver_dependent_class, KnownNames};
use crate::ir::{FuncId, Scene, Type, Value};
use crate::pta::context::ContextId;

/// Takes over the summary of a body-less function. Returns true if the
/// function is a platform method modelled here.
pub fn build_sdk_func_pag(scene: &Scene, func: FuncId) -> bool {
    let class = scene.class_of_method(func);
    if !class.is_sdk {
        debug!("{} has no body and is not a platform method", scene.method(func).signature);
    }
    class.is_sdk
}

pub struct SdkPlugin;

impl SdkPlugin {
    fn is_callback(&self, scene: &Scene, arg: &CallArg) -> bool {
        match arg {
            CallArg::Value(v) => matches!(scene.value(*v), Value::Local { ty, .. } if ty.is_function()),
            CallArg::Node(_) => false,
        }
    }
}

impl PagPlugin for SdkPlugin {
    fn name(&self) -> &'static str {
        "SDK"
    }

    fn can_handle(&self, builder: &PagBuilder<'_>, cs: &CallSite, _base_obj: Option<NodeId>) -> bool {
        let scene = builder.scene();
        let method = scene.method(cs.callee);
        let class = scene.class_of_method(cs.callee);
        !method.has_body()
            && class.is_sdk
            && !is_receiver_dependent_class(&class.name)
            && KnownNames::of(&class.name, &method.name) == KnownNames::None
    }

    fn process_call_site(
        &self,
        builder: &mut PagBuilder<'_>,
        cs: &CallSite,
        cid: ContextId,
        _base_obj: Option<NodeId>,
    ) -> PtaResult<Vec<NodeId>> {
        let scene = builder.scene();
        let method = scene.method(cs.callee);

        if let (Some(lhs), Type::Class(class)) = (cs.lhs, &method.return_type) {
            let obj = builder.pag_mut().get_or_new_synthetic_obj(
                cid,
                SyntheticObj::SdkReturn { call_site: cs.id },
                Some(class.clone()),
            );
            let dst = builder.pag_mut().get_or_new_node(scene, cid, lhs, cs.stmt);
            builder.add_address_edge(obj, dst, cs.stmt);
        }

        let mut srcs = Vec::new();
        for (index, arg) in cs.args.clone().unwrap_or_default().iter().enumerate() {
            if !self.is_callback(scene, arg) {
                continue;
            }
            let Some(callback) = builder.arg_node(cs, cid, index) else {
                continue;
            };
            if let Some(info) = builder.pag_mut().node_mut(callback).local_info_mut() {
                info.sdk_param = true;
            }
            if builder.add_synthetic_ptr_call(cs, cid, callback, Vec::new(), None).is_some() {
                srcs.push(callback);
            }
        }
        Ok(srcs)
    }
}
