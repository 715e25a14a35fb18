// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Errors raised when the analysed IR breaks an invariant a well-formed body
//! always satisfies. Gaps in the analysed program itself (unresolvable call
//! bases, missing exports, unknown callees) are logged and skipped instead.

use thiserror::Error;

use crate::ir::{MethodId, StmtId, ValueId};

#[derive(Debug, Error)]
pub enum PtaError {
    #[error("no `this` assignment found in instance method {method:?}")]
    MissingThisRef { method: MethodId },

    #[error("unexpected return operand {value:?} in {method:?}")]
    UnexpectedReturnOperand { method: MethodId, value: ValueId },

    #[error("call to constructor {callee:?} at {stmt:?} is not an instance invoke")]
    NonInstanceInvoke { callee: MethodId, stmt: Option<StmtId> },

    #[error("no PAG node for receiver {receiver:?} of {stmt:?}")]
    MissingReceiverNode { receiver: ValueId, stmt: Option<StmtId> },

    #[error("unknown entry method `{0}`")]
    UnknownEntry(String),

    #[error("failed to load scene: {0}")]
    SceneLoad(String),
}

pub type PtaResult<T> = Result<T, PtaError>;
