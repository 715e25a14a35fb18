// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use super::{MethodId, ValueId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign { lhs: ValueId, rhs: ValueId },
    Invoke { expr: ValueId },
    Return { op: ValueId },
    ReturnVoid,
    Nop,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stmt {
    pub method: MethodId,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn lhs(&self) -> Option<ValueId> {
        match self.kind {
            StmtKind::Assign { lhs, .. } => Some(lhs),
            _ => None,
        }
    }

    pub fn rhs(&self) -> Option<ValueId> {
        match self.kind {
            StmtKind::Assign { rhs, .. } => Some(rhs),
            _ => None,
        }
    }

    pub fn return_op(&self) -> Option<ValueId> {
        match self.kind {
            StmtKind::Return { op } => Some(op),
            _ => None,
        }
    }
}
