// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use super::types::{FieldSignature, MethodSignature, Type};
use super::{MethodId, ValueId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Str(String),
    Number(String),
    Bool(bool),
    Null,
    Undefined,
}

/// An operand of the three-address IR.
///
/// Locals are identified by their `ValueId`; the same name declared in two
/// methods yields two distinct values. A local used in a method that does not
/// declare it is a capture of an enclosing scope or an import.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Local { name: String, ty: Type },
    /// The `index`-th formal parameter, only ever on the right of `p = parameter`.
    Parameter { index: usize, ty: Type },
    /// The receiver, only ever on the right of `this = this: C`.
    This { class: String },
    InstanceField { base: ValueId, field: FieldSignature },
    StaticField { field: FieldSignature },
    ArrayRef { base: ValueId, index: ValueId },
    New { class: String },
    NewArray { elem_ty: Type },
    Constant(Constant),
    FunctionRef { method: MethodId },
    InstanceInvoke { base: ValueId, method: MethodSignature, args: Vec<ValueId> },
    StaticInvoke { method: MethodSignature, args: Vec<ValueId> },
    PtrInvoke { ptr: ValueId, args: Vec<ValueId> },
    /// Any other expression (arithmetic, comparisons, casts, ...).
    Expr { operands: Vec<ValueId> },
}

impl Value {
    pub fn is_local(&self) -> bool {
        matches!(self, Value::Local { .. })
    }

    pub fn is_invoke(&self) -> bool {
        matches!(
            self,
            Value::InstanceInvoke { .. } | Value::StaticInvoke { .. } | Value::PtrInvoke { .. }
        )
    }

    /// Instance field and array element references.
    pub fn is_field_like(&self) -> bool {
        matches!(self, Value::InstanceField { .. } | Value::ArrayRef { .. })
    }

    pub fn is_allocation(&self) -> bool {
        matches!(
            self,
            Value::New { .. } | Value::NewArray { .. } | Value::FunctionRef { .. }
        )
    }

    pub fn local_name(&self) -> Option<&str> {
        match self {
            Value::Local { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_str_constant(&self) -> Option<&str> {
        match self {
            Value::Constant(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Arguments of an invoke expression.
    pub fn invoke_args(&self) -> Option<&[ValueId]> {
        match self {
            Value::InstanceInvoke { args, .. }
            | Value::StaticInvoke { args, .. }
            | Value::PtrInvoke { args, .. } => Some(args),
            _ => None,
        }
    }

    /// The value a call is dispatched on: the base of an instance invoke or
    /// the function pointer of a pointer invoke.
    pub fn invoke_receiver(&self) -> Option<ValueId> {
        match self {
            Value::InstanceInvoke { base, .. } => Some(*base),
            Value::PtrInvoke { ptr, .. } => Some(*ptr),
            _ => None,
        }
    }

    /// Operand values this value directly refers to.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Value::InstanceField { base, .. } => vec![*base],
            Value::ArrayRef { base, index } => vec![*base, *index],
            Value::InstanceInvoke { base, args, .. } => {
                let mut ops = vec![*base];
                ops.extend(args.iter().copied());
                ops
            }
            Value::StaticInvoke { args, .. } => args.clone(),
            Value::PtrInvoke { ptr, args } => {
                let mut ops = vec![*ptr];
                ops.extend(args.iter().copied());
                ops
            }
            Value::Expr { operands } => operands.clone(),
            _ => Vec::new(),
        }
    }
}
