// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Class name used by the front end for receivers whose type could not be
/// inferred.
pub const UNKNOWN_CLASS: &str = "%unk";
/// Name of the per-file class and method holding module-level code.
pub const DEFAULT_NAME: &str = "%dflt";
pub const CONSTRUCTOR_NAME: &str = "constructor";
/// Name used for the synthetic callee of pointer invocations.
pub const PTR_INVOKE_NAME: &str = "%ptr";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Unknown,
    Any,
    Void,
    Primitive(String),
    Class(String),
    Array(Box<Type>),
    Function(MethodSignature),
    Union(Vec<Type>),
}

impl Default for Type {
    fn default() -> Self {
        Type::Unknown
    }
}

impl Type {
    pub fn class(name: impl Into<String>) -> Type {
        Type::Class(name.into())
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(_))
    }

    /// Returns false for types whose values can never hold a reference.
    pub fn may_be_pointer(&self) -> bool {
        !matches!(self, Type::Void | Type::Primitive(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "unknown"),
            Type::Any => write!(f, "any"),
            Type::Void => write!(f, "void"),
            Type::Primitive(name) | Type::Class(name) => write!(f, "{}", name),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Function(sig) => write!(f, "fn {}", sig),
            Type::Union(tys) => {
                let parts: Vec<String> = tys.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", parts.join(" | "))
            }
        }
    }
}

/// `class.name` signature of a method, as written at call sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    pub class: String,
    pub name: String,
}

impl MethodSignature {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        MethodSignature {
            class: class.into(),
            name: name.into(),
        }
    }

    pub fn has_unknown_class(&self) -> bool {
        self.class == UNKNOWN_CLASS
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSignature {
    pub class: String,
    pub name: String,
}

impl FieldSignature {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        FieldSignature {
            class: class.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}
