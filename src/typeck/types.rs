use std::fmt;
use std::sync::Arc;

/// Direction restriction of a channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

impl ChanDir {
    pub fn can_send(self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::Send)
    }

    pub fn can_recv(self) -> bool {
        matches!(self, ChanDir::Both | ChanDir::Recv)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    /// Interface type every value converts to.
    Any,
    Chan(ChanDir, Box<Type>),
    UnsafePointer,
    Uint8,
    Uint16,
    Uintptr,
    Ptr(Box<Type>),
    Array(Box<Type>, u64),
    Struct(Arc<StructType>),
    /// Type of the untyped `nil` literal.
    Nil,
    /// Placeholder after a reported error; suppresses follow-on diagnostics.
    Invalid,
}

impl Type {
    pub fn chan(dir: ChanDir, elem: Type) -> Type {
        Type::Chan(dir, Box::new(elem))
    }

    pub fn ptr(to: Type) -> Type {
        Type::Ptr(Box::new(to))
    }

    pub fn array(elem: Type, len: u64) -> Type {
        Type::Array(Box::new(elem), len)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// Direction and element type if this is a channel.
    pub fn chan_elem(&self) -> Option<(ChanDir, &Type)> {
        match self {
            Type::Chan(dir, elem) => Some((*dir, elem)),
            _ => None,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Type::Bool | Type::Uint8 => 1,
            Type::Uint16 => 2,
            Type::Int
            | Type::Any
            | Type::Chan(..)
            | Type::UnsafePointer
            | Type::Uintptr
            | Type::Ptr(_)
            | Type::Nil => 8,
            Type::Array(elem, len) => elem.size() * len,
            Type::Struct(st) => st.size(),
            Type::Invalid => 0,
        }
    }

    pub fn align(&self) -> u64 {
        match self {
            Type::Array(elem, _) => elem.align(),
            Type::Struct(st) => st.align(),
            Type::Invalid => 1,
            other => other.size(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Any => write!(f, "any"),
            Type::Chan(ChanDir::Both, elem) => write!(f, "chan {elem}"),
            Type::Chan(ChanDir::Send, elem) => write!(f, "chan<- {elem}"),
            Type::Chan(ChanDir::Recv, elem) => write!(f, "<-chan {elem}"),
            Type::UnsafePointer => write!(f, "unsafe.Pointer"),
            Type::Uint8 => write!(f, "uint8"),
            Type::Uint16 => write!(f, "uint16"),
            Type::Uintptr => write!(f, "uintptr"),
            Type::Ptr(to) => write!(f, "*{to}"),
            Type::Array(elem, len) => write!(f, "[{len}]{elem}"),
            Type::Struct(st) => write!(f, "{}", st.name),
            Type::Nil => write!(f, "untyped nil"),
            Type::Invalid => write!(f, "invalid type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

/// Compiler-internal record type with C-like field layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
    /// No equality or hashing is ever generated for this type.
    pub noalg: bool,
}

impl StructType {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, Type)>) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| StructField { name: name.to_string(), ty })
                .collect(),
            noalg: false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Byte offset of `name`, with each field aligned to its natural alignment.
    pub fn field_offset(&self, name: &str) -> Option<u64> {
        let mut offset = 0;
        for field in &self.fields {
            offset = align_up(offset, field.ty.align());
            if field.name == name {
                return Some(offset);
            }
            offset += field.ty.size();
        }
        None
    }

    pub fn align(&self) -> u64 {
        self.fields.iter().map(|f| f.ty.align()).max().unwrap_or(1)
    }

    pub fn size(&self) -> u64 {
        let mut offset = 0;
        for field in &self.fields {
            offset = align_up(offset, field.ty.align()) + field.ty.size();
        }
        align_up(offset, self.align())
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align.max(1)) * align.max(1)
}

/// How a value of one type reaches a destination of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignability {
    Identical,
    /// Allowed through an implicit conversion the checker inserts.
    Convert,
    No,
}

pub fn assignability(value: &Type, target: &Type) -> Assignability {
    if value.is_invalid() || target.is_invalid() || value == target {
        return Assignability::Identical;
    }
    match (value, target) {
        (Type::Nil, Type::Chan(..) | Type::Any | Type::Ptr(_) | Type::UnsafePointer) => Assignability::Identical,
        (Type::Nil, _) => Assignability::No,
        (_, Type::Any) => Assignability::Convert,
        // A bidirectional channel is usable where a directional one is expected.
        (Type::Chan(ChanDir::Both, a), Type::Chan(_, b)) if a == b => Assignability::Identical,
        _ => Assignability::No,
    }
}
