use std::{
    fmt::{self, Display},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;
use thiserror::Error;

/// A captured kernel event: fixed header plus the variable argument list
/// of whatever syscall or probe produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    header: Header,
    args: Vec<Argument>,
}

/// Context shared by every event variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub pid: i32,
    pub ppid: i32,
    pub uid: i32,
    pub gid: i32,
    pub comm: String,
    pub timestamp: SystemTime,
}

/// A named, dynamically typed event argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: Value,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Raw argument payload. Which variant an argument carries depends on
/// the probe that produced the event, so consumers must go through
/// [`Event::arg_val`] instead of assuming a shape.
#[derive(Debug, Clone, Serialize, Deserialize, EnumDiscriminants)]
#[serde(tag = "type", content = "content")]
#[strum_discriminants(derive(strum::Display))]
#[strum_discriminants(strum(serialize_all = "lowercase"))]
#[strum_discriminants(name(ValueKind))]
pub enum Value {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Str(String),
    StrArray(Vec<String>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("argument {name} not found")]
    NotFound { name: String },
    #[error("argument {name} is not of type {expected}")]
    WrongType { name: String, expected: ValueKind },
}

/// Types extractable from a [`Value`], one per variant.
pub trait FromValue: Sized {
    /// Value kind this type maps to, used for diagnostics.
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ( $( $ty:ty => $kind:ident ),* $(,)? ) => {
        $(
            impl FromValue for $ty {
                const KIND: ValueKind = ValueKind::$kind;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$kind(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_value![
    i32 => Int32,
    i64 => Int64,
    u32 => UInt32,
    u64 => UInt64,
    String => Str,
    Vec<String> => StrArray,
];

impl Event {
    pub fn new(header: Header, args: Vec<Argument>) -> Self {
        Self { header, args }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Typed access to a named argument.
    ///
    /// Fails when no argument carries that name or when the argument's
    /// value is not of the requested type.
    pub fn arg_val<T: FromValue>(&self, name: &str) -> Result<T, ArgError> {
        let arg = self
            .args
            .iter()
            .find(|arg| arg.name == name)
            .ok_or_else(|| ArgError::NotFound {
                name: name.to_string(),
            })?;
        T::from_value(&arg.value).ok_or_else(|| ArgError::WrongType {
            name: name.to_string(),
            expected: T::KIND,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = DateTime::<Utc>::from(self.header.timestamp).format("%Y-%m-%dT%TZ");
        let comm = &self.header.comm;
        let pid = self.header.pid;
        write!(f, "[{time} {comm} ({pid})]")?;
        for Argument { name, value } in &self.args {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::StrArray(v) => {
                write!(f, "[")?;
                for (index, elem) in v.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, "]")
            }
        }
    }
}
