/*!
 varlink_parser crate for parsing [varlink](http://varlink.org) interface definition files.

 # Examples

 ```rust
 use varlink_parser::{Interface, TypeKind};

 let iface = Interface::from_string("
 ## Example service
 interface org.example.ping

 ## Returns the same string
 method Ping(ping: string) -> (pong: string)
 ").unwrap();

 assert_eq!(iface.name, "org.example.ping");
 let ping = &iface.methods["Ping"];
 assert_eq!(ping.input.fields[0].name, "ping");
 assert_eq!(ping.output.fields[0].ty.kind, TypeKind::String);
 ```
!*/

#![doc(
    html_logo_url = "https://varlink.org/images/varlink.png",
    html_favicon_url = "https://varlink.org/images/varlink-small.png"
)]

use std::collections::BTreeMap;
use std::str::FromStr;

mod error;
mod format;
mod lexer;
mod parser;

#[cfg(test)]
mod test;

pub use crate::error::{Error, Result};
pub use crate::format::Format;

/// A type expression as it appears in a field, a typedef, or an array/map element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    /// `true` if the type was prefixed with `?`.
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Object,
    /// Reference to a named type. Not resolved by the parser.
    Name(String),
    Struct(Struct),
    Enum(Enum),
    /// `[]T`
    Array(Box<Type>),
    /// `[string]T`, keys are always strings.
    Map(Box<Type>),
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Type {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: TypeKind) -> Self {
        Type {
            kind,
            nullable: true,
        }
    }
}

impl From<TypeKind> for Type {
    fn from(kind: TypeKind) -> Self {
        Type::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// An ordered list of `name: type` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Struct {
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn new() -> Self {
        Struct::default()
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Type)> for Struct {
    fn from_iter<I: IntoIterator<Item = (S, Type)>>(iter: I) -> Self {
        Struct {
            fields: iter
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.into(),
                    ty,
                })
                .collect(),
        }
    }
}

/// An ordered list of bare variant names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enum {
    pub variants: Vec<String>,
}

impl<S: Into<String>> FromIterator<S> for Enum {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Enum {
            variants: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub input: Struct,
    pub output: Struct,
}

/// A named `type` declaration. `ty` is always a struct or an enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VError {
    pub name: String,
    pub parm: Struct,
}

/// A parsed interface definition.
///
/// Members are looked up by name through the maps; the `*_keys` vectors keep
/// the order in which they were declared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Interface {
    pub name: String,
    pub typedefs: BTreeMap<String, Typedef>,
    pub typedef_keys: Vec<String>,
    pub methods: BTreeMap<String, Method>,
    pub method_keys: Vec<String>,
    pub errors: BTreeMap<String, VError>,
    pub error_keys: Vec<String>,
}

impl Interface {
    /// Parse an interface definition.
    ///
    /// Parsing stops at the first malformed token; no partial interface is
    /// ever returned.
    pub fn from_string<S: ?Sized + AsRef<str>>(s: &S) -> Result<Self> {
        parser::Parser::new(s.as_ref()).parse_interface()
    }

    pub fn typedefs(&self) -> impl Iterator<Item = &Typedef> {
        self.typedef_keys.iter().map(move |k| &self.typedefs[k])
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.method_keys.iter().map(move |k| &self.methods[k])
    }

    pub fn errors(&self) -> impl Iterator<Item = &VError> {
        self.error_keys.iter().map(move |k| &self.errors[k])
    }
}

impl FromStr for Interface {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Interface::from_string(s)
    }
}
