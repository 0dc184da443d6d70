//! Structural type references
//!
//! A [`TypeRef`] names a type the way descriptors and importers talk about
//! it: a full name (namespace included) applied to zero or more type
//! arguments, or a generic parameter of the enclosing definition.
//!
//! ## Textual form
//!
//! ```text
//! Fruit.Apple                     plain named type
//! Fruit.Tree<Fruit.Apple>         closed generic
//! Fruit.Tree<$T>                  open generic over parameter T
//! Collections.Map<$K, Fruit.Pear> partially open
//! ```
//!
//! The textual form is also the serialized form, so descriptor documents
//! and cached compositions stay readable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Substitution map from generic parameter name to the type bound to it
pub type Bindings = BTreeMap<String, TypeRef>;

/// Reference to a possibly generic type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeRef {
    /// A named type applied to type arguments (empty for non-generic types)
    Named {
        /// Full name including namespace, e.g. `Fruit.Tree`
        name: String,
        /// Type arguments, in declaration order
        args: Vec<TypeRef>,
    },
    /// A generic parameter of the enclosing definition
    Param(String),
}

impl TypeRef {
    /// A non-generic named type
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// A generic type applied to `args`
    pub fn generic(name: impl Into<String>, args: impl IntoIterator<Item = TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    /// A generic parameter
    pub fn param(name: impl Into<String>) -> Self {
        TypeRef::Param(name.into())
    }

    /// Full definition name, `None` for parameters
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            TypeRef::Param(_) => None,
        }
    }

    /// Type arguments (empty for parameters and non-generic types)
    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            TypeRef::Param(_) => &[],
        }
    }

    /// Name without its namespace
    pub fn short_name(&self) -> &str {
        match self {
            TypeRef::Named { name, .. } => name.rsplit('.').next().unwrap_or(name),
            TypeRef::Param(p) => p,
        }
    }

    /// Whether any generic parameter occurs in this reference
    pub fn is_open(&self) -> bool {
        match self {
            TypeRef::Param(_) => true,
            TypeRef::Named { args, .. } => args.iter().any(TypeRef::is_open),
        }
    }

    /// Parameter names occurring in this reference, first occurrence order
    pub fn params(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Param(p) => {
                if !out.contains(&p.as_str()) {
                    out.push(p);
                }
            }
            TypeRef::Named { args, .. } => {
                for arg in args {
                    arg.collect_params(out);
                }
            }
        }
    }

    /// Replace bound parameters; unbound parameters are left in place
    pub fn substitute(&self, bindings: &Bindings) -> TypeRef {
        match self {
            TypeRef::Param(p) => bindings.get(p).cloned().unwrap_or_else(|| self.clone()),
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
        }
    }

    /// Structurally match this pattern against `target`, extending `bindings`.
    ///
    /// A parameter already bound must be bound to an identical type. On
    /// failure `bindings` may hold partial results; callers that need
    /// backtracking work on a copy.
    pub fn unify(&self, target: &TypeRef, bindings: &mut Bindings) -> bool {
        match self {
            TypeRef::Param(p) => match bindings.get(p) {
                Some(bound) => bound == target,
                None => {
                    bindings.insert(p.clone(), target.clone());
                    true
                }
            },
            TypeRef::Named { name, args } => match target {
                TypeRef::Named {
                    name: target_name,
                    args: target_args,
                } => {
                    name == target_name
                        && args.len() == target_args.len()
                        && args
                            .iter()
                            .zip(target_args)
                            .all(|(a, t)| a.unify(t, bindings))
                }
                TypeRef::Param(_) => false,
            },
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Param(p) => write!(f, "${}", p),
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> String {
        ty.to_string()
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Error parsing the textual form of a [`TypeRef`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    /// Input was empty
    #[error("empty type reference")]
    Empty,
    /// A name was expected at the given position
    #[error("expected a type name at position {0}")]
    ExpectedName(usize),
    /// `<` without matching `>`
    #[error("unclosed type argument list starting at position {0}")]
    UnclosedArgs(usize),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(TypeParseError::Empty);
        }
        let chars: Vec<char> = s.chars().collect();
        let mut pos = 0;
        let ty = parse_type(&chars, &mut pos)?;
        skip_ws(&chars, &mut pos);
        if pos < chars.len() {
            return Err(TypeParseError::UnexpectedChar(chars[pos], pos));
        }
        Ok(ty)
    }
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '`' || c == '+'
}

fn parse_type(chars: &[char], pos: &mut usize) -> Result<TypeRef, TypeParseError> {
    skip_ws(chars, pos);
    let is_param = *pos < chars.len() && chars[*pos] == '$';
    if is_param {
        *pos += 1;
    }

    let start = *pos;
    while *pos < chars.len() && is_name_char(chars[*pos]) {
        *pos += 1;
    }
    if start == *pos {
        return Err(TypeParseError::ExpectedName(start));
    }
    let name: String = chars[start..*pos].iter().collect();
    if is_param {
        return Ok(TypeRef::Param(name));
    }

    skip_ws(chars, pos);
    let mut args = Vec::new();
    if *pos < chars.len() && chars[*pos] == '<' {
        let open = *pos;
        *pos += 1;
        loop {
            args.push(parse_type(chars, pos)?);
            skip_ws(chars, pos);
            match chars.get(*pos) {
                Some(',') => *pos += 1,
                Some('>') => {
                    *pos += 1;
                    break;
                }
                Some(&c) => return Err(TypeParseError::UnexpectedChar(c, *pos)),
                None => return Err(TypeParseError::UnclosedArgs(open)),
            }
        }
    }
    Ok(TypeRef::Named { name, args })
}
