//! Type references: what was written, and what it resolved to.
//!
//! Every type-carrying position of a declaration is a [`TypeSlot`]. Slots
//! start as placeholders (`Unresolved` for written types, `Implicit` for
//! types that must be inferred) and are replaced in place by a phase.

use std::fmt;

use crate::{Span, SymbolRef};

/// A type reference exactly as written in source.
///
/// # Examples
///
/// ```
/// use phasewise_core::TypeExpr;
///
/// let list = TypeExpr::named("List").with_arg(TypeExpr::named("String")).nullable();
/// assert_eq!(list.to_string(), "List<String>?");
/// assert!(!list.is_qualified());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TypeExpr {
    /// Name as written: simple (`User`) or dotted (`app.model.User`, `Outer.Inner`).
    pub name: String,
    /// Type arguments.
    pub args: Vec<TypeExpr>,
    /// Trailing `?`.
    pub is_nullable: bool,
    pub span: Span,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, arg: TypeExpr) -> Self {
        self.args.push(arg);
        self
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Whether the name contains a `.` qualifier.
    pub fn is_qualified(&self) -> bool {
        self.name.contains('.')
    }

    /// Name segments split on `.`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('.').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        if self.is_nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    /// A class-like declaration applied to type arguments.
    Class {
        symbol: SymbolRef,
        args: Vec<ResolvedType>,
        nullable: bool,
    },
    /// A reference to a type parameter declaration.
    TypeParameter { symbol: SymbolRef, nullable: bool },
    /// The universal top type. Used for classes without a supertype clause
    /// and as the fallback when a supertype edge closes a cycle.
    Any,
    /// A reference that could not be resolved; `name` is what was written.
    Error { name: String },
}

impl ResolvedType {
    /// A non-nullable class type without arguments.
    pub fn class(symbol: SymbolRef) -> Self {
        ResolvedType::Class {
            symbol,
            args: Vec::new(),
            nullable: false,
        }
    }

    pub fn error(name: impl Into<String>) -> Self {
        ResolvedType::Error { name: name.into() }
    }

    /// The class-like declaration this type refers to, if any.
    pub fn class_symbol(&self) -> Option<SymbolRef> {
        match self {
            ResolvedType::Class { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResolvedType::Error { .. })
    }

    pub fn is_any(&self) -> bool {
        matches!(self, ResolvedType::Any)
    }

    /// Whether this type or any of its arguments is an error type.
    pub fn contains_error(&self) -> bool {
        match self {
            ResolvedType::Error { .. } => true,
            ResolvedType::Class { args, .. } => args.iter().any(ResolvedType::contains_error),
            _ => false,
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Class {
                symbol,
                args,
                nullable,
            } => {
                write!(f, "{symbol}")?;
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            ResolvedType::TypeParameter { symbol, nullable } => {
                write!(f, "T{symbol}{}", if *nullable { "?" } else { "" })
            }
            ResolvedType::Any => write!(f, "Any"),
            ResolvedType::Error { name } => write!(f, "<error: {name}>"),
        }
    }
}

/// A type-carrying position of a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeSlot {
    /// Written but not yet resolved.
    Unresolved(TypeExpr),
    /// Not written; must be inferred.
    #[default]
    Implicit,
    /// Replaced in place by a phase.
    Resolved(ResolvedType),
}

impl TypeSlot {
    /// Slot for an optionally written type.
    pub fn from_written(expr: Option<TypeExpr>) -> Self {
        match expr {
            Some(expr) => TypeSlot::Unresolved(expr),
            None => TypeSlot::Implicit,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TypeSlot::Resolved(_))
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, TypeSlot::Implicit)
    }

    /// `Resolved` or `Implicit`: nothing left for explicit type resolution.
    pub fn is_settled(&self) -> bool {
        !matches!(self, TypeSlot::Unresolved(_))
    }

    pub fn resolved(&self) -> Option<&ResolvedType> {
        match self {
            TypeSlot::Resolved(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn written(&self) -> Option<&TypeExpr> {
        match self {
            TypeSlot::Unresolved(expr) => Some(expr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeclId, UnitId};

    #[test]
    fn type_expr_segments() {
        let expr = TypeExpr::named("app.model.User");
        assert!(expr.is_qualified());
        assert_eq!(expr.segments().collect::<Vec<_>>(), vec!["app", "model", "User"]);
    }

    #[test]
    fn slot_states() {
        assert!(TypeSlot::from_written(None).is_implicit());
        let slot = TypeSlot::from_written(Some(TypeExpr::named("Int")));
        assert!(!slot.is_settled());
        assert_eq!(slot.written().unwrap().name, "Int");
        let slot = TypeSlot::Resolved(ResolvedType::Any);
        assert!(slot.is_resolved());
        assert!(slot.is_settled());
    }

    #[test]
    fn error_inside_arguments_is_detected() {
        let sym = SymbolRef::new(UnitId::new(0), DeclId::new(1));
        let ty = ResolvedType::Class {
            symbol: sym,
            args: vec![ResolvedType::error("Missing")],
            nullable: false,
        };
        assert!(!ty.is_error());
        assert!(ty.contains_error());
        assert_eq!(ty.class_symbol(), Some(sym));
    }
}
