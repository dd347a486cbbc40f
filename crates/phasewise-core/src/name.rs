use std::fmt;

use crate::SymbolId;

/// Fully-qualified classifier name: a package plus a chain of class names.
///
/// The package and the class chain are kept apart because `a.b.C` may mean
/// class `C` in package `a.b` or nested class `b.C` inside class `a`.
///
/// # Examples
///
/// ```
/// use phasewise_core::FqName;
///
/// let inner = FqName::top_level("app.model", "User").child("Id");
/// assert_eq!(inner.to_string(), "app.model.User.Id");
/// assert_eq!(inner.simple_name(), "Id");
/// assert_eq!(inner.outer().unwrap().to_string(), "app.model.User");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FqName {
    /// Package, dot separated; empty for the root package.
    pub package: String,
    /// Classifier chain from the outermost class to this one (never empty).
    pub classes: Vec<String>,
}

impl FqName {
    /// A top-level classifier in `package`.
    pub fn top_level(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            classes: vec![name.into()],
        }
    }

    /// A classifier nested inside this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut classes = self.classes.clone();
        classes.push(name.into());
        Self {
            package: self.package.clone(),
            classes,
        }
    }

    /// The enclosing classifier, if this one is nested.
    pub fn outer(&self) -> Option<Self> {
        if self.classes.len() < 2 {
            return None;
        }
        Some(Self {
            package: self.package.clone(),
            classes: self.classes[..self.classes.len() - 1].to_vec(),
        })
    }

    pub fn simple_name(&self) -> &str {
        self.classes.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_nested(&self) -> bool {
        self.classes.len() > 1
    }

    /// Stable hash identity of this name.
    pub fn symbol_id(&self) -> SymbolId {
        SymbolId::classifier(&self.to_string())
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.package.is_empty() {
            write!(f, "{}.", self.package)?;
        }
        write!(f, "{}", self.classes.join("."))
    }
}

/// Join a package and a relative dotted path.
pub fn join_package(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_package_display() {
        let name = FqName::top_level("", "Main");
        assert_eq!(name.to_string(), "Main");
        assert!(!name.is_nested());
        assert!(name.outer().is_none());
    }

    #[test]
    fn nested_names_share_hash_with_their_string_form() {
        let nested = FqName::top_level("p", "A").child("B");
        assert_eq!(nested.symbol_id(), SymbolId::classifier("p.A.B"));
    }

    #[test]
    fn join() {
        assert_eq!(join_package("", "A"), "A");
        assert_eq!(join_package("x.y", "A"), "x.y.A");
    }
}
