//! Internal type representation shared by the checker and the code generator.

use std::fmt;

use crate::ast::{TypeAnnotation, TypeKind};

/// The scalar types of the language. `Void` only appears as a return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Double,
    Void,
}

impl Type {
    /// Resolve a source annotation. A missing annotation resolves to `default`.
    pub fn from_annotation(annotation: Option<&TypeAnnotation>, default: Type) -> Type {
        match annotation.map(|a| a.kind) {
            Some(TypeKind::Int) => Type::Int,
            Some(TypeKind::Double) => Type::Double,
            Some(TypeKind::Void) => Type::Void,
            None => default,
        }
    }

    /// Whether an expression of this type leaves a usable value.
    pub fn is_value(self) -> bool {
        !matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Void => write!(f, "void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn test_annotation_resolution() {
        let ann = TypeAnnotation::new(TypeKind::Double, Span::default());
        assert_eq!(Type::from_annotation(Some(&ann), Type::Int), Type::Double);
        assert_eq!(Type::from_annotation(None, Type::Int), Type::Int);
        assert_eq!(Type::from_annotation(None, Type::Void), Type::Void);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::Int.to_string(), "int");
        assert_eq!(Type::Void.to_string(), "void");
        assert!(!Type::Void.is_value());
        assert!(Type::Double.is_value());
    }
}
