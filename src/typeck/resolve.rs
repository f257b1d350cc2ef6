use crate::diagnostics::Diagnostics;
use crate::parser::ast::TypeExpr;
use crate::span::Spanned;

use super::types::Type;

/// Resolve a written type. Unknown names are reported and become `Type::Invalid`.
pub(crate) fn resolve_type(ty: &Spanned<TypeExpr>, diags: &mut Diagnostics) -> Type {
    match &ty.node {
        TypeExpr::Named(name) => match name.as_str() {
            "int" => Type::Int,
            "bool" => Type::Bool,
            "any" => Type::Any,
            _ => {
                diags.type_error(ty.span, format!("undefined type: {name}"));
                Type::Invalid
            }
        },
        TypeExpr::Chan { dir, elem } => {
            let elem = resolve_type(elem, diags);
            if elem.is_invalid() { Type::Invalid } else { Type::chan(*dir, elem) }
        }
    }
}

/// Target type of a conversion spelled as a call, e.g. `any(x)`.
pub(crate) fn conversion_target(name: &str) -> Option<Type> {
    match name {
        "int" => Some(Type::Int),
        "bool" => Some(Type::Bool),
        "any" => Some(Type::Any),
        _ => None,
    }
}
