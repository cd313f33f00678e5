//! Diagnostic-facing type formatting.

use crate::types::{LiteralValue, Type, MAX_TYPE_RECURSION};
use std::fmt::Write;

/// Render a type the way diagnostics quote it.
pub fn format_type(t: &Type) -> String {
    let mut out = String::new();
    write_type(&mut out, t, 0);
    out
}

fn write_type(out: &mut String, t: &Type, recursion: u32) {
    if recursion > MAX_TYPE_RECURSION {
        out.push_str("...");
        return;
    }
    match t {
        Type::Unbound => out.push_str("Unbound"),
        Type::Unknown => out.push_str("Unknown"),
        Type::Any { is_ellipsis: true } => out.push_str("..."),
        Type::Any { is_ellipsis: false } => out.push_str("Any"),
        Type::None => out.push_str("None"),
        Type::Never => out.push_str("Never"),
        Type::Class(c) => {
            let _ = write!(out, "Type[{}", c.name());
            write_type_args(out, t, recursion);
            out.push(']');
        }
        Type::Object(o) => {
            if let Some(literal) = &o.literal {
                let _ = write!(out, "Literal[{}]", format_literal(literal));
                return;
            }
            out.push_str(o.class.name());
            write_type_args(out, &Type::Class(o.class.clone()), recursion);
        }
        Type::Function(f) => {
            out.push('(');
            for (i, p) in f.parameters.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                match p.name.as_deref() {
                    Some(name) => {
                        let _ = write!(out, "{name}: ");
                    }
                    None => out.push_str("*: "),
                }
                write_type(out, &f.parameter_type(i), recursion + 1);
            }
            out.push_str(") -> ");
            write_type(out, &f.effective_return_type(), recursion + 1);
        }
        Type::Overloaded(o) => {
            let _ = write!(out, "Overload[{} variants]", o.overloads.len());
        }
        Type::Property(p) => {
            out.push_str("property[");
            write_type(out, &p.getter.effective_return_type(), recursion + 1);
            out.push(']');
        }
        Type::Module(m) => {
            let _ = write!(out, "Module(\"{}\")", m.name);
        }
        Type::Union(u) => {
            for (i, entry) in u.entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(" | ");
                }
                write_type(out, entry, recursion + 1);
            }
        }
        Type::TypeVar(tv) => out.push_str(&tv.name),
    }
}

fn write_type_args(out: &mut String, t: &Type, recursion: u32) {
    if let Type::Class(c) = t {
        if let Some(args) = &c.type_arguments {
            if !args.is_empty() {
                out.push('[');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_type(out, arg, recursion + 1);
                }
                out.push(']');
            }
        }
    }
}

fn format_literal(literal: &LiteralValue) -> String {
    match literal {
        LiteralValue::Int(v) => v.to_string(),
        LiteralValue::Bool(true) => "True".into(),
        LiteralValue::Bool(false) => "False".into(),
        LiteralValue::Str(v) => format!("'{v}'"),
        LiteralValue::Bytes(_) => "b'...'".into(),
    }
}

/// Format an argument-type list for "no overloads match" messages.
pub fn format_argument_types(types: &[Type]) -> String {
    let mut out = String::from("(");
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format_type(t));
    }
    out.push(')');
    out
}
