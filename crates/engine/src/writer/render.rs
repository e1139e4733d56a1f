//! Text rendering of attribute values
//!
//! Literal grammar:
//!
//! | Value                 | Rendered as                                        |
//! |-----------------------|----------------------------------------------------|
//! | Int / Float           | `5`, `0.25`                                        |
//! | String                | `"text"` with `\"` and `\\` escapes                |
//! | Color ... Transform   | `Color(r,g,b)`, `Transform(Matrix(..),Vector(..))` |
//! | Ref                   | `name` or `name::output`                           |
//! | IntList ... ColorList | `ListInt(..)`, `ListFloat(..)`, `ListString(..)`,  |
//! |                       | `ListVector(..)`, `ListColor(..)`                  |
//! | other sequences       | `List(..)`                                         |
//! | MapChannels           | `List(List("name", <vertices>, <faces>), ...)`     |
//! | Instancer             | `List(<frame>, List(<i>, <tm>, <vel>, <ref>), ...)`|
//!
//! In the binary modes homogeneous numeric arrays (including the arrays
//! nested in mapping channels) become `Hex("...")` tokens instead.

use super::encode::{hex_token, EncodingMode};
use scenecast_core::{AttrKind, Attribute, ExportError, ExportResult, Value};
use std::fmt::{self, Display, Write};

/// Rendering parameters shared by every value of one attribute line
#[derive(Debug, Clone, Copy)]
pub(crate) struct RenderCtx {
    pub mode: EncodingMode,
    pub wrap: Option<usize>,
    pub depth: usize,
}

/// Whether the attribute is written with the `interpolate((t, v))` wrapper.
///
/// Paths are never interpolated. Generic lists are not either, except the
/// `instances` attribute of instancer entities.
pub(crate) fn interpolates(name: &str, attribute: &Attribute, instancer: bool) -> bool {
    if attribute.time.is_none() || attribute.kind == AttrKind::Path {
        return false;
    }
    match &attribute.value {
        Value::List(_) => instancer && name == "instances",
        _ => true,
    }
}

/// Render one complete attribute line, including indentation and the
/// trailing `;\n`.
pub(crate) fn render_attribute(
    name: &str,
    attribute: &Attribute,
    instancer: bool,
    ctx: RenderCtx,
) -> ExportResult<String> {
    let mut line = String::new();
    push_indent(&mut line, ctx.depth);
    line.push_str(name);
    line.push('=');
    let time = attribute
        .time
        .filter(|_| interpolates(name, attribute, instancer));
    match time {
        Some(t) => {
            write!(line, "interpolate(({}, ", t).map_err(fmt_error)?;
            render_value(&mut line, &attribute.value, ctx)?;
            line.push_str("))");
        }
        None => render_value(&mut line, &attribute.value, ctx)?,
    }
    line.push_str(";\n");
    Ok(line)
}

/// Append the rendering of `value` to `out`
pub(crate) fn render_value(out: &mut String, value: &Value, ctx: RenderCtx) -> ExportResult<()> {
    if ctx.mode.is_binary() {
        if let Some(raw) = value.raw_le_bytes() {
            out.push_str(&hex_token(&raw, ctx.mode)?);
            return Ok(());
        }
    }
    match value {
        Value::Unknown => Err(ExportError::encode("unknown value has no text form")),
        Value::Int(i) => write!(out, "{}", i).map_err(fmt_error),
        Value::Float(f) => write!(out, "{}", f).map_err(fmt_error),
        Value::String(s) => {
            push_quoted(out, s);
            Ok(())
        }
        Value::Color(c) => write!(out, "{}", c).map_err(fmt_error),
        Value::AColor(c) => write!(out, "{}", c).map_err(fmt_error),
        Value::Vector(v) => write!(out, "{}", v).map_err(fmt_error),
        Value::Matrix(m) => write!(out, "{}", m).map_err(fmt_error),
        Value::Transform(t) => write!(out, "{}", t).map_err(fmt_error),
        Value::Ref(r) => write!(out, "{}", r).map_err(fmt_error),
        Value::IntList(v) => push_display_list(out, "ListInt", v, ctx),
        Value::FloatList(v) => push_display_list(out, "ListFloat", v, ctx),
        Value::VectorList(v) => push_display_list(out, "ListVector", v, ctx),
        Value::ColorList(v) => push_display_list(out, "ListColor", v, ctx),
        Value::AColorList(v) => push_display_list(out, "List", v, ctx),
        Value::MatrixList(v) => push_display_list(out, "List", v, ctx),
        Value::TransformList(v) => push_display_list(out, "List", v, ctx),
        Value::RefList(v) => push_display_list(out, "List", v, ctx),
        Value::StringList(v) => {
            out.push_str("ListString(");
            for (i, s) in v.iter().enumerate() {
                push_separator(out, i, ctx);
                push_quoted(out, s);
            }
            out.push(')');
            Ok(())
        }
        Value::List(items) => {
            out.push_str("List(");
            for (i, item) in items.iter().enumerate() {
                push_separator(out, i, ctx);
                render_value(out, item, ctx)?;
            }
            out.push(')');
            Ok(())
        }
        Value::MapChannels(channels) => {
            out.push_str("List(");
            for (i, (name, channel)) in channels.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str("List(");
                push_quoted(out, name);
                out.push(',');
                render_value(out, &Value::VectorList(channel.vertices.clone()), ctx)?;
                out.push(',');
                render_value(out, &Value::IntList(channel.faces.clone()), ctx)?;
                out.push(')');
            }
            out.push(')');
            Ok(())
        }
        Value::Instancer(array) => {
            write!(out, "List({}", array.frame).map_err(fmt_error)?;
            for item in &array.items {
                write!(
                    out,
                    ",List({},{},{},{})",
                    item.index, item.transform, item.velocity, item.entity
                )
                .map_err(fmt_error)?;
            }
            out.push(')');
            Ok(())
        }
    }
}

fn push_display_list<T: Display>(
    out: &mut String,
    head: &str,
    items: &[T],
    ctx: RenderCtx,
) -> ExportResult<()> {
    out.push_str(head);
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        push_separator(out, i, ctx);
        write!(out, "{}", item).map_err(fmt_error)?;
    }
    out.push(')');
    Ok(())
}

/// Comma before every element but the first; a line break plus one extra
/// indent level every `wrap` elements.
fn push_separator(out: &mut String, index: usize, ctx: RenderCtx) {
    if index == 0 {
        return;
    }
    out.push(',');
    if let Some(k) = ctx.wrap.filter(|k| *k > 0) {
        if index % k == 0 {
            out.push('\n');
            push_indent(out, ctx.depth + 1);
        }
    }
}

fn push_quoted(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

pub(crate) fn push_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn fmt_error(e: fmt::Error) -> ExportError {
    ExportError::encode(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_core::{
        Color, EntityRef, InstanceItem, InstancerArray, MapChannel, Transform, Vector,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn literal() -> RenderCtx {
        RenderCtx {
            mode: EncodingMode::Literal,
            wrap: None,
            depth: 0,
        }
    }

    fn render(value: impl Into<Value>, ctx: RenderCtx) -> String {
        let mut out = String::new();
        render_value(&mut out, &value.into(), ctx).unwrap();
        out
    }

    #[test]
    fn test_scalars() {
        assert_eq!(render(5, literal()), "5");
        assert_eq!(render(0.25f32, literal()), "0.25");
        assert_eq!(render(Color::new(1.0, 0.5, 0.0), literal()), "Color(1,0.5,0)");
        assert_eq!(
            render(Value::Ref(EntityRef::with_output("tex", "alpha")), literal()),
            "tex::alpha"
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(render(r#"a"b\c"#, literal()), r#""a\"b\\c""#);
    }

    #[test]
    fn test_literal_lists() {
        assert_eq!(render(vec![1, 2, 3], literal()), "ListInt(1,2,3)");
        assert_eq!(render(vec![0.5f32], literal()), "ListFloat(0.5)");
        assert_eq!(
            render(vec!["a".to_string(), "b".to_string()], literal()),
            r#"ListString("a","b")"#
        );
        assert_eq!(
            render(vec![Vector::new(1.0, 2.0, 3.0)], literal()),
            "ListVector(Vector(1,2,3))"
        );
        assert_eq!(
            render(vec![Value::Int(1), Value::from("x")], literal()),
            r#"List(1,"x")"#
        );
    }

    #[test]
    fn test_literal_wrap() {
        let ctx = RenderCtx {
            mode: EncodingMode::Literal,
            wrap: Some(2),
            depth: 1,
        };
        assert_eq!(render(vec![1, 2, 3, 4, 5], ctx), "ListInt(1,2,\n\t\t3,4,\n\t\t5)");
    }

    #[test]
    fn test_hex_mode_numeric_array() {
        let ctx = RenderCtx {
            mode: EncodingMode::Hex,
            ..literal()
        };
        assert_eq!(render(vec![1, 256], ctx), "Hex(\"0100000000010000\")");
        // Non-numeric sequences keep their literal form
        assert_eq!(render(vec![Value::Int(1)], ctx), "List(1)");
    }

    #[test]
    fn test_map_channels() {
        let mut channels = BTreeMap::new();
        channels.insert(
            "uv".to_string(),
            MapChannel::new(vec![Vector::new(0.0, 1.0, 0.0)], vec![0, 0, 0]),
        );
        let value = Value::MapChannels(Arc::new(channels));
        assert_eq!(
            render(value, literal()),
            r#"List(List("uv",ListVector(Vector(0,1,0)),ListInt(0,0,0)))"#
        );
    }

    #[test]
    fn test_instancer() {
        let array = InstancerArray {
            frame: 3.0,
            items: vec![InstanceItem {
                index: 7,
                transform: Transform::identity(),
                velocity: Transform::identity(),
                entity: EntityRef::new("tree"),
            }],
        };
        let text = render(array, literal());
        assert!(text.starts_with("List(3,List(7,Transform("));
        assert!(text.ends_with(",tree))"));
    }

    #[test]
    fn test_unknown_is_an_encode_error() {
        let mut out = String::new();
        assert!(render_value(&mut out, &Value::Unknown, literal()).is_err());
    }

    #[test]
    fn test_interpolation_policy() {
        let timed = |value: Value, kind: AttrKind| Attribute {
            value,
            time: Some(2.0),
            kind,
        };
        assert!(interpolates("n", &timed(Value::Int(1), AttrKind::Data), false));
        assert!(!interpolates("n", &Attribute::new(Value::Int(1)), false));
        assert!(!interpolates(
            "file",
            &timed(Value::from("/a.exr"), AttrKind::Path),
            false
        ));
        let list = Value::from(vec![Value::Int(1)]);
        assert!(!interpolates("items", &timed(list.clone(), AttrKind::Data), false));
        assert!(interpolates("instances", &timed(list.clone(), AttrKind::Data), true));
        assert!(!interpolates("instances", &timed(list, AttrKind::Data), false));
    }

    #[test]
    fn test_attribute_line() {
        let mut attr = Attribute::new(Value::Int(5));
        assert_eq!(
            render_attribute("n", &attr, false, RenderCtx { depth: 1, ..literal() }).unwrap(),
            "\tn=5;\n"
        );
        attr.time = Some(1.5);
        assert_eq!(
            render_attribute("n", &attr, false, literal()).unwrap(),
            "n=interpolate((1.5, 5));\n"
        );
    }
}
