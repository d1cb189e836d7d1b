use std::fmt;

use itertools::Itertools;

use crate::*;

/// Canonical text rendering of interface definitions.
///
/// `get_oneline` never emits a newline. `get_multiline` breaks parenthesized
/// lists one element per line, indented by two columns per level, whenever
/// the element would not fit into `max` columns.
pub trait Format {
    fn get_oneline(&self) -> String;
    fn get_multiline(&self, indent: usize, max: usize) -> String;
}

impl Format for Type {
    fn get_oneline(&self) -> String {
        let inner = match self.kind {
            TypeKind::Bool => "bool".into(),
            TypeKind::Int => "int".into(),
            TypeKind::Float => "float".into(),
            TypeKind::String => "string".into(),
            TypeKind::Object => "object".into(),
            TypeKind::Name(ref v) => v.clone(),
            TypeKind::Struct(ref v) => v.get_oneline(),
            TypeKind::Enum(ref v) => v.get_oneline(),
            TypeKind::Array(ref v) => format!("[]{}", v.get_oneline()),
            TypeKind::Map(ref v) => format!("[string]{}", v.get_oneline()),
        };
        if self.nullable {
            format!("?{}", inner)
        } else {
            inner
        }
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        let inner = match self.kind {
            TypeKind::Struct(ref v) => v.get_multiline(indent, max),
            TypeKind::Enum(ref v) => v.get_multiline(indent, max),
            TypeKind::Array(ref v) => format!("[]{}", v.get_multiline(indent, max)),
            TypeKind::Map(ref v) => format!("[string]{}", v.get_multiline(indent, max)),
            _ => return self.get_oneline(),
        };
        if self.nullable {
            format!("?{}", inner)
        } else {
            inner
        }
    }
}

impl Format for Field {
    fn get_oneline(&self) -> String {
        format!("{}: {}", self.name, self.ty.get_oneline())
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        format!("{}: {}", self.name, self.ty.get_multiline(indent, max))
    }
}

fn multiline_fields(elts: &[Field], indent: usize, max: usize) -> String {
    if elts.is_empty() {
        return "()".into();
    }
    let inner = indent + 2;
    let body = elts
        .iter()
        .map(|elt| {
            let line = elt.get_oneline();
            if line.len() + inner < max {
                format!("{:indent$}{}", "", line, indent = inner)
            } else {
                format!("{:indent$}{}", "", elt.get_multiline(inner, max), indent = inner)
            }
        })
        .join(",\n");
    format!("(\n{}\n{:indent$})", body, "", indent = indent)
}

impl Format for Struct {
    fn get_oneline(&self) -> String {
        format!("({})", self.fields.iter().map(Format::get_oneline).join(", "))
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        multiline_fields(&self.fields, indent, max)
    }
}

impl Format for Enum {
    fn get_oneline(&self) -> String {
        format!("({})", self.variants.iter().join(", "))
    }

    fn get_multiline(&self, indent: usize, _max: usize) -> String {
        if self.variants.is_empty() {
            return "()".into();
        }
        let body = self
            .variants
            .iter()
            .map(|v| format!("{:indent$}{}", "", v, indent = indent + 2))
            .join(",\n");
        format!("(\n{}\n{:indent$})", body, "", indent = indent)
    }
}

impl Format for Interface {
    fn get_oneline(&self) -> String {
        let mut f = format!("interface {}\n", self.name);

        for t in self.typedefs() {
            f += &format!("\ntype {} {}\n", t.name, t.ty.get_oneline());
        }
        for m in self.methods() {
            f += &format!(
                "\nmethod {}{} -> {}\n",
                m.name,
                m.input.get_oneline(),
                m.output.get_oneline()
            );
        }
        for e in self.errors() {
            f += &format!("\nerror {} {}\n", e.name, e.parm.get_oneline());
        }
        f
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        let mut f = format!("{:indent$}interface {}\n", "", self.name, indent = indent);

        for t in self.typedefs() {
            let line = format!("type {} {}", t.name, t.ty.get_oneline());
            if line.len() + indent <= max {
                f += &format!("\n{:indent$}{}\n", "", line, indent = indent);
            } else {
                f += &format!(
                    "\n{:indent$}type {} {}\n",
                    "",
                    t.name,
                    t.ty.get_multiline(indent, max),
                    indent = indent
                );
            }
        }

        for m in self.methods() {
            let head = format!("method {}", m.name);
            let input = m.input.get_oneline();
            let output = m.output.get_oneline();
            let (input, output) = if indent + head.len() + input.len() + output.len() + 4 <= max {
                (input, output)
            } else if indent + head.len() + input.len() + 5 <= max {
                (input, m.output.get_multiline(indent, max))
            } else if indent + output.len() + 5 <= max {
                (m.input.get_multiline(indent, max), output)
            } else {
                (
                    m.input.get_multiline(indent, max),
                    m.output.get_multiline(indent, max),
                )
            };
            f += &format!(
                "\n{:indent$}{}{} -> {}\n",
                "",
                head,
                input,
                output,
                indent = indent
            );
        }

        for e in self.errors() {
            let line = format!("error {} {}", e.name, e.parm.get_oneline());
            if line.len() + indent <= max {
                f += &format!("\n{:indent$}{}\n", "", line, indent = indent);
            } else {
                f += &format!(
                    "\n{:indent$}error {} {}\n",
                    "",
                    e.name,
                    e.parm.get_multiline(indent, max),
                    indent = indent
                );
            }
        }
        f
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl fmt::Display for Enum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_multiline(0, 80))
    }
}
