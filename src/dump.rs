//! Render decoded documents as XML by walking their grammar tables.
//!
//! Only the root element carries the namespace declaration. Binary content is
//! shown the way the schema types it: hexBinary upper-case, base64Binary padded.

use crate::codec::{ExiDocument, ExiElement};
use crate::grammar::{BinaryEncoding, ComplexType, SimpleType, Term};
use crate::value::FieldRef;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// `Display` adapter producing indented XML.
pub struct XmlDump<'a, D>(pub &'a D);

impl<D: ExiDocument> fmt::Display for XmlDump<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grammar = D::grammar();
        let name = self.0.root_name();
        match grammar
            .root_index(name)
            .and_then(|i| grammar.roots[i].ty)
        {
            Some(ty) => element(f, name, Some(grammar.namespace), ty, self.0.root(), 0),
            None => writeln!(f, "<{} xmlns=\"{}\"/>", name, grammar.namespace),
        }
    }
}

pub fn to_xml<D: ExiDocument>(doc: &D) -> String {
    XmlDump(doc).to_string()
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

fn element(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    namespace: Option<&str>,
    ty: &ComplexType,
    el: &dyn ExiElement,
    depth: usize,
) -> fmt::Result {
    indent(f, depth)?;
    write!(f, "<{}", name)?;
    if let Some(ns) = namespace {
        write!(f, " xmlns=\"{}\"", ns)?;
    }
    for (i, attr) in ty.attributes.iter().enumerate() {
        if el.occurrences(i) > 0 {
            write!(f, " {}=\"", attr.name)?;
            value(f, attr.ty, el.field(i, 0))?;
            f.write_str("\"")?;
        }
    }
    let first = ty.attributes.len();
    if (first..ty.step_count()).all(|i| el.occurrences(i) == 0) {
        return f.write_str("/>\n");
    }
    f.write_str(">\n")?;
    for (j, particle) in ty.particles.iter().enumerate() {
        let index = first + j;
        for k in 0..el.occurrences(index) {
            match (particle.term, el.field(index, k)) {
                (Term::Complex(child), FieldRef::Element(e)) => {
                    element(f, particle.name, None, child, e, depth + 1)?
                }
                (Term::Simple(simple), field) => {
                    indent(f, depth + 1)?;
                    write!(f, "<{}>", particle.name)?;
                    value(f, simple, field)?;
                    writeln!(f, "</{}>", particle.name)?;
                }
                _ => {}
            }
        }
    }
    indent(f, depth)?;
    writeln!(f, "</{}>", name)
}

fn value(f: &mut fmt::Formatter<'_>, simple: SimpleType, field: FieldRef<'_>) -> fmt::Result {
    match (simple, field) {
        (SimpleType::Enumeration(names), FieldRef::Enum(i)) => {
            f.write_str(names.get(i).copied().unwrap_or("?"))
        }
        (SimpleType::Binary { encoding, .. }, FieldRef::Bytes(data)) => match encoding {
            BinaryEncoding::Hex => f.write_str(&hex::encode_upper(data)),
            BinaryEncoding::Base64 => f.write_str(&STANDARD.encode(data)),
        },
        (_, FieldRef::Bool(b)) => write!(f, "{}", b),
        (_, FieldRef::Unsigned(v)) => write!(f, "{}", v),
        (_, FieldRef::Signed(v)) => write!(f, "{}", v),
        (_, FieldRef::Chars(s)) => escape(f, s),
        _ => Ok(()),
    }
}

fn escape(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '&' => f.write_str("&amp;")?,
            '<' => f.write_str("&lt;")?,
            '>' => f.write_str("&gt;")?,
            '"' => f.write_str("&quot;")?,
            '\'' => f.write_str("&apos;")?,
            _ => fmt::Write::write_char(f, c)?,
        }
    }
    Ok(())
}
