//! Grammar-driven EXI encoder and decoder.
//!
//! One engine serves every message family: it walks the [`ComplexType`] tables in
//! [`crate::grammar`] and reads or writes the typed values through [`ExiElement`].
//! Value encodings follow the EXI bit-packed profile: n-bit integers for small
//! ranges and enumerations, 7-bit group unsigned integers, length-prefixed
//! strings and binaries.

use crate::bitstream::{BitReader, BitWriter};
use crate::grammar::{
    bits_for, ComplexType, DocumentGrammar, Event, GrammarState, MaxOccurs, RootKind, SimpleType,
    Step, Term,
};
use crate::value::{FieldMut, FieldRef};

/// Distinguishing bits `10`, no options, final version 1.
pub const EXI_HEADER: u8 = 0x80;

/// Event code width inside a simple-typed element (`CH` then `EE`).
const SIMPLE_CONTENT_WIDTH: u32 = 1;

/// Longest EXI unsigned integer that still fits 64 bits.
const MAX_UNSIGNED_GROUPS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    #[error("Payload type mismatch: expected {expected:#06x}, found {found:#06x}")]
    PayloadTypeMismatch { expected: u16, found: u16 },
    #[error("Invalid EXI header byte {0:#04x}")]
    ExiHeader(u8),
    #[error("Bounds violation: {0}")]
    BoundsViolation(String),
    #[error("Invalid variant: {0}")]
    InvalidVariant(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl CodecError {
    /// Stable nonzero result code.
    pub fn code(&self) -> i32 {
        match self {
            CodecError::BufferOverflow => -1,
            CodecError::MalformedHeader(_) => -2,
            CodecError::PayloadTypeMismatch { .. } => -3,
            CodecError::ExiHeader(_) => -4,
            CodecError::BoundsViolation(_) => -5,
            CodecError::InvalidVariant(_) => -6,
            CodecError::Unsupported(_) => -7,
            CodecError::InvalidValue(_) => -8,
        }
    }
}

/// Typed value of a complex type. Step indices follow [`ComplexType::step`]:
/// attributes first, then particles.
pub trait ExiElement {
    /// Occurrences of `step` present in the value.
    fn occurrences(&self, step: usize) -> usize;

    fn field(&self, step: usize, occurrence: usize) -> FieldRef<'_>;

    /// Storage for occurrence `occurrence` of `step`, created on demand. Fails
    /// when the Rust type has no room for it.
    fn slot(&mut self, step: usize, occurrence: usize) -> Result<FieldMut<'_>, CodecError>;
}

/// A message family: a closed set of root elements, exactly one selected.
pub trait ExiDocument: Sized {
    fn grammar() -> &'static DocumentGrammar;

    fn root_name(&self) -> &'static str;

    fn root(&self) -> &dyn ExiElement;

    fn root_mut(&mut self) -> &mut dyn ExiElement;

    /// Empty document selecting the root `name`, if it is modelled.
    fn with_root(name: &str) -> Option<Self>;
}

/// Encode `doc` into `buf` starting at byte `data_offset`. Returns the payload length.
pub fn encode_document<D: ExiDocument>(
    doc: &D,
    buf: &mut [u8],
    data_offset: usize,
) -> Result<usize, CodecError> {
    let mut encoder = Encoder::new(buf, data_offset);
    encoder.document(D::grammar(), doc.root_name(), doc.root())?;
    Ok(encoder.len())
}

/// Decode a document from `buf` starting at byte `data_offset`.
pub fn decode_document<D: ExiDocument>(buf: &[u8], data_offset: usize) -> Result<D, CodecError> {
    let mut decoder = Decoder::new(buf, data_offset);
    let result = decoder.document::<D>();
    result.inspect_err(|e| {
        tracing::debug!(
            grammar = D::grammar().name,
            bit = decoder.position(),
            error = %e,
            "decode rejected"
        );
    })
}

pub(crate) fn no_step(ty: &str, step: usize) -> CodecError {
    CodecError::InvalidValue(format!("{} has no step {}", ty, step))
}

fn kind_mismatch(ty: &ComplexType, step: &Step) -> CodecError {
    CodecError::InvalidValue(format!(
        "{}.{}: field kind does not match the schema type",
        ty.name, step.name
    ))
}

/// Writes EXI events and values to a [`BitWriter`].
#[derive(Debug)]
pub struct Encoder<'a> {
    w: BitWriter<'a>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8], data_offset: usize) -> Self {
        Encoder {
            w: BitWriter::new(buf, data_offset),
        }
    }

    pub fn len(&self) -> usize {
        self.w.len()
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    pub fn document(
        &mut self,
        grammar: &DocumentGrammar,
        root_name: &str,
        root: &dyn ExiElement,
    ) -> Result<(), CodecError> {
        self.w.write_byte(EXI_HEADER)?;
        let index = grammar.root_index(root_name).ok_or_else(|| {
            CodecError::InvalidVariant(format!("{} is not a root of {}", root_name, grammar.name))
        })?;
        let ty = grammar.roots[index].ty.ok_or_else(|| {
            CodecError::Unsupported(format!("root element {} is not modelled", root_name))
        })?;
        tracing::trace!(grammar = grammar.name, root = root_name, code = index, "encode root");
        self.w.write_bits(grammar.root_width(), index as u64)?;
        self.element(ty, root)?;
        if grammar.kind == RootKind::Fragment {
            self.w
                .write_bits(grammar.root_width(), grammar.end_code() as u64)?;
        }
        Ok(())
    }

    pub fn element(&mut self, ty: &'static ComplexType, el: &dyn ExiElement) -> Result<(), CodecError> {
        let mut state = GrammarState::start(ty);
        for index in 0..ty.step_count() {
            let Some(step) = ty.step(index) else { break };
            let n = el.occurrences(index);
            if (n as u64) < u64::from(step.occurs.min) {
                return Err(CodecError::BoundsViolation(format!(
                    "{}.{}: {} occurrences, at least {} required",
                    ty.name, step.name, n, step.occurs.min
                )));
            }
            if let MaxOccurs::Bounded(max) = step.occurs.max {
                if n as u64 > u64::from(max) {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} occurrences, at most {} allowed",
                        ty.name, step.name, n, max
                    )));
                }
            }
            for occurrence in 0..n {
                self.event(&state, Event::Step(index))?;
                self.content(ty, &step, el.field(index, occurrence))?;
                state.advance(index);
            }
        }
        self.event(&state, Event::EndElement)
    }

    fn event(&mut self, state: &GrammarState, event: Event) -> Result<(), CodecError> {
        let code = state.code_of(event).ok_or_else(|| {
            CodecError::InvalidValue(format!(
                "{}: {:?} not permitted in this state",
                state.complex_type().name,
                event
            ))
        })?;
        self.w.write_bits(state.width(), code as u64)
    }

    fn content(&mut self, ty: &ComplexType, step: &Step, field: FieldRef<'_>) -> Result<(), CodecError> {
        match step.term {
            Term::Complex(child) => match field {
                FieldRef::Element(e) => self.element(child, e),
                _ => Err(kind_mismatch(ty, step)),
            },
            Term::Simple(simple) if step.is_attribute => self.simple(ty, step, simple, field),
            Term::Simple(simple) => {
                self.w.write_bits(SIMPLE_CONTENT_WIDTH, 0)?;
                self.simple(ty, step, simple, field)?;
                self.w.write_bits(SIMPLE_CONTENT_WIDTH, 0)
            }
            Term::Opaque | Term::Wildcard => Err(CodecError::Unsupported(format!(
                "{}.{}: content is not modelled",
                ty.name, step.name
            ))),
        }
    }

    fn simple(
        &mut self,
        ty: &ComplexType,
        step: &Step,
        simple: SimpleType,
        field: FieldRef<'_>,
    ) -> Result<(), CodecError> {
        let out_of_range = |v: &dyn std::fmt::Display| {
            CodecError::BoundsViolation(format!("{}.{}: {} out of range", ty.name, step.name, v))
        };
        match (simple, field) {
            (SimpleType::Boolean, FieldRef::Bool(b)) => self.w.write_bit(b),
            (SimpleType::Bounded { min, max }, field) => {
                let value = match field {
                    FieldRef::Unsigned(v) => v as i128,
                    FieldRef::Signed(v) => v as i128,
                    _ => return Err(kind_mismatch(ty, step)),
                };
                if value < min as i128 || value > max as i128 {
                    return Err(out_of_range(&value));
                }
                let width = bits_for((max as i128 - min as i128 + 1) as usize);
                self.w.write_bits(width, (value - min as i128) as u64)
            }
            (SimpleType::Unsigned, FieldRef::Unsigned(v)) => self.write_unsigned(v),
            (SimpleType::Unsigned, FieldRef::Signed(v)) => {
                let v = u64::try_from(v).map_err(|_| out_of_range(&v))?;
                self.write_unsigned(v)
            }
            (SimpleType::Signed, FieldRef::Signed(v)) => self.write_signed(v),
            (SimpleType::Signed, FieldRef::Unsigned(v)) => {
                let v = i64::try_from(v).map_err(|_| out_of_range(&v))?;
                self.write_signed(v)
            }
            (SimpleType::Enumeration(names), FieldRef::Enum(index)) => {
                if index >= names.len() {
                    return Err(CodecError::InvalidValue(format!(
                        "{}.{}: enumeration index {} of {}",
                        ty.name,
                        step.name,
                        index,
                        names.len()
                    )));
                }
                self.w.write_bits(bits_for(names.len()), index as u64)
            }
            (SimpleType::String { max_len, charset }, FieldRef::Chars(s)) => {
                let count = s.chars().count();
                if count > max_len {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} characters, at most {} allowed",
                        ty.name, step.name, count, max_len
                    )));
                }
                self.write_string(s, count, charset)
            }
            (SimpleType::Binary { max_len, .. }, FieldRef::Bytes(data)) => {
                if data.len() > max_len {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} bytes, at most {} allowed",
                        ty.name,
                        step.name,
                        data.len(),
                        max_len
                    )));
                }
                self.write_unsigned(data.len() as u64)?;
                data.iter().try_for_each(|&b| self.w.write_byte(b))
            }
            _ => Err(kind_mismatch(ty, step)),
        }
    }

    pub fn write_unsigned(&mut self, mut value: u64) -> Result<(), CodecError> {
        loop {
            let group = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                return self.w.write_byte(group);
            }
            self.w.write_byte(group | 0x80)?;
        }
    }

    pub fn write_signed(&mut self, value: i64) -> Result<(), CodecError> {
        if value < 0 {
            self.w.write_bit(true)?;
            // -1 maps to magnitude 0.
            self.write_unsigned(!value as u64)
        } else {
            self.w.write_bit(false)?;
            self.write_unsigned(value as u64)
        }
    }

    fn write_string(&mut self, s: &str, count: usize, charset: Option<&str>) -> Result<(), CodecError> {
        // Lengths 0 and 1 are reserved for string table hits.
        self.write_unsigned(count as u64 + 2)?;
        match charset {
            None => s.chars().try_for_each(|c| self.write_unsigned(c as u64)),
            Some(set) => {
                let size = set.chars().count();
                let width = bits_for(size + 1);
                for c in s.chars() {
                    match set.chars().position(|x| x == c) {
                        Some(index) => self.w.write_bits(width, index as u64)?,
                        None => {
                            self.w.write_bits(width, size as u64)?;
                            self.write_unsigned(c as u64)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Reads EXI events and values from a [`BitReader`].
#[derive(Debug)]
pub struct Decoder<'a> {
    r: BitReader<'a>,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8], data_offset: usize) -> Self {
        Decoder {
            r: BitReader::new(buf, data_offset),
        }
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    pub fn position(&self) -> usize {
        self.r.position()
    }

    pub fn document<D: ExiDocument>(&mut self) -> Result<D, CodecError> {
        let grammar = D::grammar();
        let header = self.r.read_byte()?;
        if header != EXI_HEADER {
            return Err(CodecError::ExiHeader(header));
        }
        let width = grammar.root_width();
        let code = self.r.read_bits(width)? as usize;
        if code == grammar.wildcard_code() {
            return Err(CodecError::InvalidVariant(format!(
                "{}: undeclared root element",
                grammar.name
            )));
        }
        let root = grammar.roots.get(code).ok_or_else(|| {
            CodecError::InvalidVariant(format!("{}: root event code {}", grammar.name, code))
        })?;
        let ty = root.ty.ok_or_else(|| {
            CodecError::Unsupported(format!("root element {} is not modelled", root.name))
        })?;
        let mut doc = D::with_root(root.name).ok_or_else(|| {
            CodecError::Unsupported(format!("root element {} is not modelled", root.name))
        })?;
        tracing::trace!(grammar = grammar.name, root = root.name, code, "decode root");
        self.element(ty, doc.root_mut())?;
        if grammar.kind == RootKind::Fragment {
            let end = self.r.read_bits(width)? as usize;
            if end != grammar.end_code() {
                return Err(CodecError::Unsupported(format!(
                    "{}: fragment with more than one element",
                    grammar.name
                )));
            }
        }
        Ok(doc)
    }

    pub fn element(&mut self, ty: &'static ComplexType, el: &mut dyn ExiElement) -> Result<(), CodecError> {
        let mut state = GrammarState::start(ty);
        loop {
            let code = self.r.read_bits(state.width())? as usize;
            let event = state.event_at(code).ok_or_else(|| {
                CodecError::Unsupported(format!("{}: event code {}", ty.name, code))
            })?;
            let index = match event {
                Event::EndElement => return Ok(()),
                Event::Characters => {
                    return Err(CodecError::Unsupported(format!(
                        "{}: mixed character content",
                        ty.name
                    )))
                }
                Event::Step(index) => index,
            };
            let Some(step) = ty.step(index) else {
                return Err(CodecError::InvalidValue(format!("{}: step {}", ty.name, index)));
            };
            if matches!(step.term, Term::Opaque | Term::Wildcard) {
                return Err(CodecError::Unsupported(format!(
                    "{}.{}: content is not modelled",
                    ty.name, step.name
                )));
            }
            let slot = el.slot(index, state.occurrence(index) as usize)?;
            self.content(ty, &step, slot)?;
            state.advance(index);
        }
    }

    fn content(&mut self, ty: &ComplexType, step: &Step, slot: FieldMut<'_>) -> Result<(), CodecError> {
        match step.term {
            Term::Complex(child) => match slot {
                FieldMut::Element(e) => self.element(child, e),
                _ => Err(kind_mismatch(ty, step)),
            },
            Term::Simple(simple) if step.is_attribute => self.simple(ty, step, simple, slot),
            Term::Simple(simple) => {
                self.simple_event(ty, step)?;
                self.simple(ty, step, simple, slot)?;
                self.simple_event(ty, step)
            }
            Term::Opaque | Term::Wildcard => Err(kind_mismatch(ty, step)),
        }
    }

    /// `CH` before and `EE` after simple content are both code 0.
    fn simple_event(&mut self, ty: &ComplexType, step: &Step) -> Result<(), CodecError> {
        match self.r.read_bits(SIMPLE_CONTENT_WIDTH)? {
            0 => Ok(()),
            code => Err(CodecError::Unsupported(format!(
                "{}.{}: simple content event code {}",
                ty.name, step.name, code
            ))),
        }
    }

    fn simple(
        &mut self,
        ty: &ComplexType,
        step: &Step,
        simple: SimpleType,
        slot: FieldMut<'_>,
    ) -> Result<(), CodecError> {
        match simple {
            SimpleType::Boolean => {
                let v = self.r.read_bit()?;
                match slot {
                    FieldMut::Bool(b) => {
                        *b = v;
                        Ok(())
                    }
                    _ => Err(kind_mismatch(ty, step)),
                }
            }
            SimpleType::Bounded { min, max } => {
                let width = bits_for((max as i128 - min as i128 + 1) as usize);
                let value = self.r.read_bits(width)? as i128 + min as i128;
                if value > max as i128 {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} above maximum {}",
                        ty.name, step.name, value, max
                    )));
                }
                slot.store_integer(value)
            }
            SimpleType::Unsigned => {
                let value = self.read_unsigned()?;
                slot.store_integer(value as i128)
            }
            SimpleType::Signed => {
                let value = self.read_signed()?;
                slot.store_integer(value)
            }
            SimpleType::Enumeration(names) => {
                let index = self.r.read_bits(bits_for(names.len()))? as usize;
                let FieldMut::Enum(e) = slot else {
                    return Err(kind_mismatch(ty, step));
                };
                if index >= names.len() || !e.set_index(index) {
                    return Err(CodecError::InvalidValue(format!(
                        "{}.{}: enumeration index {}",
                        ty.name, step.name, index
                    )));
                }
                Ok(())
            }
            SimpleType::String { max_len, charset } => {
                let length = self.read_unsigned()?;
                if length < 2 {
                    return Err(CodecError::Unsupported(format!(
                        "{}.{}: string table reference",
                        ty.name, step.name
                    )));
                }
                let count = length - 2;
                if count > max_len as u64 {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} characters, at most {} allowed",
                        ty.name, step.name, count, max_len
                    )));
                }
                let FieldMut::Chars(sink) = slot else {
                    return Err(kind_mismatch(ty, step));
                };
                sink.clear_text();
                for _ in 0..count {
                    let c = self.read_char(charset)?;
                    sink.push_char(c)?;
                }
                Ok(())
            }
            SimpleType::Binary { max_len, .. } => {
                let length = self.read_unsigned()?;
                if length > max_len as u64 {
                    return Err(CodecError::BoundsViolation(format!(
                        "{}.{}: {} bytes, at most {} allowed",
                        ty.name, step.name, length, max_len
                    )));
                }
                let FieldMut::Bytes(sink) = slot else {
                    return Err(kind_mismatch(ty, step));
                };
                sink.clear_bytes();
                for _ in 0..length {
                    sink.push_byte(self.r.read_byte()?)?;
                }
                Ok(())
            }
        }
    }

    pub fn read_unsigned(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        for i in 0..MAX_UNSIGNED_GROUPS {
            let byte = self.r.read_byte()?;
            let group = u64::from(byte & 0x7F);
            if i == MAX_UNSIGNED_GROUPS - 1 && group > 1 {
                break;
            }
            value |= group << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::InvalidValue(
            "unsigned integer exceeds 64 bits".to_string(),
        ))
    }

    pub fn read_signed(&mut self) -> Result<i128, CodecError> {
        let negative = self.r.read_bit()?;
        let magnitude = self.read_unsigned()? as i128;
        Ok(if negative { -magnitude - 1 } else { magnitude })
    }

    fn read_char(&mut self, charset: Option<&str>) -> Result<char, CodecError> {
        if let Some(set) = charset {
            let size = set.chars().count();
            let index = self.r.read_bits(bits_for(size + 1))? as usize;
            if index < size {
                return set
                    .chars()
                    .nth(index)
                    .ok_or_else(|| CodecError::InvalidValue("character index".to_string()));
            }
            if index > size {
                return Err(CodecError::InvalidValue(format!(
                    "character index {} of {}",
                    index, size
                )));
            }
        }
        let code_point = self.read_unsigned()?;
        u32::try_from(code_point)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| CodecError::InvalidValue(format!("code point {:#x}", code_point)))
    }
}
