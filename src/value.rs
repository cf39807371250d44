//! Fixed-capacity value containers and the field views the codec works through.
//!
//! Nothing here allocates: strings, byte arrays and repeated elements live in
//! inline storage with an explicit length that never exceeds the capacity.

use crate::codec::{CodecError, ExiElement};
use std::fmt;

/// UTF-8 string with an inline capacity of `N` bytes.
#[derive(Clone, Copy)]
pub struct ExiString<const N: usize> {
    len: usize,
    bytes: [u8; N],
}

impl<const N: usize> ExiString<N> {
    pub const fn new() -> Self {
        ExiString { len: 0, bytes: [0; N] }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_str(&self) -> &str {
        // Only whole chars are ever stored.
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn push(&mut self, c: char) -> Result<(), CodecError> {
        let width = c.len_utf8();
        if self.len + width > N {
            return Err(CodecError::BoundsViolation(format!(
                "string exceeds capacity of {} bytes",
                N
            )));
        }
        c.encode_utf8(&mut self.bytes[self.len..self.len + width]);
        self.len += width;
        Ok(())
    }

    pub fn set(&mut self, s: &str) -> Result<(), CodecError> {
        if s.len() > N {
            return Err(CodecError::BoundsViolation(format!(
                "string of {} bytes exceeds capacity of {}",
                s.len(),
                N
            )));
        }
        self.bytes[..s.len()].copy_from_slice(s.as_bytes());
        self.len = s.len();
        Ok(())
    }
}

impl<const N: usize> Default for ExiString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PartialEq for ExiString<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<const N: usize> Eq for ExiString<N> {}

impl<const N: usize> PartialEq<str> for ExiString<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl<const N: usize> PartialEq<&str> for ExiString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl<const N: usize> fmt::Debug for ExiString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for ExiString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> TryFrom<&str> for ExiString<N> {
    type Error = CodecError;

    fn try_from(s: &str) -> Result<Self, CodecError> {
        let mut out = Self::new();
        out.set(s)?;
        Ok(out)
    }
}

/// Byte array with an inline capacity of `N`.
#[derive(Clone, Copy)]
pub struct ExiBytes<const N: usize> {
    len: usize,
    bytes: [u8; N],
}

impl<const N: usize> ExiBytes<N> {
    pub const fn new() -> Self {
        ExiBytes { len: 0, bytes: [0; N] }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn push(&mut self, b: u8) -> Result<(), CodecError> {
        if self.len == N {
            return Err(CodecError::BoundsViolation(format!(
                "byte array exceeds capacity of {}",
                N
            )));
        }
        self.bytes[self.len] = b;
        self.len += 1;
        Ok(())
    }

    pub fn set(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if data.len() > N {
            return Err(CodecError::BoundsViolation(format!(
                "{} bytes exceed capacity of {}",
                data.len(),
                N
            )));
        }
        self.bytes[..data.len()].copy_from_slice(data);
        self.len = data.len();
        Ok(())
    }
}

impl<const N: usize> Default for ExiBytes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PartialEq for ExiBytes<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> Eq for ExiBytes<N> {}

impl<const N: usize> fmt::Debug for ExiBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_slice()))
    }
}

impl<const N: usize> TryFrom<&[u8]> for ExiBytes<N> {
    type Error = CodecError;

    fn try_from(data: &[u8]) -> Result<Self, CodecError> {
        let mut out = Self::new();
        out.set(data)?;
        Ok(out)
    }
}

/// Repeated element with inline storage for `N` items.
#[derive(Clone)]
pub struct ExiArray<T, const N: usize> {
    len: usize,
    items: [T; N],
}

impl<T: Default, const N: usize> ExiArray<T, N> {
    pub fn new() -> Self {
        ExiArray {
            len: 0,
            items: std::array::from_fn(|_| T::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn push(&mut self, item: T) -> Result<(), CodecError> {
        if self.len == N {
            return Err(CodecError::BoundsViolation(format!(
                "array exceeds capacity of {}",
                N
            )));
        }
        self.items[self.len] = item;
        self.len += 1;
        Ok(())
    }

    /// Item `index`, appending a default item when `index == len`.
    pub fn slot(&mut self, index: usize) -> Result<&mut T, CodecError> {
        if index > self.len {
            return Err(CodecError::InvalidValue(format!(
                "array slot {} skips past length {}",
                index, self.len
            )));
        }
        if index == self.len {
            self.push(T::default())?;
        }
        Ok(&mut self.items[index])
    }
}

impl<T: Default, const N: usize> Default for ExiArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + PartialEq, const N: usize> PartialEq for ExiArray<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Default + fmt::Debug, const N: usize> fmt::Debug for ExiArray<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: Default, const N: usize> ExiArray<T, N> {
    /// Collect `iter`, failing like [`ExiArray::push`] once the capacity is reached.
    pub fn try_from_iter<I: IntoIterator<Item = T>>(iter: I) -> Result<Self, CodecError> {
        let mut out = Self::new();
        for item in iter {
            out.push(item)?;
        }
        Ok(out)
    }
}

impl<T: Default + Clone, const N: usize> TryFrom<&[T]> for ExiArray<T, N> {
    type Error = CodecError;

    fn try_from(items: &[T]) -> Result<Self, CodecError> {
        Self::try_from_iter(items.iter().cloned())
    }
}

/// Schema enumeration mapped to a Rust enum by index.
pub trait Enumerated: Sized + Copy {
    /// Names in schema order.
    const NAMES: &'static [&'static str];

    fn index(self) -> usize;
    fn from_index(index: usize) -> Option<Self>;

    fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }
}

/// Write access to an enumerated field without knowing its Rust type.
pub trait EnumSlot {
    fn set_index(&mut self, index: usize) -> bool;
}

impl<E: Enumerated> EnumSlot for E {
    fn set_index(&mut self, index: usize) -> bool {
        match E::from_index(index) {
            Some(v) => {
                *self = v;
                true
            }
            None => false,
        }
    }
}

/// Sink for decoded characters.
pub trait TextSink {
    fn clear_text(&mut self);
    fn push_char(&mut self, c: char) -> Result<(), CodecError>;
}

impl<const N: usize> TextSink for ExiString<N> {
    fn clear_text(&mut self) {
        self.clear();
    }

    fn push_char(&mut self, c: char) -> Result<(), CodecError> {
        self.push(c)
    }
}

/// Sink for decoded binary content.
pub trait ByteSink {
    fn clear_bytes(&mut self);
    fn push_byte(&mut self, b: u8) -> Result<(), CodecError>;
}

impl<const N: usize> ByteSink for ExiBytes<N> {
    fn clear_bytes(&mut self) {
        self.clear();
    }

    fn push_byte(&mut self, b: u8) -> Result<(), CodecError> {
        self.push(b)
    }
}

/// Read view of one occurrence of a step.
pub enum FieldRef<'a> {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Enum(usize),
    Chars(&'a str),
    Bytes(&'a [u8]),
    Element(&'a dyn ExiElement),
    /// The step has no storage in the Rust type.
    Absent,
}

/// Write view of one occurrence of a step, handed out to the decoder.
pub enum FieldMut<'a> {
    Bool(&'a mut bool),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Enum(&'a mut dyn EnumSlot),
    Chars(&'a mut dyn TextSink),
    Bytes(&'a mut dyn ByteSink),
    Element(&'a mut dyn ExiElement),
}

impl FieldMut<'_> {
    /// Store a decoded integer, rejecting values the field cannot hold.
    pub fn store_integer(self, value: i128) -> Result<(), CodecError> {
        fn fit<T: TryFrom<i128>>(value: i128, slot: &mut T) -> Result<(), CodecError> {
            *slot = T::try_from(value).map_err(|_| {
                CodecError::BoundsViolation(format!(
                    "integer {} does not fit {}",
                    value,
                    std::any::type_name::<T>()
                ))
            })?;
            Ok(())
        }
        match self {
            FieldMut::U8(s) => fit(value, s),
            FieldMut::U16(s) => fit(value, s),
            FieldMut::U32(s) => fit(value, s),
            FieldMut::U64(s) => fit(value, s),
            FieldMut::I8(s) => fit(value, s),
            FieldMut::I16(s) => fit(value, s),
            FieldMut::I32(s) => fit(value, s),
            FieldMut::I64(s) => fit(value, s),
            _ => Err(CodecError::InvalidValue(
                "integer content for a non-integer field".to_string(),
            )),
        }
    }
}

/// Declare a Rust enum for a schema enumeration, in schema order.
#[macro_export]
macro_rules! exi_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $xml:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::value::Enumerated for $name {
            const NAMES: &'static [&'static str] = &[$($xml),+];

            fn index(self) -> usize {
                self as usize
            }

            fn from_index(index: usize) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL.get(index).copied()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                const ALL: &[$name] = &[$($name::$variant),+];
                ALL[0]
            }
        }
    };
}
