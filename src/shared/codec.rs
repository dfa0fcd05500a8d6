//! Payload codecs.
//!
//! The wire carries no type tag: the receiver knows which kind of payload
//! it expects at every step of the protocol and picks the decoder through
//! [`PayloadKind`].
//!
//! | kind | layout |
//! |---|---|
//! | text | UTF-8 bytes, NUL |
//! | int | `i32` |
//! | function | `[i32 zeros][i32 ones][i32 lines][i32 vars][lines*vars literal bytes][lines output bytes]` |
//! | children | `[i32 count][i32 element size][i32 capacity]`, then per child `[u64 len][u32 name len][name][i32 position]` |
//! | module | `[u64 name len][name, NUL][u64 len][function][u64 len][children]` |

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::function::{FunctionTable, Literal, Row};
use crate::module::{ChildLink, Module};

/// Which decoder to apply to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// NUL-terminated UTF-8 text.
    Text,
    /// A single `i32`.
    Int,
    /// A function table.
    Function,
    /// A module with its function and child links.
    Module,
    /// A child-link container.
    Children,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Function => "function",
            Self::Module => "module",
            Self::Children => "children",
        };
        f.write_str(name)
    }
}

/// A decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Instruction text or a directive.
    Text(String),
    /// A count or status value.
    Int(i32),
    /// A bare function table.
    Function(FunctionTable),
    /// A module.
    Module(Module),
    /// Child links of a module.
    Children(Vec<ChildLink>),
}

impl Payload {
    /// Kind of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Text(_) => PayloadKind::Text,
            Self::Int(_) => PayloadKind::Int,
            Self::Function(_) => PayloadKind::Function,
            Self::Module(_) => PayloadKind::Module,
            Self::Children(_) => PayloadKind::Children,
        }
    }

    /// Encodes the payload.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Self::Text(text) => text.encode(&mut buf),
            Self::Int(value) => value.encode(&mut buf),
            Self::Function(table) => table.encode(&mut buf),
            Self::Module(module) => module.encode(&mut buf),
            Self::Children(links) => links.encode(&mut buf),
        }
        buf.freeze()
    }

    /// Decodes `bytes` as a payload of `kind`. The whole buffer must be
    /// consumed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::shared::{Payload, PayloadKind};
    ///
    /// let bytes = Payload::Int(42).encode();
    /// assert_eq!(bytes.as_ref(), &[42, 0, 0, 0]);
    /// assert_eq!(Payload::decode(PayloadKind::Int, bytes).unwrap(), Payload::Int(42));
    /// ```
    pub fn decode(kind: PayloadKind, bytes: Bytes) -> Result<Self, ProtocolError> {
        match kind {
            PayloadKind::Text => decode_all::<String>(bytes).map(Self::Text),
            PayloadKind::Int => decode_all::<i32>(bytes).map(Self::Int),
            PayloadKind::Function => decode_all::<FunctionTable>(bytes).map(Self::Function),
            PayloadKind::Module => decode_all::<Module>(bytes).map(Self::Module),
            PayloadKind::Children => decode_all::<Vec<ChildLink>>(bytes).map(Self::Children),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<Module> for Payload {
    fn from(module: Module) -> Self {
        Self::Module(module)
    }
}

/// A type with a wire encoding.
pub trait Wire: Sized {
    /// Human-readable name used in errors.
    const WHAT: &'static str;

    /// Appends the encoding to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Reads one value from the front of `buf`.
    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError>;

    /// Encodes into a fresh buffer.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

/// Decodes one `T` and rejects leftover bytes.
pub fn decode_all<T: Wire>(mut bytes: Bytes) -> Result<T, ProtocolError> {
    let value = T::decode(&mut bytes)?;
    if bytes.has_remaining() {
        return Err(ProtocolError::TrailingBytes {
            what: T::WHAT,
            count: bytes.remaining(),
        });
    }
    Ok(value)
}

fn need(buf: &Bytes, what: &'static str, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            what,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn get_i32(buf: &mut Bytes, what: &'static str) -> Result<i32, ProtocolError> {
    need(buf, what, 4)?;
    Ok(buf.get_i32_le())
}

/// Reads a non-negative `i32` count.
fn get_count(buf: &mut Bytes, what: &'static str) -> Result<usize, ProtocolError> {
    let value = get_i32(buf, what)?;
    usize::try_from(value).map_err(|_| ProtocolError::InvalidLength {
        what,
        value: i64::from(value),
    })
}

/// Reads a `u64` length prefix and splits off that many bytes.
fn get_section(buf: &mut Bytes, what: &'static str) -> Result<Bytes, ProtocolError> {
    need(buf, what, 8)?;
    let len = buf.get_u64_le();
    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= buf.remaining())
        .ok_or(ProtocolError::Truncated {
            what,
            needed: usize::try_from(len).unwrap_or(usize::MAX),
            remaining: buf.remaining(),
        })?;
    Ok(buf.split_to(len))
}

fn put_count(buf: &mut BytesMut, count: usize) {
    buf.put_i32_le(i32::try_from(count).unwrap_or(i32::MAX));
}

impl Wire for String {
    const WHAT: &'static str = "text";

    fn encode(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(self.as_bytes());
        buf.put_u8(0);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let end = buf
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ProtocolError::InvalidString("missing NUL terminator".into()))?;
        let text = buf.split_to(end);
        buf.advance(1);
        String::from_utf8(text.to_vec()).map_err(|e| ProtocolError::InvalidString(e.to_string()))
    }
}

impl Wire for i32 {
    const WHAT: &'static str = "int";

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(*self);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        get_i32(buf, Self::WHAT)
    }
}

impl Wire for FunctionTable {
    const WHAT: &'static str = "function";

    fn encode(&self, buf: &mut BytesMut) {
        put_count(buf, self.zeros());
        put_count(buf, self.ones());
        put_count(buf, self.len());
        put_count(buf, self.var_count());
        for row in self.rows() {
            buf.extend(row.inputs.iter().map(|literal| literal.as_byte()));
        }
        buf.extend(self.rows().iter().map(|row| if row.output { b'1' } else { b'0' }));
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let zeros = get_i32(buf, "function zero count")?;
        let ones = get_i32(buf, "function one count")?;
        let lines = get_count(buf, "function line count")?;
        let vars = get_count(buf, "function variable count")?;

        let literal_bytes = lines
            .checked_mul(vars)
            .and_then(|n| n.checked_add(lines))
            .ok_or(ProtocolError::InvalidLength {
                what: "function size",
                value: i64::MAX,
            })?;
        need(buf, "function rows", literal_bytes)?;
        let literals = buf.split_to(lines * vars);
        let outputs = buf.split_to(lines);

        let mut table = FunctionTable::with_capacity(vars, lines);
        for (index, &output) in outputs.iter().enumerate() {
            let inputs = literals[index * vars..(index + 1) * vars]
                .iter()
                .map(|&byte| decode_literal(byte))
                .collect::<Result<Vec<_>, _>>()?;
            let output = match output {
                b'0' => false,
                b'1' => true,
                byte => {
                    return Err(ProtocolError::InvalidByte {
                        what: "output",
                        byte,
                    })
                }
            };
            table
                .push(Row::new(inputs, output))
                .map_err(|_| ProtocolError::InvalidLength {
                    what: "function row width",
                    value: vars as i64,
                })?;
        }

        if usize::try_from(zeros) != Ok(table.zeros()) || usize::try_from(ones) != Ok(table.ones())
        {
            return Err(ProtocolError::CountMismatch {
                zeros,
                ones,
                tally_zeros: table.zeros(),
                tally_ones: table.ones(),
            });
        }
        Ok(table)
    }
}

fn decode_literal(byte: u8) -> Result<Literal, ProtocolError> {
    match byte {
        b'0' => Ok(Literal::Zero),
        b'1' => Ok(Literal::One),
        b'-' => Ok(Literal::DontCare),
        byte => Err(ProtocolError::InvalidByte {
            what: "literal",
            byte,
        }),
    }
}

impl Wire for ChildLink {
    const WHAT: &'static str = "child link";

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.name.len() as u32);
        buf.extend_from_slice(self.name.as_bytes());
        put_count(buf, self.position);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        need(buf, "child name length", 4)?;
        let name_len = buf.get_u32_le() as usize;
        need(buf, "child name", name_len)?;
        let name = String::from_utf8(buf.split_to(name_len).to_vec())
            .map_err(|e| ProtocolError::InvalidString(e.to_string()))?;
        let position = get_count(buf, "child position")?;
        Ok(Self { name, position })
    }
}

impl Wire for Vec<ChildLink> {
    const WHAT: &'static str = "children";

    fn encode(&self, buf: &mut BytesMut) {
        let elements: Vec<Bytes> = self.iter().map(Wire::to_bytes).collect();
        let element_size = elements.iter().map(Bytes::len).max().unwrap_or(0);
        put_count(buf, elements.len());
        put_count(buf, element_size);
        put_count(buf, self.capacity().max(elements.len()));
        for element in elements {
            buf.put_u64_le(element.len() as u64);
            buf.extend_from_slice(&element);
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let count = get_count(buf, "children count")?;
        let element_size = get_count(buf, "children element size")?;
        let capacity = get_count(buf, "children capacity")?;
        if capacity < count {
            return Err(ProtocolError::InvalidLength {
                what: "children capacity",
                value: capacity as i64,
            });
        }
        // Each element needs at least its u64 length prefix.
        need(buf, "children", count.saturating_mul(8))?;

        let mut links = Vec::with_capacity(count);
        for _ in 0..count {
            let element = get_section(buf, "child element")?;
            if element.len() > element_size {
                return Err(ProtocolError::InvalidLength {
                    what: "child element size",
                    value: element.len() as i64,
                });
            }
            links.push(decode_all::<ChildLink>(element)?);
        }
        Ok(links)
    }
}

impl Wire for Module {
    const WHAT: &'static str = "module";

    fn encode(&self, buf: &mut BytesMut) {
        let name = self.name().to_string().to_bytes();
        let function = self.function().to_bytes();
        let children = self.children().to_vec().to_bytes();
        for section in [name, function, children] {
            buf.put_u64_le(section.len() as u64);
            buf.extend_from_slice(&section);
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        let name = decode_all::<String>(get_section(buf, "module name")?)?;
        let function = decode_all::<FunctionTable>(get_section(buf, "module function")?)?;
        let children = decode_all::<Vec<ChildLink>>(get_section(buf, "module children")?)?;
        Ok(Module::from_parts(name, function, children))
    }
}
