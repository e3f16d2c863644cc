use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Operation tag of a skull propagation frame.
pub const GIVE_SKULL: &str = "GiveSkull";

/// Largest encodable field: the length prefix is an unsigned 16-bit integer.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Wire frame: three length-prefixed UTF-8 strings (tag, player, value).
///
/// Each field is a big-endian `u16` byte length followed by the UTF-8
/// bytes. There is no version byte or checksum; peers match on the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: String,
    pub player: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    FieldTooLong { field: &'static str, len: usize },
    Truncated { field: &'static str },
    InvalidUtf8 { field: &'static str },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::FieldTooLong { field, len } => write!(
                f,
                "frame field '{}' is {} bytes, limit is {}",
                field, len, MAX_FIELD_LEN
            ),
            FrameError::Truncated { field } => write!(f, "frame truncated in field '{}'", field),
            FrameError::InvalidUtf8 { field } => write!(f, "frame field '{}' is not valid UTF-8", field),
        }
    }
}

impl std::error::Error for FrameError {}

impl Frame {
    pub fn new(tag: impl Into<String>, player: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            player: player.into(),
            value: value.into(),
        }
    }

    pub fn give_skull(player: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(GIVE_SKULL, player, value)
    }

    /// Encode the whole frame. Either every field is written or an error is
    /// returned; a partial frame is never produced.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let fields = [("tag", &self.tag), ("player", &self.player), ("value", &self.value)];

        for (field, text) in fields {
            if text.len() > MAX_FIELD_LEN {
                return Err(FrameError::FieldTooLong { field, len: text.len() });
            }
        }

        let size: usize = fields.iter().map(|(_, text)| 2 + text.len()).sum();
        let mut buf = BytesMut::with_capacity(size);
        for (_, text) in fields {
            buf.put_u16(text.len() as u16);
            buf.put_slice(text.as_bytes());
        }

        Ok(buf.freeze())
    }

    /// Decode a frame. Bytes after the third field are ignored so that
    /// later protocol revisions can append fields.
    pub fn decode(mut buf: &[u8]) -> Result<Self, FrameError> {
        let tag = read_field(&mut buf, "tag")?;
        let player = read_field(&mut buf, "player")?;
        let value = read_field(&mut buf, "value")?;

        Ok(Self { tag, player, value })
    }
}

fn read_field(buf: &mut &[u8], field: &'static str) -> Result<String, FrameError> {
    if buf.remaining() < 2 {
        return Err(FrameError::Truncated { field });
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(FrameError::Truncated { field });
    }

    let text = std::str::from_utf8(&buf[..len])
        .map_err(|_| FrameError::InvalidUtf8 { field })?
        .to_string();
    buf.advance(len);
    Ok(text)
}

/// Decoded meaning of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    GiveSkull { player: String, value: String },
    /// Tag not known to this build; receivers ignore it.
    Unknown { tag: String },
}

impl From<Frame> for Instruction {
    fn from(frame: Frame) -> Self {
        match frame.tag.as_str() {
            GIVE_SKULL => Instruction::GiveSkull {
                player: frame.player,
                value: frame.value,
            },
            _ => Instruction::Unknown { tag: frame.tag },
        }
    }
}
