//! Binary encoding of frames and patch opcodes.
//!
//! Layout rules: varuint (LEB128) for every unsigned integer, zigzag varuint
//! for signed, 8-byte little-endian IEEE-754 for floats, length-prefixed
//! UTF-8 for strings, and a preorder walk for inserted subtrees. Node ids
//! for inserted nodes are *not* on the wire - both ends assign them by
//! counting in the same order.

use vango_core::{HandlerId, NodeFlags, NodeId, Patch, PropValue, Props, VNode};

/// A decoded transport frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Server -> client: one batch of patches under a sequence number.
    Patches { seq: u64, patches: Vec<Patch> },
    /// Client -> server handshake.
    Hello { resumable: bool, last_seq: u64 },
    /// Server -> client: abandon local state and reload.
    FullResync,
    Heartbeat,
}

const FRAME_PATCHES: u8 = 0x00;
const FRAME_HELLO: u8 = 0x01;
const FRAME_FULL_RESYNC: u8 = 0x02;
const FRAME_HEARTBEAT: u8 = 0x03;

/// Patch opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opcode {
    ReplaceText = 0x01,
    SetAttribute = 0x02,
    RemoveNode = 0x03,
    InsertNode = 0x04,
    UpdateEvents = 0x05,
    RemoveAttribute = 0x06,
    MoveNode = 0x07,
}

impl Opcode {
    fn from_u8(byte: u8) -> Option<Opcode> {
        match byte {
            0x01 => Some(Opcode::ReplaceText),
            0x02 => Some(Opcode::SetAttribute),
            0x03 => Some(Opcode::RemoveNode),
            0x04 => Some(Opcode::InsertNode),
            0x05 => Some(Opcode::UpdateEvents),
            0x06 => Some(Opcode::RemoveAttribute),
            0x07 => Some(Opcode::MoveNode),
            _ => None,
        }
    }
}

const KIND_ELEMENT: u8 = 0x00;
const KIND_TEXT: u8 = 0x01;
const KIND_FRAGMENT: u8 = 0x02;
const KIND_PORTAL: u8 = 0x03;

const PROP_TEXT: u8 = 0x00;
const PROP_BOOL: u8 = 0x01;
const PROP_INT: u8 = 0x02;
const PROP_NUMBER: u8 = 0x03;
const PROP_HANDLER: u8 = 0x04;

/// A frame that cannot be decoded. Structural for the protocol: the decoder
/// reports it upstream, which answers with a full resync.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of frame")]
    ShortRead,
    #[error("empty frame")]
    EmptyFrame,
    #[error("unknown frame type {0:#04x}")]
    BadFrameType(u8),
    #[error("unknown opcode {0:#04x}")]
    BadOpcode(u8),
    #[error("unknown node kind {0:#04x}")]
    BadNodeKind(u8),
    #[error("unknown prop tag {0:#04x}")]
    BadPropTag(u8),
    #[error("varuint longer than 64 bits")]
    VarintOverflow,
    #[error("string field is not valid utf-8")]
    BadUtf8,
    #[error("peer sent a frame only the other side may send: {0}")]
    UnexpectedFrame(&'static str),
}

pub(crate) fn write_varuint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varuint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.buf.get(self.pos).ok_or(CodecError::ShortRead)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::ShortRead)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::ShortRead)?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_varuint(&mut self) -> Result<u64, CodecError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(CodecError::VarintOverflow);
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_varuint()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::BadUtf8)
    }

    fn read_f64(&mut self) -> Result<f64, CodecError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }
}

fn write_prop_value(buf: &mut Vec<u8>, value: &PropValue) {
    match value {
        PropValue::Text(text) => {
            buf.push(PROP_TEXT);
            write_string(buf, text);
        }
        PropValue::Bool(b) => {
            buf.push(PROP_BOOL);
            buf.push(u8::from(*b));
        }
        PropValue::Int(i) => {
            buf.push(PROP_INT);
            write_varuint(buf, zigzag(*i));
        }
        PropValue::Number(n) => {
            buf.push(PROP_NUMBER);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        PropValue::Handler(token) => {
            buf.push(PROP_HANDLER);
            write_varuint(buf, u64::from(token.0));
        }
    }
}

fn read_prop_value(reader: &mut Reader<'_>) -> Result<PropValue, CodecError> {
    match reader.read_u8()? {
        PROP_TEXT => Ok(PropValue::Text(reader.read_string()?)),
        PROP_BOOL => Ok(PropValue::Bool(reader.read_u8()? != 0)),
        PROP_INT => Ok(PropValue::Int(unzigzag(reader.read_varuint()?))),
        PROP_NUMBER => Ok(PropValue::Number(reader.read_f64()?)),
        PROP_HANDLER => Ok(PropValue::Handler(HandlerId(
            reader.read_varuint()? as u32
        ))),
        other => Err(CodecError::BadPropTag(other)),
    }
}

fn write_subtree(buf: &mut Vec<u8>, node: &VNode) {
    match node {
        VNode::Element(el) => {
            buf.push(KIND_ELEMENT);
            write_string(buf, &el.tag);
            write_string(buf, &el.key);
            buf.push(el.flags.bits());
            write_varuint(buf, el.props.len() as u64);
            for (name, value) in el.props.iter() {
                write_string(buf, name);
                write_prop_value(buf, value);
            }
            write_varuint(buf, el.children.len() as u64);
            for child in &el.children {
                write_subtree(buf, child);
            }
        }
        VNode::Text(text) => {
            buf.push(KIND_TEXT);
            write_string(buf, &text.text);
        }
        VNode::Fragment(frag) => {
            buf.push(KIND_FRAGMENT);
            write_string(buf, &frag.key);
            write_varuint(buf, frag.children.len() as u64);
            for child in &frag.children {
                write_subtree(buf, child);
            }
        }
        VNode::Portal(portal) => {
            buf.push(KIND_PORTAL);
            write_string(buf, &portal.key);
            write_string(buf, &portal.target);
            write_varuint(buf, portal.children.len() as u64);
            for child in &portal.children {
                write_subtree(buf, child);
            }
        }
    }
}

fn read_subtree(reader: &mut Reader<'_>) -> Result<VNode, CodecError> {
    match reader.read_u8()? {
        KIND_ELEMENT => {
            let tag = reader.read_string()?;
            let key = reader.read_string()?;
            let flags = reader.read_u8()?;
            let prop_count = reader.read_varuint()? as usize;
            let mut props = Props::new();
            for _ in 0..prop_count {
                let name = reader.read_string()?;
                let value = read_prop_value(reader)?;
                props.insert(name, value);
            }
            let child_count = reader.read_varuint()? as usize;
            let mut children = Vec::with_capacity(child_count.min(64));
            for _ in 0..child_count {
                children.push(read_subtree(reader)?);
            }
            let mut node = VNode::element(tag, props, children);
            if !key.is_empty() {
                node = node.with_key(key);
            }
            if flags & NodeFlags::STATIC.bits() != 0 {
                node = node.mark_static();
            }
            Ok(node)
        }
        KIND_TEXT => Ok(VNode::text(reader.read_string()?)),
        KIND_FRAGMENT => {
            let key = reader.read_string()?;
            let child_count = reader.read_varuint()? as usize;
            let mut children = Vec::with_capacity(child_count.min(64));
            for _ in 0..child_count {
                children.push(read_subtree(reader)?);
            }
            let mut node = VNode::fragment(children);
            if !key.is_empty() {
                node = node.with_key(key);
            }
            Ok(node)
        }
        KIND_PORTAL => {
            let key = reader.read_string()?;
            let target = reader.read_string()?;
            let child_count = reader.read_varuint()? as usize;
            let mut children = Vec::with_capacity(child_count.min(64));
            for _ in 0..child_count {
                children.push(read_subtree(reader)?);
            }
            let mut node = VNode::portal(target, children);
            if !key.is_empty() {
                node = node.with_key(key);
            }
            Ok(node)
        }
        other => Err(CodecError::BadNodeKind(other)),
    }
}

fn write_patch(buf: &mut Vec<u8>, patch: &Patch) {
    match patch {
        Patch::ReplaceText { node, text } => {
            buf.push(Opcode::ReplaceText as u8);
            write_varuint(buf, u64::from(node.0));
            write_string(buf, text);
        }
        Patch::SetAttribute { node, key, value } => {
            buf.push(Opcode::SetAttribute as u8);
            write_varuint(buf, u64::from(node.0));
            write_string(buf, key);
            write_prop_value(buf, value);
        }
        Patch::RemoveNode { node } => {
            buf.push(Opcode::RemoveNode as u8);
            write_varuint(buf, u64::from(node.0));
        }
        Patch::InsertNode {
            parent,
            before,
            subtree,
        } => {
            buf.push(Opcode::InsertNode as u8);
            write_varuint(buf, u64::from(parent.0));
            write_varuint(buf, u64::from(before.0));
            write_subtree(buf, subtree);
        }
        Patch::UpdateEvents { node, mask } => {
            buf.push(Opcode::UpdateEvents as u8);
            write_varuint(buf, u64::from(node.0));
            write_varuint(buf, u64::from(*mask));
        }
        Patch::RemoveAttribute { node, key } => {
            buf.push(Opcode::RemoveAttribute as u8);
            write_varuint(buf, u64::from(node.0));
            write_string(buf, key);
        }
        Patch::MoveNode {
            node,
            parent,
            before,
        } => {
            buf.push(Opcode::MoveNode as u8);
            write_varuint(buf, u64::from(node.0));
            write_varuint(buf, u64::from(parent.0));
            write_varuint(buf, u64::from(before.0));
        }
    }
}

fn read_patch(reader: &mut Reader<'_>) -> Result<Patch, CodecError> {
    let opcode = reader.read_u8()?;
    let opcode = Opcode::from_u8(opcode).ok_or(CodecError::BadOpcode(opcode))?;
    let patch = match opcode {
        Opcode::ReplaceText => Patch::ReplaceText {
            node: NodeId(reader.read_varuint()? as u32),
            text: reader.read_string()?,
        },
        Opcode::SetAttribute => Patch::SetAttribute {
            node: NodeId(reader.read_varuint()? as u32),
            key: reader.read_string()?,
            value: read_prop_value(reader)?,
        },
        Opcode::RemoveNode => Patch::RemoveNode {
            node: NodeId(reader.read_varuint()? as u32),
        },
        Opcode::InsertNode => Patch::InsertNode {
            parent: NodeId(reader.read_varuint()? as u32),
            before: NodeId(reader.read_varuint()? as u32),
            subtree: read_subtree(reader)?,
        },
        Opcode::UpdateEvents => Patch::UpdateEvents {
            node: NodeId(reader.read_varuint()? as u32),
            mask: reader.read_varuint()? as u32,
        },
        Opcode::RemoveAttribute => Patch::RemoveAttribute {
            node: NodeId(reader.read_varuint()? as u32),
            key: reader.read_string()?,
        },
        Opcode::MoveNode => Patch::MoveNode {
            node: NodeId(reader.read_varuint()? as u32),
            parent: NodeId(reader.read_varuint()? as u32),
            before: NodeId(reader.read_varuint()? as u32),
        },
    };
    Ok(patch)
}

/// Encode one frame; the transport length-delimits it.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::new();
    match frame {
        Frame::Patches { seq, patches } => {
            buf.push(FRAME_PATCHES);
            write_varuint(&mut buf, *seq);
            for patch in patches {
                write_patch(&mut buf, patch);
            }
        }
        Frame::Hello {
            resumable,
            last_seq,
        } => {
            buf.push(FRAME_HELLO);
            buf.push(u8::from(*resumable));
            write_varuint(&mut buf, *last_seq);
        }
        Frame::FullResync => buf.push(FRAME_FULL_RESYNC),
        Frame::Heartbeat => buf.push(FRAME_HEARTBEAT),
    }
    buf
}

/// Decode one length-delimited frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let mut reader = Reader::new(bytes);
    let frame_type = match reader.read_u8() {
        Ok(byte) => byte,
        Err(_) => return Err(CodecError::EmptyFrame),
    };
    match frame_type {
        FRAME_PATCHES => {
            let seq = reader.read_varuint()?;
            let mut patches = Vec::new();
            while !reader.is_empty() {
                patches.push(read_patch(&mut reader)?);
            }
            Ok(Frame::Patches { seq, patches })
        }
        FRAME_HELLO => {
            let resumable = reader.read_u8()? != 0;
            let last_seq = reader.read_varuint()?;
            Ok(Frame::Hello {
                resumable,
                last_seq,
            })
        }
        FRAME_FULL_RESYNC => Ok(Frame::FullResync),
        FRAME_HEARTBEAT => Ok(Frame::Heartbeat),
        other => Err(CodecError::BadFrameType(other)),
    }
}
