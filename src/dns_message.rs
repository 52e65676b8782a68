use bytes::{BufMut, Bytes, BytesMut};

use crate::dns_header::{DnsFlags, DnsHeader, MessageKind, HEADER_LEN};
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};
use crate::error::{DnsError, Result};

/// Length of the big-endian length prefix in front of every framed message
pub const FRAME_PREFIX_LEN: usize = 2;

/// Root owner name, type, class, TTL and an empty RDLENGTH
const MIN_RECORD_LEN: usize = 11;

/// A DNS message with a single question and its answer records.
/// Authority and additional sections are neither parsed nor produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    pub flags: DnsFlags,
    pub question: DnsQuestion,
    pub answers: Vec<DnsAnswer>,
}

impl DnsMessage {
    /// Create an empty message; the question defaults to the root with type 0
    pub fn new(id: u16, kind: MessageKind) -> Self {
        DnsMessage {
            id,
            flags: DnsFlags::for_kind(kind),
            question: DnsQuestion::new(".", 0),
            answers: Vec::new(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.flags.kind()
    }

    pub fn set_question(&mut self, question: DnsQuestion) {
        self.question = question;
    }

    pub fn add_answer(&mut self, answer: DnsAnswer) {
        self.answers.push(answer);
    }

    /// Decode a raw (unframed) DNS message
    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        let header = DnsHeader::from_bytes(buf)?;

        if header.question_count == 0 {
            return Err(DnsError::parse("message carries no question"));
        }

        let (question, mut offset) = DnsQuestion::from_bytes(buf, HEADER_LEN)?;

        // Any further questions are skipped; only the first one is answered
        for _ in 1..header.question_count {
            let (_, next) = DnsQuestion::from_bytes(buf, offset)?;
            offset = next;
        }

        // ANCOUNT is untrusted; never reserve more records than the buffer could hold
        let room = buf.len().saturating_sub(offset) / MIN_RECORD_LEN;
        let mut answers = Vec::with_capacity(usize::from(header.answer_count).min(room));
        for _ in 0..header.answer_count {
            let (answer, next) = DnsAnswer::from_bytes(buf, offset)?;
            answers.push(answer);
            offset = next;
        }

        Ok(DnsMessage {
            id: header.id,
            flags: DnsFlags::from_u16(header.flags),
            question,
            answers,
        })
    }

    /// Encode to raw (unframed) wire bytes, names uncompressed
    pub fn marshal(&self) -> Result<BytesMut> {
        let answer_count = u16::try_from(self.answers.len())
            .map_err(|_| DnsError::parse(format!("{} answers", self.answers.len())))?;

        let header = DnsHeader {
            id: self.id,
            flags: self.flags.to_u16(),
            question_count: 1,
            answer_count,
            authority_count: 0,
            additional_count: 0,
        };

        let mut buf = BytesMut::with_capacity(512);
        header.write_to(&mut buf);
        self.question.write_to(&mut buf)?;
        for answer in &self.answers {
            answer.write_to(&mut buf)?;
        }

        Ok(buf)
    }

    /// Encode with the 2-byte length prefix used internally
    pub fn marshal_framed(&self) -> Result<Bytes> {
        frame(&self.marshal()?)
    }
}

/// Prefix a raw message with its big-endian length
pub fn frame(msg: &[u8]) -> Result<Bytes> {
    let len = u16::try_from(msg.len())
        .map_err(|_| DnsError::parse(format!("message of {} bytes cannot be framed", msg.len())))?;

    let mut buf = BytesMut::with_capacity(FRAME_PREFIX_LEN + msg.len());
    buf.put_u16(len);
    buf.put_slice(msg);
    Ok(buf.freeze())
}

/// The raw message inside a framed buffer
pub fn unframe(framed: &[u8]) -> Result<&[u8]> {
    framed
        .get(FRAME_PREFIX_LEN..)
        .ok_or_else(|| DnsError::parse("missing length prefix"))
}

/// Overwrite the transaction ID of a framed message in place
pub fn set_message_id(framed: &mut [u8], id: u16) {
    if let Some(slot) = framed.get_mut(FRAME_PREFIX_LEN..FRAME_PREFIX_LEN + 2) {
        slot.copy_from_slice(&id.to_be_bytes());
    }
}
