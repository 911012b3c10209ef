//! DNS message parsing and construction.
//!
//! A [`Message`] keeps the bytes it was decoded from. Upstream responses are
//! relayed (and cached) exactly as received; only the header is patched when
//! the transaction ID or response code changes.

use std::borrow::Cow;
use std::net::Ipv4Addr;

use crate::error::ParseError;

pub const HEADER_LEN: usize = 12;

/// Record type A (IPv4 host address).
pub const TYPE_A: u16 = 1;
/// Record type AAAA (IPv6 host address).
pub const TYPE_AAAA: u16 = 28;
/// Class IN.
pub const CLASS_IN: u16 = 1;

const FLAG_QR: u16 = 0x8000;
const MASK_OPCODE: u16 = 0x7800;
const FLAG_AA: u16 = 0x0400;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const MASK_RCODE: u16 = 0x000F;

const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 32;

/// Response code (low four bits of the header flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rcode(u8);

impl Rcode {
    pub const NO_ERROR: Rcode = Rcode(0);
    pub const SERV_FAIL: Rcode = Rcode(2);
    pub const NX_DOMAIN: Rcode = Rcode(3);
}

/// Lowercase a domain name and strip the trailing root dot.
///
/// Borrows when the name is already in canonical form.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    let trimmed = match name.strip_suffix('.') {
        // An odd run of backslashes means the dot is escaped label data
        Some(rest) if rest.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 0 => rest,
        _ => name,
    };
    if trimmed.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(trimmed.to_ascii_lowercase())
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// A DNS question section entry.
///
/// Names are held in presentation format (see [`Message::parse`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// A DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl Record {
    /// An IN-class A record.
    pub fn a(name: impl Into<String>, ttl: u32, addr: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            rtype: TYPE_A,
            class: CLASS_IN,
            ttl,
            rdata: addr.octets().to_vec(),
        }
    }

    /// The address carried by an A record.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.rtype != TYPE_A {
            return None;
        }
        let octets: [u8; 4] = self.rdata.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }
}

/// A DNS message (query or response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    wire: Vec<u8>,
    questions: Vec<Question>,
    answers: Vec<Record>,
}

impl Message {
    /// Parse a DNS message from raw bytes.
    ///
    /// The header, question section and answer section are decoded; the
    /// authority and additional sections are kept as opaque bytes. Names
    /// are rendered in RFC 1035 presentation format: a `.` or `\` inside a
    /// label is backslash-escaped and non-printable octets become `\DDD`.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::Truncated);
        }

        let qdcount = read_u16(data, 4)?;
        let ancount = read_u16(data, 6)?;
        let mut pos = HEADER_LEN;

        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            let (domain, next) = read_name(data, pos)?;
            let qtype = read_u16(data, next)?;
            let qclass = read_u16(data, next + 2)?;
            questions.push(Question {
                domain,
                qtype,
                qclass,
            });
            pos = next + 4;
        }

        let mut answers = Vec::with_capacity(ancount as usize);
        for _ in 0..ancount {
            let (name, next) = read_name(data, pos)?;
            let rtype = read_u16(data, next)?;
            let class = read_u16(data, next + 2)?;
            let ttl = read_u32(data, next + 4)?;
            let rdlength = read_u16(data, next + 8)? as usize;
            let start = next + 10;
            let rdata = data
                .get(start..start + rdlength)
                .ok_or(ParseError::Truncated)?
                .to_vec();
            answers.push(Record {
                name,
                rtype,
                class,
                ttl,
                rdata,
            });
            pos = start + rdlength;
        }

        Ok(Self {
            wire: data.to_vec(),
            questions,
            answers,
        })
    }

    /// Build a recursive query with a single IN-class question.
    pub fn query(id: u16, domain: &str, qtype: u16) -> Self {
        let question = Question {
            domain: domain.to_string(),
            qtype,
            qclass: CLASS_IN,
        };
        Self::from_parts(id, FLAG_RD, vec![question], Vec::new())
    }

    /// Build a response to `query` carrying `answers`.
    ///
    /// Copies the transaction ID, opcode, RD bit and question section.
    pub fn reply(query: &Message, rcode: Rcode, answers: Vec<Record>) -> Self {
        let flags = reply_flags(query.flags()) | rcode.0 as u16;
        Self::from_parts(query.id(), flags, query.questions.clone(), answers)
    }

    /// A SERVFAIL response to `query` with an empty answer section.
    pub fn server_failure(query: &Message) -> Self {
        Self::reply(query, Rcode::SERV_FAIL, Vec::new())
    }

    /// An authoritative response answering the first question with `addr`.
    pub fn authoritative_a(query: &Message, addr: Ipv4Addr, ttl: u32) -> Self {
        let answers = query
            .questions
            .first()
            .map(|q| vec![Record::a(q.domain.clone(), ttl, addr)])
            .unwrap_or_default();
        let flags = reply_flags(query.flags()) | FLAG_AA;
        Self::from_parts(query.id(), flags, query.questions.clone(), answers)
    }

    fn from_parts(id: u16, flags: u16, questions: Vec<Question>, answers: Vec<Record>) -> Self {
        let wire = encode(id, flags, &questions, &answers);
        Self {
            wire,
            questions,
            answers,
        }
    }

    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.wire[0], self.wire[1]])
    }

    /// Rewrite the transaction ID in place.
    pub fn set_id(&mut self, id: u16) {
        self.wire[..2].copy_from_slice(&id.to_be_bytes());
    }

    pub fn flags(&self) -> u16 {
        u16::from_be_bytes([self.wire[2], self.wire[3]])
    }

    fn set_flags(&mut self, flags: u16) {
        self.wire[2..4].copy_from_slice(&flags.to_be_bytes());
    }

    pub fn rcode(&self) -> Rcode {
        Rcode((self.flags() & MASK_RCODE) as u8)
    }

    pub fn set_rcode(&mut self, rcode: Rcode) {
        let flags = (self.flags() & !MASK_RCODE) | (rcode.0 as u16 & MASK_RCODE);
        self.set_flags(flags);
    }

    pub fn is_response(&self) -> bool {
        self.flags() & FLAG_QR != 0
    }

    pub fn is_authoritative(&self) -> bool {
        self.flags() & FLAG_AA != 0
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &[Record] {
        &self.answers
    }

    /// Minimum TTL across the answer section, `None` if it is empty.
    pub fn min_answer_ttl(&self) -> Option<u32> {
        self.answers.iter().map(|a| a.ttl).min()
    }

    /// Wire format bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }
}

fn reply_flags(query_flags: u16) -> u16 {
    FLAG_QR | (query_flags & (MASK_OPCODE | FLAG_RD)) | FLAG_RA
}

fn encode(id: u16, flags: u16, questions: &[Question], answers: &[Record]) -> Vec<u8> {
    let mut data = Vec::with_capacity(512);

    // Header
    data.extend_from_slice(&id.to_be_bytes());
    data.extend_from_slice(&flags.to_be_bytes());
    data.extend_from_slice(&(questions.len() as u16).to_be_bytes());
    data.extend_from_slice(&(answers.len() as u16).to_be_bytes());
    data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

    for q in questions {
        encode_domain(&mut data, &q.domain);
        data.extend_from_slice(&q.qtype.to_be_bytes());
        data.extend_from_slice(&q.qclass.to_be_bytes());
    }

    for a in answers {
        // Point back at the first question's name when possible
        if questions.first().is_some_and(|q| q.domain == a.name) {
            data.extend_from_slice(&[0xC0, 0x0C]);
        } else {
            encode_domain(&mut data, &a.name);
        }
        data.extend_from_slice(&a.rtype.to_be_bytes());
        data.extend_from_slice(&a.class.to_be_bytes());
        data.extend_from_slice(&a.ttl.to_be_bytes());
        data.extend_from_slice(&(a.rdata.len() as u16).to_be_bytes());
        data.extend_from_slice(&a.rdata);
    }

    data
}

/// Encode a name in presentation format, undoing the `\.`, `\\` and
/// `\DDD` escapes produced by [`read_name`].
fn encode_domain(buf: &mut Vec<u8>, domain: &str) {
    let bytes = domain.as_bytes();
    let mut label = Vec::with_capacity(63);
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'.' => {
                push_label(buf, &mut label);
                i += 1;
            }
            b'\\' => {
                let digits = bytes
                    .get(i + 1..i + 4)
                    .filter(|d| d.iter().all(u8::is_ascii_digit));
                match digits {
                    Some(d) => {
                        let value = d.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
                        label.push(value.min(255) as u8);
                        i += 4;
                    }
                    None => {
                        if let Some(&c) = bytes.get(i + 1) {
                            label.push(c);
                        }
                        i += 2;
                    }
                }
            }
            b => {
                label.push(b);
                i += 1;
            }
        }
    }
    push_label(buf, &mut label);
    buf.push(0);
}

fn push_label(buf: &mut Vec<u8>, label: &mut Vec<u8>) {
    if !label.is_empty() {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label);
        label.clear();
    }
}

/// Append one wire label in presentation format.
///
/// Labels are arbitrary octets, so `.` and `\` are backslash-escaped and
/// anything outside printable ASCII becomes `\DDD`. Distinct label
/// sequences therefore never produce the same string.
fn push_escaped_label(name: &mut String, label: &[u8]) {
    for &b in label {
        match b {
            b'.' | b'\\' => {
                name.push('\\');
                name.push(b as char);
            }
            0x21..=0x7E => name.push(b as char),
            _ => {
                name.push('\\');
                name.push_str(&format!("{b:03}"));
            }
        }
    }
}

/// Decode a possibly compressed name starting at `start`.
///
/// Returns the name in presentation format and the offset just past it in
/// the original stream (after the first pointer, if any was followed).
fn read_name(data: &[u8], start: usize) -> Result<(String, usize), ParseError> {
    let mut name = String::new();
    // Wire length including the root label
    let mut wire_len = 1;
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *data.get(pos).ok_or(ParseError::Truncated)? as usize;
        match len & 0xC0 {
            0x00 if len == 0 => {
                pos += 1;
                break;
            }
            0x00 => {
                let label = data
                    .get(pos + 1..pos + 1 + len)
                    .ok_or(ParseError::Truncated)?;
                wire_len += 1 + len;
                if wire_len > MAX_NAME_LEN {
                    return Err(ParseError::NameTooLong);
                }
                if !name.is_empty() {
                    name.push('.');
                }
                push_escaped_label(&mut name, label);
                pos += 1 + len;
            }
            0xC0 => {
                let low = *data.get(pos + 1).ok_or(ParseError::Truncated)? as usize;
                end.get_or_insert(pos + 2);
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(ParseError::PointerLoop);
                }
                pos = ((len & 0x3F) << 8) | low;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }

    Ok((name, end.unwrap_or(pos)))
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16, ParseError> {
    match data.get(pos..pos + 2) {
        Some(b) => Ok(u16::from_be_bytes([b[0], b[1]])),
        None => Err(ParseError::Truncated),
    }
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, ParseError> {
    match data.get(pos..pos + 4) {
        Some(b) => Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
        None => Err(ParseError::Truncated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_response(query: &Message) -> Vec<u8> {
        // Both answers point back at the question name.
        let mut packet = Vec::new();
        packet.extend_from_slice(&query.id().to_be_bytes());
        packet.extend_from_slice(&[0x81, 0x80]);
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        packet.extend_from_slice(b"\x07example\x03com\x00\x00\x01\x00\x01");
        packet.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        packet.extend_from_slice(&120u32.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x04, 93, 184, 216, 34]);
        packet.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        packet.extend_from_slice(&45u32.to_be_bytes());
        packet.extend_from_slice(&[0x00, 0x04, 93, 184, 216, 35]);
        packet
    }

    #[test]
    fn parse_query_roundtrips_question() {
        let query = Message::query(0x1234, "Example.COM", TYPE_A);
        let parsed = Message::parse(query.as_bytes()).unwrap();

        assert_eq!(parsed.id(), 0x1234);
        assert!(!parsed.is_response());
        assert_eq!(parsed.questions().len(), 1);
        assert_eq!(parsed.questions()[0].domain, "Example.COM");
        assert_eq!(parsed.questions()[0].qtype, TYPE_A);
        assert_eq!(parsed.questions()[0].qclass, CLASS_IN);
    }

    #[test]
    fn parse_follows_compression_pointers() {
        let query = Message::query(7, "example.com", TYPE_A);
        let parsed = Message::parse(&upstream_response(&query)).unwrap();

        assert_eq!(parsed.answers().len(), 2);
        assert_eq!(parsed.answers()[0].name, "example.com");
        assert_eq!(
            parsed.answers()[1].ipv4(),
            Some(Ipv4Addr::new(93, 184, 216, 35))
        );
        assert_eq!(parsed.min_answer_ttl(), Some(45));
    }

    #[test]
    fn parse_rejects_short_header() {
        assert_eq!(Message::parse(&[0u8; 5]), Err(ParseError::Truncated));
    }

    #[test]
    fn parse_rejects_truncated_question() {
        let query = Message::query(1, "example.com", TYPE_A);
        let bytes = query.as_bytes();

        assert_eq!(
            Message::parse(&bytes[..bytes.len() - 2]),
            Err(ParseError::Truncated)
        );
    }

    #[test]
    fn parse_rejects_pointer_loop() {
        let mut packet = vec![0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0];
        packet.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);

        assert_eq!(Message::parse(&packet), Err(ParseError::PointerLoop));
    }

    #[test]
    fn parse_accepts_zero_questions() {
        let packet = [0, 9, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let parsed = Message::parse(&packet).unwrap();

        assert!(parsed.questions().is_empty());
        assert_eq!(parsed.id(), 9);
    }

    #[test]
    fn set_id_and_rcode_patch_header() {
        let query = Message::query(1, "example.com", TYPE_A);
        let mut parsed = Message::parse(&upstream_response(&query)).unwrap();

        parsed.set_id(0xBEEF);
        parsed.set_rcode(Rcode::NX_DOMAIN);

        let reparsed = Message::parse(parsed.as_bytes()).unwrap();
        assert_eq!(reparsed.id(), 0xBEEF);
        assert_eq!(reparsed.rcode(), Rcode::NX_DOMAIN);
        assert_eq!(reparsed.answers(), parsed.answers());
    }

    #[test]
    fn server_failure_keeps_id_and_question() {
        let query = Message::query(0x4242, "example.com", TYPE_AAAA);
        let reply = Message::parse(Message::server_failure(&query).as_bytes()).unwrap();

        assert!(reply.is_response());
        assert_eq!(reply.id(), 0x4242);
        assert_eq!(reply.rcode(), Rcode::SERV_FAIL);
        assert_eq!(reply.questions(), query.questions());
        assert!(reply.answers().is_empty());
    }

    #[test]
    fn authoritative_a_answers_question() {
        let query = Message::query(3, "router.lan", TYPE_A);
        let reply = Message::authoritative_a(&query, Ipv4Addr::new(192, 168, 1, 1), 60);
        let reply = Message::parse(reply.as_bytes()).unwrap();

        assert!(reply.is_authoritative());
        assert_eq!(reply.rcode(), Rcode::NO_ERROR);
        assert_eq!(reply.answers().len(), 1);
        assert_eq!(reply.answers()[0].name, "router.lan");
        assert_eq!(reply.answers()[0].ttl, 60);
        assert_eq!(
            reply.answers()[0].ipv4(),
            Some(Ipv4Addr::new(192, 168, 1, 1))
        );
    }

    #[test]
    fn normalize_name_folds_case_and_root() {
        assert_eq!(normalize_name("Example.COM."), "example.com");
        assert!(matches!(normalize_name("example.com"), Cow::Borrowed(_)));
    }

    #[test]
    fn normalize_name_keeps_escaped_trailing_dot() {
        assert_eq!(normalize_name("Lan\\."), "lan\\.");
        assert_eq!(normalize_name("lan\\\\."), "lan\\\\");
    }

    fn raw_query(labels: &[&[u8]]) -> Vec<u8> {
        let mut packet = vec![0x00, 0x2A, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
        for label in labels {
            packet.push(label.len() as u8);
            packet.extend_from_slice(label);
        }
        packet.push(0);
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        packet
    }

    #[test]
    fn parse_accepts_binary_label() {
        let packet = raw_query(&[&[0xC3, 0x28], b"com"]);
        let parsed = Message::parse(&packet).unwrap();

        assert_eq!(parsed.questions()[0].domain, "\\195(.com");
        // The escaped name encodes back to the same wire labels
        let rebuilt = Message::query(0x2A, &parsed.questions()[0].domain, TYPE_A);
        assert_eq!(rebuilt.as_bytes(), packet.as_slice());
    }

    #[test]
    fn dot_inside_label_stays_distinct() {
        let packet = raw_query(&[b"www", b"bank.com"]);
        let parsed = Message::parse(&packet).unwrap();

        assert_eq!(parsed.questions()[0].domain, "www.bank\\.com");
        assert_ne!(
            parsed.questions(),
            Message::query(0x2A, "www.bank.com", TYPE_A).questions()
        );
        let reply = Message::server_failure(&parsed);
        assert_eq!(&reply.as_bytes()[HEADER_LEN..], &packet[HEADER_LEN..]);
    }

    #[test]
    fn backslash_and_space_are_escaped() {
        let packet = raw_query(&[b"a\\b c"]);
        let parsed = Message::parse(&packet).unwrap();

        assert_eq!(parsed.questions()[0].domain, "a\\\\b\\032c");
        let rebuilt = Message::query(0x2A, &parsed.questions()[0].domain, TYPE_A);
        assert_eq!(rebuilt.as_bytes(), packet.as_slice());
    }

    #[test]
    fn parse_rejects_overlong_name() {
        let label = [b'a'; 63];
        let packet = raw_query(&[&label, &label, &label, &label]);

        assert_eq!(Message::parse(&packet), Err(ParseError::NameTooLong));
    }
}
