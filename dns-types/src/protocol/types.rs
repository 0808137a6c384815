use bytes::Bytes;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Basic DNS message format, used for both queries and responses.
///
/// ```text
///     +---------------------+
///     |        Header       |
///     +---------------------+
///     |       Question      | the question for the name server
///     +---------------------+
///     |        Answer       | RRs answering the question
///     +---------------------+
///     |      Authority      | RRs pointing toward an authority
///     +---------------------+
///     |      Additional     | RRs holding additional information
///     +---------------------+
/// ```
///
/// See section 4.1 of RFC 1035.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authority: Vec<ResourceRecord>,
    pub additional: Vec<ResourceRecord>,
}

impl Message {
    /// Build the skeleton of a reply to this message: same ID, opcode and
    /// RD bit, QR set, AA and RA cleared, empty sections.
    pub fn make_response(&self) -> Self {
        Self {
            header: Header {
                id: self.header.id,
                is_response: true,
                opcode: self.header.opcode,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: self.header.recursion_desired,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: self.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Build a `FormErr` response carrying only the ID recovered from an
    /// otherwise-unparseable datagram.
    pub fn make_format_error_response(id: u16) -> Self {
        Self {
            header: Header {
                id,
                is_response: true,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::FormErr,
            },
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Build a new outgoing query for a single question.
    pub fn from_question(id: u16, question: Question) -> Self {
        Self {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: false,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }
}

/// Common header type for all messages.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.1 of RFC 1035. The Z field is reserved, always zero, and
/// not stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: Opcode,
    pub is_authoritative: bool,
    pub is_truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub rcode: Rcode,
}

/// A `Header` plus the four wire-only section-length fields. Kept separate
/// from `Header` so that the normal type can't represent a count which
/// disagrees with the section it describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WireHeader {
    pub header: Header,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

/// A single entry in the question section.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                     QNAME                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QTYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     QCLASS                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.2 of RFC 1035. Equality and hashing are over the
/// `(name, qtype, qclass)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: DomainName,
    pub qtype: QueryType,
    pub qclass: QueryClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.name.to_dotted_string(),
            self.qclass,
            self.qtype
        )
    }
}

/// A single resource record, as found in the answer, authority and
/// additional sections.
///
/// ```text
///                                     1  1  1  1  1  1
///       0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                                               |
///     /                                               /
///     /                      NAME                     /
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TYPE                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                     CLASS                     |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      TTL                      |
///     |                                               |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                   RDLENGTH                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--|
///     /                     RDATA                     /
///     /                                               /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// See section 4.1.3 of RFC 1035.
///
/// `raw_rdata` is the verbatim RDATA octets as they appeared on the wire:
/// re-emission always uses `raw_rdata`, never a re-serialisation of
/// `rtype_with_data`, so a record round-trips byte-for-byte even though
/// parsing some RDATA forms (names with compression pointers) is lossy.
///
/// `PartialEq`, `Eq` and `Hash` deliberately ignore `ttl`: two records with
/// the same owner, type, class and wire-form RDATA are the same record no
/// matter their TTL, so that re-inserting a record refreshes it instead of
/// duplicating it.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rtype_with_data: RecordTypeWithData,
    pub rclass: RecordClass,
    pub ttl: u32,
    pub raw_rdata: Bytes,
}

impl PartialEq for ResourceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.rtype_with_data.rtype() == other.rtype_with_data.rtype()
            && self.rclass == other.rclass
            && self.raw_rdata == other.raw_rdata
    }
}

impl Eq for ResourceRecord {}

impl Hash for ResourceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rtype_with_data.rtype().hash(state);
        self.rclass.hash(state);
        self.raw_rdata.hash(state);
    }
}

impl ResourceRecord {
    pub fn is_unknown(&self) -> bool {
        self.rtype_with_data.rtype().is_unknown() || self.rclass.is_unknown()
    }

    pub fn matches(&self, question: &Question) -> bool {
        self.rtype_with_data.rtype().matches(&question.qtype) && self.rclass.matches(&question.qclass)
    }
}

/// A record type together with its parsed RDATA. Only the types spec'd in
/// §4.2 are given a structured representation; anything else (including
/// `HINFO`, which this resolver never inspects) is kept as opaque octets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordTypeWithData {
    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    A { address: Ipv4Addr },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   NSDNAME                     /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    NS { nsdname: DomainName },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                     CNAME                     /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    CNAME { cname: DomainName },

    /// MNAME, RNAME, then five 32-bit fields.
    SOA {
        mname: DomainName,
        rname: DomainName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   PTRDNAME                    /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    PTR { ptrdname: DomainName },

    /// This application does not interpret `HINFO` records.
    HINFO { octets: Bytes },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                  PREFERENCE                   |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     /                   EXCHANGE                    /
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    MX {
        preference: u16,
        exchange: DomainName,
    },

    /// ```text
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    ///     |                    ADDRESS                    |
    ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
    /// ```
    AAAA { address: Ipv6Addr },

    /// Any other record type: RDATA is kept raw and never interpreted.
    Unknown { tag: RecordTypeUnknown, octets: Bytes },
}

impl RecordTypeWithData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordTypeWithData::A { .. } => RecordType::A,
            RecordTypeWithData::NS { .. } => RecordType::NS,
            RecordTypeWithData::CNAME { .. } => RecordType::CNAME,
            RecordTypeWithData::SOA { .. } => RecordType::SOA,
            RecordTypeWithData::PTR { .. } => RecordType::PTR,
            RecordTypeWithData::HINFO { .. } => RecordType::HINFO,
            RecordTypeWithData::MX { .. } => RecordType::MX,
            RecordTypeWithData::AAAA { .. } => RecordType::AAAA,
            RecordTypeWithData::Unknown { tag, .. } => RecordType::Unknown(*tag),
        }
    }
}

/// What sort of query this is (the 4-bit OPCODE field).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Query,
    IQuery,
    Status,
    Reserved(OpcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Opcode`s cannot
/// be created outside of this module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OpcodeReserved(u8);

impl From<u8> for Opcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Opcode::Query,
            1 => Opcode::IQuery,
            2 => Opcode::Status,
            other => Opcode::Reserved(OpcodeReserved(other)),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        match value {
            Opcode::Query => 0,
            Opcode::IQuery => 1,
            Opcode::Status => 2,
            Opcode::Reserved(OpcodeReserved(octet)) => octet,
        }
    }
}

/// The 4-bit RCODE field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Rcode {
    NoError,
    FormErr,
    ServFail,
    NXDomain,
    NotImp,
    Refused,
    Reserved(RcodeReserved),
}

/// A struct with a private constructor, to ensure invalid `Rcode`s cannot
/// be created outside of this module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RcodeReserved(u8);

impl From<u8> for Rcode {
    fn from(octet: u8) -> Self {
        match octet & 0b0000_1111 {
            0 => Rcode::NoError,
            1 => Rcode::FormErr,
            2 => Rcode::ServFail,
            3 => Rcode::NXDomain,
            4 => Rcode::NotImp,
            5 => Rcode::Refused,
            other => Rcode::Reserved(RcodeReserved(other)),
        }
    }
}

impl From<Rcode> for u8 {
    fn from(value: Rcode) -> Self {
        match value {
            Rcode::NoError => 0,
            Rcode::FormErr => 1,
            Rcode::ServFail => 2,
            Rcode::NXDomain => 3,
            Rcode::NotImp => 4,
            Rcode::Refused => 5,
            Rcode::Reserved(RcodeReserved(octet)) => octet,
        }
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rcode::NoError => write!(f, "NoError"),
            Rcode::FormErr => write!(f, "FormErr"),
            Rcode::ServFail => write!(f, "ServFail"),
            Rcode::NXDomain => write!(f, "NXDomain"),
            Rcode::NotImp => write!(f, "NotImp"),
            Rcode::Refused => write!(f, "Refused"),
            Rcode::Reserved(RcodeReserved(n)) => write!(f, "Reserved({n})"),
        }
    }
}

/// A single label's maximum length, in octets (RFC 1035 section 3.1).
pub const LABEL_MAX_LEN: usize = 63;

/// A domain name's maximum length on the wire, in octets (RFC 1035 section
/// 3.1).
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// One label of a domain name: between 0 (the root) and 63 octets.
pub type Label = Vec<u8>;

/// A domain name is a sequence of labels. Labels are canonicalised to
/// lowercase ASCII on construction (bytes outside `A..=Z` are left alone,
/// which also makes non-ASCII octets pass through unchanged). Since there
/// is no particular character encoding guaranteed for a label, it is kept
/// as an opaque byte string; only the textual (`to_dotted_string`) form
/// applies `\NNN` escaping for non-printable or separator-colliding bytes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
}

impl DomainName {
    pub fn root() -> Self {
        DomainName {
            labels: vec![Vec::new()],
        }
    }

    pub fn is_root(&self) -> bool {
        self.labels.len() == 1 && self.labels[0].is_empty()
    }

    /// The number of octets this name would occupy on the wire,
    /// uncompressed: one length octet plus the label's octets, per label,
    /// plus the trailing zero octet.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum()
    }

    pub fn is_subdomain_of(&self, other: &DomainName) -> bool {
        self.labels.ends_with(&other.labels)
    }

    /// Render as RFC 1035 presentation format: labels joined by `.`, with a
    /// trailing dot, escaping any octet that is not a printable ASCII
    /// character (or that would be ambiguous with the label separator or
    /// the escape character itself) as `\NNN`.
    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::new();
        for label in &self.labels {
            for &octet in label {
                match octet {
                    b'.' | b'\\' => out.push_str(&format!("\\{octet:03}")),
                    0x20..=0x7e => out.push(octet as char),
                    _ => out.push_str(&format!("\\{octet:03}")),
                }
            }
            out.push('.');
        }
        out
    }

    /// Parse RFC 1035 presentation format, accepting `\NNN` (1-3 decimal
    /// digits) escapes for arbitrary octets.
    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root());
        }

        let mut labels = Vec::new();
        for (i, chunk) in s.split('.').enumerate() {
            let is_last = i == s.split('.').count() - 1;
            if chunk.is_empty() {
                if is_last {
                    continue;
                }
                return None;
            }
            labels.push(decode_label(chunk)?);
        }
        labels.push(Vec::new());
        Self::from_labels(labels)
    }

    /// Build from already-split, possibly mixed-case labels, lowercasing
    /// and validating length limits.
    pub fn from_labels(mixed_case_labels: Vec<Label>) -> Option<Self> {
        if mixed_case_labels.is_empty() {
            return None;
        }

        let mut labels = Vec::with_capacity(mixed_case_labels.len());
        let mut total = 0usize;
        let mut seen_blank = false;

        for (i, raw) in mixed_case_labels.iter().enumerate() {
            if seen_blank {
                return None;
            }
            seen_blank = raw.is_empty();
            if raw.len() > LABEL_MAX_LEN {
                return None;
            }
            if seen_blank && i != mixed_case_labels.len() - 1 {
                return None;
            }
            total += raw.len() + 1;
            labels.push(raw.iter().map(u8::to_ascii_lowercase).collect());
        }

        if seen_blank && total <= DOMAINNAME_MAX_LEN {
            Some(Self { labels })
        } else {
            None
        }
    }
}

fn decode_label(s: &str) -> Option<Label> {
    let mut out = Vec::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut digits = String::new();
            while digits.len() < 3 {
                match chars.peek() {
                    Some(d) if d.is_ascii_digit() => {
                        digits.push(*d);
                        chars.next();
                    }
                    _ => break,
                }
            }
            if digits.is_empty() {
                return None;
            }
            let value: u32 = digits.parse().ok()?;
            out.push(u8::try_from(value).ok()?);
        } else if c.is_ascii() {
            out.push(c as u8);
        } else {
            return None;
        }
    }
    Some(out)
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

/// Query types are a superset of record types: they add `AXFR` and the
/// wildcard `ANY`/`*` query.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueryType {
    Record(RecordType),
    Axfr,
    Any,
}

impl QueryType {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryType::Record(rtype) => rtype.is_unknown(),
            _ => false,
        }
    }
}

impl From<u16> for QueryType {
    fn from(value: u16) -> Self {
        match value {
            252 => QueryType::Axfr,
            255 => QueryType::Any,
            _ => QueryType::Record(RecordType::from(value)),
        }
    }
}

impl From<QueryType> for u16 {
    fn from(value: QueryType) -> Self {
        match value {
            QueryType::Axfr => 252,
            QueryType::Any => 255,
            QueryType::Record(rtype) => rtype.into(),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Record(rtype) => write!(f, "{rtype}"),
            QueryType::Axfr => write!(f, "AXFR"),
            QueryType::Any => write!(f, "ANY"),
        }
    }
}

/// Query classes are a superset of record classes: they add the wildcard
/// `ANY` class.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueryClass {
    Record(RecordClass),
    Any,
}

impl QueryClass {
    pub fn is_unknown(&self) -> bool {
        match self {
            QueryClass::Record(rclass) => rclass.is_unknown(),
            QueryClass::Any => false,
        }
    }
}

impl From<u16> for QueryClass {
    fn from(value: u16) -> Self {
        match value {
            255 => QueryClass::Any,
            _ => QueryClass::Record(RecordClass::from(value)),
        }
    }
}

impl From<QueryClass> for u16 {
    fn from(value: QueryClass) -> Self {
        match value {
            QueryClass::Any => 255,
            QueryClass::Record(rclass) => rclass.into(),
        }
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryClass::Record(rclass) => write!(f, "{rclass}"),
            QueryClass::Any => write!(f, "ANY"),
        }
    }
}

/// Record types recognised by the RDATA codec (§4.2): `A`, `NS`, `CNAME`,
/// `SOA`, `PTR`, `HINFO`, `MX`, `AAAA`. Anything else passes through as
/// `Unknown`, with its RDATA kept opaque.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    HINFO,
    MX,
    AAAA,
    Unknown(RecordTypeUnknown),
}

/// A struct with a private constructor, to ensure invalid `RecordType`s
/// cannot be created outside of this module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordTypeUnknown(u16);

impl RecordType {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordType::Unknown(_))
    }

    pub fn matches(&self, qtype: &QueryType) -> bool {
        match qtype {
            QueryType::Any => true,
            QueryType::Record(rtype) => rtype == self,
            QueryType::Axfr => false,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::HINFO => write!(f, "HINFO"),
            RecordType::MX => write!(f, "MX"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::Unknown(RecordTypeUnknown(n)) => write!(f, "{n}"),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            13 => RecordType::HINFO,
            15 => RecordType::MX,
            28 => RecordType::AAAA,
            other => RecordType::Unknown(RecordTypeUnknown(other)),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::PTR => 12,
            RecordType::HINFO => 13,
            RecordType::MX => 15,
            RecordType::AAAA => 28,
            RecordType::Unknown(RecordTypeUnknown(value)) => value,
        }
    }
}

/// Record classes. Only `IN` is meaningfully handled; anything else is
/// kept but treated as unknown.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordClass {
    IN,
    Unknown(RecordClassUnknown),
}

/// A struct with a private constructor, to ensure invalid `RecordClass`es
/// cannot be created outside of this module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RecordClassUnknown(u16);

impl RecordClass {
    pub fn is_unknown(&self) -> bool {
        matches!(self, RecordClass::Unknown(_))
    }

    pub fn matches(&self, qclass: &QueryClass) -> bool {
        match qclass {
            QueryClass::Any => true,
            QueryClass::Record(rclass) => rclass == self,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordClass::IN => write!(f, "IN"),
            RecordClass::Unknown(RecordClassUnknown(n)) => write!(f, "{n}"),
        }
    }
}

impl From<u16> for RecordClass {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordClass::IN,
            other => RecordClass::Unknown(RecordClassUnknown(other)),
        }
    }
}

impl From<RecordClass> for u16 {
    fn from(value: RecordClass) -> Self {
        match value {
            RecordClass::IN => 1,
            RecordClass::Unknown(RecordClassUnknown(value)) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    #[test]
    fn u8_opcode_roundtrip() {
        for i in 0..16 {
            assert_eq!(u8::from(Opcode::from(i)), i);
        }
    }

    #[test]
    fn u8_rcode_roundtrip() {
        for i in 0..16 {
            assert_eq!(u8::from(Rcode::from(i)), i);
        }
    }

    #[test]
    fn u16_querytype_roundtrip() {
        for i in 0..300 {
            assert_eq!(u16::from(QueryType::from(i)), i);
        }
    }

    #[test]
    fn u16_recordtype_roundtrip() {
        for i in 0..300 {
            assert_eq!(u16::from(RecordType::from(i)), i);
        }
    }

    #[test]
    fn domainname_root_conversions() {
        assert_eq!(Some(DomainName::root()), DomainName::from_dotted_string("."));
        assert_eq!(".", DomainName::root().to_dotted_string());
    }

    #[test]
    fn domainname_lowercases() {
        assert_eq!(domain("example.com."), domain("Example.COM."));
    }

    #[test]
    fn domainname_dotted_roundtrip() {
        let name = domain("www.example.com.");
        assert_eq!("www.example.com.", name.to_dotted_string());
    }

    #[test]
    fn domainname_escapes_nonascii() {
        let labels = vec![vec![b'a', 200, b'b'], Vec::new()];
        let name = DomainName::from_labels(labels).unwrap();
        assert_eq!(r"a\200b.", name.to_dotted_string());
        assert_eq!(
            name,
            DomainName::from_dotted_string(&name.to_dotted_string()).unwrap()
        );
    }

    #[test]
    fn domainname_rejects_oversized_label() {
        let label = vec![b'a'; LABEL_MAX_LEN + 1];
        assert_eq!(None, DomainName::from_labels(vec![label, Vec::new()]));
    }

    #[test]
    fn is_subdomain_of() {
        assert!(domain("www.example.com.").is_subdomain_of(&domain("example.com.")));
        assert!(!domain("www.example.com.").is_subdomain_of(&domain("example.net.")));
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;

    pub fn domain(name: &str) -> DomainName {
        DomainName::from_dotted_string(name).unwrap()
    }

    pub fn a_record(name: &str, address: Ipv4Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::A { address },
            rclass: RecordClass::IN,
            ttl: 300,
            raw_rdata: Bytes::copy_from_slice(&address.octets()),
        }
    }

    pub fn aaaa_record(name: &str, address: Ipv6Addr) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::AAAA { address },
            rclass: RecordClass::IN,
            ttl: 300,
            raw_rdata: Bytes::copy_from_slice(&address.octets()),
        }
    }

    pub fn cname_record(name: &str, target_name: &str) -> ResourceRecord {
        let cname = domain(target_name);
        let mut buf = crate::protocol::serialise::WritableBuffer::default();
        cname.serialise(&mut buf);
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::CNAME { cname },
            rclass: RecordClass::IN,
            ttl: 300,
            raw_rdata: Bytes::from(buf.octets),
        }
    }

    pub fn ns_record(superdomain_name: &str, nameserver_name: &str) -> ResourceRecord {
        let nsdname = domain(nameserver_name);
        let mut buf = crate::protocol::serialise::WritableBuffer::default();
        nsdname.serialise(&mut buf);
        ResourceRecord {
            name: domain(superdomain_name),
            rtype_with_data: RecordTypeWithData::NS { nsdname },
            rclass: RecordClass::IN,
            ttl: 300,
            raw_rdata: Bytes::from(buf.octets),
        }
    }

    pub fn unknown_record(name: &str, octets: &[u8]) -> ResourceRecord {
        ResourceRecord {
            name: domain(name),
            rtype_with_data: RecordTypeWithData::Unknown {
                tag: RecordTypeUnknown(65280),
                octets: Bytes::copy_from_slice(octets),
            },
            rclass: RecordClass::IN,
            ttl: 300,
            raw_rdata: Bytes::copy_from_slice(octets),
        }
    }
}
