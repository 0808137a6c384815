use super::types::*;
use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A cursor over a fixed byte slice, used to decode wire-format messages.
/// Compression-pointer following works by constructing a fresh
/// `ConsumableBuffer` positioned at the pointer target and recursing into
/// it: the outer buffer's own position is never advanced past the two
/// pointer octets, which is exactly the "next offset is just past the
/// first pointer" rule RFC 1035 section 4.1.4 requires.
#[derive(Debug, Clone, Copy)]
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        ConsumableBuffer { octets, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn require(&self, size: usize) -> Result<(), Error> {
        if self.position + size > self.octets.len() {
            Err(Error::UnexpectedEOF)
        } else {
            Ok(())
        }
    }

    pub fn next_u8(&mut self) -> Result<u8, Error> {
        self.require(1)?;
        let value = self.octets[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn next_u16(&mut self) -> Result<u16, Error> {
        self.require(2)?;
        let value = u16::from_be_bytes([self.octets[self.position], self.octets[self.position + 1]]);
        self.position += 2;
        Ok(value)
    }

    pub fn next_u32(&mut self) -> Result<u32, Error> {
        self.require(4)?;
        let value = u32::from_be_bytes([
            self.octets[self.position],
            self.octets[self.position + 1],
            self.octets[self.position + 2],
            self.octets[self.position + 3],
        ]);
        self.position += 4;
        Ok(value)
    }

    /// Take `size` octets and advance past them.
    pub fn take(&mut self, size: usize) -> Result<&'a [u8], Error> {
        self.require(size)?;
        let taken = &self.octets[self.position..self.position + size];
        self.position += size;
        Ok(taken)
    }

    /// A new cursor over the same underlying octets, positioned at
    /// `position`, used to follow a compression pointer.
    pub fn at_offset(&self, position: usize) -> Self {
        ConsumableBuffer {
            octets: self.octets,
            position,
        }
    }
}

/// Errors that can occur while parsing a wire-format message.
///
/// Parsing is as permissive as RFC 1035 allows, but a handful of things are
/// fatal: truncated buffers, compression pointers that do not point
/// strictly backward (which would otherwise allow an infinite loop), and
/// a name with more labels+pointers than fit in an RFC 1035 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    UnexpectedEOF,
    InvalidCompressionPointer { pointer: usize, at: usize },
    TooManyCompressionPointers,
    LabelTooLong { length: usize },
    NameTooLong,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedEOF => write!(f, "unexpected end of buffer"),
            Error::InvalidCompressionPointer { pointer, at } => {
                write!(f, "compression pointer at {at} to {pointer} does not point strictly backward")
            }
            Error::TooManyCompressionPointers => write!(f, "too many compression pointers followed"),
            Error::LabelTooLong { length } => write!(f, "label too long: {length} octets"),
            Error::NameTooLong => write!(f, "domain name exceeds 255 octets"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// The query ID, if it could be recovered before the error occurred —
    /// used to build a `FormErr` response that at least echoes the ID the
    /// client sent, rather than dropping the datagram silently.
    pub fn id(octets: &[u8]) -> Option<u16> {
        if octets.len() >= 2 {
            Some(u16::from_be_bytes([octets[0], octets[1]]))
        } else {
            None
        }
    }
}

/// Compression pointers are followed at most this many times while
/// decoding a single name, bounding the work a malicious or corrupt
/// packet can force even though the strictly-backward rule already
/// prevents cycles.
const MAX_COMPRESSION_POINTERS: usize = 128;

impl Message {
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        let mut buffer = ConsumableBuffer::new(octets);
        Self::deserialise(&mut buffer)
    }

    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;

        let mut questions = Vec::with_capacity(wire_header.qdcount as usize);
        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(buffer)?);
        }

        let mut answers = Vec::with_capacity(wire_header.ancount as usize);
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(buffer)?);
        }

        let mut authority = Vec::with_capacity(wire_header.nscount as usize);
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(buffer)?);
        }

        let mut additional = Vec::with_capacity(wire_header.arcount as usize);
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(buffer)?);
        }

        Ok(Message {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl WireHeader {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16()?;
        let octet = buffer.next_u8()?;
        let is_response = octet & 0b1000_0000 != 0;
        let opcode = Opcode::from((octet & 0b0111_1000) >> 3);
        let is_authoritative = octet & 0b0000_0100 != 0;
        let is_truncated = octet & 0b0000_0010 != 0;
        let recursion_desired = octet & 0b0000_0001 != 0;

        let octet = buffer.next_u8()?;
        let recursion_available = octet & 0b1000_0000 != 0;
        // bits 0b0111_0000 are the reserved Z field, dropped
        let rcode = Rcode::from(octet & 0b0000_1111);

        let qdcount = buffer.next_u16()?;
        let ancount = buffer.next_u16()?;
        let nscount = buffer.next_u16()?;
        let arcount = buffer.next_u16()?;

        Ok(WireHeader {
            header: Header {
                id,
                is_response,
                opcode,
                is_authoritative,
                is_truncated,
                recursion_desired,
                recursion_available,
                rcode,
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let qtype = QueryType::from(buffer.next_u16()?);
        let qclass = QueryClass::from(buffer.next_u16()?);
        Ok(Question { name, qtype, qclass })
    }
}

impl ResourceRecord {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(buffer)?;
        let rtype = RecordType::from(buffer.next_u16()?);
        let rclass = RecordClass::from(buffer.next_u16()?);
        let ttl = buffer.next_u32()?;
        let rdlength = buffer.next_u16()? as usize;

        let rdata_start = buffer.position();
        let raw_rdata = Bytes::copy_from_slice(buffer.take(rdlength)?);

        // Names nested in RDATA (NS/CNAME/SOA/PTR/MX) may contain
        // compression pointers into the *whole* message, not just into
        // this record's RDATA, so they are parsed from a cursor over the
        // full buffer positioned at `rdata_start`, not over `raw_rdata`
        // alone.
        let rtype_with_data = match rtype {
            RecordType::A => {
                let mut rdata_buffer = ConsumableBuffer::new(&raw_rdata);
                RecordTypeWithData::A {
                    address: Ipv4Addr::from(rdata_buffer.next_u32()?),
                }
            }
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(&mut buffer.at_offset(rdata_start))?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(&mut buffer.at_offset(rdata_start))?,
            },
            RecordType::SOA => {
                let mut cursor = buffer.at_offset(rdata_start);
                let mname = DomainName::deserialise(&mut cursor)?;
                let rname = DomainName::deserialise(&mut cursor)?;
                let serial = cursor.next_u32()?;
                let refresh = cursor.next_u32()?;
                let retry = cursor.next_u32()?;
                let expire = cursor.next_u32()?;
                let minimum = cursor.next_u32()?;
                RecordTypeWithData::SOA {
                    mname,
                    rname,
                    serial,
                    refresh,
                    retry,
                    expire,
                    minimum,
                }
            }
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(&mut buffer.at_offset(rdata_start))?,
            },
            RecordType::HINFO => RecordTypeWithData::HINFO {
                octets: raw_rdata.clone(),
            },
            RecordType::MX => {
                let mut cursor = buffer.at_offset(rdata_start);
                let preference = cursor.next_u16()?;
                let exchange = DomainName::deserialise(&mut cursor)?;
                RecordTypeWithData::MX { preference, exchange }
            }
            RecordType::AAAA => {
                let mut rdata_buffer = ConsumableBuffer::new(&raw_rdata);
                let octets: [u8; 16] = rdata_buffer.take(16)?.try_into().expect("took exactly 16 octets");
                RecordTypeWithData::AAAA {
                    address: Ipv6Addr::from(octets),
                }
            }
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: raw_rdata.clone(),
            },
        };

        Ok(ResourceRecord {
            name,
            rtype_with_data,
            rclass,
            ttl,
            raw_rdata,
        })
    }
}

impl DomainName {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let start = buffer.position();
        let mut labels: Vec<Label> = Vec::new();
        let mut total_len = 0usize;
        let mut pointers_followed = 0usize;
        let mut cursor = *buffer;
        let mut advanced_past_first_pointer = false;

        loop {
            let length = cursor.next_u8()?;
            if length == 0 {
                labels.push(Vec::new());
                if !advanced_past_first_pointer {
                    buffer.position = cursor.position;
                }
                break;
            } else if length & 0b1100_0000 == 0b1100_0000 {
                let pointer_at = cursor.position - 1;
                let lower = cursor.next_u8()?;
                let pointer = (((length & 0b0011_1111) as usize) << 8) | lower as usize;
                if !advanced_past_first_pointer {
                    buffer.position = cursor.position;
                    advanced_past_first_pointer = true;
                }
                // A pointer must point strictly backward relative to
                // where this name began, otherwise it could point forward
                // into itself or later data and loop forever.
                if pointer >= start {
                    return Err(Error::InvalidCompressionPointer { pointer, at: pointer_at });
                }
                pointers_followed += 1;
                if pointers_followed > MAX_COMPRESSION_POINTERS {
                    return Err(Error::TooManyCompressionPointers);
                }
                cursor = cursor.at_offset(pointer);
            } else if length & 0b1100_0000 != 0 {
                return Err(Error::LabelTooLong { length: length as usize });
            } else {
                let length = length as usize;
                if length > LABEL_MAX_LEN {
                    return Err(Error::LabelTooLong { length });
                }
                let label = cursor.take(length)?.to_vec();
                total_len += length + 1;
                if total_len > DOMAINNAME_MAX_LEN {
                    return Err(Error::NameTooLong);
                }
                labels.push(label);
            }
        }

        DomainName::from_labels(labels).ok_or(Error::NameTooLong)
    }
}

#[cfg(test)]
mod tests {
    use super::super::serialise::WritableBuffer;
    use super::super::types::test_util::*;
    use super::super::types::*;
    use super::*;

    #[test]
    fn roundtrip_a_record_message() {
        let message = Message {
            header: Header {
                id: 0x1234,
                is_response: true,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: true,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: domain("example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            }],
            answers: vec![a_record("example.com.", "93.184.216.34".parse().unwrap())],
            authority: Vec::new(),
            additional: Vec::new(),
        };

        let octets = message.clone().into_octets().unwrap();
        let decoded = Message::from_octets(&octets).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn follows_compression_pointer() {
        let mut buffer = WritableBuffer::default();
        // "example.com." at offset 0
        domain("example.com.").serialise(&mut buffer);
        let name_offset = 0u16;

        // A second name "www.example.com." where "example.com." is a
        // pointer back to offset 0.
        let www_offset = buffer.index();
        buffer.write_u8(3);
        buffer.write_octets(b"www");
        buffer.write_u16(0b1100_0000_0000_0000 | name_offset);

        let mut cursor = ConsumableBuffer::new(&buffer.octets);
        let first = DomainName::deserialise(&mut cursor).unwrap();
        assert_eq!(first, domain("example.com."));
        assert_eq!(cursor.position(), www_offset);

        let mut second_cursor = ConsumableBuffer::new(&buffer.octets).at_offset(www_offset);
        let second = DomainName::deserialise(&mut second_cursor).unwrap();
        assert_eq!(second, domain("www.example.com."));
        // the cursor stops just past the two pointer octets, not at
        // wherever following the pointer ended up
        assert_eq!(second_cursor.position(), buffer.index());
    }

    #[test]
    fn rejects_forward_pointing_pointer() {
        let mut buffer = WritableBuffer::default();
        buffer.write_u16(0b1100_0000_0000_0101); // points to offset 5, which is >= start (0)
        buffer.write_u8(0);

        let mut cursor = ConsumableBuffer::new(&buffer.octets);
        assert!(DomainName::deserialise(&mut cursor).is_err());
    }

    #[test]
    fn rejects_truncated_message() {
        let octets = [0x00, 0x01];
        assert!(Message::from_octets(&octets).is_err());
    }

    #[test]
    fn error_recovers_id_from_truncated_message() {
        let octets = [0x12, 0x34];
        assert_eq!(Some(0x1234), Error::id(&octets));
    }
}
