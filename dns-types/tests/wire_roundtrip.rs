//! End-to-end properties of the wire codec, as opposed to the per-module
//! unit tests colocated with `serialise`/`deserialise`. See the Testable
//! Properties in the design doc: round-trip (1), compression tolerance
//! (2, 6).

use dns_types::protocol::deserialise;
use dns_types::protocol::serialise::WritableBuffer;
use dns_types::protocol::types::test_util::*;
use dns_types::protocol::types::*;

fn sample_message() -> Message {
    Message {
        header: Header {
            id: 0xbeef,
            is_response: true,
            opcode: Opcode::Query,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: true,
            recursion_available: true,
            rcode: Rcode::NoError,
        },
        questions: vec![Question {
            name: domain("www.example.com."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        }],
        answers: vec![
            cname_record("www.example.com.", "example.com."),
            a_record("example.com.", "93.184.216.34".parse().unwrap()),
        ],
        authority: vec![ns_record("example.com.", "ns1.example.com.")],
        additional: vec![a_record("ns1.example.com.", "9.9.9.9".parse().unwrap())],
    }
}

#[test]
fn round_trip_without_compression() {
    let message = sample_message();
    let octets = message.clone().into_octets().expect("serialise");
    let decoded = Message::from_octets(&octets).expect("deserialise");
    assert_eq!(message, decoded);
}

#[test]
fn round_trip_preserves_unknown_record_types() {
    let message = Message {
        header: Header {
            id: 1,
            is_response: true,
            opcode: Opcode::Query,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: false,
            rcode: Rcode::NoError,
        },
        questions: vec![],
        answers: vec![unknown_record("example.com.", &[1, 2, 3, 4, 5])],
        authority: vec![],
        additional: vec![],
    };

    let octets = message.clone().into_octets().expect("serialise");
    let decoded = Message::from_octets(&octets).expect("deserialise");
    assert_eq!(message, decoded);
}

/// Hand-build a message where the second question's name uses a
/// compression pointer back into the first, and check it decodes to the
/// same logical name as the fully expanded form.
#[test]
fn compressed_name_decodes_same_as_expanded() {
    let mut buffer = WritableBuffer::default();

    // header: id=1, flags=query, qdcount=2, rest 0
    buffer.write_u16(1);
    buffer.write_u8(0); // QR=0, opcode=0
    buffer.write_u8(0); // RA=0, rcode=0
    buffer.write_u16(2); // qdcount
    buffer.write_u16(0);
    buffer.write_u16(0);
    buffer.write_u16(0);

    let first_name_offset = buffer.index() as u16;
    domain("example.com.").serialise(&mut buffer);
    buffer.write_u16(u16::from(RecordType::A)); // qtype
    buffer.write_u16(u16::from(RecordClass::IN)); // qclass

    buffer.write_u8(3);
    buffer.write_octets(b"www");
    buffer.write_u16(0b1100_0000_0000_0000 | first_name_offset);
    buffer.write_u16(u16::from(RecordType::A));
    buffer.write_u16(u16::from(RecordClass::IN));

    let compressed = Message::from_octets(&buffer.octets).expect("parses compressed message");

    let expanded = Message {
        header: Header {
            id: 1,
            is_response: false,
            opcode: Opcode::Query,
            is_authoritative: false,
            is_truncated: false,
            recursion_desired: false,
            recursion_available: false,
            rcode: Rcode::NoError,
        },
        questions: vec![
            Question {
                name: domain("example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            },
            Question {
                name: domain("www.example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            },
        ],
        answers: vec![],
        authority: vec![],
        additional: vec![],
    };

    assert_eq!(expanded, compressed);
}

#[test]
fn never_emits_compression_pointers() {
    let message = sample_message();
    // A compression pointer's first octet always has both top bits set; a
    // label length octet is always <= 63. RDATA can legitimately contain
    // 0xC0-tagged bytes (e.g. an A record's address octets), so this only
    // scans the name-bearing spans: each question and record owner name,
    // serialised on its own.
    let names = message
        .questions
        .iter()
        .map(|q| &q.name)
        .chain(message.answers.iter().map(|rr| &rr.name))
        .chain(message.authority.iter().map(|rr| &rr.name))
        .chain(message.additional.iter().map(|rr| &rr.name));
    for name in names {
        let mut buffer = WritableBuffer::default();
        name.serialise(&mut buffer);
        for &octet in &buffer.octets {
            assert_ne!(octet & 0b1100_0000, 0b1100_0000, "found a compression-pointer-tagged octet");
        }
    }
}

#[test]
fn deserialise_rejects_truncated_header() {
    assert!(matches!(
        Message::from_octets(&[0, 1, 2]),
        Err(deserialise::Error::UnexpectedEOF)
    ));
}
