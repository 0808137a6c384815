use super::types::*;

/// An append-only byte buffer used to build up the wire form of a message.
#[derive(Debug, Default, Clone)]
pub struct WritableBuffer {
    pub octets: Vec<u8>,
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.push(octet);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }

    /// Overwrite two already-written octets at `index` (used for the
    /// RDLENGTH backpatch).
    fn set_u16(&mut self, index: usize, value: u16) {
        self.octets[index..index + 2].copy_from_slice(&value.to_be_bytes());
    }
}

/// Errors that can occur while building a wire-format message. The only
/// failure mode is a section that is too big to be counted in 16 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    CounterTooLarge { counter_name: &'static str, value: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter_name, value } => {
                write!(f, "{counter_name} is too large to fit in a u16: {value}")
            }
        }
    }
}

impl std::error::Error for Error {}

fn usize_to_u16(counter_name: &'static str, value: usize) -> Result<u16, Error> {
    u16::try_from(value).map_err(|_| Error::CounterTooLarge { counter_name, value })
}

impl Message {
    pub fn into_octets(self) -> Result<Vec<u8>, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let wire_header = WireHeader {
            header: self.header,
            qdcount: usize_to_u16("qdcount", self.questions.len())?,
            ancount: usize_to_u16("ancount", self.answers.len())?,
            nscount: usize_to_u16("nscount", self.authority.len())?,
            arcount: usize_to_u16("arcount", self.additional.len())?,
        };
        wire_header.serialise(buffer);

        for question in &self.questions {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer);
        }
        for rr in &self.authority {
            rr.serialise(buffer);
        }
        for rr in &self.additional {
            rr.serialise(buffer);
        }

        Ok(())
    }
}

impl WireHeader {
    fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.header.id);

        let mut octet = 0u8;
        if self.header.is_response {
            octet |= 0b1000_0000;
        }
        octet |= u8::from(self.header.opcode) << 3;
        if self.header.is_authoritative {
            octet |= 0b0000_0100;
        }
        if self.header.is_truncated {
            octet |= 0b0000_0010;
        }
        if self.header.recursion_desired {
            octet |= 0b0000_0001;
        }
        buffer.write_u8(octet);

        let mut octet = 0u8;
        if self.header.recursion_available {
            octet |= 0b1000_0000;
        }
        octet |= u8::from(self.header.rcode);
        buffer.write_u8(octet);

        buffer.write_u16(self.qdcount);
        buffer.write_u16(self.ancount);
        buffer.write_u16(self.nscount);
        buffer.write_u16(self.arcount);
    }
}

impl Question {
    fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        buffer.write_u16(self.qtype.into());
        buffer.write_u16(self.qclass.into());
    }
}

impl ResourceRecord {
    fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        buffer.write_u16(self.rtype_with_data.rtype().into());
        buffer.write_u16(self.rclass.into());
        buffer.write_u32(self.ttl);

        // RDLENGTH is filled in with a backpatch once we know how many
        // octets the RDATA occupies: the RDATA itself is always the raw
        // octets captured at parse time, never a re-serialisation of the
        // typed form, so that re-emission is byte-exact.
        let rdlength_index = buffer.index();
        buffer.write_u16(0);
        let rdata_start = buffer.index();
        buffer.write_octets(&self.raw_rdata);
        let rdlength = buffer.index() - rdata_start;
        buffer.set_u16(rdlength_index, rdlength as u16);
    }
}

impl DomainName {
    /// Serialise as a sequence of length-prefixed labels terminated by a
    /// zero octet. Names are never compressed on output.
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        for label in &self.labels {
            buffer.write_u8(label.len() as u8);
            buffer.write_octets(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::test_util::*;
    use super::*;

    #[test]
    fn serialise_a_record() {
        let rr = a_record("example.com.", "93.184.216.34".parse().unwrap());
        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer);

        let mut expected = WritableBuffer::default();
        expected.write_u8(7);
        expected.write_octets(b"example");
        expected.write_u8(3);
        expected.write_octets(b"com");
        expected.write_u8(0);
        expected.write_u16(1); // A
        expected.write_u16(1); // IN
        expected.write_u32(300);
        expected.write_u16(4);
        expected.write_octets(&[93, 184, 216, 34]);

        assert_eq!(expected.octets, buffer.octets);
    }

    #[test]
    fn serialise_mx_record_exact_bytes() {
        let exchange = domain("mail.example.com.");
        let mut rdata = WritableBuffer::default();
        rdata.write_u16(10);
        exchange.serialise(&mut rdata);

        let rr = ResourceRecord {
            name: domain("example.com."),
            rtype_with_data: RecordTypeWithData::MX {
                preference: 10,
                exchange,
            },
            rclass: RecordClass::IN,
            ttl: 3600,
            raw_rdata: bytes::Bytes::from(rdata.octets),
        };

        let mut buffer = WritableBuffer::default();
        rr.serialise(&mut buffer);

        // name + type + class + ttl + rdlength header, then rdata verbatim
        let rdata_offset = buffer.octets.len() - 18;
        assert_eq!(&buffer.octets[rdata_offset..], &rr.raw_rdata[..]);
    }

    #[test]
    fn name_never_compressed() {
        let name = domain("www.example.com.");
        let mut buffer = WritableBuffer::default();
        name.serialise(&mut buffer);
        // no octet in a freshly-serialised name has either high bit of the
        // compression-pointer tag set, since we only ever emit label
        // lengths (<= 63) or the terminator.
        for &octet in &buffer.octets {
            assert_eq!(octet & 0b1100_0000, 0);
        }
    }
}
