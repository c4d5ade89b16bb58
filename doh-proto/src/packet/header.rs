use crate::buffer::{BytePacketBuffer, ReaderError, WriterError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum ResponseCode {
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl TryFrom<u8> for ResponseCode {
    type Error = ReaderError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResponseCode::NoError),
            1 => Ok(ResponseCode::FormatError),
            2 => Ok(ResponseCode::ServerFailure),
            3 => Ok(ResponseCode::NameError),
            4 => Ok(ResponseCode::NotImplemented),
            5 => Ok(ResponseCode::Refused),
            other => Err(ReaderError::InvalidResponseCode(other)),
        }
    }
}

impl Default for ResponseCode {
    fn default() -> Self {
        ResponseCode::NoError
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Header {
    pub id: u16,

    pub recursion_desired: bool,
    pub truncated_message: bool,
    pub authoritative_answer: bool,
    pub opcode: u8,
    pub response: bool,

    pub response_code: ResponseCode,
    pub checking_disabled: bool,
    pub authed_data: bool,
    pub z: bool,
    pub recursion_available: bool,

    pub questions: u16,
    pub answers: u16,
    pub authoritative_entries: u16,
    pub resource_entries: u16,
}

impl Header {
    /// Builds the header for a fresh outgoing query.
    pub fn question(id: u16) -> Self {
        Header {
            id,
            recursion_desired: true,
            ..Default::default()
        }
    }

    /// Builds the header for a reply carrying the given id.
    pub fn response(id: u16) -> Self {
        Header {
            id,
            response: true,
            recursion_available: true,
            ..Default::default()
        }
    }

    /// Builds the header for a reply to the given request, copying the id
    /// and the flags a resolver is expected to echo back.
    pub fn response_from(request: &Header) -> Self {
        Header {
            id: request.id,
            recursion_desired: request.recursion_desired,
            response: true,
            recursion_available: true,
            ..Default::default()
        }
    }

    pub fn with_response_code(mut self, value: ResponseCode) -> Self {
        self.response_code = value;
        self
    }

    pub fn read(buffer: &mut BytePacketBuffer) -> Result<Self, ReaderError> {
        let id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;

        let recursion_desired = (a & (1 << 0)) > 0;
        let truncated_message = (a & (1 << 1)) > 0;
        let authoritative_answer = (a & (1 << 2)) > 0;
        let opcode = (a >> 3) & 0x0F;
        let response = (a & (1 << 7)) > 0;

        let response_code = ResponseCode::try_from(b & 0x0F)?;
        let checking_disabled = (b & (1 << 4)) > 0;
        let authed_data = (b & (1 << 5)) > 0;
        let z = (b & (1 << 6)) > 0;
        let recursion_available = (b & (1 << 7)) > 0;

        let questions = buffer.read_u16()?;
        let answers = buffer.read_u16()?;
        let authoritative_entries = buffer.read_u16()?;
        let resource_entries = buffer.read_u16()?;

        Ok(Header {
            id,
            recursion_desired,
            truncated_message,
            authoritative_answer,
            opcode,
            response,
            response_code,
            checking_disabled,
            authed_data,
            z,
            recursion_available,
            questions,
            answers,
            authoritative_entries,
            resource_entries,
        })
    }

    pub fn write(&self, buffer: &mut BytePacketBuffer) -> Result<(), WriterError> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            (self.response_code as u8)
                | ((self.checking_disabled as u8) << 4)
                | ((self.authed_data as u8) << 5)
                | ((self.z as u8) << 6)
                | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Header, ResponseCode};

    #[test]
    fn should_roundtrip_question_header() {
        let header = Header::question(1234);
        let mut buffer = crate::buffer::BytePacketBuffer::default();
        header.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let parsed = Header::read(&mut buffer).unwrap();
        assert_eq!(parsed.id, 1234);
        assert!(parsed.recursion_desired);
        assert!(!parsed.response);
    }

    #[test]
    fn should_roundtrip_response_header_with_counts() {
        let mut header = Header::response_from(&Header::question(42));
        header.questions = 1;
        header.answers = 3;
        let mut buffer = crate::buffer::BytePacketBuffer::default();
        header.write(&mut buffer).unwrap();
        buffer.pos = 0;
        let parsed = Header::read(&mut buffer).unwrap();
        assert_eq!(parsed.id, 42);
        assert!(parsed.response);
        assert!(parsed.recursion_available);
        assert_eq!(parsed.questions, 1);
        assert_eq!(parsed.answers, 3);
    }

    #[test]
    fn should_set_response_code() {
        let header = Header::response(1).with_response_code(ResponseCode::NameError);
        assert_eq!(header.response_code, ResponseCode::NameError);
    }

    #[test]
    fn should_reject_invalid_response_code() {
        let mut buffer = crate::buffer::BytePacketBuffer::default();
        buffer.buf[3] = 0x0F;
        let error = Header::read(&mut buffer).unwrap_err();
        assert_eq!(
            error,
            crate::buffer::ReaderError::InvalidResponseCode(15)
        );
    }
}
