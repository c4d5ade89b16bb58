pub mod base64url;
pub mod buffer;
pub mod packet;

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use crate::packet::header::Header;
    use crate::packet::question::Question;
    use crate::packet::record::Record;
    use crate::packet::{DnsPacket, QueryType};

    #[test]
    fn should_roundtrip_query_packet() {
        let mut packet = DnsPacket {
            header: Header::question(38005),
            questions: vec![Question::new(String::from("google.com"), QueryType::A)],
            ..Default::default()
        };

        let buffer = packet.create_buffer().unwrap();
        let parsed = DnsPacket::try_from(buffer).unwrap();

        assert_eq!(parsed.header.id, 38005);
        assert!(parsed.header.recursion_desired);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].name, "google.com");
        assert_eq!(parsed.questions[0].qtype, QueryType::A);
        assert!(parsed.answers.is_empty());
    }

    #[test]
    fn should_roundtrip_response_packet_with_answer() {
        let mut packet = DnsPacket {
            header: Header::response_from(&Header::question(38005)),
            questions: vec![Question::new(String::from("google.com"), QueryType::A)],
            answers: vec![Record::A {
                domain: String::from("google.com"),
                addr: Ipv4Addr::new(172, 217, 20, 206),
                ttl: 8,
            }],
            ..Default::default()
        };

        let buffer = packet.create_buffer().unwrap();
        let parsed = DnsPacket::try_from(buffer).unwrap();

        assert_eq!(parsed.header.id, 38005);
        assert!(parsed.header.response);
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(
            parsed.answers[0],
            Record::A {
                domain: String::from("google.com"),
                addr: Ipv4Addr::new(172, 217, 20, 206),
                ttl: 8,
            }
        );
    }

    #[test]
    fn should_roundtrip_cname_chain_with_compressed_names() {
        let mut packet = DnsPacket {
            header: Header::response_from(&Header::question(45838)),
            questions: vec![Question::new(
                String::from("app.datadoghq.com"),
                QueryType::A,
            )],
            answers: vec![
                Record::CNAME {
                    domain: String::from("app.datadoghq.com"),
                    host: String::from("edge.datadoghq.com"),
                    ttl: 39,
                },
                Record::A {
                    domain: String::from("edge.datadoghq.com"),
                    addr: Ipv4Addr::new(3, 233, 151, 184),
                    ttl: 60,
                },
            ],
            ..Default::default()
        };

        let buffer = packet.create_buffer().unwrap();
        let parsed = DnsPacket::try_from(buffer).unwrap();

        assert_eq!(parsed.answers.len(), 2);
        assert_eq!(parsed.answers, packet.answers);
    }

    #[test]
    fn should_build_error_response_preserving_id_and_question() {
        use crate::packet::header::ResponseCode;

        let mut query = DnsPacket {
            header: Header::question(1234),
            questions: vec![Question::new(String::from("example.com"), QueryType::A)],
            ..Default::default()
        };
        let query_bytes = query.create_buffer().unwrap().buf.to_vec();

        let response_bytes = DnsPacket::build_error_response(&query_bytes, ResponseCode::FormatError);
        let buffer = crate::buffer::BytePacketBuffer::from_bytes(&response_bytes);
        let response = DnsPacket::try_from(buffer).unwrap();

        assert_eq!(response.header.id, 1234);
        assert!(response.header.response);
        assert_eq!(response.header.response_code, ResponseCode::FormatError);
        assert_eq!(response.questions.len(), 1);
        assert_eq!(response.questions[0].name, "example.com");
        assert!(response.answers.is_empty());
    }

    #[test]
    fn should_build_error_response_for_an_unparseable_query() {
        use crate::packet::header::ResponseCode;

        let garbage = [0xFFu8; 4];
        let response_bytes = DnsPacket::build_error_response(&garbage, ResponseCode::FormatError);
        let buffer = crate::buffer::BytePacketBuffer::from_bytes(&response_bytes);
        let response = DnsPacket::try_from(buffer).unwrap();

        assert!(response.header.response);
        assert_eq!(response.header.response_code, ResponseCode::FormatError);
        assert!(response.questions.is_empty());
    }
}
