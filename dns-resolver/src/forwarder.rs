use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use dns_types::protocol::types::{DomainName, Label, Message, QueryType, Question, RecordType};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// A per-read deadline of ~1 second; see spec §4.5. Each datagram read
/// gets its own fresh deadline, so a chatty (TC-looping) upstream can hold
/// a worker for multiple seconds total.
const READ_DEADLINE: Duration = Duration::from_secs(1);

/// Maximum size of a classic (non-EDNS0) DNS datagram.
const MAX_DATAGRAM_SIZE: usize = 512;

/// Sends queries to a single configured upstream resolver and collects its
/// replies. Bugs and all: if the upstream sets TC, this keeps reading
/// instead of retrying over TCP, exactly as the source it was distilled
/// from does (see Design Notes item 1) — RFC 1035 would have the client
/// retry over TCP instead.
#[derive(Debug, Clone)]
pub struct Forwarder {
    upstream: SocketAddr,
}

/// If `question`'s name is a dotted IPv4 address, rewrite it to the reverse
/// `.IN-ADDR.ARPA.` name and force `qtype = PTR` (spec §4.3 request
/// construction); otherwise pass the question through unchanged.
fn request_question(question: &Question) -> Question {
    match dotted_ipv4(&question.name) {
        Some(address) => Question {
            name: reverse_dns_name(address),
            qtype: QueryType::Record(RecordType::PTR),
            qclass: question.qclass,
        },
        None => question.clone(),
    }
}

fn dotted_ipv4(name: &DomainName) -> Option<Ipv4Addr> {
    let text = name.to_dotted_string();
    text.strip_suffix('.').unwrap_or(&text).parse().ok()
}

fn reverse_dns_name(address: Ipv4Addr) -> DomainName {
    let mut labels: Vec<Label> = address
        .octets()
        .iter()
        .rev()
        .map(|octet| octet.to_string().into_bytes())
        .collect();
    labels.push(b"in-addr".to_vec());
    labels.push(b"arpa".to_vec());
    labels.push(Vec::new());
    DomainName::from_labels(labels).expect("reverse DNS name is always well-formed")
}

impl Forwarder {
    pub fn new(upstream: SocketAddr) -> Self {
        Forwarder { upstream }
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    /// Send `question` upstream with recursion desired, and collect every
    /// reply datagram until a non-truncated reply arrives, the deadline
    /// elapses with nothing read, or a socket/parse error occurs. Never
    /// fails outright: any failure just means fewer replies were
    /// collected, down to zero (spec §4.5/§7: surfaces as an empty result
    /// to the dispatcher).
    pub async fn query(&self, question: &Question) -> Vec<Message> {
        let mut replies = Vec::new();

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(error) => {
                tracing::warn!(?error, "failed to bind forwarder socket");
                return replies;
            }
        };
        if let Err(error) = socket.connect(self.upstream).await {
            tracing::warn!(upstream = %self.upstream, ?error, "failed to connect forwarder socket");
            return replies;
        }

        let id = rand::random();
        let mut request = Message::from_question(id, request_question(question));
        request.header.recursion_desired = true;

        let octets = match request.into_octets() {
            Ok(octets) => octets,
            Err(error) => {
                tracing::warn!(?error, "failed to serialise forwarded request");
                return replies;
            }
        };
        if let Err(error) = socket.send(&octets).await {
            tracing::warn!(upstream = %self.upstream, ?error, "failed to send forwarded request");
            return replies;
        }

        loop {
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            match timeout(READ_DEADLINE, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => match Message::from_octets(&buf[..n]) {
                    Ok(message) => {
                        let truncated = message.header.is_truncated;
                        replies.push(message);
                        if truncated {
                            continue;
                        }
                        break;
                    }
                    Err(error) => {
                        tracing::debug!(?error, "malformed reply from upstream");
                        break;
                    }
                },
                Ok(Err(error)) => {
                    tracing::warn!(upstream = %self.upstream, ?error, "forwarder socket error");
                    break;
                }
                Err(_elapsed) => {
                    tracing::debug!(upstream = %self.upstream, "forwarder read deadline elapsed");
                    break;
                }
            }
        }

        replies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::domain;
    use dns_types::protocol::types::{QueryClass, QueryType, RecordClass, RecordType};
    use tokio::net::UdpSocket as TestSocket;

    fn a_question(name: &str) -> Question {
        Question {
            name: domain(name),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        }
    }

    #[test]
    fn dotted_ipv4_rewritten_to_reverse_ptr_query() {
        let question = a_question("1.2.3.4");
        let rewritten = request_question(&question);
        assert_eq!(domain("4.3.2.1.in-addr.arpa."), rewritten.name);
        assert_eq!(QueryType::Record(RecordType::PTR), rewritten.qtype);
    }

    #[test]
    fn ordinary_name_passes_through_unchanged() {
        let question = a_question("example.com.");
        assert_eq!(question, request_question(&question));
    }

    #[tokio::test]
    async fn collects_single_reply() {
        let server = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (n, client) = server.recv_from(&mut buf).await.unwrap();
            let request = Message::from_octets(&buf[..n]).unwrap();
            let mut response = request.make_response();
            response.answers = vec![dns_types::protocol::types::test_util::a_record(
                "example.com.",
                "1.2.3.4".parse().unwrap(),
            )];
            server.send_to(&response.into_octets().unwrap(), client).await.unwrap();
        });

        let forwarder = Forwarder::new(server_addr);
        let replies = forwarder.query(&a_question("example.com.")).await;
        handle.await.unwrap();

        assert_eq!(1, replies.len());
        assert_eq!(1, replies[0].answers.len());
    }

    #[tokio::test]
    async fn times_out_with_no_replies() {
        let server = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        // never replies

        let forwarder = Forwarder::new(server_addr);
        let replies = forwarder.query(&a_question("example.com.")).await;
        assert!(replies.is_empty());
        drop(server);
    }
}
