use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Mutex;

use dns_types::protocol::types::{Message, Question, Rcode};
use tokio::net::UdpSocket;

use crate::cache::SharedCache;
use crate::forwarder::Forwarder;

/// The order-insensitive set of a message's questions, used as the
/// in-flight de-duplication key (spec §4.6 step 2). `Question` has no
/// `Ord` impl of its own, so the key is built from the parts that do.
fn dedup_key(questions: &[Question]) -> Vec<(String, u16, u16)> {
    let mut key: Vec<(String, u16, u16)> = questions
        .iter()
        .map(|q| (q.name.to_dotted_string(), q.qtype.into(), q.qclass.into()))
        .collect();
    key.sort();
    key
}

/// Per-datagram worker: de-dup, cache lookup, forwarder call, reply
/// build. One `Dispatcher` is shared by the whole worker pool; it owns no
/// per-worker state, only the shared cache and in-flight set.
pub struct Dispatcher {
    cache: SharedCache,
    forwarder: Forwarder,
    in_flight: Mutex<HashSet<Vec<(String, u16, u16)>>>,
}

impl Dispatcher {
    pub fn new(cache: SharedCache, forwarder: Forwarder) -> Self {
        Dispatcher {
            cache,
            forwarder,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Handle one client datagram end to end: parse, de-dup, resolve
    /// (from cache or upstream), and send the reply/replies back to
    /// `client` on `socket`. See spec §4.6 for the exact state machine.
    pub async fn handle_datagram(&self, socket: &UdpSocket, client: SocketAddr, bytes: &[u8]) {
        let message = match Message::from_octets(bytes) {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(%client, ?error, "dropping unparseable datagram");
                return;
            }
        };

        let key = dedup_key(&message.questions);
        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set mutex poisoned");
            if !in_flight.insert(key.clone()) {
                tracing::debug!(%client, id = message.header.id, "dropping duplicate in-flight query");
                return;
            }
        }

        self.resolve_and_reply(socket, client, message).await;

        self.in_flight
            .lock()
            .expect("in-flight set mutex poisoned")
            .remove(&key);
    }

    async fn resolve_and_reply(&self, socket: &UdpSocket, client: SocketAddr, message: Message) {
        let mut answers = Vec::new();
        let mut authority = Vec::new();
        let mut additional = Vec::new();

        for question in &message.questions {
            let hit = {
                let mut cache = self.cache.lock();
                cache.lookup(question)
            };

            if !hit.is_miss() {
                answers.extend(hit.answers);
                authority.extend(hit.authority);
                additional.extend(hit.additional);
                continue;
            }

            // Cache miss: the forwarder's reply stands in for the whole
            // response, so once we forward we stop processing any
            // further questions in this datagram.
            let replies = self.forwarder.query(question).await;
            for mut reply in replies {
                reply.header.id = message.header.id;

                if reply.header.rcode == Rcode::NoError {
                    self.cache.lock().insert(&reply);
                }

                match reply.into_octets() {
                    Ok(octets) => {
                        if let Err(error) = socket.send_to(&octets, client).await {
                            tracing::warn!(%client, ?error, "failed to send forwarded reply");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(?error, "failed to serialise forwarded reply");
                    }
                }
            }
            return;
        }

        // Every question was served from cache: build and send a single
        // aggregated reply.
        let mut response = message.make_response();
        response.answers = answers;
        response.authority = authority;
        response.additional = additional;

        match response.into_octets() {
            Ok(octets) => {
                if let Err(error) = socket.send_to(&octets, client).await {
                    tracing::warn!(%client, ?error, "failed to send cached reply");
                }
            }
            Err(error) => {
                tracing::warn!(?error, "failed to serialise cached reply");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::{a_record, domain};
    use dns_types::protocol::types::{Header, Opcode, QueryClass, QueryType, RecordClass, RecordType};

    fn query_message(id: u16, name: &str) -> Message {
        Message {
            header: Header {
                id,
                is_response: false,
                opcode: Opcode::Query,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: false,
                rcode: Rcode::NoError,
            },
            questions: vec![Question {
                name: domain(name),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            }],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    #[tokio::test]
    async fn cache_hit_answers_without_forwarding() {
        let cache = SharedCache::new();
        let rr = a_record("example.com.", "9.9.9.9".parse().unwrap());
        let query = query_message(0x1234, "example.com.");
        cache.lock().insert(&Message {
            answers: vec![rr.clone()],
            ..query.clone()
        });

        // An upstream nobody is listening on: if the dispatcher tried to
        // forward this, the test would hang on the 1s read deadline.
        let forwarder = Forwarder::new("127.0.0.1:1".parse().unwrap());
        let dispatcher = Dispatcher::new(cache, forwarder);

        let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_socket.local_addr().unwrap();

        let octets = query.into_octets().unwrap();
        dispatcher
            .handle_datagram(&server_socket, client_addr, &octets)
            .await;

        let mut buf = [0u8; 512];
        let n = client_socket.recv(&mut buf).await.unwrap();
        let reply = Message::from_octets(&buf[..n]).unwrap();
        assert_eq!(0x1234, reply.header.id);
        assert_eq!(vec![rr], reply.answers);
    }

    #[test]
    fn dedup_key_is_order_insensitive() {
        let a = Question {
            name: domain("a.example."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        let b = Question {
            name: domain("b.example."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        assert_eq!(dedup_key(&[a.clone(), b.clone()]), dedup_key(&[b, a]));
    }
}
