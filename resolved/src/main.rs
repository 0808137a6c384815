use std::net::{IpAddr, SocketAddr};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing_subscriber::EnvFilter;

use dns_resolver::{Dispatcher, Forwarder, SharedCache};

const DEFAULT_PORT: u16 = 53;
const DEFAULT_FORWARDER: &str = "8.8.8.8";

/// Number of worker tasks draining the accept queue. Small and fixed, per
/// spec §4.7/§5 — this is a LAN-scale resolver, not an internet-facing one.
const WORKER_POOL_SIZE: usize = 4;

/// Classic (non-EDNS0) DNS datagrams are capped at 512 bytes.
const MAX_DATAGRAM_SIZE: usize = 512;

/// How many accepted-but-not-yet-dispatched datagrams the channel between
/// the acceptor and the worker pool can hold before `recv_from` backs up.
const ACCEPT_QUEUE_SIZE: usize = 32;

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// A caching, forwarding DNS resolver for UDP port 53.
///
/// Answers queries from a local cache when possible, and otherwise
/// forwards them to a single upstream recursive resolver, caching the
/// reply for subsequent use.
struct Args {
    /// Port to listen on
    #[clap(short, long, value_parser, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Upstream resolver to forward cache misses to, as host or host:port;
    /// a :port suffix overrides --port for the upstream leg only
    #[clap(short, long, value_parser, default_value = DEFAULT_FORWARDER)]
    forwarder: String,
}

fn begin_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

/// Split a `host` or `host:port` forwarder spec into its parts. IPv6
/// literals are out of scope (this resolver doesn't query upstreams over
/// IPv6), so a bare `rsplit_once(':')` is unambiguous.
fn split_forwarder_spec(spec: &str) -> (&str, Option<u16>) {
    if let Some((host, port)) = spec.rsplit_once(':') {
        if let Ok(port) = port.parse() {
            return (host, Some(port));
        }
    }
    (spec, None)
}

/// Resolve the configured forwarder to a single socket address, via the OS
/// resolver if it isn't already an IP literal. Resolving is done once, at
/// startup: a forwarder that later stops resolving doesn't affect an
/// already-running server.
async fn resolve_forwarder(spec: &str, default_port: u16) -> Option<SocketAddr> {
    let (host, port) = split_forwarder_spec(spec);
    let port = port.unwrap_or(default_port);

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, port));
    }

    match tokio::net::lookup_host((host, port)).await {
        Ok(mut addrs) => addrs.next(),
        Err(error) => {
            tracing::error!(%host, ?error, "could not resolve forwarder address");
            None
        }
    }
}

async fn listen(port: u16, dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    tracing::info!(%port, "binding DNS UDP socket");
    let socket = Arc::new(UdpSocket::bind(("0.0.0.0", port)).await?);

    let (tx, rx) = mpsc::channel::<(Vec<u8>, SocketAddr)>(ACCEPT_QUEUE_SIZE);
    let rx = Arc::new(AsyncMutex::new(rx));

    for worker_id in 0..WORKER_POOL_SIZE {
        let rx = Arc::clone(&rx);
        let socket = Arc::clone(&socket);
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            loop {
                let job = { rx.lock().await.recv().await };
                let Some((bytes, peer)) = job else {
                    tracing::debug!(worker_id, "accept channel closed, worker exiting");
                    break;
                };
                dispatcher.handle_datagram(&socket, peer, &bytes).await;
            }
        });
    }

    // A blocking-with-short-poll accept loop in a synchronous server
    // becomes a plain `.await` here: tokio parks the task until the
    // socket is readable instead of spinning on a timeout.
    loop {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match socket.recv_from(&mut buf).await {
            Ok((n, peer)) => {
                if tx.send((buf[..n].to_vec(), peer)).await.is_err() {
                    tracing::error!("worker pool gone, dropping datagram");
                }
            }
            Err(error) => {
                tracing::warn!(?error, "error receiving UDP datagram");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    begin_logging();

    let (_, upstream_default_port) = split_forwarder_spec(&args.forwarder);
    let upstream = match resolve_forwarder(&args.forwarder, upstream_default_port.unwrap_or(DEFAULT_PORT)).await {
        Some(addr) => addr,
        None => {
            tracing::error!(forwarder = %args.forwarder, "forwarder address did not resolve");
            process::exit(1);
        }
    };
    tracing::info!(%upstream, "resolved forwarder address");

    let dispatcher = Arc::new(Dispatcher::new(SharedCache::new(), Forwarder::new(upstream)));

    if let Err(error) = listen(args.port, dispatcher).await {
        tracing::error!(?error, "could not bind DNS UDP socket");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_port() {
        assert_eq!(("8.8.8.8", None), split_forwarder_spec("8.8.8.8"));
        assert_eq!(("8.8.8.8", Some(5353)), split_forwarder_spec("8.8.8.8:5353"));
        assert_eq!(("dns.example.com", Some(53)), split_forwarder_spec("dns.example.com:53"));
    }
}
