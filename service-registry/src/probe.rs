use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use shared::protocol::DEFAULT_PROBE_TIMEOUT_MS;
use shared::types::ServiceDescriptor;

/// Address probed when a service has no bind address configured.
const FALLBACK_HOST: &str = "127.0.0.1";

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Where and how to probe a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        let host = if descriptor.bind_address.is_empty() {
            FALLBACK_HOST.to_string()
        } else {
            descriptor.bind_address.clone()
        };

        Self {
            scheme: descriptor.protocol.clone(),
            host,
            port: descriptor.port,
        }
    }

    /// `host:port`, with IPv6 literals wrapped in brackets.
    pub fn address(&self) -> String {
        match self.host.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]:{}", self.host, self.port),
            Err(_) => format!("{}:{}", self.host, self.port),
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.address())
    }
}

/// Connects to a target and reports whether anything answered.
///
/// Failure to connect is the normal "service down" outcome, so probers
/// return `false` rather than an error.
pub trait Prober {
    fn probe(&self, target: &ProbeTarget) -> bool;
}

impl<T: Prober + ?Sized> Prober for Arc<T> {
    fn probe(&self, target: &ProbeTarget) -> bool {
        (**self).probe(target)
    }
}

/// Blocking socket prober with a fixed connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct SocketProber {
    timeout: Duration,
}

impl SocketProber {
    /// A zero timeout is raised to 1 ms; the socket layer rejects zero.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: timeout.max(MIN_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn connect(&self, target: &ProbeTarget) -> std::io::Result<()> {
        let addr = resolve(target)?;

        match target.scheme.as_str() {
            "tcp" => {
                let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
                let _ = stream.shutdown(std::net::Shutdown::Both);
                Ok(())
            }
            "udp" => {
                let local: IpAddr = if addr.is_ipv6() {
                    Ipv6Addr::UNSPECIFIED.into()
                } else {
                    Ipv4Addr::UNSPECIFIED.into()
                };
                let socket = UdpSocket::bind(SocketAddr::new(local, 0))?;
                socket.connect(addr)
            }
            other => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("unsupported scheme {other:?}"),
            )),
        }
    }
}

impl Default for SocketProber {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
    }
}

impl Prober for SocketProber {
    fn probe(&self, target: &ProbeTarget) -> bool {
        match self.connect(target) {
            Ok(()) => {
                tracing::debug!("Probe {} succeeded", target);
                true
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", target, e);
                false
            }
        }
    }
}

fn resolve(target: &ProbeTarget) -> std::io::Result<SocketAddr> {
    target
        .address()
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))
}
