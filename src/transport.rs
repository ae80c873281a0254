// Criação e configuração de sockets de baixo nível
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{ProbeError, TransportError};

/// Buffer de recepção: cabe qualquer datagrama IPv4.
const RECV_BUF_LEN: usize = 65_536;

/// Envio e recepção com prazo. É a costura entre o laço de sondagem e o SO.
pub trait Transport {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Bloqueia até chegar um datagrama ou o `deadline` passar
    /// (`TransportError::Timeout`).
    fn receive(&mut self, deadline: Instant) -> Result<Vec<u8>, TransportError>;
}

/// Alvo resolvido: nome como digitado e o endereço IPv4 usado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub addr: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// SOCK_RAW: exige root/CAP_NET_RAW, recebe todo o tráfego ICMP do host.
    Raw,
    /// SOCK_DGRAM + IPPROTO_ICMP: ping sem privilégio (Linux, macOS).
    Datagram,
}

/// Resolve o alvo para IPv4. IPv6 não é suportado.
pub fn resolve(host: &str) -> Result<Ipv4Addr, ProbeError> {
    let resolution = |reason: String| ProbeError::Resolution {
        host: host.to_string(),
        reason,
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(addr) => Ok(addr),
            IpAddr::V6(_) => Err(resolution("IPv6 is not supported".to_string())),
        };
    }

    // Porta 0 é ignorada, só interessa o endereço
    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|e| resolution(e.to_string()))?;

    addrs
        .filter_map(|sa| match sa.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| resolution("no IPv4 address found".to_string()))
}

/// Socket ICMP da sessão. Liberado no drop, em qualquer caminho de saída.
pub struct IcmpSocket {
    socket: Socket,
    target: Target,
    dst: SockAddr,
    identifier: u16,
    buf: Vec<u8>,
}

impl IcmpSocket {
    /// Resolve o alvo e cria o socket. Tenta RAW primeiro e, se faltar
    /// privilégio, o socket DGRAM sem privilégio.
    pub fn open(host: &str, identifier: u16) -> Result<Self, ProbeError> {
        let addr = resolve(host)?;
        let target = Target {
            host: host.to_string(),
            addr,
        };
        debug!("resolved {} to {}", target.host, target.addr);

        let (socket, kind) = create_socket()?;
        let dst_sa = SocketAddr::new(IpAddr::V4(addr), 0);

        let identifier = match kind {
            SocketKind::Raw => identifier,
            SocketKind::Datagram => {
                let identifier = bind_identifier(&socket, identifier).map_err(ProbeError::Transport)?;
                // Conectado, o kernel reporta EHOSTUNREACH/ENETUNREACH no recv
                socket.connect(&dst_sa.into()).map_err(ProbeError::Transport)?;
                identifier
            }
        };
        info!("opened {kind:?} ICMP socket to {addr}, identifier {identifier}");

        Ok(Self {
            socket,
            target,
            dst: dst_sa.into(),
            identifier,
            buf: vec![0u8; RECV_BUF_LEN],
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Identifier efetivo. Em sockets DGRAM no Linux o kernel usa a porta
    /// local como identifier e pode ter escolhido outro valor.
    pub fn identifier(&self) -> u16 {
        self.identifier
    }
}

impl Transport for IcmpSocket {
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(frame, &self.dst)
            .map(|_| ())
            .map_err(TransportError::from_os)
    }

    fn receive(&mut self, deadline: Instant) -> Result<Vec<u8>, TransportError> {
        let n = recv_until(&self.socket, &mut self.buf, deadline)?;
        Ok(self.buf[..n].to_vec())
    }
}

/// Leitura bloqueante limitada pelo `deadline`, via SO_RCVTIMEO ajustado ao
/// tempo restante antes de cada leitura.
fn recv_until(socket: &Socket, buf: &mut [u8], deadline: Instant) -> Result<usize, TransportError> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        // SO_RCVTIMEO zerado significa "bloqueia para sempre"
        if remaining < Duration::from_micros(1) {
            return Err(TransportError::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        let mut reader = socket;
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => match TransportError::from_os(e) {
                // Timeout do SO: volta e confere o prazo
                TransportError::Timeout => continue,
                other => return Err(other),
            },
        }
    }
}

fn is_permission_denied(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
        || err.kind() == io::ErrorKind::PermissionDenied
}

fn create_socket() -> Result<(Socket, SocketKind), ProbeError> {
    let raw_err = match Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) {
        Ok(socket) => return Ok((socket, SocketKind::Raw)),
        Err(e) if is_permission_denied(&e) => e,
        Err(e) => return Err(ProbeError::Transport(e)),
    };
    debug!("raw ICMP socket refused ({raw_err}), trying unprivileged datagram socket");

    match Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)) {
        Ok(socket) => Ok((socket, SocketKind::Datagram)),
        Err(e) => {
            debug!("datagram ICMP socket refused: {e}");
            Err(ProbeError::Permission { source: raw_err })
        }
    }
}

/// No Linux a porta local de um socket ICMP DGRAM é o identifier do echo.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_identifier(socket: &Socket, identifier: u16) -> io::Result<u16> {
    let requested = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), identifier);
    if let Err(e) = socket.bind(&requested.into()) {
        if e.raw_os_error() != Some(libc::EADDRINUSE) {
            return Err(e);
        }
        warn!("ICMP identifier {identifier} already in use, letting the kernel choose one");
        let any = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        socket.bind(&any.into())?;
    }

    Ok(socket
        .local_addr()?
        .as_socket()
        .map(|sa| sa.port())
        .unwrap_or(identifier))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_identifier(_socket: &Socket, identifier: u16) -> io::Result<u16> {
    Ok(identifier)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolve_accepts_ipv4_literal() {
        assert_eq!(resolve("192.0.2.7").unwrap(), Ipv4Addr::new(192, 0, 2, 7));
    }

    #[test]
    fn resolve_rejects_ipv6_literal() {
        assert!(matches!(
            resolve("::1"),
            Err(ProbeError::Resolution { .. })
        ));
    }

    #[test]
    fn resolve_fails_for_unknown_host() {
        // .invalid nunca resolve (RFC 6761)
        let err = resolve("no-such-host.invalid").unwrap_err();
        assert!(matches!(err, ProbeError::Resolution { ref host, .. } if host == "no-such-host.invalid"));
    }

    #[test]
    fn open_fails_before_creating_socket_when_unresolvable() {
        assert!(matches!(
            IcmpSocket::open("no-such-host.invalid", 1),
            Err(ProbeError::Resolution { .. })
        ));
    }

    fn loopback_udp() -> (Socket, SockAddr) {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
        let local = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        socket.bind(&local.into()).unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    #[test]
    fn recv_until_past_deadline_times_out_immediately() {
        let (socket, _) = loopback_udp();
        let mut buf = [0u8; 64];
        let started = Instant::now();
        let deadline = started.checked_sub(Duration::from_millis(10)).unwrap_or(started);

        assert!(matches!(
            recv_until(&socket, &mut buf, deadline),
            Err(TransportError::Timeout)
        ));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn recv_until_waits_for_remaining_time_only() {
        let (socket, _) = loopback_udp();
        let mut buf = [0u8; 64];
        let wait = Duration::from_millis(80);
        let started = Instant::now();

        assert!(matches!(
            recv_until(&socket, &mut buf, started + wait),
            Err(TransportError::Timeout)
        ));
        let elapsed = started.elapsed();
        assert!(elapsed >= wait, "returned early after {elapsed:?}");
        assert!(elapsed < wait + Duration::from_millis(500), "overslept {elapsed:?}");
    }

    #[test]
    fn recv_until_returns_datagram_before_deadline() {
        let (socket, addr) = loopback_udp();
        let (sender, _) = loopback_udp();
        sender.send_to(b"echo", &addr).unwrap();

        let mut buf = [0u8; 64];
        let started = Instant::now();
        let n = recv_until(&socket, &mut buf, started + Duration::from_secs(5)).unwrap();

        assert_eq!(&buf[..n], b"echo");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn permission_errors_are_recognised() {
        assert!(is_permission_denied(&io::Error::from_raw_os_error(libc::EPERM)));
        assert!(is_permission_denied(&io::Error::from_raw_os_error(libc::EACCES)));
        assert!(!is_permission_denied(&io::Error::from_raw_os_error(libc::EBADF)));
    }
}
