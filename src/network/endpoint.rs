//! Socket endpoint wrapper
//!
//! Satu tipe untuk dua jenis socket yang di-manage reactor:
//! - Listener: accept koneksi masuk
//! - Stream: koneksi dua arah dengan buffered non-blocking read/write
//!
//! Setup socket (non-blocking, TCP_NODELAY, kernel buffer sizes) terjadi
//! sekali saat endpoint dibuat, tidak ada di hot path.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::unix::io::{AsRawFd, RawFd};

use mio::event::Source;
use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};

/// Kernel socket buffer size (256KB) - sama untuk send dan receive
const SOCKET_BUFFER_SIZE: libc::c_int = 256 * 1024;

/// Satu network endpoint yang bisa di-register ke reactor.
pub enum Endpoint {
    Listener(TcpListener),
    Stream(TcpStream),
}

impl Endpoint {
    /// Wrap listening socket. Socket di-set non-blocking.
    pub fn listener(listener: std::net::TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Endpoint::Listener(TcpListener::from_std(listener)))
    }

    /// Wrap connected stream. Non-blocking + TCP_NODELAY + buffer tuning.
    pub fn stream(stream: std::net::TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let stream = TcpStream::from_std(stream);
        stream.set_nodelay(true)?;
        tune_socket_buffers(stream.as_raw_fd());
        Ok(Endpoint::Stream(stream))
    }

    /// Wrap stream hasil accept (sudah non-blocking dari listener).
    ///
    /// Tuning failure di-ignore - tidak semua platform support ukuran ini.
    pub(crate) fn accepted(stream: TcpStream) -> Self {
        stream.set_nodelay(true).ok();
        tune_socket_buffers(stream.as_raw_fd());
        Endpoint::Stream(stream)
    }

    /// Descriptor untuk endpoint ini - unik selama socket hidup.
    #[inline]
    pub fn raw_fd(&self) -> RawFd {
        match self {
            Endpoint::Listener(listener) => listener.as_raw_fd(),
            Endpoint::Stream(stream) => stream.as_raw_fd(),
        }
    }

    #[inline]
    pub fn is_listener(&self) -> bool {
        matches!(self, Endpoint::Listener(_))
    }

    /// Readiness interest untuk endpoint ini: listener cuma perlu accept
    /// (readable), stream perlu read dan write.
    pub(crate) fn interest(&self) -> Interest {
        match self {
            Endpoint::Listener(_) => Interest::READABLE,
            Endpoint::Stream(_) => Interest::READABLE | Interest::WRITABLE,
        }
    }

    /// Non-blocking read. `Ok(0)` berarti peer sudah close dengan rapi.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Endpoint::Stream(stream) => stream.read(buf),
            Endpoint::Listener(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot read from a listening socket",
            )),
        }
    }

    /// Non-blocking write.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Endpoint::Stream(stream) => stream.write(buf),
            Endpoint::Listener(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write to a listening socket",
            )),
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Endpoint::Stream(stream) => stream.write_all(buf),
            Endpoint::Listener(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write to a listening socket",
            )),
        }
    }

    /// Accept satu koneksi masuk. `WouldBlock` berarti backlog kosong.
    pub fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        match self {
            Endpoint::Listener(listener) => listener.accept(),
            Endpoint::Stream(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot accept on a connected stream",
            )),
        }
    }

    /// Ambil pending socket error (SO_ERROR). Sekali dibaca, error hilang.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        match self {
            Endpoint::Listener(listener) => listener.take_error(),
            Endpoint::Stream(stream) => stream.take_error(),
        }
    }
}

impl Source for Endpoint {
    fn register(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Endpoint::Listener(listener) => listener.register(registry, token, interests),
            Endpoint::Stream(stream) => stream.register(registry, token, interests),
        }
    }

    fn reregister(&mut self, registry: &Registry, token: Token, interests: Interest) -> io::Result<()> {
        match self {
            Endpoint::Listener(listener) => listener.reregister(registry, token, interests),
            Endpoint::Stream(stream) => stream.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            Endpoint::Listener(listener) => listener.deregister(registry),
            Endpoint::Stream(stream) => stream.deregister(registry),
        }
    }
}

/// Set kernel send/receive buffer untuk throughput.
///
/// Ignore errors - not all platforms support this.
fn tune_socket_buffers(fd: RawFd) {
    unsafe {
        let optval: libc::c_int = SOCKET_BUFFER_SIZE;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = Endpoint::listener(listener).unwrap();

        assert!(endpoint.is_listener());
        assert!(endpoint.raw_fd() >= 0);
        assert_eq!(endpoint.interest(), Interest::READABLE);
    }

    #[test]
    fn test_read_from_listener_is_rejected() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut endpoint = Endpoint::listener(listener).unwrap();

        let mut buf = [0u8; 8];
        let err = endpoint.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_stream_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();

        let endpoint = Endpoint::stream(client).unwrap();
        assert!(!endpoint.is_listener());
        assert_eq!(endpoint.interest(), Interest::READABLE | Interest::WRITABLE);
        assert!(endpoint.take_error().unwrap().is_none());
    }
}
