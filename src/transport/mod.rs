//! Byte-stream transports with out-of-band descriptor passing.
//!
//! During authentication a [`Transport`] is driven by a single task. Once
//! the binary phase begins it is split into a read half and a write half
//! so the inbound and outbound loops can run concurrently; for unix
//! sockets both halves share the descriptor through an `Arc`.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::trace;

use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr};

use crate::error::ErrorKind;
use crate::message::{frame_length, FIXED_HEADER_LENGTH};
use crate::value::UnixFd;
use crate::{Address, Error, Result};

/// The longest line tolerated during the authentication phase.
const MAX_LINE_LENGTH: usize = 16 * 1024;

/// The largest chunk requested from the socket in one read.
const CHUNK: usize = 4096;

/// The read half of a transport, sole owner of the receive buffer and the
/// queue of descriptors not yet claimed by a decoded message.
pub(crate) struct ReadTransport {
    stream: ReadStream,
    recv: Vec<u8>,
    fds: VecDeque<UnixFd>,
}

enum ReadStream {
    Unix(Arc<AsyncFd<UnixStream>>),
    Tcp(OwnedReadHalf),
    Generic(Box<dyn AsyncRead + Send + Unpin>),
}

/// The write half of a transport.
pub(crate) struct WriteTransport {
    stream: WriteStream,
    /// Whether `NEGOTIATE_UNIX_FD` has succeeded.
    unix_fds: bool,
}

enum WriteStream {
    Unix(Arc<AsyncFd<UnixStream>>),
    Tcp(OwnedWriteHalf),
    Generic(Box<dyn AsyncWrite + Send + Unpin>),
}

/// A duplex byte stream speaking the D-Bus framing.
pub(crate) struct Transport {
    read: ReadTransport,
    write: WriteTransport,
}

impl Transport {
    /// Connect to the first reachable address in the list.
    pub(crate) async fn connect_list(addresses: &[Address]) -> Result<Self> {
        let mut last = None;

        for address in addresses {
            match Self::connect(address).await {
                Ok(transport) => return Ok(transport),
                Err(error) => last = Some(error),
            }
        }

        Err(last.unwrap_or_else(|| Error::new(ErrorKind::NoAvailableAddress)))
    }

    /// Connect to a single address.
    pub(crate) async fn connect(address: &Address) -> Result<Self> {
        match address {
            Address::Unix(path) => Self::connect_unix(path),
            Address::UnixAbstract(name) => Self::connect_abstract(name),
            Address::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                Ok(Self::from_tcp(stream))
            }
            Address::NonceTcp {
                host,
                port,
                noncefile,
            } => {
                let nonce = std::fs::read(noncefile)?;
                let mut stream = TcpStream::connect((host.as_str(), *port)).await?;
                // The nonce goes over the wire before anything else,
                // including the initial nul byte.
                stream.write_all(&nonce).await?;
                Ok(Self::from_tcp(stream))
            }
        }
    }

    fn connect_unix(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)?;
        Self::from_unix_stream(stream)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn connect_abstract(name: &[u8]) -> Result<Self> {
        use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};

        let fd = socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC,
            None,
        )
        .map_err(io::Error::from)?;

        let addr = UnixAddr::new_abstract(name).map_err(io::Error::from)?;
        connect(fd.as_raw_fd(), &addr).map_err(io::Error::from)?;

        Self::from_unix_stream(UnixStream::from(fd))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn connect_abstract(_: &[u8]) -> Result<Self> {
        Err(Error::new(ErrorKind::InvalidAddress))
    }

    /// Construct a transport over an already connected unix stream.
    pub(crate) fn from_unix_stream(stream: UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        let fd = Arc::new(AsyncFd::new(stream)?);

        Ok(Self {
            read: ReadTransport {
                stream: ReadStream::Unix(fd.clone()),
                recv: Vec::new(),
                fds: VecDeque::new(),
            },
            write: WriteTransport {
                stream: WriteStream::Unix(fd),
                unix_fds: false,
            },
        })
    }

    /// Construct a transport over any connected duplex stream.
    ///
    /// No descriptors, no credentials; authentication is limited to
    /// mechanisms that need neither.
    pub(crate) fn from_duplex<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read, write) = tokio::io::split(stream);

        Self {
            read: ReadTransport {
                stream: ReadStream::Generic(Box::new(read)),
                recv: Vec::new(),
                fds: VecDeque::new(),
            },
            write: WriteTransport {
                stream: WriteStream::Generic(Box::new(write)),
                unix_fds: false,
            },
        }
    }

    fn from_tcp(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();

        Self {
            read: ReadTransport {
                stream: ReadStream::Tcp(read),
                recv: Vec::new(),
                fds: VecDeque::new(),
            },
            write: WriteTransport {
                stream: WriteStream::Tcp(write),
                unix_fds: false,
            },
        }
    }

    /// Split into independently owned halves for the I/O loops.
    pub(crate) fn split(self) -> (ReadTransport, WriteTransport) {
        (self.read, self.write)
    }

    /// Test if the transport is capable of passing unix descriptors.
    pub(crate) fn supports_unix_fds(&self) -> bool {
        matches!(self.read.stream, ReadStream::Unix(..))
    }

    /// Record that `NEGOTIATE_UNIX_FD` has been agreed.
    pub(crate) fn enable_unix_fds(&mut self) {
        self.write.enable_unix_fds();
    }

    /// Test if descriptor passing has been negotiated.
    #[cfg(test)]
    pub(crate) fn unix_fds_enabled(&self) -> bool {
        self.write.unix_fds
    }

    /// The uid of the peer, where the platform exposes it.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub(crate) fn peer_uid(&self) -> Option<u32> {
        use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};

        match &self.read.stream {
            ReadStream::Unix(fd) => getsockopt(fd.get_ref(), PeerCredentials)
                .ok()
                .map(|creds| creds.uid()),
            _ => None,
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub(crate) fn peer_uid(&self) -> Option<u32> {
        None
    }

    /// Send the single nul byte which starts the authentication phase.
    ///
    /// On platforms where the reference bus requires it, this is the point
    /// at which credentials travel as ancillary data; on Linux the kernel
    /// provides them through `SO_PEERCRED` instead.
    pub(crate) async fn send_null_byte(&mut self) -> Result<()> {
        self.write.send_bytes(b"\0").await
    }

    /// Consume the nul byte a client sends before its first command.
    pub(crate) async fn read_null_byte(&mut self) -> Result<()> {
        while self.read.recv.is_empty() {
            self.read.fill_some(1).await?;
        }

        if self.read.recv.remove(0) != 0 {
            return Err(Error::new(ErrorKind::InvalidSasl));
        }

        Ok(())
    }

    /// Send one CR LF terminated line of the authentication protocol.
    pub(crate) async fn send_line(&mut self, line: &[u8]) -> Result<()> {
        self.write.send_line(line).await
    }

    /// Read one CR LF terminated line of the authentication protocol.
    pub(crate) async fn read_line(&mut self) -> Result<Vec<u8>> {
        self.read.read_line().await
    }

    #[cfg(test)]
    pub(crate) async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write.send_bytes(bytes).await
    }

    #[cfg(test)]
    pub(crate) async fn send_frame(&mut self, frame: &[u8], fds: &[UnixFd]) -> Result<()> {
        self.write.send_frame(frame, fds).await
    }

    #[cfg(test)]
    pub(crate) async fn read_frame(&mut self) -> Result<(Vec<u8>, &mut VecDeque<UnixFd>)> {
        self.read.read_frame().await
    }
}

impl ReadTransport {
    /// Read one CR LF terminated line. The terminator is stripped.
    pub(crate) async fn read_line(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(n) = self.recv.iter().position(|&b| b == b'\n') {
                let mut line = self.recv.drain(..n + 1).collect::<Vec<u8>>();

                // Strip the LF and an optional preceding CR.
                line.pop();

                if line.last() == Some(&b'\r') {
                    line.pop();
                }

                trace!(line = %crate::lossy_str::LossyStr::new(&line), "sasl recv");
                return Ok(line);
            }

            if self.recv.len() > MAX_LINE_LENGTH {
                return Err(Error::new(ErrorKind::SaslLineTooLong));
            }

            self.fill_some(CHUNK).await?;
        }
    }

    /// Read one complete message frame.
    ///
    /// Reads are bounded by the frame length so that ancillary data never
    /// crosses a frame boundary unobserved; the returned queue holds the
    /// descriptors received so far, to be claimed by decoding.
    pub(crate) async fn read_frame(&mut self) -> Result<(Vec<u8>, &mut VecDeque<UnixFd>)> {
        while self.recv.len() < FIXED_HEADER_LENGTH {
            let needed = FIXED_HEADER_LENGTH - self.recv.len();
            self.fill_some(needed).await?;
        }

        let total = match frame_length(&self.recv)? {
            Some(total) => total,
            None => return Err(Error::new(ErrorKind::InvalidProtocol)),
        };

        while self.recv.len() < total {
            let needed = total - self.recv.len();
            self.fill_some(needed).await?;
        }

        let frame = self.recv.drain(..total).collect::<Vec<u8>>();
        Ok((frame, &mut self.fds))
    }

    /// Read up to `max` bytes into the receive buffer, collecting any
    /// ancillary descriptors into the pending queue.
    async fn fill_some(&mut self, max: usize) -> Result<()> {
        let max = max.min(CHUNK);
        let start = self.recv.len();
        self.recv.resize(start + max, 0);

        let result = match &mut self.stream {
            ReadStream::Unix(fd) => {
                let recv = &mut self.recv[start..];
                let fds = &mut self.fds;
                readable_io(fd, |stream| recv_with_fds(stream, recv, fds)).await
            }
            ReadStream::Tcp(stream) => stream.read(&mut self.recv[start..]).await,
            ReadStream::Generic(stream) => stream.read(&mut self.recv[start..]).await,
        };

        match result {
            Ok(0) => {
                self.recv.truncate(start);
                Err(Error::from(io::Error::from(io::ErrorKind::UnexpectedEof)))
            }
            Ok(n) => {
                self.recv.truncate(start + n);
                Ok(())
            }
            Err(error) => {
                self.recv.truncate(start);
                Err(error.into())
            }
        }
    }
}

impl WriteTransport {
    /// Record that `NEGOTIATE_UNIX_FD` has been agreed.
    pub(crate) fn enable_unix_fds(&mut self) {
        self.unix_fds = true;
    }

    /// Send one CR LF terminated line of the authentication protocol.
    pub(crate) async fn send_line(&mut self, line: &[u8]) -> Result<()> {
        trace!(line = %crate::lossy_str::LossyStr::new(line), "sasl send");

        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line);
        bytes.extend_from_slice(b"\r\n");
        self.send_bytes(&bytes).await
    }

    /// Write raw bytes without descriptors.
    pub(crate) async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;

        while written < bytes.len() {
            written += self.send_raw(&bytes[written..], &[]).await?;
        }

        Ok(())
    }

    /// Send one message frame and its descriptors.
    ///
    /// The descriptors ride with the first chunk in a single system call,
    /// which is what keeps them associated with this frame on the
    /// receiving side.
    pub(crate) async fn send_frame(&mut self, frame: &[u8], fds: &[UnixFd]) -> Result<()> {
        if !fds.is_empty() && !self.unix_fds {
            return Err(Error::new(ErrorKind::FdsNotSupported));
        }

        let mut written = self.send_raw(frame, fds).await?;

        while written < frame.len() {
            written += self.send_raw(&frame[written..], &[]).await?;
        }

        Ok(())
    }

    /// Write bytes and descriptors in one system call, returning the
    /// number of bytes accepted.
    async fn send_raw(&mut self, bytes: &[u8], fds: &[UnixFd]) -> Result<usize> {
        match &mut self.stream {
            WriteStream::Unix(fd) => {
                let n = writable_io(fd, |stream| send_with_fds(stream, bytes, fds)).await?;
                Ok(n)
            }
            WriteStream::Tcp(stream) => {
                if !fds.is_empty() {
                    return Err(Error::new(ErrorKind::FdsNotSupported));
                }

                stream.write_all(bytes).await?;
                Ok(bytes.len())
            }
            WriteStream::Generic(stream) => {
                if !fds.is_empty() {
                    return Err(Error::new(ErrorKind::FdsNotSupported));
                }

                stream.write_all(bytes).await?;
                Ok(bytes.len())
            }
        }
    }
}

/// Run a read-readiness guarded operation, retrying when it would block.
async fn readable_io<R>(
    fd: &AsyncFd<UnixStream>,
    mut op: impl FnMut(&UnixStream) -> io::Result<R>,
) -> io::Result<R> {
    loop {
        let mut guard = fd.readable().await?;

        match guard.try_io(|inner| op(inner.get_ref())) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

/// Run a write-readiness guarded operation, retrying when it would block.
async fn writable_io<R>(
    fd: &AsyncFd<UnixStream>,
    mut op: impl FnMut(&UnixStream) -> io::Result<R>,
) -> io::Result<R> {
    loop {
        let mut guard = fd.writable().await?;

        match guard.try_io(|inner| op(inner.get_ref())) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

/// Receive bytes and descriptors off the socket.
///
/// Every ancillary byte must be read along with the data; a truncated
/// control message would silently leak descriptors, so `MSG_CTRUNC` is
/// fatal.
fn recv_with_fds(
    stream: &UnixStream,
    buf: &mut [u8],
    fds: &mut VecDeque<UnixFd>,
) -> io::Result<usize> {
    let mut iov = [io::IoSliceMut::new(buf)];
    let mut cmsg = nix::cmsg_space!([std::os::fd::RawFd; 16]);

    let msg = recvmsg::<UnixAddr>(
        stream.as_raw_fd(),
        &mut iov,
        Some(&mut cmsg),
        MsgFlags::MSG_CMSG_CLOEXEC,
    )
    .map_err(io::Error::from)?;

    if msg.flags.contains(MsgFlags::MSG_CTRUNC) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "control message truncated while receiving descriptors",
        ));
    }

    let mut received = 0;

    for cmsg in msg.cmsgs().map_err(io::Error::from)? {
        if let ControlMessageOwned::ScmRights(raw) = cmsg {
            for raw in raw {
                // SAFETY: The kernel hands ownership of every received
                // descriptor to this process.
                fds.push_back(UnixFd::new(unsafe { OwnedFd::from_raw_fd(raw) }));
                received += 1;
            }
        }
    }

    if received > 0 {
        trace!(received, "descriptors received");
    }

    Ok(msg.bytes)
}

/// Send bytes with the given descriptors attached as `SCM_RIGHTS`.
fn send_with_fds(stream: &UnixStream, bytes: &[u8], fds: &[UnixFd]) -> io::Result<usize> {
    let iov = [io::IoSlice::new(bytes)];

    let raw = fds.iter().map(|fd| fd.as_raw_fd()).collect::<Vec<_>>();

    let cmsgs = if raw.is_empty() {
        Vec::new()
    } else {
        vec![ControlMessage::ScmRights(&raw)]
    };

    sendmsg::<UnixAddr>(stream.as_raw_fd(), &iov, &cmsgs, MsgFlags::empty(), None)
        .map_err(io::Error::from)
}
