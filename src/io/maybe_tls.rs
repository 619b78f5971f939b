use std::io::{IoSlice, IoSliceMut};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_std::io::{self, Read, Write};
use async_std::net::{Shutdown, TcpStream};

use crate::error::Error;
use crate::options::SocketOptions;

use self::Inner::*;

/// A TCP stream that may or may not have been upgraded to TLS.
///
/// The framer and command phase never need to know which: both variants
/// implement `Read`/`Write` identically. Only the TLS negotiator
/// ([`crate::tls`]) distinguishes them, by calling [`MaybeTlsStream::upgrade`]
/// partway through the connection phase.
pub struct MaybeTlsStream {
    inner: Inner,
}

enum Inner {
    Plain(TcpStream),
    Tls(async_native_tls::TlsStream<TcpStream>),
    Upgrading,
}

impl MaybeTlsStream {
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Option<Duration>,
        socket_options: SocketOptions,
    ) -> crate::Result<Self> {
        let connect = TcpStream::connect((host, port));

        let conn = match connect_timeout {
            Some(timeout) => async_std::future::timeout(timeout, connect)
                .await
                .map_err(|_| Error::Io(std::io::ErrorKind::TimedOut.into()))??,
            None => connect.await?,
        };

        conn.set_nodelay(socket_options.tcp_nodelay)?;

        if let Some(keepalive) = socket_options.tcp_keepalive {
            let sock_ref = socket2::SockRef::from(&conn);
            sock_ref.set_tcp_keepalive(&socket2::TcpKeepalive::new().with_time(keepalive))?;
        }

        Ok(Self {
            inner: Inner::Plain(conn),
        })
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }

    pub async fn upgrade(
        &mut self,
        host: &str,
        connector: async_native_tls::TlsConnector,
    ) -> crate::Result<()> {
        let conn = match std::mem::replace(&mut self.inner, Upgrading) {
            Plain(conn) => conn,
            Tls(_) => return Err(Error::Tls("connection already upgraded".into())),
            Upgrading => return Err(Error::Tls("connection already failed to upgrade".into())),
        };

        self.inner = Tls(connector.connect(host, conn).await?);

        Ok(())
    }

    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self.inner {
            Plain(ref conn) => conn.shutdown(how),
            Tls(ref conn) => conn.get_ref().shutdown(how),
            // already closed
            Upgrading => Ok(()),
        }
    }
}

macro_rules! forward_pin (
    ($self:ident.$method:ident($($arg:ident),*)) => (
        match &mut $self.inner {
            Plain(ref mut conn) => Pin::new(conn).$method($($arg),*),
            Tls(ref mut conn) => Pin::new(conn).$method($($arg),*),
            Upgrading => Err(io::Error::new(io::ErrorKind::Other, "connection broken; TLS upgrade failed")).into(),
        }
    )
);

impl Read for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        forward_pin!(self.poll_read(cx, buf))
    }

    fn poll_read_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context,
        bufs: &mut [IoSliceMut],
    ) -> Poll<io::Result<usize>> {
        forward_pin!(self.poll_read_vectored(cx, bufs))
    }
}

impl Write for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        forward_pin!(self.poll_write(cx, buf))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        forward_pin!(self.poll_flush(cx))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        forward_pin!(self.poll_close(cx))
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context,
        bufs: &[IoSlice],
    ) -> Poll<io::Result<usize>> {
        forward_pin!(self.poll_write_vectored(cx, bufs))
    }
}
