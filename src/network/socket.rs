//! TCP socket setup
//!
//! Sockets are built with socket2 so that listener and stream options are
//! set before the socket is handed to std or tokio.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::error::NetworkError;

/// Create a non-blocking listening socket
///
/// `SO_REUSEADDR` is set so a restarted server can rebind immediately.
/// A small backlog is enough: only one client is served at a time and
/// later ones wait in the queue until the current one disconnects.
pub fn create_listener(addr: SocketAddr, backlog: i32) -> Result<TcpListener, NetworkError> {
    let bind_err = |e: std::io::Error| NetworkError::BindFailed(format!("{}: {}", addr, e));

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    Ok(socket.into())
}

/// Connect a blocking stream with bounded connect and per-transfer timeouts
///
/// The I/O timeout bounds how long a single read or write can stall, which
/// in turn bounds how long shutdown waits on an in-flight round trip.
pub fn connect_stream(
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
) -> Result<TcpStream, NetworkError> {
    let connect_err = |e: std::io::Error| NetworkError::ConnectionFailed(format!("{}: {}", addr, e));

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(connect_err)?;
    socket
        .connect_timeout(&addr.into(), connect_timeout)
        .map_err(connect_err)?;

    socket.set_nodelay(true)?;
    socket.set_read_timeout(Some(io_timeout))?;
    socket.set_write_timeout(Some(io_timeout))?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_connect_to_listener() {
        let listener = create_listener("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(false).unwrap();

        let mut client =
            connect_stream(addr, Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert!(client.nodelay().unwrap());
    }

    #[test]
    fn test_connect_refused_is_connection_failed() {
        // Grab a free port, then release it so nothing is listening there
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();

        let err = connect_stream(addr, Duration::from_millis(500), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, NetworkError::ConnectionFailed(_)));
    }

    #[test]
    fn test_rebind_after_close() {
        let first = create_listener("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = first.local_addr().unwrap();
        drop(first);

        assert!(create_listener(addr, 1).is_ok());
    }
}
