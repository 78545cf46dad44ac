//! Per-Connection Driver
//!
//! One [`ConnectionHandler`] runs per accepted TCP connection, inside its own
//! tokio task. It owns the socket, a read buffer, and a protocol decoder, and
//! loops: decode frames out of the buffer, execute them, write responses,
//! read more bytes when the buffer runs dry.
//!
//! Responses for pipelined commands are written in arrival order, so a client
//! that batches commands gets its replies in the order it sent them.

use crate::commands::CommandHandler;
use crate::protocol::{CommandDecoder, Frame};
use crate::stats::ServerStats;
use crate::storage::MAX_VALUE_SIZE;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// Initial read buffer capacity; grows on demand.
const INITIAL_BUFFER_SIZE: usize = 4 * 1024;

/// Hard cap on buffered, not-yet-decoded input. Payloads stream through the
/// decoder, so in practice this bounds a single command plus one in-limit
/// data block.
const MAX_BUFFER_SIZE: usize = MAX_VALUE_SIZE + 8 * 1024;

/// Errors that terminate a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client closed the socket between commands. Not a fault.
    #[error("client disconnected")]
    ClientDisconnected,

    /// The socket closed while a command was partially received.
    #[error("connection closed mid-command")]
    UnexpectedEof,

    /// A single command line outgrew the buffer cap.
    #[error("input exceeds maximum buffer size")]
    BufferFull,
}

/// Drives the read-decode-execute-respond loop for one client.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    decoder: CommandDecoder,
    handler: CommandHandler,
}

impl ConnectionHandler {
    pub fn new(stream: TcpStream, addr: SocketAddr, handler: CommandHandler) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: CommandDecoder::new(),
            handler,
        }
    }

    /// Serves the connection until the client quits, disconnects, or an I/O
    /// error occurs.
    pub async fn run(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.decoder.decode(&mut self.buffer) {
                trace!(addr = %self.addr, ?frame, "decoded frame");

                if matches!(frame, Frame::Quit) {
                    debug!(addr = %self.addr, "client quit");
                    // replies to commands pipelined ahead of quit must still
                    // reach the client before the socket closes
                    self.stream.flush().await?;
                    return Ok(());
                }

                let response = self.handler.execute(frame);
                if !response.is_empty() {
                    self.stream.write_all(&response.serialize()).await?;
                }
            }
            // all buffered responses go out before we block on the socket
            self.stream.flush().await?;
            self.read_more_data().await?;
        }
    }

    /// Reads at least one byte into the buffer, or reports why it can't.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        let n = self.stream.read_buf(&mut self.buffer).await?;
        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            return Err(ConnectionError::UnexpectedEof);
        }
        Ok(())
    }
}

/// Entry point spawned for each accepted connection.
///
/// Maintains the connection counters and logs the outcome; never panics the
/// task on a misbehaving client.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handler: CommandHandler,
    stats: Arc<ServerStats>,
) {
    stats.connection_opened();
    debug!(%addr, "connection opened");

    let mut connection = ConnectionHandler::new(stream, addr, handler);
    match connection.run().await {
        Ok(()) | Err(ConnectionError::ClientDisconnected) => {
            debug!(%addr, "connection closed");
        }
        Err(err) => {
            warn!(%addr, error = %err, "connection terminated");
        }
    }

    stats.connection_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use std::sync::atomic::Ordering;
    use tokio::net::TcpListener;

    async fn spawn_server() -> (SocketAddr, Arc<ServerStats>) {
        let stats = Arc::new(ServerStats::new());
        let store = Arc::new(Store::new(Arc::clone(&stats)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            loop {
                let (socket, peer) = listener.accept().await.unwrap();
                let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&server_stats));
                tokio::spawn(handle_connection(
                    socket,
                    peer,
                    handler,
                    Arc::clone(&server_stats),
                ));
            }
        });

        (addr, stats)
    }

    /// Writes `input` and reads until the reply ends with `until`.
    async fn send_and_read(stream: &mut TcpStream, input: &[u8], until: &[u8]) -> Vec<u8> {
        stream.write_all(input).await.unwrap();
        stream.flush().await.unwrap();

        let mut reply = Vec::new();
        let mut chunk = [0u8; 4096];
        while !reply.ends_with(until) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before full reply");
            reply.extend_from_slice(&chunk[..n]);
        }
        reply
    }

    #[tokio::test]
    async fn test_set_and_get_over_tcp() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let reply = send_and_read(&mut client, b"set name 7 0 4\r\nAriz\r\n", b"\r\n").await;
        assert_eq!(reply, b"STORED\r\n");

        let reply = send_and_read(&mut client, b"get name\r\n", b"END\r\n").await;
        assert_eq!(reply, b"VALUE name 7 4\r\nAriz\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_commands_reply_in_order() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let batch = b"set a 0 0 1\r\n1\r\nset b 0 0 1\r\n2\r\nget a b\r\n";
        let reply = send_and_read(&mut client, batch, b"END\r\n").await;
        assert_eq!(
            reply,
            b"STORED\r\nSTORED\r\nVALUE a 0 1\r\n1\r\nVALUE b 0 1\r\n2\r\nEND\r\n"
        );
    }

    #[tokio::test]
    async fn test_noreply_produces_no_bytes() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        // the only reply on the wire should be the get's
        let batch = b"set quiet 0 0 2 noreply\r\nhi\r\nget quiet\r\n";
        let reply = send_and_read(&mut client, batch, b"END\r\n").await;
        assert_eq!(reply, b"VALUE quiet 0 2\r\nhi\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_delete_over_tcp() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send_and_read(&mut client, b"set gone 0 0 1\r\nx\r\n", b"\r\n").await;
        let reply = send_and_read(&mut client, b"delete gone\r\n", b"\r\n").await;
        assert_eq!(reply, b"DELETED\r\n");

        let reply = send_and_read(&mut client, b"delete gone\r\n", b"\r\n").await;
        assert_eq!(reply, b"NOT_FOUND\r\n");
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection_alive() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let reply = send_and_read(&mut client, b"frobnicate\r\n", b"\r\n").await;
        assert_eq!(reply, b"ERROR\r\n");

        let reply = send_and_read(&mut client, b"set ok 0 0 2\r\nok\r\n", b"\r\n").await;
        assert_eq!(reply, b"STORED\r\n");
    }

    #[tokio::test]
    async fn test_quit_closes_connection() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"quit\r\n").await.unwrap();

        let mut buf = [0u8; 16];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_replies_before_quit_are_flushed() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"set k 0 0 1\r\nx\r\nquit\r\n")
            .await
            .unwrap();

        // read to EOF; the STORED reply must arrive before the close
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"STORED\r\n");
    }

    #[tokio::test]
    async fn test_stats_over_tcp() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send_and_read(&mut client, b"set s 0 0 1\r\nx\r\n", b"\r\n").await;
        let reply = send_and_read(&mut client, b"stats\r\n", b"END\r\n").await;

        let text = String::from_utf8(reply).unwrap();
        assert!(text.contains("STAT curr_items 1\r\n"));
        assert!(text.contains("STAT total_connections 1\r\n"));
        assert!(text.ends_with("END\r\n"));
    }

    #[tokio::test]
    async fn test_oversized_value_gets_error_and_recovers() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let declared = MAX_VALUE_SIZE + 1;
        let mut batch = format!("set big 0 0 {}\r\n", declared).into_bytes();
        batch.extend(std::iter::repeat(b'x').take(declared));
        batch.extend_from_slice(b"\r\n");

        let reply = send_and_read(&mut client, &batch, b"\r\n").await;
        assert_eq!(reply, b"SERVER_ERROR object too large for cache\r\n");

        // framing survived the drain
        let reply = send_and_read(&mut client, b"set small 0 0 2\r\nok\r\n", b"\r\n").await;
        assert_eq!(reply, b"STORED\r\n");
    }

    #[tokio::test]
    async fn test_bad_data_chunk_then_next_command_works() {
        let (addr, _) = spawn_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let reply = send_and_read(&mut client, b"set k 0 0 3\r\nabcdef\r\n", b"\r\n").await;
        assert_eq!(reply, b"CLIENT_ERROR bad data chunk\r\n");

        let reply = send_and_read(&mut client, b"set k 0 0 3\r\nabc\r\n", b"\r\n").await;
        assert_eq!(reply, b"STORED\r\n");
    }

    #[tokio::test]
    async fn test_concurrent_clients_on_disjoint_keys() {
        let (addr, _) = spawn_server().await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            tasks.push(tokio::spawn(async move {
                let mut client = TcpStream::connect(addr).await.unwrap();
                for j in 0..50 {
                    let key = format!("c{}-k{}", i, j);
                    let set = format!("set {} 0 0 1\r\nx\r\n", key);
                    let reply = send_and_read(&mut client, set.as_bytes(), b"\r\n").await;
                    assert_eq!(reply, b"STORED\r\n");

                    let get = format!("get {}\r\n", key);
                    let reply = send_and_read(&mut client, get.as_bytes(), b"END\r\n").await;
                    let expected = format!("VALUE {} 0 1\r\nx\r\nEND\r\n", key);
                    assert_eq!(reply, expected.as_bytes());
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_connection_counters() {
        let (addr, stats) = spawn_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        send_and_read(&mut client, b"stats\r\n", b"END\r\n").await;
        assert_eq!(stats.curr_connections.load(Ordering::Relaxed), 1);

        drop(client);
        // the server notices the disconnect asynchronously
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(stats.curr_connections.load(Ordering::Relaxed), 0);
        assert_eq!(stats.total_connections.load(Ordering::Relaxed), 1);
    }
}
