//! Scripted FTP server used by the unit tests.

use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;

/// One accepted control connection on the mock server.
pub(crate) struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ServerConn {
    /// Writes `line` followed by CRLF.
    pub(crate) async fn reply(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Reads one command line and asserts it starts with `prefix`.
    pub(crate) async fn expect(&mut self, prefix: &str) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        let line = line.trim_end().to_string();
        assert!(line.starts_with(prefix), "expected {prefix:?}, got {line:?}");
        line
    }

    /// Reads one line, returning `None` at end of stream.
    pub(crate) async fn next_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await.unwrap() {
            0 => None,
            _ => Some(line.trim_end().to_string()),
        }
    }
}

/// Binds a listener on loopback and runs `script` against the first connection.
///
/// Await the returned handle to surface assertion failures from the script.
pub(crate) async fn spawn_server<F, Fut>(script: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnOnce(ServerConn) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        script(ServerConn {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
        .await;
    });
    (addr, handle)
}

/// Encodes a loopback socket address as a PASV reply argument.
pub(crate) fn pasv_reply(addr: SocketAddr) -> String {
    format!(
        "227 Entering Passive Mode (127,0,0,1,{},{}).",
        addr.port() / 256,
        addr.port() % 256
    )
}
