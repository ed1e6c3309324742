//! Module `runner`
//!
//! Reads operator lines, checks them against the session state and drives
//! the `Session`. Output is the server's reply or a readable error.

use log::{debug, info};
use std::io;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::handlers::{handle_error, user_message};
use crate::error::{FtpClientError, FtpResult};
use crate::session::Session;
use crate::shell::parser::{ShellCommand, parse_line};
use crate::transfer::TransferMode;

const PROMPT: &[u8] = b"ftp> ";

/// Interactive front end over one session.
pub struct Shell {
    session: Session,
    mode: TransferMode,
}

impl Shell {
    pub fn new(session: Session) -> Self {
        let mode = session.config().default_mode;
        Self { session, mode }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mode the next data command will negotiate.
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Runs until `quit`, end of input, or loss of the control connection.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            output.write_all(PROMPT).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                debug!("End of input");
                if self.session.state().is_connected() {
                    if let Err(e) = self.session.quit().await {
                        handle_error(&e);
                    }
                }
                break;
            };

            let command = parse_line(&line);
            let text = match self.execute(command).await {
                Ok(text) => text,
                Err(e) => {
                    handle_error(&e);
                    user_message(&e)
                }
            };
            if !text.is_empty() {
                output.write_all(text.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }

            if !self.session.state().is_connected() {
                info!("Session ended");
                break;
            }
        }

        output.flush().await
    }

    /// Executes one parsed command and returns the text to show.
    pub async fn execute(&mut self, command: ShellCommand) -> FtpResult<String> {
        if let Some(operation) = command.operation() {
            if !self.session.permits(operation) {
                return Err(FtpClientError::InvalidState {
                    state: self.session.state(),
                    operation: operation.name(),
                });
            }
        }

        match command {
            ShellCommand::User(name) => Ok(self.session.user(&name).await?.to_string()),
            ShellCommand::Pass(password) => Ok(self.session.pass(&password).await?.to_string()),
            ShellCommand::Cd(path) => Ok(self.session.cwd(&path).await?.to_string()),
            ShellCommand::Pwd => Ok(format!("Remote directory: {}", self.session.pwd().await?)),
            ShellCommand::Ls(path) => {
                self.session.negotiate(self.mode).await?;
                let listing = self.session.list(path.as_deref()).await?;
                Ok(listing.trim_end().to_string())
            }
            ShellCommand::Get { remote, local } => {
                let local = local.unwrap_or_else(|| file_name(&remote));
                self.session.negotiate(self.mode).await?;
                let summary = self.session.download(&remote, &local).await?;
                Ok(format!("{} ({} bytes to {})", summary.reply, summary.bytes, local))
            }
            ShellCommand::Put { local, remote } => {
                let remote = remote.unwrap_or_else(|| file_name(&local));
                self.session.negotiate(self.mode).await?;
                let summary = self.session.upload(&local, &remote).await?;
                Ok(format!("{} ({} bytes from {})", summary.reply, summary.bytes, local))
            }
            ShellCommand::Mode(mode) => {
                self.mode = mode;
                Ok(format!("Data mode: {} ({})", mode, mode.verb()))
            }
            ShellCommand::Syst => Ok(self.session.syst().await?.to_string()),
            ShellCommand::Help(topic) => Ok(self.session.help(topic.as_deref()).await?.to_string()),
            ShellCommand::Quit => Ok(match self.session.quit().await? {
                Some(reply) => reply.to_string(),
                None => "Connection closed".to_string(),
            }),
            ShellCommand::Empty => Ok(String::new()),
            ShellCommand::MissingArgument(usage) => Ok(format!("Usage: {}", usage)),
            ShellCommand::Unknown(line) => Ok(format!("Unknown command: {}", line)),
        }
    }
}

/// Last path component of `path`, or `path` itself.
fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::SessionState;
    use crate::testing::{pasv_reply, spawn_server};
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn connected_shell(addr: SocketAddr) -> Shell {
        let config = ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            reply_timeout_secs: 5,
            data_timeout_secs: 5,
            idle_poll_millis: 100,
            ..ClientConfig::default()
        };
        let mut session = Session::new(config);
        session.connect().await.unwrap();
        Shell::new(session)
    }

    async fn run_script(shell: &mut Shell, script: &str) -> String {
        let mut output = Vec::new();
        shell.run(script.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/pub/docs/readme.txt"), "readme.txt");
        assert_eq!(file_name("plain"), "plain");
    }

    #[tokio::test]
    async fn test_shell_session() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            conn.expect("USER anonymous").await;
            conn.reply("230 Welcome").await;
            conn.expect("SYST").await;
            conn.reply("215 UNIX Type: L8").await;
            conn.expect("QUIT").await;
            conn.reply("221 Goodbye").await;
        })
        .await;

        let mut shell = connected_shell(addr).await;
        let output = run_script(&mut shell, "user anonymous\nsyst\nfrobnicate\nquit\npwd\n").await;

        assert!(output.contains("230 Welcome"));
        assert!(output.contains("215 UNIX Type: L8"));
        assert!(output.contains("Unknown command: frobnicate"));
        assert!(output.contains("221 Goodbye"));
        // the shell stops at quit, so pwd is never attempted
        assert!(!output.contains("Remote directory"));
        assert_eq!(shell.session().state(), SessionState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_data_command_before_login_is_refused() {
        let (addr, server) = spawn_server(|mut conn| async move {
            conn.reply("220 ready").await;
            // ls must not reach the server
            conn.expect("QUIT").await;
            conn.reply("221 Goodbye").await;
        })
        .await;

        let mut shell = connected_shell(addr).await;
        let output = run_script(&mut shell, "ls\n").await;
        assert!(output.contains("Cannot negotiate a data channel while connected"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ls_negotiates_selected_mode() {
        let data = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let data_addr = data.local_addr().unwrap();

        let (addr, server) = spawn_server(move |mut conn| async move {
            use tokio::io::AsyncWriteExt;

            conn.reply("220 ready").await;
            conn.expect("USER").await;
            conn.reply("230 Welcome").await;
            conn.expect("PASV").await;
            conn.reply(&pasv_reply(data_addr)).await;
            let (mut stream, _) = data.accept().await.unwrap();
            conn.expect("LIST").await;
            conn.reply("150 Here comes the listing").await;
            stream.write_all(b"-rw-r--r-- 1 ftp ftp 12 readme.txt\r\n").await.unwrap();
            drop(stream);
            conn.reply("226 Directory send OK").await;
            conn.expect("QUIT").await;
            conn.reply("221 Goodbye").await;
        })
        .await;

        let mut shell = connected_shell(addr).await;
        let output = run_script(&mut shell, "user anonymous\npassive\nls\n").await;
        assert!(output.contains("Data mode: passive (PASV)"));
        assert!(output.contains("readme.txt"));
        server.await.unwrap();
    }
}
