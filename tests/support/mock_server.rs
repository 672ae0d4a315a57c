//! Mock upstream servers for dispatch tests
//!
//! Provides two scriptable listeners bound to an ephemeral local port:
//! - [`MockSmtpServer`]: answers an SMTP conversation with configurable
//!   status codes and records every command it receives
//! - [`MockHttpServer`]: answers POSTs with a configurable status and
//!   records every request body
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    Auth(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(Vec<u8>),
    Quit,
    Other(String),
}

/// Response configuration for one SMTP command
#[derive(Debug, Clone)]
struct SmtpResponse {
    code: u16,
    message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_line(&self) -> String {
        format!("{} {}\r\n", self.code, self.message)
    }
}

#[derive(Clone)]
struct MockSmtpConfig {
    greeting: SmtpResponse,
    hello_response: SmtpResponse,
    auth_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    quit_response: SmtpResponse,
}

impl Default for MockSmtpConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "mock.example.com ready"),
            hello_response: SmtpResponse::new(250, "mock.example.com"),
            auth_response: SmtpResponse::new(235, "Authentication successful"),
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            data_response: SmtpResponse::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end_response: SmtpResponse::new(250, "Queued"),
            quit_response: SmtpResponse::new(221, "Bye"),
        }
    }
}

/// Builder for [`MockSmtpServer`]
#[derive(Default)]
pub struct MockSmtpServerBuilder {
    config: MockSmtpConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: &str) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: &str) -> Self {
        self.config.auth_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: &str) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: &str) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: &str) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let config = self.config;
        let task_commands = Arc::clone(&commands);
        let task_connections = Arc::clone(&connections);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                task_connections.fetch_add(1, Ordering::SeqCst);

                let config = config.clone();
                let commands = Arc::clone(&task_commands);
                tokio::spawn(async move {
                    let _ = handle_smtp_connection(stream, config, commands).await;
                });
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands,
            connections,
            handle,
        })
    }
}

/// A scriptable mock SMTP server
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::default()
    }

    /// The `host:port` the server is listening on
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Every command received so far, in arrival order
    #[must_use]
    pub fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of connections accepted so far
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// Extracts the address between angle brackets, falling back to everything
/// after the colon.
fn address_argument(line: &str) -> String {
    if let (Some(start), Some(end)) = (line.find('<'), line.rfind('>')) {
        if start < end {
            return line[start + 1..end].to_string();
        }
    }
    line.split_once(':')
        .map_or(line, |(_, rest)| rest)
        .trim()
        .to_string()
}

async fn handle_smtp_connection(
    stream: TcpStream,
    config: MockSmtpConfig,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(config.greeting.to_line().as_bytes())
        .await?;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        let upper = line.to_uppercase();

        let response = if upper.starts_with("EHLO") {
            commands
                .lock()
                .unwrap()
                .push(SmtpCommand::Ehlo(line[4..].trim().to_string()));
            &config.hello_response
        } else if upper.starts_with("HELO") {
            commands
                .lock()
                .unwrap()
                .push(SmtpCommand::Helo(line[4..].trim().to_string()));
            &config.hello_response
        } else if upper.starts_with("AUTH") {
            let token = line.rsplit(' ').next().unwrap_or_default().to_string();
            commands.lock().unwrap().push(SmtpCommand::Auth(token));
            &config.auth_response
        } else if upper.starts_with("MAIL FROM") {
            commands
                .lock()
                .unwrap()
                .push(SmtpCommand::MailFrom(address_argument(&line)));
            &config.mail_from_response
        } else if upper.starts_with("RCPT TO") {
            commands
                .lock()
                .unwrap()
                .push(SmtpCommand::RcptTo(address_argument(&line)));
            &config.rcpt_to_response
        } else if upper.starts_with("DATA") {
            commands.lock().unwrap().push(SmtpCommand::Data);
            write_half
                .write_all(config.data_response.to_line().as_bytes())
                .await?;

            let mut content = Vec::new();
            loop {
                let mut data_line = String::new();
                if reader.read_line(&mut data_line).await? == 0 {
                    return Ok(());
                }
                if data_line.trim_end_matches(['\r', '\n']) == "." {
                    break;
                }
                content.extend_from_slice(data_line.as_bytes());
            }
            commands
                .lock()
                .unwrap()
                .push(SmtpCommand::MessageContent(content));
            &config.data_end_response
        } else if upper.starts_with("QUIT") {
            commands.lock().unwrap().push(SmtpCommand::Quit);
            write_half
                .write_all(config.quit_response.to_line().as_bytes())
                .await?;
            return Ok(());
        } else {
            commands.lock().unwrap().push(SmtpCommand::Other(line));
            &config.hello_response
        };

        write_half.write_all(response.to_line().as_bytes()).await?;
    }
}

/// A minimal mock HTTP endpoint that records request bodies
pub struct MockHttpServer {
    addr: SocketAddr,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockHttpServer {
    /// Start a server answering every request with `status`.
    pub async fn start(status: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let hits = Arc::new(AtomicUsize::new(0));

        let task_bodies = Arc::clone(&bodies);
        let task_hits = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                task_hits.fetch_add(1, Ordering::SeqCst);

                let bodies = Arc::clone(&task_bodies);
                tokio::spawn(async move {
                    let _ = handle_http_connection(stream, status, bodies).await;
                });
            }
        });

        Ok(Self {
            addr,
            bodies,
            hits,
            handle,
        })
    }

    /// The endpoint URL routes should point at
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Every request body received so far
    #[must_use]
    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }

    /// Number of requests received so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

async fn handle_http_connection(
    stream: TcpStream,
    status: u16,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    tokio::io::AsyncReadExt::read_exact(&mut reader, &mut body).await?;
    bodies.lock().unwrap().push(body);

    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        500 => "Internal Server Error",
        _ => "",
    };
    let response =
        format!("HTTP/1.1 {status} {reason}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
    write_half.write_all(response.as_bytes()).await?;

    Ok(())
}
