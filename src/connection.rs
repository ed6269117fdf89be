//! IMAP connection actor and TLS plumbing
//!
//! One [`Connection`] owns one server connection. Internally a tokio
//! task holds the transport, the framed reader, the protocol state,
//! the tag allocator, and the capability cache; callers talk to it
//! through an op queue. The queue is the serialization point: exactly
//! one command is on the wire at a time, tags are strictly monotonic,
//! and a caller that gives up on its future cannot desynchronize the
//! stream -- the actor still drains the tagged response before taking
//! the next op.
//!
//! Untagged responses always reach `subscribe()`rs, whether or not a
//! command is in flight; responses that arrive during a command are
//! additionally collected into that command's outcome.

use crate::codec::ResponseCodec;
use crate::config::{ImapConfig, TlsMode};
use crate::error::{Error, Result};
use crate::proto::command::{self, Command, CommandKind, Fragment, TagGenerator};
use crate::proto::types::{
    Capability, Response, ResponseCode, ResponseStatus, UntaggedResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

/// Depth of the op queue; callers beyond this suspend in `send`.
const OP_QUEUE: usize = 16;
/// Untagged events buffered per subscriber before it starts lagging.
const EVENT_QUEUE: usize = 64;

type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;
type Responder = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>> + Send>;

/// Protocol state of a connection (RFC 3501 section 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Greeted but not authenticated.
    Greeted,
    Authenticated,
    Selected(String),
    LoggingOut,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Greeted => f.write_str("not authenticated"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::Selected(mailbox) => write!(f, "selected ({mailbox})"),
            Self::LoggingOut => f.write_str("logging out"),
        }
    }
}

/// What subscribers receive.
#[derive(Debug, Clone)]
pub enum Event {
    /// An untagged server response, solicited or not.
    Untagged(UntaggedResponse),
    /// The connection died; no further events follow.
    Disconnected { reason: String },
}

/// A successfully completed command: the tagged OK plus every
/// untagged response that arrived while it was in flight.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub code: Option<ResponseCode>,
    pub text: String,
    pub untagged: Vec<UntaggedResponse>,
}

enum Op {
    Execute {
        command: Command,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    Authenticate {
        mechanism: String,
        responder: Responder,
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    StartTls {
        reply: oneshot::Sender<Result<()>>,
    },
    StartIdle {
        reply: oneshot::Sender<Result<()>>,
    },
    StopIdle {
        reply: oneshot::Sender<Result<CommandOutcome>>,
    },
    State {
        reply: oneshot::Sender<ConnectionState>,
    },
    Capabilities {
        reply: oneshot::Sender<Option<Vec<Capability>>>,
    },
    Close,
}

/// Handle to a connection actor. Cloning shares the same connection.
#[derive(Clone)]
pub struct Connection {
    ops: mpsc::Sender<Op>,
    events: broadcast::Sender<Event>,
}

impl Connection {
    /// Connect, negotiate TLS per the configured mode, and read the
    /// server greeting. The whole sequence runs under the connect
    /// timeout.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        timeout(config.connect_timeout, Self::connect_inner(config))
            .await
            .map_err(|_| Error::Timeout("server greeting"))?
    }

    async fn connect_inner(config: &ImapConfig) -> Result<Self> {
        let address = format!("{}:{}", config.host, config.port);
        debug!(%address, "connecting");
        let tcp = TcpStream::connect(&address).await?;

        let transport = match config.tls {
            TlsMode::Required => Transport::Tls(Box::new(
                tls_handshake(tcp, &config.host, config.danger_accept_invalid_certs).await?,
            )),
            TlsMode::StartTls | TlsMode::Disabled => Transport::Plain(tcp),
        };

        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let (ops, ops_rx) = mpsc::channel(OP_QUEUE);
        let mut actor = Actor {
            ops: ops_rx,
            io: Some(Framed::new(
                transport,
                ResponseCodec::new(config.max_literal_octets),
            )),
            state: ConnectionState::Disconnected,
            idle_tag: None,
            tags: TagGenerator::default(),
            capabilities: None,
            events: events.clone(),
            command_timeout: config.command_timeout,
            max_literal: config.max_literal_octets,
            host: config.host.clone(),
            accept_invalid_certs: config.danger_accept_invalid_certs,
        };

        actor.read_greeting().await?;
        if config.tls == TlsMode::StartTls {
            actor.upgrade_tls().await?;
        }
        info!(host = %config.host, "connected");

        tokio::spawn(actor.run());
        Ok(Self { ops, events })
    }

    /// Run one command to its tagged completion.
    ///
    /// Serialized with every other caller; dropping the returned
    /// future cancels the wait but the actor still drains the
    /// server's response for the allocated tag.
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send_op(Op::Execute { command, reply }).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Drive a full AUTHENTICATE exchange. `responder` receives each
    /// decoded server challenge and returns the raw response; base64
    /// framing in both directions is handled here.
    pub async fn authenticate(
        &self,
        mechanism: impl Into<String>,
        responder: impl FnMut(&[u8]) -> Result<Vec<u8>> + Send + 'static,
    ) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send_op(Op::Authenticate {
            mechanism: mechanism.into(),
            responder: Box::new(responder),
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Issue STARTTLS and upgrade the transport. Cached capabilities
    /// are discarded; ask the server again afterwards.
    pub async fn starttls(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send_op(Op::StartTls { reply }).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Enter IDLE. Until [`Connection::stop_idle`], the only traffic
    /// is server updates (delivered to subscribers) and `execute`
    /// fails with `BadState`.
    pub async fn start_idle(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send_op(Op::StartIdle { reply }).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Send DONE and await the tagged completion of the IDLE.
    pub async fn stop_idle(&self) -> Result<CommandOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send_op(Op::StopIdle { reply }).await?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Subscribe to untagged events. Every subscriber sees every
    /// event from the moment of subscription.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Current protocol state; `Disconnected` once the actor is gone.
    pub async fn state(&self) -> ConnectionState {
        let (reply, rx) = oneshot::channel();
        if self.send_op(Op::State { reply }).await.is_err() {
            return ConnectionState::Disconnected;
        }
        rx.await.unwrap_or(ConnectionState::Disconnected)
    }

    /// The cached capability set, if the server has told us one since
    /// the last connect or STARTTLS.
    pub async fn cached_capabilities(&self) -> Option<Vec<Capability>> {
        let (reply, rx) = oneshot::channel();
        if self.send_op(Op::Capabilities { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Drop the transport without a LOGOUT.
    pub async fn close(&self) {
        let _ = self.ops.send(Op::Close).await;
    }

    async fn send_op(&self, op: Op) -> Result<()> {
        self.ops.send(op).await.map_err(|_| Error::Closed)
    }
}

// ----- the actor -----

struct Actor {
    ops: mpsc::Receiver<Op>,
    io: Option<Framed<Transport, ResponseCodec>>,
    state: ConnectionState,
    /// Tag of the IDLE command while idling.
    idle_tag: Option<String>,
    tags: TagGenerator,
    capabilities: Option<Vec<Capability>>,
    events: broadcast::Sender<Event>,
    command_timeout: Duration,
    max_literal: usize,
    host: String,
    accept_invalid_certs: bool,
}

/// What woke the actor loop.
enum Wake {
    Op(Option<Op>),
    Response(Option<Result<Response>>),
}

impl Actor {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                op = self.ops.recv() => Wake::Op(op),
                response = Self::read_from(&mut self.io) => Wake::Response(response),
            };
            match wake {
                // Every handle is gone; tear down.
                Wake::Op(None) => break,
                Wake::Op(Some(op)) => self.handle_op(op).await,
                Wake::Response(response) => self.handle_unsolicited(response),
            }
        }
    }

    /// Read side of the select loop. With no transport this pends
    /// forever so a dead connection still answers ops.
    async fn read_from(
        io: &mut Option<Framed<Transport, ResponseCodec>>,
    ) -> Option<Result<Response>> {
        match io {
            Some(framed) => framed.next().await,
            None => std::future::pending().await,
        }
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::Execute { command, reply } => {
                let result = match timeout(self.command_timeout, self.run_command(&command)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout("tagged response")),
                };
                let _ = reply.send(self.settle(result));
            }
            Op::Authenticate {
                mechanism,
                mut responder,
                reply,
            } => {
                let result = match timeout(
                    self.command_timeout,
                    self.run_authenticate(&mechanism, responder.as_mut()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout("authentication exchange")),
                };
                let _ = reply.send(self.settle(result));
            }
            Op::StartTls { reply } => {
                let result = match timeout(self.command_timeout, self.upgrade_tls()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout("TLS upgrade")),
                };
                let _ = reply.send(self.settle(result));
            }
            Op::StartIdle { reply } => {
                let result = match timeout(self.command_timeout, self.enter_idle()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout("idle continuation")),
                };
                let _ = reply.send(self.settle(result));
            }
            Op::StopIdle { reply } => {
                let result = match timeout(self.command_timeout, self.leave_idle()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout("idle completion")),
                };
                let _ = reply.send(self.settle(result));
            }
            Op::State { reply } => {
                let _ = reply.send(self.state.clone());
            }
            Op::Capabilities { reply } => {
                let _ = reply.send(self.capabilities.clone());
            }
            Op::Close => {
                self.fail("closed by caller");
            }
        }
    }

    /// Mark the connection dead after a fatal error, exactly once.
    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            let fatal = matches!(
                error,
                Error::Io(_)
                    | Error::Tls(_)
                    | Error::Timeout(_)
                    | Error::Protocol(_)
                    | Error::Closed
            );
            if fatal {
                self.fail(&error.to_string());
            }
        }
        result
    }

    fn fail(&mut self, reason: &str) {
        if self.io.is_none() && self.state == ConnectionState::Disconnected {
            return;
        }
        warn!(reason, "connection closed");
        self.io = None;
        self.idle_tag = None;
        self.state = ConnectionState::Disconnected;
        let _ = self.events.send(Event::Disconnected {
            reason: reason.to_string(),
        });
    }

    /// Server data arriving while no command is in flight.
    fn handle_unsolicited(&mut self, response: Option<Result<Response>>) {
        match response {
            None => self.fail("connection closed by server"),
            Some(Err(Error::Parse(reason))) => {
                warn!(%reason, "dropping malformed response");
            }
            Some(Err(error)) => self.fail(&error.to_string()),
            Some(Ok(Response::Untagged(data))) => self.absorb_untagged(data, None),
            Some(Ok(Response::Tagged { tag, .. })) => {
                warn!(%tag, "tagged response with no command in flight");
            }
            Some(Ok(Response::Continuation { .. })) => {
                warn!("continuation with no command in flight");
            }
        }
    }

    /// Route one untagged response: update session-level caches,
    /// broadcast to subscribers, and append to the in-flight
    /// command's collection when one exists.
    fn absorb_untagged(
        &mut self,
        data: UntaggedResponse,
        collected: Option<&mut Vec<UntaggedResponse>>,
    ) {
        match &data {
            UntaggedResponse::Condition {
                status: ResponseStatus::Bye,
                text,
                ..
            } => {
                debug!(%text, "server BYE");
                self.state = ConnectionState::LoggingOut;
            }
            UntaggedResponse::Condition {
                code: Some(ResponseCode::Capability(caps)),
                ..
            } => {
                self.capabilities = Some(caps.clone());
            }
            UntaggedResponse::Capability(caps) => {
                self.capabilities = Some(caps.clone());
            }
            _ => {}
        }
        let _ = self.events.send(Event::Untagged(data.clone()));
        if let Some(collected) = collected {
            collected.push(data);
        }
    }

    async fn next_response(&mut self) -> Result<Response> {
        loop {
            let framed = self.io.as_mut().ok_or(Error::Closed)?;
            match framed.next().await {
                Some(Ok(response)) => {
                    trace!(?response, "received");
                    return Ok(response);
                }
                // Lenient: one bad response does not kill the session.
                Some(Err(Error::Parse(reason))) => {
                    warn!(%reason, "dropping malformed response");
                }
                Some(Err(error)) => return Err(error),
                None => return Err(Error::Closed),
            }
        }
    }

    async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let framed = self.io.as_mut().ok_or(Error::Closed)?;
        framed.send(bytes).await
    }

    fn check_allowed(&self, command: &Command) -> Result<()> {
        if self.idle_tag.is_some() {
            return Err(Error::BadState(
                "IDLE in progress; stop it before issuing commands".to_string(),
            ));
        }
        let allowed = match command.kind() {
            CommandKind::Any => !matches!(
                self.state,
                ConnectionState::Disconnected | ConnectionState::LoggingOut
            ),
            CommandKind::NotAuthenticated => self.state == ConnectionState::Greeted,
            CommandKind::Authenticated => matches!(
                self.state,
                ConnectionState::Authenticated | ConnectionState::Selected(_)
            ),
            CommandKind::Selected => matches!(self.state, ConnectionState::Selected(_)),
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::BadState(format!(
                "{} is not allowed in the {} state",
                command.name(),
                self.state
            )))
        }
    }

    /// The execute contract: state check, encode, write with the
    /// literal-continuation handshake, then stream responses until
    /// the matching tagged completion.
    async fn run_command(&mut self, command: &Command) -> Result<CommandOutcome> {
        self.check_allowed(command)?;
        let tag = self.tags.next();
        let fragments = command::encode(&tag, command)?;
        debug!(command = command.name(), %tag, "sending");

        let mut collected = Vec::new();
        for fragment in fragments {
            match fragment {
                Fragment::Line(bytes) => self.send_bytes(&bytes).await?,
                Fragment::Literal(bytes) => {
                    // The server must grant a continuation before the
                    // literal octets may flow.
                    match self.await_continuation(&tag, &mut collected).await? {
                        None => self.send_bytes(&bytes).await?,
                        Some((status, code, text)) => {
                            return self.finish(command, status, code, text, collected);
                        }
                    }
                }
            }
        }

        loop {
            match self.next_response().await? {
                Response::Untagged(data) => self.absorb_untagged(data, Some(&mut collected)),
                Response::Continuation { .. } => {
                    warn!("unexpected continuation; ignoring");
                }
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } => {
                    if got == tag {
                        return self.finish(command, status, code, text, collected);
                    }
                    warn!(expected = %tag, got = %got, "mismatched tag dropped");
                }
            }
        }
    }

    /// Wait for `+`. A tagged NO/BAD may arrive instead when the
    /// server rejects the literal up front.
    #[allow(clippy::type_complexity)]
    async fn await_continuation(
        &mut self,
        tag: &str,
        collected: &mut Vec<UntaggedResponse>,
    ) -> Result<Option<(ResponseStatus, Option<ResponseCode>, String)>> {
        loop {
            match self.next_response().await? {
                Response::Continuation { .. } => return Ok(None),
                Response::Untagged(data) => self.absorb_untagged(data, Some(collected)),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => return Ok(Some((status, code, text))),
                Response::Tagged { tag: got, .. } => {
                    warn!(got = %got, "mismatched tag dropped");
                }
            }
        }
    }

    /// Turn the tagged completion into the caller's result and apply
    /// the state transition it implies.
    fn finish(
        &mut self,
        command: &Command,
        status: ResponseStatus,
        code: Option<ResponseCode>,
        text: String,
        untagged: Vec<UntaggedResponse>,
    ) -> Result<CommandOutcome> {
        match status {
            ResponseStatus::Ok => {
                if let Some(ResponseCode::Capability(caps)) = &code {
                    self.capabilities = Some(caps.clone());
                }
                self.apply_transition(command);
                Ok(CommandOutcome {
                    code,
                    text,
                    untagged,
                })
            }
            ResponseStatus::No => {
                if matches!(command, Command::Login { .. } | Command::Authenticate { .. }) {
                    Err(Error::Auth(text))
                } else {
                    Err(Error::CommandFailed { text, code })
                }
            }
            ResponseStatus::Bad => Err(Error::Protocol(format!(
                "server rejected {}: {text}",
                command.name()
            ))),
            ResponseStatus::PreAuth | ResponseStatus::Bye => Err(Error::Protocol(format!(
                "unexpected tagged {status} response"
            ))),
        }
    }

    fn apply_transition(&mut self, command: &Command) {
        match command {
            Command::Login { .. } | Command::Authenticate { .. } => {
                self.state = ConnectionState::Authenticated;
            }
            Command::Select { mailbox } | Command::Examine { mailbox } => {
                self.state = ConnectionState::Selected(mailbox.clone());
            }
            Command::Close => {
                self.state = ConnectionState::Authenticated;
            }
            Command::Logout => {
                self.state = ConnectionState::Disconnected;
                self.io = None;
            }
            _ => {}
        }
    }

    async fn read_greeting(&mut self) -> Result<()> {
        match self.next_response().await? {
            Response::Untagged(UntaggedResponse::Condition { status, code, text }) => {
                if let Some(ResponseCode::Capability(caps)) = &code {
                    self.capabilities = Some(caps.clone());
                }
                match status {
                    ResponseStatus::Ok => {
                        debug!(%text, "greeted");
                        self.state = ConnectionState::Greeted;
                        Ok(())
                    }
                    ResponseStatus::PreAuth => {
                        debug!(%text, "pre-authenticated");
                        self.state = ConnectionState::Authenticated;
                        Ok(())
                    }
                    ResponseStatus::Bye => Err(Error::Protocol(format!(
                        "server refused the connection: {text}"
                    ))),
                    ResponseStatus::No | ResponseStatus::Bad => Err(Error::Protocol(format!(
                        "unexpected {status} greeting: {text}"
                    ))),
                }
            }
            other => Err(Error::Protocol(format!(
                "expected a greeting, got {other:?}"
            ))),
        }
    }

    /// STARTTLS: tagged OK, then the transport is handed to rustls
    /// and every cached capability is forgotten (RFC 3501 section
    /// 6.2.1 -- the pre-TLS values were tamperable).
    async fn upgrade_tls(&mut self) -> Result<()> {
        self.run_command(&Command::StartTls).await?;
        let framed = self.io.take().ok_or(Error::Closed)?;
        let transport = framed.into_inner();
        let tcp = match transport {
            Transport::Plain(tcp) => tcp,
            Transport::Tls(tls) => {
                self.io = Some(Framed::new(
                    Transport::Tls(tls),
                    ResponseCodec::new(self.max_literal),
                ));
                return Err(Error::Tls("connection is already TLS".to_string()));
            }
        };
        let tls = tls_handshake(tcp, &self.host, self.accept_invalid_certs).await?;
        self.io = Some(Framed::new(
            Transport::Tls(Box::new(tls)),
            ResponseCodec::new(self.max_literal),
        ));
        self.capabilities = None;
        info!("transport upgraded to TLS; capability cache purged");
        Ok(())
    }

    /// AUTHENTICATE with a generic challenge responder.
    async fn run_authenticate(
        &mut self,
        mechanism: &str,
        responder: &mut (dyn FnMut(&[u8]) -> Result<Vec<u8>> + Send),
    ) -> Result<CommandOutcome> {
        let command = Command::Authenticate {
            mechanism: mechanism.to_string(),
        };
        self.check_allowed(&command)?;
        let tag = self.tags.next();
        for fragment in command::encode(&tag, &command)? {
            if let Fragment::Line(bytes) = fragment {
                self.send_bytes(&bytes).await?;
            }
        }
        debug!(mechanism, %tag, "authenticating");

        let mut collected = Vec::new();
        loop {
            match self.next_response().await? {
                Response::Continuation { text } => {
                    let challenge = BASE64.decode(text.trim()).unwrap_or_default();
                    match responder(&challenge) {
                        Ok(response) => {
                            let mut line = BASE64.encode(&response).into_bytes();
                            line.extend_from_slice(b"\r\n");
                            self.send_bytes(&line).await?;
                        }
                        Err(error) => {
                            // "*" aborts the exchange; drain the
                            // server's tagged rejection.
                            self.send_bytes(b"*\r\n").await?;
                            loop {
                                match self.next_response().await? {
                                    Response::Tagged { tag: got, .. } if got == tag => break,
                                    Response::Untagged(data) => {
                                        self.absorb_untagged(data, None);
                                    }
                                    _ => {}
                                }
                            }
                            return Err(error);
                        }
                    }
                }
                Response::Untagged(data) => self.absorb_untagged(data, Some(&mut collected)),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    return self.finish(&command, status, code, text, collected);
                }
                Response::Tagged { tag: got, .. } => {
                    warn!(got = %got, "mismatched tag dropped");
                }
            }
        }
    }

    /// IDLE up to its continuation; afterwards the main loop keeps
    /// broadcasting whatever the server pushes.
    async fn enter_idle(&mut self) -> Result<()> {
        self.check_allowed(&Command::Idle)?;
        let tag = self.tags.next();
        for fragment in command::encode(&tag, &Command::Idle)? {
            if let Fragment::Line(bytes) = fragment {
                self.send_bytes(&bytes).await?;
            }
        }
        loop {
            match self.next_response().await? {
                Response::Continuation { .. } => {
                    debug!(%tag, "idling");
                    self.idle_tag = Some(tag);
                    return Ok(());
                }
                Response::Untagged(data) => self.absorb_untagged(data, None),
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    return match status {
                        ResponseStatus::No => Err(Error::CommandFailed { text, code }),
                        _ => Err(Error::Protocol(format!("IDLE rejected: {text}"))),
                    };
                }
                Response::Tagged { .. } => {}
            }
        }
    }

    /// DONE, then await the tagged completion of the IDLE command.
    async fn leave_idle(&mut self) -> Result<CommandOutcome> {
        let tag = self
            .idle_tag
            .take()
            .ok_or_else(|| Error::BadState("not idling".to_string()))?;
        self.send_bytes(b"DONE\r\n").await?;
        let mut collected = Vec::new();
        loop {
            match self.next_response().await? {
                Response::Untagged(data) => self.absorb_untagged(data, Some(&mut collected)),
                Response::Continuation { .. } => {
                    warn!("unexpected continuation; ignoring");
                }
                Response::Tagged {
                    tag: got,
                    status,
                    code,
                    text,
                } if got == tag => {
                    return match status {
                        ResponseStatus::Ok => Ok(CommandOutcome {
                            code,
                            text,
                            untagged: collected,
                        }),
                        ResponseStatus::No => Err(Error::CommandFailed { text, code }),
                        _ => Err(Error::Protocol(format!("IDLE ended with {status}: {text}"))),
                    };
                }
                Response::Tagged { .. } => {}
            }
        }
    }
}

// ----- transport -----

/// The duplex byte stream under the framed codec: plain TCP before
/// (or without) TLS, rustls after.
enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

async fn tls_handshake(
    tcp: TcpStream,
    host: &str,
    accept_invalid_certs: bool,
) -> Result<TlsStream> {
    let connector = tls_connector(accept_invalid_certs);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| Error::Tls(format!("invalid server name: {e}")))?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

fn tls_connector(accept_invalid_certs: bool) -> TlsConnector {
    // Ensure the ring crypto provider is installed process-wide.
    // Multiple connections may race to install it, so we ignore the
    // error if it's already set.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = if accept_invalid_certs {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    TlsConnector::from(Arc::new(config))
}

/// Certificate verifier that accepts all certificates
/// (for bridges and test servers with self-signed certs).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
