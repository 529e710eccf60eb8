//! Client side of the relay protocol.

use std::io;
use std::net::{SocketAddr, TcpStream};

use crate::protocol::{Frame, Framed, MAX_MESSAGE_LEN};
use crate::server::Verdict;

/// Client-side failures.
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// The server did not answer `PING` with `PONG`.
    HandshakeRejected,
    /// The server closed the connection.
    Disconnected,
    UnexpectedReply(Frame),
    /// The message would not fit in a single frame.
    MessageTooLong { len: usize, max: usize },
    /// The message contains a line break and would log as several lines.
    MultilineMessage,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {}", e),
            ClientError::HandshakeRejected => write!(f, "Server rejected the handshake"),
            ClientError::Disconnected => write!(f, "Server closed the connection"),
            ClientError::UnexpectedReply(frame) => write!(f, "Unexpected reply: {:?}", frame),
            ClientError::MessageTooLong { len, max } => {
                write!(f, "Message is {} bytes, the limit is {}", len, max)
            }
            ClientError::MultilineMessage => write!(f, "Message must fit on one line"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

/// A connected, handshaken relay session.
pub struct Client {
    framed: Framed<TcpStream>,
}

impl Client {
    /// Connect and perform the `PING`/`PONG` handshake.
    pub fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream);
        framed.send(&Frame::Ping)?;
        match framed.read_frame()? {
            Some(reply) if Frame::parse(&reply) == Frame::Pong => Ok(Client { framed }),
            _ => Err(ClientError::HandshakeRejected),
        }
    }

    /// Send `MESG <text>` and return the echoed text.
    ///
    /// Text that would not arrive as one frame, or would not log as one
    /// line, is refused before anything is sent.
    pub fn send_message(&mut self, text: &str) -> Result<String, ClientError> {
        check_message(text)?;
        self.framed.send(&Frame::Message(text.to_string()))?;
        match self.next_reply()? {
            Frame::Message(echo) => Ok(echo),
            other => Err(ClientError::UnexpectedReply(other)),
        }
    }

    /// Send `TERM` followed by `PASS <password>` and return the server's verdict.
    pub fn terminate(&mut self, password: &str) -> Result<Verdict, ClientError> {
        self.framed.send(&Frame::Term)?;
        self.framed
            .send(&Frame::Pass(password.as_bytes().to_vec().into()))?;
        let reply = self.next_reply()?;
        Verdict::from_reply(&reply).ok_or(ClientError::UnexpectedReply(reply))
    }

    fn next_reply(&mut self) -> Result<Frame, ClientError> {
        match self.framed.read_frame()? {
            Some(raw) => Ok(Frame::parse(&raw)),
            None => Err(ClientError::Disconnected),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.framed.get_ref().local_addr()
    }
}

fn check_message(text: &str) -> Result<(), ClientError> {
    if text.len() > MAX_MESSAGE_LEN {
        return Err(ClientError::MessageTooLong {
            len: text.len(),
            max: MAX_MESSAGE_LEN,
        });
    }
    if text.contains(['\n', '\r']) {
        return Err(ClientError::MultilineMessage);
    }
    Ok(())
}
