//! Relay frame parser.

use bytes::{BufMut, Bytes, BytesMut};

/// Maximum size of a single frame (one read).
pub const MAX_FRAME_SIZE: usize = 1024;

/// Largest `MESG` payload that fits in one frame after `MESG `.
pub const MAX_MESSAGE_LEN: usize = MAX_FRAME_SIZE - MESG.len() - 1;

pub const PING: &[u8] = b"PING";
pub const PONG: &[u8] = b"PONG";
pub const MESG: &[u8] = b"MESG";
pub const TERM: &[u8] = b"TERM";
pub const PASS: &[u8] = b"PASS";
pub const PWOK: &[u8] = b"PWOK";
pub const PWNO: &[u8] = b"PWNO";
pub const PWIV: &[u8] = b"PWIV";

/// A parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Handshake request.
    Ping,
    /// Handshake accepted.
    Pong,
    /// Text to log and echo (request), or the echo itself (reply).
    Message(String),
    /// Shutdown request; a credential frame follows.
    Term,
    /// Credential response to a pending `TERM`.
    Pass(Bytes),
    /// Credential accepted.
    PasswordOk,
    /// Credential rejected.
    PasswordWrong,
    /// Credential frame malformed.
    PasswordInvalid,
    /// Anything this protocol does not define.
    Unknown(Bytes),
}

impl Frame {
    /// Parse a single frame. Never fails: unrecognized input is `Unknown`.
    pub fn parse(input: &[u8]) -> Frame {
        match input {
            PING => return Frame::Ping,
            PONG => return Frame::Pong,
            TERM => return Frame::Term,
            PWOK => return Frame::PasswordOk,
            PWNO => return Frame::PasswordWrong,
            PWIV => return Frame::PasswordInvalid,
            MESG => return Frame::Message(String::new()),
            _ => {}
        }

        if let Some(payload) = payload_after(input, MESG) {
            return match std::str::from_utf8(payload) {
                Ok(text) => Frame::Message(text.to_string()),
                Err(_) => Frame::Unknown(Bytes::copy_from_slice(input)),
            };
        }

        if let Some(payload) = payload_after(input, PASS) {
            return Frame::Pass(Bytes::copy_from_slice(payload));
        }

        Frame::Unknown(Bytes::copy_from_slice(input))
    }

    /// Encode this frame into its wire form.
    pub fn encode(&self) -> BytesMut {
        match self {
            Frame::Ping => BytesMut::from(PING),
            Frame::Pong => BytesMut::from(PONG),
            Frame::Term => BytesMut::from(TERM),
            Frame::PasswordOk => BytesMut::from(PWOK),
            Frame::PasswordWrong => BytesMut::from(PWNO),
            Frame::PasswordInvalid => BytesMut::from(PWIV),
            Frame::Message(text) => with_payload(MESG, text.as_bytes()),
            Frame::Pass(secret) => with_payload(PASS, secret),
            Frame::Unknown(raw) => BytesMut::from(&raw[..]),
        }
    }
}

/// Return the bytes following `<header> `, if `input` starts with them.
fn payload_after<'a>(input: &'a [u8], header: &[u8]) -> Option<&'a [u8]> {
    input.strip_prefix(header)?.strip_prefix(b" ")
}

fn with_payload(header: &[u8], payload: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(header.len() + 1 + payload.len());
    out.put_slice(header);
    out.put_u8(b' ');
    out.put_slice(payload);
    out
}

/// Split a `TERM` that arrived in the same read as the `PASS` following it.
///
/// Returns the length of the leading `TERM` frame when a split applies.
pub fn coalesced_term(input: &[u8]) -> Option<usize> {
    let rest = input.strip_prefix(TERM)?;
    rest.starts_with(PASS).then_some(TERM.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed_headers() {
        assert_eq!(Frame::parse(b"PING"), Frame::Ping);
        assert_eq!(Frame::parse(b"PONG"), Frame::Pong);
        assert_eq!(Frame::parse(b"TERM"), Frame::Term);
        assert_eq!(Frame::parse(b"PWOK"), Frame::PasswordOk);
        assert_eq!(Frame::parse(b"PWNO"), Frame::PasswordWrong);
        assert_eq!(Frame::parse(b"PWIV"), Frame::PasswordInvalid);
    }

    #[test]
    fn test_headers_are_exact() {
        assert!(matches!(Frame::parse(b"ping"), Frame::Unknown(_)));
        assert!(matches!(Frame::parse(b"PING "), Frame::Unknown(_)));
        assert!(matches!(Frame::parse(b"TERMINATE"), Frame::Unknown(_)));
        assert!(matches!(Frame::parse(b""), Frame::Unknown(_)));
    }

    #[test]
    fn test_parse_message() {
        assert_eq!(
            Frame::parse(b"MESG hello world"),
            Frame::Message("hello world".to_string())
        );
        assert_eq!(Frame::parse(b"MESG"), Frame::Message(String::new()));
        assert_eq!(Frame::parse(b"MESG "), Frame::Message(String::new()));
        // Only the first space separates the header
        assert_eq!(
            Frame::parse(b"MESG  padded"),
            Frame::Message(" padded".to_string())
        );
    }

    #[test]
    fn test_message_must_be_utf8() {
        assert!(matches!(
            Frame::parse(b"MESG \xff\xfe"),
            Frame::Unknown(_)
        ));
    }

    #[test]
    fn test_message_without_separator() {
        assert!(matches!(Frame::parse(b"MESGhello"), Frame::Unknown(_)));
    }

    #[test]
    fn test_parse_pass() {
        assert_eq!(
            Frame::parse(b"PASS secret"),
            Frame::Pass(Bytes::from_static(b"secret"))
        );
        assert_eq!(Frame::parse(b"PASS "), Frame::Pass(Bytes::new()));
        assert!(matches!(Frame::parse(b"PASS"), Frame::Unknown(_)));
    }

    #[test]
    fn test_encode() {
        assert_eq!(&Frame::Ping.encode()[..], b"PING");
        assert_eq!(&Frame::PasswordWrong.encode()[..], b"PWNO");
        assert_eq!(
            &Frame::Message("héllo".to_string()).encode()[..],
            "MESG héllo".as_bytes()
        );
        assert_eq!(
            &Frame::Pass(Bytes::from_static(b"pw")).encode()[..],
            b"PASS pw"
        );
    }

    #[test]
    fn test_max_message_fills_one_frame() {
        let text = "a".repeat(MAX_MESSAGE_LEN);
        assert_eq!(Frame::Message(text).encode().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_coalesced_term() {
        assert_eq!(coalesced_term(b"TERMPASS secret"), Some(4));
        assert_eq!(coalesced_term(b"TERM"), None);
        assert_eq!(coalesced_term(b"TERMINATE"), None);
        assert_eq!(coalesced_term(b"MESG TERMPASS"), None);
    }
}
