//! Credential check gating a remote `TERM`.

use std::io::{self, Read, Write};

use crate::protocol::{Frame, Framed};

/// Result of a credential challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// `PASS` with the correct secret; answered `PWOK`.
    Authorized,
    /// `PASS` with a different secret; answered `PWNO`.
    Denied,
    /// Not a `PASS` frame; answered `PWIV`.
    Malformed,
}

impl Verdict {
    pub fn reply(self) -> Frame {
        match self {
            Verdict::Authorized => Frame::PasswordOk,
            Verdict::Denied => Frame::PasswordWrong,
            Verdict::Malformed => Frame::PasswordInvalid,
        }
    }

    /// Map a server reply back to a verdict (client side).
    pub fn from_reply(frame: &Frame) -> Option<Self> {
        match frame {
            Frame::PasswordOk => Some(Verdict::Authorized),
            Frame::PasswordWrong => Some(Verdict::Denied),
            Frame::PasswordInvalid => Some(Verdict::Malformed),
            _ => None,
        }
    }
}

/// Judge a credential frame against the configured secret (byte-exact).
pub fn judge(frame: &Frame, secret: &[u8]) -> Verdict {
    match frame {
        Frame::Pass(attempt) if attempt[..] == *secret => Verdict::Authorized,
        Frame::Pass(_) => Verdict::Denied,
        _ => Verdict::Malformed,
    }
}

/// Read exactly one credential frame and send exactly one reply.
///
/// Never closes the connection; only the caller acts on `Authorized`.
/// An empty read counts as malformed.
pub fn validate<S: Read + Write>(framed: &mut Framed<S>, secret: &[u8]) -> io::Result<Verdict> {
    let raw = framed.read_frame()?.unwrap_or_default();
    let verdict = judge(&Frame::parse(&raw), secret);
    framed.send(&verdict.reply())?;
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::framed::mock::ScriptedStream;

    fn run(chunks: &[&[u8]], secret: &[u8]) -> (Verdict, Vec<Vec<u8>>) {
        let mut framed = Framed::new(ScriptedStream::new(chunks));
        let verdict = validate(&mut framed, secret).unwrap();
        (verdict, framed.get_ref().written.clone())
    }

    #[test]
    fn test_correct_password() {
        let (verdict, written) = run(&[b"PASS password"], b"password");
        assert_eq!(verdict, Verdict::Authorized);
        assert_eq!(written, vec![b"PWOK".to_vec()]);
    }

    #[test]
    fn test_wrong_password() {
        let (verdict, written) = run(&[b"PASS nope"], b"password");
        assert_eq!(verdict, Verdict::Denied);
        assert_eq!(written, vec![b"PWNO".to_vec()]);
    }

    #[test]
    fn test_comparison_is_byte_exact() {
        assert_eq!(run(&[b"PASS password "], b"password").0, Verdict::Denied);
        assert_eq!(run(&[b"PASS Password"], b"password").0, Verdict::Denied);
        assert_eq!(run(&[b"PASS "], b"password").0, Verdict::Denied);
    }

    #[test]
    fn test_malformed_credential() {
        let (verdict, written) = run(&[b"MESG password"], b"password");
        assert_eq!(verdict, Verdict::Malformed);
        assert_eq!(written, vec![b"PWIV".to_vec()]);

        assert_eq!(run(&[b"PASS"], b"password").0, Verdict::Malformed);
        assert_eq!(run(&[b"PASSpassword"], b"password").0, Verdict::Malformed);
    }

    #[test]
    fn test_empty_read_is_malformed() {
        let (verdict, written) = run(&[], b"password");
        assert_eq!(verdict, Verdict::Malformed);
        assert_eq!(written, vec![b"PWIV".to_vec()]);
    }

    #[test]
    fn test_reply_round_trip() {
        for verdict in [Verdict::Authorized, Verdict::Denied, Verdict::Malformed] {
            assert_eq!(Verdict::from_reply(&verdict.reply()), Some(verdict));
        }
        assert_eq!(Verdict::from_reply(&Frame::Pong), None);
    }
}
