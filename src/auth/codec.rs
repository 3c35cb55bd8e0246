use super::session::Session;
use crate::{MessagesError, Result};
use serde::{Deserialize, Serialize};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    #[serde(flatten)]
    session: &'a Session,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    #[serde(flatten)]
    session: Session,
}

/// Converts a [`Session`] to and from its portable JSON form.
///
/// The form is a versioned object holding `cookies`, `localStorage` and
/// `sessionStorage`. `decode(encode(s)) == s` for every session.
pub struct CredentialCodec;

impl CredentialCodec {
    pub fn encode(session: &Session) -> Result<Vec<u8>> {
        // JSON has no NaN or infinity; such a value would not decode.
        if let Some(cookie) = session.cookies().iter().find(|c| !c.expires.is_finite()) {
            return Err(MessagesError::MalformedCredentials(format!(
                "cookie '{}' has a non-finite expiry ({})",
                cookie.name, cookie.expires
            )));
        }

        let envelope = EnvelopeRef {
            version: FORMAT_VERSION,
            session,
        };
        Ok(serde_json::to_vec_pretty(&envelope)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Session> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| MessagesError::MalformedCredentials(e.to_string()))?;

        if envelope.version != FORMAT_VERSION {
            return Err(MessagesError::MalformedCredentials(format!(
                "unsupported format version {} (expected {})",
                envelope.version, FORMAT_VERSION
            )));
        }

        Ok(envelope.session)
    }
}
