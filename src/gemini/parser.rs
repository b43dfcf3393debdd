use bytes::Bytes;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use url::Url;

use crate::gemini::request::{Request, Scheme};
use crate::gemini::status::Status;

/// Number of bytes read before the scheme, and with it the size limit, is known.
pub const SNIPPET_LEN: usize = 10;

/// Ways a request line can fail to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The transport failed or timed out before a full line arrived.
    #[error("error reading request: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// The line did not fit the scheme's size limit.
    #[error("request exceeds {limit} bytes")]
    TooLong { limit: usize },

    #[error("request line is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid payload encoding: {0}")]
    Payload(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl DecodeError {
    /// Status sent to the client for this failure.
    ///
    /// Transport problems are temporary; everything else is the client's fault.
    pub fn status(&self) -> Status {
        match self {
            DecodeError::Io(_) => Status::TemporaryFailure,
            _ => Status::PermanentFailure,
        }
    }

    /// Meta text sent alongside [`DecodeError::status`].
    pub fn meta(&self) -> String {
        match self {
            DecodeError::Io(e) => format!("Unknown error reading request! {e}"),
            DecodeError::UnsupportedScheme(_) => {
                "Unknown or missing URL scheme. Only gemini and nimigem are supported!".to_string()
            }
            DecodeError::TooLong { .. } => "Request too long!".to_string(),
            DecodeError::InvalidUtf8 => "Request is not valid UTF-8!".to_string(),
            DecodeError::Payload(e) => format!("Invalid nimigem payload encoding! {e}"),
            DecodeError::Url(e) => format!("Error parsing URL! {e}"),
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, DecodeError::TooLong { .. })
    }
}

enum DecodeState {
    AwaitSchemeSnippet,
    AwaitRestOfLine {
        scheme: Scheme,
        snippet: [u8; SNIPPET_LEN],
    },
    SplitPayload {
        scheme: Scheme,
        line: String,
    },
    ParseUrl {
        scheme: Scheme,
        url: String,
        payload: Bytes,
    },
    Ready(Request),
}

/// Turns the start of a connection into a [`Request`].
///
/// Decoding runs as a small state machine:
///
/// ```text
/// AwaitSchemeSnippet -> AwaitRestOfLine -> [SplitPayload] -> ParseUrl -> Ready
/// ```
///
/// Any state may bail out with a [`DecodeError`]. `SplitPayload` is only
/// visited for nimigem requests.
pub struct RequestDecoder<R> {
    reader: R,
    state: DecodeState,
}

impl<R: AsyncBufRead + Unpin> RequestDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: DecodeState::AwaitSchemeSnippet,
        }
    }

    pub async fn decode(mut self) -> Result<Request, DecodeError> {
        loop {
            let state = std::mem::replace(&mut self.state, DecodeState::AwaitSchemeSnippet);

            self.state = match state {
                DecodeState::AwaitSchemeSnippet => {
                    let mut snippet = [0u8; SNIPPET_LEN];
                    self.reader.read_exact(&mut snippet).await?;
                    let scheme = scheme_of(&snippet)?;
                    DecodeState::AwaitRestOfLine { scheme, snippet }
                }

                DecodeState::AwaitRestOfLine { scheme, snippet } => {
                    let line = self.read_rest_of_line(scheme, &snippet).await?;
                    if scheme.carries_payload() {
                        DecodeState::SplitPayload { scheme, line }
                    } else {
                        DecodeState::ParseUrl {
                            scheme,
                            url: line,
                            payload: Bytes::new(),
                        }
                    }
                }

                DecodeState::SplitPayload { scheme, line } => {
                    let (url, payload) = match line.split_once(' ') {
                        Some((url, encoded)) => (url.to_string(), decode_payload(encoded)?),
                        None => (line, Bytes::new()),
                    };
                    DecodeState::ParseUrl {
                        scheme,
                        url,
                        payload,
                    }
                }

                DecodeState::ParseUrl {
                    scheme,
                    url,
                    payload,
                } => {
                    let url = Url::parse(&url)?;
                    DecodeState::Ready(Request::new(scheme, url, payload))
                }

                DecodeState::Ready(request) => return Ok(request),
            };
        }
    }

    /// Reads up to the line terminator without letting the whole line grow
    /// past the scheme's limit.
    async fn read_rest_of_line(
        &mut self,
        scheme: Scheme,
        snippet: &[u8; SNIPPET_LEN],
    ) -> Result<String, DecodeError> {
        // Very short lines may already be complete inside the snippet.
        if let Some(end) = snippet.iter().position(|b| *b == b'\n') {
            return line_to_string(strip_cr(snippet[..end].to_vec()));
        }

        let limit = scheme.max_request_size();
        let budget = limit - SNIPPET_LEN;

        // Room for the remaining content plus a CRLF.
        let mut rest = Vec::with_capacity(budget.min(1024));
        let n = (&mut self.reader)
            .take(budget as u64 + 2)
            .read_until(b'\n', &mut rest)
            .await?;

        if rest.last() == Some(&b'\n') {
            rest.pop();
        } else if n == budget + 2 {
            return Err(DecodeError::TooLong { limit });
        }
        // Otherwise the peer closed the stream without a terminator; take what arrived.

        // The CR may sit at the end of the snippet, so strip it from the whole line.
        let mut line = snippet.to_vec();
        line.extend_from_slice(&rest);
        let line = strip_cr(line);

        if line.len() > limit {
            return Err(DecodeError::TooLong { limit });
        }

        line_to_string(line)
    }
}

/// Decodes one request from an unbuffered reader.
pub async fn read_request<R: AsyncRead + Unpin>(reader: R) -> Result<Request, DecodeError> {
    RequestDecoder::new(BufReader::new(reader)).decode().await
}

fn scheme_of(snippet: &[u8]) -> Result<Scheme, DecodeError> {
    let name = snippet.split(|b| *b == b':').next().unwrap_or_default();
    let name = String::from_utf8_lossy(name);
    Scheme::from_str(&name).ok_or_else(|| DecodeError::UnsupportedScheme(name.into_owned()))
}

fn strip_cr(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}

fn line_to_string(line: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)
}

/// Percent-decodes a nimigem payload.
///
/// Unlike form decoding, `+` is left alone. A `%` that is not followed by two
/// hex digits is an error rather than being passed through.
///
/// # Example
///
/// ```
/// # use nightjar::gemini::parser::decode_payload;
/// assert_eq!(&decode_payload("hello%20world").unwrap()[..], b"hello world");
/// assert!(decode_payload("100%").is_err());
/// ```
pub fn decode_payload(encoded: &str) -> Result<Bytes, DecodeError> {
    let raw = encoded.as_bytes();

    for (at, _) in raw.iter().enumerate().filter(|(_, b)| **b == b'%') {
        let valid = matches!(
            raw.get(at + 1..at + 3),
            Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
        );
        if !valid {
            let end = (at + 3).min(raw.len());
            let escape = String::from_utf8_lossy(&raw[at..end]);
            return Err(DecodeError::Payload(format!("invalid escape {escape:?}")));
        }
    }

    Ok(Bytes::from(percent_decode_str(encoded).collect::<Vec<u8>>()))
}
