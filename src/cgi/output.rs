use thiserror::Error;

use crate::gemini::status::Status;

/// Reasons a gateway program's output cannot be relayed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("empty header")]
    Empty,

    #[error("header too short")]
    Unterminated,

    #[error("missing LF after CR")]
    MissingLf,

    #[error("header line must end with CRLF")]
    BareLf,

    #[error("first 2 characters must be digits")]
    NotNumeric,

    #[error("invalid status {0:?}")]
    InvalidStatus(String),
}

impl HeaderError {
    /// Fixed phrase sent to the client; the detail only goes to the log.
    pub fn client_meta(&self) -> &'static str {
        match self {
            HeaderError::InvalidStatus(_) => "CGI error - invalid status!",
            _ => "CGI error - invalid or missing header",
        }
    }
}

/// A program's output split into status line and body.
#[derive(Debug, PartialEq, Eq)]
pub struct GatewayResponse<'a> {
    pub status: Status,
    pub meta: String,
    pub body: &'a [u8],
}

/// Splits captured output into `<status> <meta>\r\n` and the body after it.
///
/// The header must be terminated by CRLF and start with two digits. The meta
/// is everything after the first space, inner spaces included.
///
/// # Example
///
/// ```
/// # use nightjar::cgi::output::parse_output;
/// # use nightjar::gemini::status::Status;
/// let parsed = parse_output(b"20 text/gemini\r\nHello").unwrap();
/// assert_eq!(parsed.status, Status::Success);
/// assert_eq!(parsed.meta, "text/gemini");
/// assert_eq!(parsed.body, b"Hello");
/// ```
pub fn parse_output(output: &[u8]) -> Result<GatewayResponse<'_>, HeaderError> {
    if output.is_empty() {
        return Err(HeaderError::Empty);
    }

    let cr = match output.iter().position(|b| *b == b'\r' || *b == b'\n') {
        Some(at) if output[at] == b'\n' => return Err(HeaderError::BareLf),
        Some(at) => at,
        None => return Err(HeaderError::Unterminated),
    };
    match output.get(cr + 1) {
        Some(b'\n') => {}
        Some(_) => return Err(HeaderError::MissingLf),
        None => return Err(HeaderError::Unterminated),
    }

    let header = &output[..cr];
    if !matches!(header, [a, b, ..] if a.is_ascii_digit() && b.is_ascii_digit()) {
        return Err(HeaderError::NotNumeric);
    }

    let header = String::from_utf8_lossy(header);
    let (code, meta) = header.split_once(' ').unwrap_or((&*header, ""));
    let code: u16 = code
        .parse()
        .map_err(|_| HeaderError::InvalidStatus(code.to_string()))?;

    Ok(GatewayResponse {
        status: Status::from_u16(code),
        meta: meta.to_string(),
        body: &output[cr + 2..],
    })
}
