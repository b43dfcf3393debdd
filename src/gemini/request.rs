use bytes::Bytes;
use url::Url;

/// Request schemes the server accepts.
///
/// The scheme decides how large a request line may grow and whether a
/// payload may follow the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `gemini://` - URL only, at most 1024 bytes.
    Gemini,
    /// `nimigem://` - URL plus an optional percent-encoded payload.
    Nimigem,
}

impl Scheme {
    /// Parses a scheme name.
    ///
    /// # Example
    ///
    /// ```
    /// # use nightjar::gemini::request::Scheme;
    /// assert_eq!(Scheme::from_str("nimigem"), Some(Scheme::Nimigem));
    /// assert_eq!(Scheme::from_str("https"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gemini" => Some(Scheme::Gemini),
            "nimigem" => Some(Scheme::Nimigem),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Gemini => "gemini",
            Scheme::Nimigem => "nimigem",
        }
    }

    /// Largest request line, in bytes, excluding the line terminator.
    ///
    /// 15 KiB of percent-encoded payload decodes to roughly 10 KiB.
    pub fn max_request_size(&self) -> usize {
        match self {
            Scheme::Gemini => 1024,
            Scheme::Nimigem => 15360,
        }
    }

    pub fn carries_payload(&self) -> bool {
        matches!(self, Scheme::Nimigem)
    }
}

/// A decoded client request.
///
/// Built once by the request decoder and handed to a handler by reference.
#[derive(Debug, Clone)]
pub struct Request {
    /// The scheme the request line started with
    pub scheme: Scheme,
    /// The parsed request target
    pub url: Url,
    /// Decoded nimigem payload; always empty for gemini requests
    pub payload: Bytes,
}

impl Request {
    pub fn new(scheme: Scheme, url: Url, payload: impl Into<Bytes>) -> Self {
        Self {
            scheme,
            url,
            payload: payload.into(),
        }
    }

    /// The URL path, still percent-encoded.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The raw query component, if one was sent.
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}
