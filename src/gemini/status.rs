use std::fmt;

/// The six status families of the protocol, keyed by the first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    /// 1x - the client must send input
    Input,
    /// 2x - success, meta is a MIME type
    Success,
    /// 3x - redirect, meta is the new URL
    Redirect,
    /// 4x - temporary failure
    TemporaryFailure,
    /// 5x - permanent failure
    PermanentFailure,
    /// 6x - a client certificate is required
    CertificateRequired,
}

/// Response status codes.
///
/// The named variants cover the codes the server itself emits. Gateway
/// programs may answer with any two-digit code, which round-trips through
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 10
    Input,
    /// 11
    SensitiveInput,
    /// 20
    Success,
    /// 30
    RedirectTemporary,
    /// 31
    RedirectPermanent,
    /// 40
    TemporaryFailure,
    /// 41
    ServerUnavailable,
    /// 42 - the gateway itself failed to produce a response
    CgiError,
    /// 43
    ProxyError,
    /// 44
    SlowDown,
    /// 50
    PermanentFailure,
    /// 51
    NotFound,
    /// 52
    Gone,
    /// 53
    ProxyRequestRefused,
    /// 59
    BadRequest,
    /// 60
    ClientCertificateRequired,
    /// 61
    CertificateNotAuthorised,
    /// 62
    CertificateNotValid,
    /// Any other code, usually relayed from a gateway program.
    Other(u16),
}

impl Status {
    /// Returns the numeric status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use nightjar::gemini::status::Status;
    /// assert_eq!(Status::Success.as_u16(), 20);
    /// assert_eq!(Status::CgiError.as_u16(), 42);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            Status::Input => 10,
            Status::SensitiveInput => 11,
            Status::Success => 20,
            Status::RedirectTemporary => 30,
            Status::RedirectPermanent => 31,
            Status::TemporaryFailure => 40,
            Status::ServerUnavailable => 41,
            Status::CgiError => 42,
            Status::ProxyError => 43,
            Status::SlowDown => 44,
            Status::PermanentFailure => 50,
            Status::NotFound => 51,
            Status::Gone => 52,
            Status::ProxyRequestRefused => 53,
            Status::BadRequest => 59,
            Status::ClientCertificateRequired => 60,
            Status::CertificateNotAuthorised => 61,
            Status::CertificateNotValid => 62,
            Status::Other(code) => *code,
        }
    }

    /// Maps a numeric code back to a status, falling back to `Other`.
    pub fn from_u16(code: u16) -> Self {
        match code {
            10 => Status::Input,
            11 => Status::SensitiveInput,
            20 => Status::Success,
            30 => Status::RedirectTemporary,
            31 => Status::RedirectPermanent,
            40 => Status::TemporaryFailure,
            41 => Status::ServerUnavailable,
            42 => Status::CgiError,
            43 => Status::ProxyError,
            44 => Status::SlowDown,
            50 => Status::PermanentFailure,
            51 => Status::NotFound,
            52 => Status::Gone,
            53 => Status::ProxyRequestRefused,
            59 => Status::BadRequest,
            60 => Status::ClientCertificateRequired,
            61 => Status::CertificateNotAuthorised,
            62 => Status::CertificateNotValid,
            other => Status::Other(other),
        }
    }

    /// Classifies the code by its leading digit.
    ///
    /// Returns `None` for codes outside `10..=69`.
    pub fn family(&self) -> Option<StatusFamily> {
        match self.as_u16() {
            10..=19 => Some(StatusFamily::Input),
            20..=29 => Some(StatusFamily::Success),
            30..=39 => Some(StatusFamily::Redirect),
            40..=49 => Some(StatusFamily::TemporaryFailure),
            50..=59 => Some(StatusFamily::PermanentFailure),
            60..=69 => Some(StatusFamily::CertificateRequired),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.family() == Some(StatusFamily::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self.family(),
            Some(StatusFamily::TemporaryFailure | StatusFamily::PermanentFailure)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}
