use thiserror::Error;

/// Error taxonomy for the PAdES-T core.
///
/// `CannotSign` deliberately has no variant here: the certificate-gating
/// rule only ever triggers the internal DocTimeStamp fallback, which is
/// never surfaced to a caller as an error.
#[derive(Error, Debug)]
pub enum PdfSignError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed PDF: {0}")]
    PDFMalformed(String),

    #[error("signature field not found: {0}")]
    PDFFieldMissing(String),

    #[error("CMS/timestamp token ({actual} hex chars) exceeds placeholder capacity ({capacity})")]
    PlaceholderTooSmall { actual: usize, capacity: usize },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("TSA network error: {0}")]
    TSANetwork(String),

    #[error("TSA protocol error: {0}")]
    TSAProtocol(String),

    #[error("TSA rejected the request (status {status}): {status_string}")]
    TSARejected {
        status: i32,
        status_string: String,
        fail_info: Option<i32>,
    },

    #[error("TSA response mismatch: {0}")]
    TSAMismatch(String),

    #[error("invalid certificate: {0}")]
    CertInvalid(String),

    #[error("DER encoding error: {0}")]
    Der(#[from] der::Error),

    #[error("signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, PdfSignError>;
