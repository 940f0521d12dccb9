//! PAdES-T: incremental PDF signing with a CAdES-BES signature and an
//! RFC 3161 signature-time-stamp.
//!
//! The crate is organized around that pipeline: [`pdf::reader`] parses
//! the existing xref/trailer chain, [`pdf::writer`] appends incremental
//! updates (AcroForm/field setup, the `/ByteRange`/`/Contents` placeholder,
//! and the final byte splice), [`cms`] builds the CAdES-BES `SignedData`,
//! [`tsa`] talks RFC 3161 to a Time-Stamp Authority, and [`orchestrator`]
//! wires all of it into the `sign_pades_t`/`add_document_timestamp`
//! operations a caller actually calls.

pub mod asn1;
pub mod certificate;
pub mod cms;
pub mod error;
pub mod oid;
pub mod orchestrator;
pub mod pdf;
pub mod signature_config;
pub mod signer;
pub mod tsa;
pub mod utils;

pub use certificate::Certificate;
pub use error::{PdfSignError, Result};
pub use orchestrator::{
    add_document_timestamp, sign_pades_t, AddDocumentTimestampRequest, DocumentTimestampOptions,
    SignMode, SignOutput, SignRequest, TimestampRequester, VisibleSignatureOptions,
};
pub use signer::SigningKey;
pub use tsa::{TimestampToken, TsaClient, TsaOptions};
