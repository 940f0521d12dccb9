//! PAdES-T orchestrator: wires the certificate gate, the PDF writer's
//! placeholder mechanics, the CAdES builder, and the TSA client into
//! the sign / append-document-timestamp operations.

use std::future::Future;
use std::pin::Pin;

use crate::certificate::{Certificate, PublicKeyAlgorithm};
use crate::cms::{self, CadesBuilder};
use crate::error::Result;
use crate::oid::DigestAlgorithm;
use crate::pdf::appearance;
use crate::pdf::writer::{
    self, EnsureFieldOptions, PlaceholderOptions, Rect, SubFilter,
};
use crate::signer::SigningKey;
use crate::tsa::{TimestampToken, TsaClient, TsaOptions};
use crate::utils;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Seam the orchestrator drives the TSA round-trip through. The POST to the
/// TSA is the only genuine network I/O an operation performs; abstracting
/// it behind a trait lets tests substitute a fake responder instead of
/// reaching across the network.
pub trait TimestampRequester: Send + Sync {
    fn request_timestamp<'a>(
        &'a self,
        url: &'a str,
        imprint: &'a [u8],
        opts: &'a TsaOptions,
    ) -> BoxFuture<'a, Result<TimestampToken>>;
}

impl TimestampRequester for TsaClient {
    fn request_timestamp<'a>(
        &'a self,
        url: &'a str,
        imprint: &'a [u8],
        opts: &'a TsaOptions,
    ) -> BoxFuture<'a, Result<TimestampToken>> {
        Box::pin(TsaClient::request_timestamp(self, url, imprint, opts))
    }
}

/// Options for appending a standalone or follow-on DocTimeStamp.
#[derive(Debug, Clone)]
pub struct DocumentTimestampOptions {
    /// When set on a `SignRequest`, append a DocTimeStamp after a successful
    /// `pades-t` signature rather than producing `pades-t` alone.
    pub append: bool,
    pub field_name: String,
    pub placeholder_hex_len: usize,
}

impl Default for DocumentTimestampOptions {
    fn default() -> Self {
        Self { append: false, field_name: "DocTS".to_string(), placeholder_hex_len: 64_000 }
    }
}

/// A caller-supplied stamp image and optional caption, placed on the
/// signature widget before the placeholder is prepared.
#[derive(Debug, Clone)]
pub struct VisibleSignatureOptions {
    pub rect: Rect,
    pub page_index: Option<usize>,
    pub stamp_png: Vec<u8>,
    pub overlay_text: Option<String>,
}

/// Input to `sign_pades_t`.
pub struct SignRequest<'a> {
    pub pdf: Vec<u8>,
    pub key: &'a SigningKey,
    pub certificate: &'a Certificate,
    pub chain: &'a [Certificate],
    pub field_name: Option<String>,
    pub placeholder_hex_len: Option<usize>,
    pub tsa_url: String,
    pub tsa_options: TsaOptions,
    pub document_timestamp: Option<DocumentTimestampOptions>,
    pub visible_signature: Option<VisibleSignatureOptions>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
}

/// Input to `add_document_timestamp` as a standalone operation.
pub struct AddDocumentTimestampRequest {
    pub pdf: Vec<u8>,
    pub field_name: Option<String>,
    pub placeholder_hex_len: usize,
    pub tsa_url: String,
    pub tsa_options: TsaOptions,
}

/// Which of the four outcomes an operation actually produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    PadesT,
    PadesTPlusDocTs,
    DocTsFallback,
    DocTs,
}

impl SignMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SignMode::PadesT => "pades-t",
            SignMode::PadesTPlusDocTs => "pades-t+docts",
            SignMode::DocTsFallback => "docts-fallback",
            SignMode::DocTs => "docts",
        }
    }
}

pub struct SignOutput {
    pub pdf: Vec<u8>,
    pub mode: SignMode,
}

const DEFAULT_PADES_PLACEHOLDER: usize = 120_000;
const DEFAULT_DOCTS_PLACEHOLDER: usize = 64_000;
const DEFAULT_FIELD_NAME: &str = "Sig1";
const DEFAULT_DOCTS_FIELD_NAME: &str = "DocTS";

fn normalize_field_name(name: Option<&str>, default: &str) -> String {
    let name = name.unwrap_or(default);
    name.strip_prefix('/').unwrap_or(name).to_string()
}

/// Signs `req.pdf`: ensure the `/Sig` field, gate on `can_sign`,
/// optionally embed the visible appearance, prepare the placeholder, sign,
/// fetch a signature-time-stamp, and inject the final CMS. Falls back to a
/// bare DocTimeStamp over the same field when the certificate can't sign.
pub async fn sign_pades_t(req: SignRequest<'_>, tsa: &dyn TimestampRequester) -> Result<SignOutput> {
    let field_name = normalize_field_name(req.field_name.as_deref(), DEFAULT_FIELD_NAME);
    log::debug!("orchestrator: ensuring AcroForm + empty /Sig field {field_name:?}");

    let ensure_opts = EnsureFieldOptions {
        rect: req.visible_signature.as_ref().map(|v| v.rect),
        page_index: req.visible_signature.as_ref().and_then(|v| v.page_index),
    };
    let ensured = writer::ensure_acroform_and_empty_sig_field(req.pdf, &field_name, &ensure_opts)?;

    if !req.certificate.can_sign() {
        log::warn!(
            "orchestrator: certificate {:?} cannot sign (KeyUsage/EKU gate); falling back to DocTimeStamp",
            req.certificate.subject_cn()
        );
        let pdf = add_document_timestamp_inner(
            ensured.pdf,
            &field_name,
            req.placeholder_hex_len.unwrap_or(DEFAULT_DOCTS_PLACEHOLDER),
            &req.tsa_url,
            &req.tsa_options,
            tsa,
        )
        .await?;
        return Ok(SignOutput { pdf, mode: SignMode::DocTsFallback });
    }

    let mut pdf = ensured.pdf;
    if let Some(visible) = &req.visible_signature {
        log::debug!("orchestrator: embedding visible appearance on widget {}", ensured.widget_obj_num);
        pdf = appearance::embed_appearance(
            pdf,
            ensured.widget_obj_num,
            ensured.applied_rect,
            &visible.stamp_png,
            visible.overlay_text.as_deref(),
        )?;
    }

    let digest = recommended_digest(req.certificate, req.key);

    let placeholder_opts = PlaceholderOptions {
        sub_filter: SubFilter::CadesDetached,
        placeholder_hex_len: req.placeholder_hex_len.unwrap_or(DEFAULT_PADES_PLACEHOLDER),
        field_name: field_name.clone(),
        signer_name: req.certificate.subject_cn(),
        reason: req.reason.clone(),
        location: req.location.clone(),
        contact_info: req.contact_info.clone(),
    };
    let placeholder = writer::prepare_placeholder(pdf, &placeholder_opts)?;
    log::debug!("orchestrator: placeholder prepared, signature object {}", placeholder.sig_obj_num);

    let tbs_hash = writer::compute_byte_range_hash(&placeholder.pdf, placeholder.byte_range, digest);

    let cades = CadesBuilder { leaf: req.certificate, chain: req.chain, key: req.key, digest };
    let cades_der = cades.build(&tbs_hash)?;
    let signature_bytes = cms::extract_signature_value(&cades_der)?;
    let imprint = utils::digest(req.tsa_options.hash, &signature_bytes);

    log::debug!("orchestrator: requesting signature-time-stamp from {}", req.tsa_url);
    let token = tsa.request_timestamp(&req.tsa_url, &imprint, &req.tsa_options).await?;
    let final_cms = cades.attach_timestamp(&cades_der, &token.der)?;

    let mut pdf_bytes = placeholder.pdf;
    writer::inject_cms(&mut pdf_bytes, &placeholder, &final_cms)?;

    if let Some(doc_ts) = &req.document_timestamp {
        if doc_ts.append {
            log::debug!("orchestrator: appending a DocTimeStamp after pades-t");
            let pdf2 = add_document_timestamp_inner(
                pdf_bytes,
                &doc_ts.field_name,
                doc_ts.placeholder_hex_len,
                &req.tsa_url,
                &req.tsa_options,
                tsa,
            )
            .await?;
            return Ok(SignOutput { pdf: pdf2, mode: SignMode::PadesTPlusDocTs });
        }
    }

    Ok(SignOutput { pdf: pdf_bytes, mode: SignMode::PadesT })
}

/// Adds a bare document time-stamp as a standalone operation: ensures its
/// own `/Sig` field (named `DocTS` unless overridden), prepares an
/// `ETSI.RFC3161` placeholder, fetches a bare timestamp token over the
/// byte-range hash, and injects it directly (no CAdES wrapper).
pub async fn add_document_timestamp(
    req: AddDocumentTimestampRequest,
    tsa: &dyn TimestampRequester,
) -> Result<SignOutput> {
    let field_name = normalize_field_name(req.field_name.as_deref(), DEFAULT_DOCTS_FIELD_NAME);
    let pdf = add_document_timestamp_inner(
        req.pdf,
        &field_name,
        req.placeholder_hex_len,
        &req.tsa_url,
        &req.tsa_options,
        tsa,
    )
    .await?;
    Ok(SignOutput { pdf, mode: SignMode::DocTs })
}

async fn add_document_timestamp_inner(
    pdf: Vec<u8>,
    field_name: &str,
    placeholder_hex_len: usize,
    tsa_url: &str,
    tsa_options: &TsaOptions,
    tsa: &dyn TimestampRequester,
) -> Result<Vec<u8>> {
    let opts = PlaceholderOptions {
        sub_filter: SubFilter::Rfc3161,
        placeholder_hex_len,
        field_name: field_name.to_string(),
        signer_name: None,
        reason: None,
        location: None,
        contact_info: None,
    };
    let placeholder = writer::prepare_document_timestamp_placeholder(pdf, &opts)?;
    let tbs_hash = writer::compute_byte_range_hash(&placeholder.pdf, placeholder.byte_range, tsa_options.hash);
    let token = tsa.request_timestamp(tsa_url, &tbs_hash, tsa_options).await?;

    let mut pdf_bytes = placeholder.pdf;
    writer::inject_cms(&mut pdf_bytes, &placeholder, &token.der)?;
    Ok(pdf_bytes)
}

/// The digest a certificate's public key recommends, falling
/// back to the signing key's own recommendation if the certificate can't be
/// parsed for its algorithm (it was already validated enough to reach here
/// via `can_sign`, so this is only reached on malformed key material).
fn recommended_digest(cert: &Certificate, key: &SigningKey) -> DigestAlgorithm {
    match cert.public_key_algorithm() {
        Ok(PublicKeyAlgorithm::Rsa) => DigestAlgorithm::Sha256,
        Ok(PublicKeyAlgorithm::Ecdsa(curve)) => curve.recommended_digest(),
        Err(_) => key.recommended_digest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_mode_as_str_uses_the_documented_names() {
        assert_eq!(SignMode::PadesT.as_str(), "pades-t");
        assert_eq!(SignMode::PadesTPlusDocTs.as_str(), "pades-t+docts");
        assert_eq!(SignMode::DocTsFallback.as_str(), "docts-fallback");
        assert_eq!(SignMode::DocTs.as_str(), "docts");
    }

    #[test]
    fn normalize_field_name_strips_leading_slash() {
        assert_eq!(normalize_field_name(Some("/Sig1"), DEFAULT_FIELD_NAME), "Sig1");
        assert_eq!(normalize_field_name(None, DEFAULT_FIELD_NAME), DEFAULT_FIELD_NAME);
    }
}
