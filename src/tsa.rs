//! RFC 3161 timestamp client: build a `TimeStampReq` with a fresh
//! nonce, POST it to the TSA, and verify the response.

use std::collections::HashMap;
use std::time::Duration;

use der::asn1::{Any, Int, OctetString};
use der::{Decode, Encode};
use rand::RngCore;
use spki::AlgorithmIdentifierOwned;

use crate::asn1::tsp::{MessageImprint, TimeStampReq, TimeStampResp, TstInfo};
use crate::error::{PdfSignError, Result};
use crate::oid::DigestAlgorithm;

/// Options controlling how a timestamp request is built and validated.
#[derive(Debug, Clone)]
pub struct TsaOptions {
    pub hash: DigestAlgorithm,
    pub cert_req: bool,
    pub req_policy_oid: Option<String>,
    pub nonce_bytes: usize,
    pub allow_missing_nonce: bool,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub headers: HashMap<String, String>,
}

impl Default for TsaOptions {
    fn default() -> Self {
        Self {
            hash: DigestAlgorithm::Sha256,
            cert_req: true,
            req_policy_oid: None,
            nonce_bytes: 8,
            allow_missing_nonce: true,
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            headers: HashMap::new(),
        }
    }
}

/// The result of a successful timestamp round-trip: the raw `ContentInfo`
/// bytes of the `timeStampToken` (ready for embedding into a CMS unsigned
/// attribute or directly into a PDF `/Contents` for a bare DocTimeStamp),
/// plus the parsed `TSTInfo` for callers who want the genTime/serial.
pub struct TimestampToken {
    pub der: Vec<u8>,
    pub info: TstInfo,
}

/// Client for a single Time Stamp Authority endpoint.
pub struct TsaClient {
    http: reqwest::Client,
}

impl TsaClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Request and validate a timestamp over `imprint` (the pre-image
    /// digest, already computed by the caller). Returns the raw token DER.
    pub async fn request_timestamp(
        &self,
        url: &str,
        imprint: &[u8],
        opts: &TsaOptions,
    ) -> Result<TimestampToken> {
        let nonce = generate_nonce(opts.nonce_bytes);
        let req = build_request(imprint, opts, &nonce)?;
        let req_der = req
            .to_der()
            .map_err(|e| PdfSignError::TSAProtocol(format!("failed to encode TimeStampReq: {e}")))?;

        log::debug!("tsa: POST {} ({} byte request)", url, req_der.len());

        let client = reqwest::Client::builder()
            .timeout(opts.timeout)
            .redirect(reqwest::redirect::Policy::limited(opts.max_redirects))
            .build()
            .unwrap_or_else(|_| self.http.clone());

        let mut builder = client
            .post(url)
            .header("Content-Type", "application/timestamp-query")
            .header("Accept", "application/timestamp-reply")
            .body(req_der);

        for (name, value) in &opts.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PdfSignError::TSANetwork(format!("TSA request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(PdfSignError::TSANetwork(format!(
                "TSA returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PdfSignError::TSANetwork(format!("failed to read TSA response: {e}")))?;

        log::debug!("tsa: received {} byte response", body.len());

        validate_response(&body, imprint, opts, &nonce)
    }
}

impl Default for TsaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_nonce(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len.max(1)];
    rand::thread_rng().fill_bytes(&mut bytes);
    // INTEGER must be non-negative: clear the sign bit of the first byte.
    bytes[0] &= 0x7f;
    bytes
}

fn build_request(imprint: &[u8], opts: &TsaOptions, nonce: &[u8]) -> Result<TimeStampReq> {
    let hash_alg_id = AlgorithmIdentifierOwned {
        oid: opts.hash.oid(),
        parameters: Some(Any::new(der::Tag::Null, Vec::new())?),
    };

    let message_imprint = MessageImprint {
        hash_algorithm: hash_alg_id,
        hashed_message: OctetString::new(imprint.to_vec())?,
    };

    let req_policy = match &opts.req_policy_oid {
        Some(s) => Some(
            const_oid::ObjectIdentifier::new(s)
                .map_err(|e| PdfSignError::UnsupportedAlgorithm(format!("bad reqPolicy OID: {e}")))?,
        ),
        None => None,
    };

    Ok(TimeStampReq {
        version: 1,
        message_imprint,
        req_policy,
        nonce: Some(Int::new(nonce)?),
        cert_req: opts.cert_req.then_some(true),
    })
}

fn validate_response(
    body: &[u8],
    expected_imprint: &[u8],
    opts: &TsaOptions,
    sent_nonce: &[u8],
) -> Result<TimestampToken> {
    let resp = TimeStampResp::from_der(body)
        .map_err(|e| PdfSignError::TSAProtocol(format!("malformed TimeStampResp: {e}")))?;

    if resp.status.status != 0 && resp.status.status != 1 {
        let status_string = resp
            .status
            .status_string
            .map(|parts| parts.join(" "))
            .unwrap_or_default();
        let fail_info = resp
            .status
            .fail_info
            .and_then(|bits| bits.raw_bytes().first().copied())
            .map(|b| b as i32);
        return Err(PdfSignError::TSARejected {
            status: resp.status.status,
            status_string,
            fail_info,
        });
    }

    let token = resp
        .time_stamp_token
        .ok_or_else(|| PdfSignError::TSAProtocol("response granted but no timeStampToken".into()))?;

    let token_der = token
        .to_der()
        .map_err(|e| PdfSignError::TSAProtocol(format!("failed to re-encode timeStampToken: {e}")))?;

    // eContent of the enclosed SignedData is the DER-encoded TSTInfo,
    // wrapped as an OCTET STRING. We re-decode `content` (the SignedData)
    // minimally: callers only need TSTInfo, so we pull it out of the
    // encapContentInfo without fully modeling CertificateSet/SignerInfos
    // (they are not needed for validation and are preserved verbatim in
    // `der` for embedding).
    let tst_info = extract_tst_info(&token.content)?;

    if tst_info.message_imprint.hash_algorithm.oid != opts.hash.oid() {
        return Err(PdfSignError::TSAMismatch(
            "messageImprint.hashAlgorithm does not match the requested hash".into(),
        ));
    }
    if tst_info.message_imprint.hashed_message.as_bytes() != expected_imprint {
        return Err(PdfSignError::TSAMismatch(
            "messageImprint.hashedMessage does not match the signed digest".into(),
        ));
    }

    match &tst_info.nonce {
        Some(returned) => {
            let sent = Int::new(sent_nonce)?;
            if returned.as_bytes() != sent.as_bytes() {
                return Err(PdfSignError::TSAMismatch(
                    "TSA response nonce does not match the request nonce".into(),
                ));
            }
        }
        None => {
            if !opts.allow_missing_nonce {
                return Err(PdfSignError::TSAMismatch(
                    "TSA response omitted the nonce and allowMissingNonce is false".into(),
                ));
            }
        }
    }

    Ok(TimestampToken {
        der: token_der,
        info: tst_info,
    })
}

/// `SignedData.encapContentInfo.eContent` holds the DER-encoded `TSTInfo`
/// inside an explicit `[0] OCTET STRING`. A real `timeStampToken` also
/// carries `certificates [0]` (present whenever `certReq=true`, the
/// default) and `signerInfos` after `encapContentInfo`, so the full
/// `SignedData` shape must be decoded — a struct modeling only the first
/// two fields leaves those trailing bytes unconsumed and `from_der` fails.
fn extract_tst_info(signed_data_any: &Any) -> Result<TstInfo> {
    let signed_data_der = signed_data_any.to_der()?;
    let signed_data = crate::asn1::cms_types::SignedData::from_der(&signed_data_der)
        .map_err(|e| PdfSignError::TSAProtocol(format!("malformed timeStampToken SignedData: {e}")))?;

    let econtent = signed_data
        .encap_content_info
        .econtent
        .ok_or_else(|| PdfSignError::TSAProtocol("timeStampToken has no eContent".into()))?;

    let octets = OctetString::from_der(&econtent.to_der()?)
        .map_err(|e| PdfSignError::TSAProtocol(format!("eContent is not an OCTET STRING: {e}")))?;

    TstInfo::from_der(octets.as_bytes())
        .map_err(|e| PdfSignError::TSAProtocol(format!("malformed TSTInfo: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_always_non_negative() {
        for len in [1, 8, 16] {
            let nonce = generate_nonce(len);
            assert_eq!(nonce.len(), len);
            assert_eq!(nonce[0] & 0x80, 0);
        }
    }

    #[test]
    fn default_options_are_sha256_with_cert_request() {
        let opts = TsaOptions::default();
        assert_eq!(opts.hash, DigestAlgorithm::Sha256);
        assert!(opts.cert_req);
        assert_eq!(opts.nonce_bytes, 8);
        assert!(opts.allow_missing_nonce);
    }
}
