//! End-to-end coverage of the orchestrator's sign / DocTimeStamp flows.
//!
//! A TSA round-trip is the one piece of genuine network I/O these
//! operations perform, so every test here drives `sign_pades_t`/
//! `add_document_timestamp` through a hand-built [`FakeTsa`] implementing
//! [`TimestampRequester`] instead of reaching across the network. The
//! token it returns is structurally a real RFC 3161 `TimeStampToken`
//! (`ContentInfo` -> `SignedData` -> `TSTInfo`), just not cryptographically
//! signed by a real TSA key — nothing downstream of the trait verifies that
//! signature, only the message imprint and nonce.

use std::sync::Mutex;
use std::time::Duration;

use const_oid::ObjectIdentifier;
use der::asn1::{Any, GeneralizedTime, Int, OctetString};
use der::{DateTime, Decode, Encode};
use spki::AlgorithmIdentifierOwned;

use pades_t::asn1::cms_types::{ContentInfo, EncapsulatedContentInfo, IssuerAndSerialNumber, SignedData, SignerInfo};
use pades_t::asn1::tsp::{MessageImprint, TstInfo};
use pades_t::asn1::UnsortedSet;
use pades_t::certificate::Certificate;
use pades_t::error::PdfSignError;
use pades_t::oid;
use pades_t::pdf::reader::PdfDocument;
use pades_t::signer::SigningKey;
use pades_t::tsa::{TimestampToken, TsaOptions};
use pades_t::{sign_pades_t, SignMode, SignRequest, TimestampRequester};

const SIGNER_CERT_DER: &[u8] = include_bytes!("fixtures/signer_cert.der");
const SIGNER_KEY_PEM: &str = include_str!("fixtures/signer_key.pem");
const TIMESTAMP_ONLY_CERT_DER: &[u8] = include_bytes!("fixtures/timestamp_only_cert.der");
const TIMESTAMP_ONLY_KEY_PEM: &str = include_str!("fixtures/timestamp_only_key.pem");

fn minimal_pdf() -> Vec<u8> {
    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.7\n");
    let obj1 = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
    let obj2 = b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n";
    let obj3 = b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>\nendobj\n";
    let mut offs = Vec::new();
    for obj in [obj1.as_slice(), obj2.as_slice(), obj3.as_slice()] {
        offs.push(pdf.len());
        pdf.extend_from_slice(obj);
    }
    let xref_off = pdf.len();
    pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
    for off in &offs {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
    pdf.extend_from_slice(format!("startxref\n{xref_off}\n%%EOF\n").as_bytes());
    pdf
}

fn any_from<T: der::Encode>(value: &T) -> Any {
    Any::from_der(&value.to_der().unwrap()).unwrap()
}

fn build_fake_token(hash_oid: ObjectIdentifier, imprint: &[u8], nonce: Option<Int>) -> TimestampToken {
    let message_imprint = MessageImprint {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: hash_oid,
            parameters: Some(Any::new(der::Tag::Null, Vec::new()).unwrap()),
        },
        hashed_message: OctetString::new(imprint.to_vec()).unwrap(),
    };
    let tst_info = TstInfo {
        version: 1,
        policy: ObjectIdentifier::new_unwrap("1.2.3.4.5"),
        message_imprint,
        serial_number: Int::new(&[1]).unwrap(),
        gen_time: GeneralizedTime::from_date_time(DateTime::new(2026, 1, 1, 0, 0, 0).unwrap()).unwrap(),
        accuracy: None,
        ordering: None,
        nonce,
        tsa: None,
        extensions: None,
    };
    let tst_der = tst_info.to_der().unwrap();
    let econtent = any_from(&OctetString::new(tst_der).unwrap());

    let signer_info = SignerInfo {
        version: 1,
        sid: IssuerAndSerialNumber {
            issuer: Any::new(der::Tag::Sequence, Vec::new()).unwrap(),
            serial_number: Int::new(&[1]).unwrap(),
        },
        digest_algorithm: AlgorithmIdentifierOwned {
            oid: oid::SHA256,
            parameters: Some(Any::new(der::Tag::Null, Vec::new()).unwrap()),
        },
        signed_attrs: None,
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: oid::RSA_WITH_SHA256,
            parameters: Some(Any::new(der::Tag::Null, Vec::new()).unwrap()),
        },
        signature: OctetString::new(vec![0u8; 16]).unwrap(),
        unsigned_attrs: None,
    };

    let signed_data = SignedData {
        version: 3,
        digest_algorithms: UnsortedSet::new(vec![AlgorithmIdentifierOwned {
            oid: oid::SHA256,
            parameters: Some(Any::new(der::Tag::Null, Vec::new()).unwrap()),
        }]),
        encap_content_info: EncapsulatedContentInfo { econtent_type: oid::ID_CT_TST_INFO, econtent: Some(econtent) },
        certificates: None,
        signer_infos: UnsortedSet::new(vec![signer_info]),
    };

    let content_info = ContentInfo { content_type: oid::ID_SIGNED_DATA, content: any_from(&signed_data) };
    TimestampToken { der: content_info.to_der().unwrap(), info: tst_info }
}

/// Hands back a structurally valid `TimeStampToken` over whatever imprint
/// it was asked to stamp, without any network I/O. `rejects` forces a
/// `TSARejected` on every call, for exercising the rejection path.
struct FakeTsa {
    calls: Mutex<u32>,
    rejects: bool,
}

impl FakeTsa {
    fn new() -> Self {
        Self { calls: Mutex::new(0), rejects: false }
    }

    fn rejecting() -> Self {
        Self { calls: Mutex::new(0), rejects: true }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl TimestampRequester for FakeTsa {
    fn request_timestamp<'a>(
        &'a self,
        _url: &'a str,
        imprint: &'a [u8],
        opts: &'a TsaOptions,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = pades_t::Result<TimestampToken>> + Send + 'a>> {
        *self.calls.lock().unwrap() += 1;
        Box::pin(async move {
            if self.rejects {
                return Err(PdfSignError::TSARejected {
                    status: 2,
                    status_string: "rejected by policy".into(),
                    fail_info: Some(1),
                });
            }
            Ok(build_fake_token(opts.hash.oid(), imprint, None))
        })
    }
}

fn signer_materials() -> (SigningKey, Certificate) {
    let key = SigningKey::from_pem(SIGNER_KEY_PEM).unwrap();
    let cert = Certificate::from_der(SIGNER_CERT_DER.to_vec()).unwrap();
    (key, cert)
}

#[tokio::test]
async fn pades_t_signs_and_embeds_a_signature_timestamp() {
    let (key, cert) = signer_materials();
    let tsa = FakeTsa::new();
    let req = SignRequest {
        pdf: minimal_pdf(),
        key: &key,
        certificate: &cert,
        chain: &[],
        field_name: None,
        placeholder_hex_len: None,
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions::default(),
        document_timestamp: None,
        visible_signature: None,
        reason: Some("Approval".to_string()),
        location: None,
        contact_info: None,
    };

    let out = sign_pades_t(req, &tsa).await.unwrap();
    assert_eq!(out.mode, SignMode::PadesT);
    assert_eq!(tsa.call_count(), 1);

    let doc = PdfDocument::parse(out.pdf).unwrap();
    let catalog = doc.read_object(doc.trailer.root).unwrap();
    assert!(catalog.dict.contains("/AcroForm"));
}

#[tokio::test]
async fn pades_t_can_append_a_document_timestamp() {
    let (key, cert) = signer_materials();
    let tsa = FakeTsa::new();
    let req = SignRequest {
        pdf: minimal_pdf(),
        key: &key,
        certificate: &cert,
        chain: &[],
        field_name: Some("Signature1".to_string()),
        placeholder_hex_len: None,
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions::default(),
        document_timestamp: Some(pades_t::DocumentTimestampOptions { append: true, ..Default::default() }),
        visible_signature: None,
        reason: None,
        location: None,
        contact_info: None,
    };

    let out = sign_pades_t(req, &tsa).await.unwrap();
    assert_eq!(out.mode, SignMode::PadesTPlusDocTs);
    assert_eq!(tsa.call_count(), 2);
}

#[tokio::test]
async fn certificate_without_signing_key_usage_falls_back_to_doc_timestamp() {
    let key = SigningKey::from_pem(TIMESTAMP_ONLY_KEY_PEM).unwrap();
    let cert = Certificate::from_der(TIMESTAMP_ONLY_CERT_DER.to_vec()).unwrap();
    assert!(!cert.can_sign(), "fixture cert must fail the KeyUsage/EKU gate for this test to be meaningful");

    let tsa = FakeTsa::new();
    let req = SignRequest {
        pdf: minimal_pdf(),
        key: &key,
        certificate: &cert,
        chain: &[],
        field_name: None,
        placeholder_hex_len: None,
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions::default(),
        document_timestamp: None,
        visible_signature: None,
        reason: None,
        location: None,
        contact_info: None,
    };

    let out = sign_pades_t(req, &tsa).await.unwrap();
    assert_eq!(out.mode, SignMode::DocTsFallback);
    assert_eq!(tsa.call_count(), 1);

    let doc = PdfDocument::parse(out.pdf).unwrap();
    let catalog = doc.read_object(doc.trailer.root).unwrap();
    assert!(catalog.dict.contains("/AcroForm"));
    let field = doc.read_object(4).unwrap();
    assert!(field.dict.contains("/FT /Sig"));
    assert!(field.dict.contains("/V "));
}

#[tokio::test]
async fn tsa_rejection_surfaces_without_corrupting_the_buffer() {
    let (key, cert) = signer_materials();
    let tsa = FakeTsa::rejecting();
    let req = SignRequest {
        pdf: minimal_pdf(),
        key: &key,
        certificate: &cert,
        chain: &[],
        field_name: None,
        placeholder_hex_len: None,
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions::default(),
        document_timestamp: None,
        visible_signature: None,
        reason: None,
        location: None,
        contact_info: None,
    };

    let err = sign_pades_t(req, &tsa).await.unwrap_err();
    assert!(matches!(err, PdfSignError::TSARejected { status: 2, .. }));
}

#[tokio::test]
async fn placeholder_too_small_for_the_token_is_reported() {
    let (key, cert) = signer_materials();
    let tsa = FakeTsa::new();
    let req = SignRequest {
        pdf: minimal_pdf(),
        key: &key,
        certificate: &cert,
        chain: &[],
        field_name: None,
        placeholder_hex_len: Some(8),
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions::default(),
        document_timestamp: None,
        visible_signature: None,
        reason: None,
        location: None,
        contact_info: None,
    };

    let err = sign_pades_t(req, &tsa).await.unwrap_err();
    assert!(matches!(err, PdfSignError::PlaceholderTooSmall { .. }));
}

#[tokio::test]
async fn standalone_document_timestamp_uses_the_rfc3161_subfilter() {
    let tsa = FakeTsa::new();
    let req = pades_t::AddDocumentTimestampRequest {
        pdf: minimal_pdf(),
        field_name: None,
        placeholder_hex_len: 4_000,
        tsa_url: "https://tsa.example.test/".to_string(),
        tsa_options: TsaOptions { timeout: Duration::from_secs(5), ..Default::default() },
    };

    let out = pades_t::add_document_timestamp(req, &tsa).await.unwrap();
    assert_eq!(out.mode, SignMode::DocTs);

    let doc = PdfDocument::parse(out.pdf).unwrap();
    let catalog = doc.read_object(doc.trailer.root).unwrap();
    assert!(catalog.dict.contains("/Perms"));
}
