//! CMS (RFC 5652) structures needed for a CAdES-BES `SignedData`.
//!
//! `sid` is narrowed from the full `SignerIdentifier` CHOICE to its
//! `IssuerAndSerialNumber` arm: this builder always identifies the
//! signer that way and never emits `subjectKeyIdentifier`, so modeling
//! the CHOICE would only add an unused branch.

use const_oid::ObjectIdentifier;
use der::asn1::{Any, Int, OctetString, SetOfVec};
use der::{Sequence, ValueOrd};
use spki::AlgorithmIdentifierOwned;

use super::UnsortedSet;

/// `ContentInfo ::= SEQUENCE { contentType OID, content [0] EXPLICIT ANY }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ContentInfo {
    pub content_type: ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT")]
    pub content: Any,
}

/// `EncapsulatedContentInfo ::= SEQUENCE { eContentType OID, eContent [0] EXPLICIT OCTET STRING OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct EncapsulatedContentInfo {
    pub econtent_type: ObjectIdentifier,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub econtent: Option<Any>,
}

/// `IssuerAndSerialNumber ::= SEQUENCE { issuer Name, serialNumber CertificateSerialNumber }`
///
/// `issuer` is carried as the raw DER bytes of the leaf certificate's Issuer
/// `Name` (copied verbatim from the parsed leaf certificate) rather than
/// re-modeling `Name`/`RDNSequence` — the builder never inspects or mutates
/// it, only re-embeds it.
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct IssuerAndSerialNumber {
    pub issuer: Any,
    pub serial_number: Int,
}

/// `Attribute ::= SEQUENCE { attrType OID, attrValues SET OF AttributeValue }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence, ValueOrd)]
pub struct Attribute {
    pub attr_type: ObjectIdentifier,
    pub attr_values: SetOfVec<Any>,
}

impl Attribute {
    pub fn single(attr_type: ObjectIdentifier, value: Any) -> der::Result<Self> {
        let mut values = SetOfVec::new();
        values.insert(value)?;
        Ok(Attribute {
            attr_type,
            attr_values: values,
        })
    }
}

/// `SignerInfo ::= SEQUENCE { version, sid, digestAlgorithm, signedAttrs [0] IMPLICIT SET OF Attribute OPTIONAL,
///   signatureAlgorithm, signature OCTET STRING, unsignedAttrs [1] IMPLICIT SET OF Attribute OPTIONAL }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignerInfo {
    pub version: u8,
    pub sid: IssuerAndSerialNumber,
    pub digest_algorithm: AlgorithmIdentifierOwned,
    #[asn1(
        context_specific = "0",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub signed_attrs: Option<SetOfVec<Attribute>>,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature: OctetString,
    #[asn1(
        context_specific = "1",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub unsigned_attrs: Option<SetOfVec<Attribute>>,
}

/// `SignedData ::= SEQUENCE { version, digestAlgorithms SET OF, encapContentInfo,
///   certificates [0] IMPLICIT SET OF CertificateChoices OPTIONAL, signerInfos SET OF SignerInfo }`
///
/// `digestAlgorithms`, `certificates` and `signerInfos` use [`UnsortedSet`]:
/// this builder emits a single `digestAlgorithms` entry and leaf-first
/// certificate order, neither of which should be disturbed by
/// DER-canonical SET OF sorting (only `signedAttrs` needs that, and it uses
/// `SetOfVec` directly for exactly that reason).
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SignedData {
    pub version: u8,
    pub digest_algorithms: UnsortedSet<AlgorithmIdentifierOwned>,
    pub encap_content_info: EncapsulatedContentInfo,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", constructed = "true", optional = "true")]
    pub certificates: Option<UnsortedSet<Any>>,
    pub signer_infos: UnsortedSet<SignerInfo>,
}
