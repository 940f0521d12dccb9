//! Typed DER structures used by the CMS builder and the RFC 3161 client.
//! Built on the `der`/`const-oid`/`spki` crates rather than a
//! hand-rolled tag/length pusher, with one deliberate exception:
//! [`UnsortedSet`], used wherever caller-chosen element order must be
//! preserved (certificate chains, the single-entry digest-algorithm
//! set) rather than the DER-canonical sort that `der::asn1::SetOfVec`
//! applies. Where canonical sorting *is* required — the `SET OF
//! Attribute` form of `signedAttrs` — `SetOfVec` is used directly,
//! which is what gives us "sorted by DER encoding" for free.

pub mod cms_types;
pub mod ess;
pub mod tsp;

use der::{Decode, DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Tag, Writer};

/// A `SET OF T` that preserves insertion order instead of DER-sorting.
///
/// Used for certificate sets (leaf-first order) and any other SET OF
/// field whose order is semantically meaningful rather than canonical.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsortedSet<T>(pub Vec<T>);

impl<T> UnsortedSet<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self(items)
    }

    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> FixedTag for UnsortedSet<T> {
    const TAG: Tag = Tag::Set;
}

impl<'a, T: Decode<'a>> DecodeValue<'a> for UnsortedSet<T> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let end = (reader.position() + header.length)?;
        let mut items = Vec::new();
        while reader.position() < end {
            items.push(T::decode(reader)?);
        }
        Ok(UnsortedSet(items))
    }
}

impl<T: Encode> EncodeValue for UnsortedSet<T> {
    fn value_len(&self) -> der::Result<Length> {
        self.0
            .iter()
            .try_fold(Length::ZERO, |acc, item| acc + item.encoded_len()?)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        for item in &self.0 {
            item.encode(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::asn1::Int;

    #[test]
    fn unsorted_set_round_trips_preserving_order() {
        let set = UnsortedSet::new(vec![
            Int::new(&[3]).unwrap(),
            Int::new(&[1]).unwrap(),
            Int::new(&[2]).unwrap(),
        ]);
        let der = set.to_der().unwrap();
        let decoded = UnsortedSet::<Int>::from_der(&der).unwrap();
        let values: Vec<_> = decoded.into_inner();
        assert_eq!(values[0].as_bytes(), &[3]);
        assert_eq!(values[1].as_bytes(), &[1]);
        assert_eq!(values[2].as_bytes(), &[2]);
    }
}
