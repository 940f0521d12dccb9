//! Small helpers shared across the PDF reader/writer, CMS builder, and TSA client.

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::Result;
use crate::oid::DigestAlgorithm;

/// Highest `N 0 obj` object number used anywhere in `pdf_data`, plus one.
/// Scans the whole file (not just the last xref section) so it stays correct
/// across incremental updates that may renumber or append objects.
pub fn get_next_object_number(pdf_data: &[u8]) -> Result<u32> {
    let pdf_str = String::from_utf8_lossy(pdf_data);
    let mut max_obj: u32 = 0;

    for line in pdf_str.lines() {
        if let Some(num_str) = line.split_whitespace().next() {
            if let Ok(num) = num_str.parse::<u32>() {
                if line.contains("0 obj") {
                    max_obj = max_obj.max(num);
                }
            }
        }
    }

    Ok(max_obj + 1)
}

/// Hash `data` with the named digest algorithm.
pub fn digest(alg: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
    match alg {
        DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
        DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Render an unsigned integer as a fixed-width, zero-padded ASCII decimal
/// string. `/ByteRange` entries and the placeholder `/Contents` hex string
/// are patched in place post-hoc, so their width must never change once
/// reserved.
pub fn pad_decimal(value: usize, width: usize) -> String {
    format!("{value:0width$}", width = width)
}

/// PDF date string `D:YYYYMMDDHHMMSSZ` for the current UTC time.
pub fn pdf_date_now() -> String {
    let now = chrono::Utc::now();
    format!("D:{}Z", now.format("%Y%m%d%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_next_object_number() {
        let pdf = b"1 0 obj\n<<\n>>\n5 0 obj\n<<\n>>\n";
        let result = get_next_object_number(pdf).unwrap();
        assert_eq!(result, 6);
    }

    #[test]
    fn pad_decimal_is_fixed_width() {
        assert_eq!(pad_decimal(7, 10), "0000000007");
        assert_eq!(pad_decimal(1234567890, 10), "1234567890");
    }

    #[test]
    fn digest_lengths_match_algorithm() {
        assert_eq!(digest(DigestAlgorithm::Sha256, b"x").len(), 32);
        assert_eq!(digest(DigestAlgorithm::Sha384, b"x").len(), 48);
        assert_eq!(digest(DigestAlgorithm::Sha512, b"x").len(), 64);
    }

    #[test]
    fn pdf_date_has_expected_shape() {
        let d = pdf_date_now();
        assert!(d.starts_with("D:"));
        assert!(d.ends_with('Z'));
        assert_eq!(d.len(), 17);
    }
}
