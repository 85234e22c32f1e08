use aes::Aes128;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, AesGcm};
use log::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::meter_definitions::DLMS_TAG_LENGTH;
use super::DlmsParseError;

/* DLMS truncates the GCM tag to 12 bytes */
type Aes128GcmDlms = AesGcm<Aes128, U12, U12>;

pub const KEY_LENGTH: usize = 16;

/// AES-128 key of the meter, provided by the grid operator
#[derive(Clone, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct DecryptionKey([u8; KEY_LENGTH]);

impl DecryptionKey {
    pub fn new(key: &[u8]) -> Result<Self, DlmsParseError> {
        let bytes: [u8; KEY_LENGTH] = key
            .try_into()
            .map_err(|_| DlmsParseError::InvalidKeyLength(key.len()))?;
        Ok(Self(bytes))
    }

    /// Accepts "0011..", "00 11 .." and "00:11:.." notations
    pub fn from_hex(key: &str) -> Result<Self, DlmsParseError> {
        let cleaned: String = key
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let bytes = hex::decode(&cleaned).map_err(|_| DlmsParseError::InvalidKeyFormat)?;
        Self::new(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DecryptionKey(****)")
    }
}

/// Runs AES-128-GCM over the ciphertext with empty associated data.
///
/// Without a tag the GCM keystream is applied as is, which is what the meter
/// expects for encryption-only telegrams (security control 0x20). With a tag
/// the telegram is authenticated before any plaintext is returned.
pub fn decrypt(key: &DecryptionKey,
               nonce: &[u8; 12],
               ciphertext: &[u8],
               tag: Option<&[u8]>) -> Result<Vec<u8>, DlmsParseError> {
    let mut buffer = ciphertext.to_vec();

    match tag {
        None => {
            let cipher = Aes128Gcm::new_from_slice(key.as_bytes())
                .map_err(|_| DlmsParseError::InvalidKeyLength(key.as_bytes().len()))?;
            /* CTR mode is symmetric, the computed tag is of no use here */
            cipher
                .encrypt_in_place_detached(GenericArray::from_slice(nonce), &[], &mut buffer)
                .map_err(|_| DlmsParseError::DecryptionFailed)?;
        }
        Some(tag) => {
            if tag.len() != DLMS_TAG_LENGTH {
                return Err(DlmsParseError::AuthenticationFailed);
            }
            let cipher = Aes128GcmDlms::new_from_slice(key.as_bytes())
                .map_err(|_| DlmsParseError::InvalidKeyLength(key.as_bytes().len()))?;
            cipher
                .decrypt_in_place_detached(GenericArray::from_slice(nonce), &[], &mut buffer, GenericArray::from_slice(tag))
                .map_err(|_| DlmsParseError::AuthenticationFailed)?;
        }
    }

    trace!("Plaintext: {}", hex::encode_upper(&buffer));
    Ok(buffer)
}

/// A data-notification APDU starts with 0x0F and has 0x0C at offset 5
pub fn check_plaintext(plaintext: &[u8]) -> Result<(), DlmsParseError> {
    match (plaintext.first(), plaintext.get(5)) {
        (Some(0x0F), Some(0x0C)) => Ok(()),
        _ => Err(DlmsParseError::InvalidPlaintext),
    }
}
