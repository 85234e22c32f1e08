use log::{debug, trace};

use super::meter_definitions::{MeterProfile, INVOCATION_COUNTER_LENGTH, SYSTEM_TITLE_LENGTH};
use super::structs::EncryptedPayload;
use super::DlmsParseError;

/// Size checks run on a captured frame before anything is decrypted
pub fn validate_frame(frame: &[u8], profile: &MeterProfile) -> Result<(), DlmsParseError> {
    let len = frame.len();

    if len < profile.min_frame_size {
        return Err(DlmsParseError::PacketTooSmall(len));
    }

    if len <= profile.payload_length {
        trace!("receiveBufferIndex: {len}, payloadLength: {}", profile.payload_length);
        return Err(DlmsParseError::PayloadExceedsFrame {
            payload: profile.payload_length,
            available: len,
        });
    }

    /* The second header may sit past the end of a short frame */
    let available = len.saturating_sub(profile.second_segment_offset());
    let second = profile.second_segment_length();
    if second >= available {
        trace!("receiveBufferIndex: {len}, payloadLength2: {second}");
        return Err(DlmsParseError::SecondSegmentOverrun { segment: second, available });
    }

    let required = [
        profile.first_segment_offset() + profile.first_segment_length,
        profile.second_segment_offset() + second + profile.tag_length,
        profile.system_title_offset + SYSTEM_TITLE_LENGTH,
        profile.invocation_counter_offset + INVOCATION_COUNTER_LENGTH,
    ];
    if let Some(end) = required.iter().copied().find(|end| *end > len) {
        debug!("Frame of {len} bytes ends before offset {end}");
        return Err(DlmsParseError::LayoutMismatch(end));
    }

    Ok(())
}

fn slice<'a>(frame: &'a [u8], offset: usize, len: usize) -> Result<&'a [u8], DlmsParseError> {
    frame.get(offset..offset + len).ok_or(DlmsParseError::LayoutMismatch(offset + len))
}

/// Cuts nonce and ciphertext out of a validated frame
pub fn extract_payload(frame: &[u8], profile: &MeterProfile) -> Result<EncryptedPayload, DlmsParseError> {
    let mut system_title = [0u8; SYSTEM_TITLE_LENGTH];
    system_title.copy_from_slice(slice(frame, profile.system_title_offset, SYSTEM_TITLE_LENGTH)?);

    let mut counter = [0u8; INVOCATION_COUNTER_LENGTH];
    counter.copy_from_slice(slice(frame, profile.invocation_counter_offset, INVOCATION_COUNTER_LENGTH)?);

    let mut nonce = [0u8; 12];
    nonce[..SYSTEM_TITLE_LENGTH].copy_from_slice(&system_title);
    nonce[SYSTEM_TITLE_LENGTH..].copy_from_slice(&counter);

    /* The ciphertext is interrupted by the header of the second M-Bus frame */
    let second_length = profile.second_segment_length();
    let mut ciphertext = Vec::with_capacity(profile.payload_length);
    ciphertext.extend_from_slice(slice(frame, profile.first_segment_offset(), profile.first_segment_length)?);
    ciphertext.extend_from_slice(slice(frame, profile.second_segment_offset(), second_length)?);

    let tag = match profile.tag_length {
        0 => None,
        n => Some(slice(frame, profile.second_segment_offset() + second_length, n)?.to_vec()),
    };

    let invocation_counter = u32::from_be_bytes(counter);
    debug!("System title {}, invocation counter {invocation_counter}", hex::encode_upper(system_title));

    Ok(EncryptedPayload {
        system_title,
        invocation_counter,
        nonce,
        ciphertext,
        tag,
    })
}
