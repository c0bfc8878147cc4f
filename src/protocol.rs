// MIT License - Copyright (c) 2026 Peter Wright

//! ISECnet v2 wire format.
//!
//! Every message is a single frame:
//!
//! ```text
//! 0..1   destination id   (0x0000, the central)
//! 2..3   source id        (0x8FFE, this software)
//! 4..5   length           = body length + 2 (covers command + body)
//! 6..7   command
//! 8..N   body
//! N+1    checksum         = XOR of all preceding bytes, XOR 0xFF
//! ```
//!
//! All multi-byte fields are big-endian.

use crate::error::{Error, Result};

/// Destination id of the central.
const CENTRAL_ID: u16 = 0x0000;

/// Source id this software identifies itself with.
const OUR_ID: u16 = 0x8ffe;

/// Device type reported during authentication (0x03 = mobile app).
const DEVICE_TYPE: u8 = 0x03;

/// Software version reported during authentication.
const SOFTWARE_VERSION: u8 = 0x10;

pub const CMD_AUTH: u16 = 0xf0f0;
pub const CMD_DISCONNECT: u16 = 0xf0f1;
pub const CMD_STATUS: u16 = 0x0b4a;
pub const CMD_PANIC: u16 = 0x401a;
pub const CMD_ARM: u16 = 0x401e;
pub const CMD_TURN_OFF_SIREN: u16 = 0x4019;
pub const CMD_CLEAN_FIRINGS: u16 = 0x4013;
pub const CMD_BYPASS: u16 = 0x401f;

/// Arm/disarm sub-ops, byte 1 of the `CMD_ARM` body.
pub const SUB_DISARM: u8 = 0x00;
pub const SUB_ARM: u8 = 0x01;
pub const SUB_STAY: u8 = 0x02;

/// Partition byte meaning "every partition".
pub const ALL_PARTITIONS: u8 = 0xff;

/// Frame header length (two ids, length, command).
pub const HEADER_LEN: usize = 8;

fn be16(n: u16) -> [u8; 2] {
    n.to_be_bytes()
}

fn merge_be16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

/// XOR of every byte, inverted. Appending the result to the covered bytes
/// makes the whole frame XOR to 0xFF.
pub fn checksum(buf: &[u8]) -> u8 {
    buf.iter().fold(0u8, |acc, b| acc ^ b) ^ 0xff
}

/// Build a complete frame for `command` with the given body.
pub fn build_frame(command: u16, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len() + 1);
    frame.extend_from_slice(&be16(CENTRAL_ID));
    frame.extend_from_slice(&be16(OUR_ID));
    frame.extend_from_slice(&be16(body.len() as u16 + 2));
    frame.extend_from_slice(&be16(command));
    frame.extend_from_slice(body);
    frame.push(checksum(&frame));
    frame
}

/// Parse a frame, returning its command and body.
///
/// The buffer must contain at least the header and body. When the trailing
/// checksum byte is present as well it is verified; some replies from the
/// central arrive without it and are accepted as-is.
pub fn parse_frame(buf: &[u8]) -> Result<(u16, &[u8])> {
    if buf.len() < HEADER_LEN {
        return Err(Error::Protocol(format!(
            "frame too short: {} bytes",
            buf.len()
        )));
    }
    let length = merge_be16(&buf[4..6]) as usize;
    if length < 2 {
        return Err(Error::Protocol(format!("frame length underflow: {length}")));
    }
    let body_len = length - 2;
    if buf.len() < HEADER_LEN + body_len {
        return Err(Error::Protocol(format!(
            "frame truncated: have {} bytes, need {}",
            buf.len(),
            HEADER_LEN + body_len
        )));
    }
    if buf.len() > HEADER_LEN + body_len {
        let framed = &buf[..HEADER_LEN + body_len + 1];
        let xor = framed.iter().fold(0u8, |acc, b| acc ^ b);
        if xor != 0xff {
            return Err(Error::Protocol("checksum mismatch".into()));
        }
    }
    let command = merge_be16(&buf[6..8]);
    Ok((command, &buf[HEADER_LEN..HEADER_LEN + body_len]))
}

/// Encode a numeric password in the contact-ID digit alphabet.
///
/// Each digit becomes one byte, with `0` mapped to 0x0A. Four-digit
/// passwords are left-padded with two 0x0A bytes so the result is always
/// six bytes long.
pub fn encode_password(password: &str) -> Result<Vec<u8>> {
    if password.len() != 4 && password.len() != 6 {
        return Err(Error::InvalidPassword);
    }
    let mut buf = Vec::with_capacity(6);
    if password.len() == 4 {
        buf.extend_from_slice(&[0x0a, 0x0a]);
    }
    for c in password.chars() {
        let digit = c.to_digit(10).ok_or(Error::InvalidPassword)? as u8;
        buf.push(if digit == 0 { 0x0a } else { digit });
    }
    Ok(buf)
}

/// Body of the authentication request.
pub fn auth_body(password: &str) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(8);
    body.push(DEVICE_TYPE);
    body.extend_from_slice(&encode_password(password)?);
    body.push(SOFTWARE_VERSION);
    Ok(body)
}

/// How many bytes the central sends back after an auth request.
pub fn auth_reply_len(password: &str) -> usize {
    match password.len() {
        6 => 10,
        _ => 9,
    }
}

/// Interpret an auth reply frame.
pub fn parse_auth_reply(buf: &[u8]) -> Result<()> {
    let (command, body) = parse_frame(buf)?;
    if command != CMD_AUTH {
        return Err(Error::Protocol(format!(
            "unexpected auth reply command: {command:#06x}"
        )));
    }
    match body.first() {
        Some(0) => Ok(()),
        Some(1) => Err(Error::InvalidPassword),
        Some(&code) => Err(Error::AuthFailed(code)),
        None => Err(Error::Protocol("empty auth reply".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        for (cmd, body) in [
            (CMD_STATUS, vec![]),
            (CMD_ARM, vec![0x02, SUB_ARM]),
            (CMD_BYPASS, vec![0x00, 0x01]),
            (CMD_PANIC, vec![0x02, 0xa5]),
            (0x1234, (0u8..200).collect::<Vec<_>>()),
        ] {
            let frame = build_frame(cmd, &body);
            assert_eq!(frame.len(), HEADER_LEN + body.len() + 1);
            let (parsed_cmd, parsed_body) = parse_frame(&frame).unwrap();
            assert_eq!(parsed_cmd, cmd);
            assert_eq!(parsed_body, &body[..]);
        }
    }

    #[test]
    fn test_whole_frame_xors_to_ff() {
        let frame = build_frame(CMD_ARM, &[0x01, SUB_ARM]);
        assert_eq!(frame.iter().fold(0u8, |acc, b| acc ^ b), 0xff);
    }

    #[test]
    fn test_known_bypass_frames() {
        // Bypassing zone 1 on and off.
        assert_eq!(
            build_frame(CMD_BYPASS, &[0x00, 0x01]),
            [0x00, 0x00, 0x8f, 0xfe, 0x00, 0x04, 0x40, 0x1f, 0x00, 0x01, 0xd4]
        );
        assert_eq!(
            build_frame(CMD_BYPASS, &[0x00, 0x00]),
            [0x00, 0x00, 0x8f, 0xfe, 0x00, 0x04, 0x40, 0x1f, 0x00, 0x00, 0xd5]
        );
    }

    #[test]
    fn test_parse_rejects_short_and_corrupt_frames() {
        assert!(parse_frame(&[0x00, 0x00, 0x8f]).is_err());

        let mut frame = build_frame(CMD_STATUS, &[0xaa, 0xbb]);
        frame[9] ^= 0x01;
        assert!(matches!(parse_frame(&frame), Err(Error::Protocol(_))));

        // Length field pointing past the buffer.
        let mut truncated = build_frame(CMD_STATUS, &[0xaa, 0xbb, 0xcc]);
        truncated.truncate(9);
        assert!(parse_frame(&truncated).is_err());
    }

    #[test]
    fn test_parse_accepts_frame_without_checksum() {
        let mut frame = build_frame(CMD_AUTH, &[0x00]);
        frame.pop();
        let (cmd, body) = parse_frame(&frame).unwrap();
        assert_eq!(cmd, CMD_AUTH);
        assert_eq!(body, [0x00]);
    }

    #[test]
    fn test_encode_password() {
        assert_eq!(encode_password("307924").unwrap(), [3, 10, 7, 9, 2, 4]);
        assert_eq!(encode_password("1234").unwrap(), [10, 10, 1, 2, 3, 4]);
        assert!(matches!(
            encode_password("abcd"),
            Err(Error::InvalidPassword)
        ));
        assert!(matches!(
            encode_password("12345"),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_auth_body_layout() {
        let body = auth_body("307924").unwrap();
        assert_eq!(body, [0x03, 3, 10, 7, 9, 2, 4, 0x10]);
    }

    #[test]
    fn test_auth_reply_len() {
        assert_eq!(auth_reply_len("307924"), 10);
        assert_eq!(auth_reply_len("1234"), 9);
    }

    #[test]
    fn test_parse_auth_reply() {
        assert!(parse_auth_reply(&build_frame(CMD_AUTH, &[0x00])).is_ok());
        assert!(matches!(
            parse_auth_reply(&build_frame(CMD_AUTH, &[0x01])),
            Err(Error::InvalidPassword)
        ));
        assert!(matches!(
            parse_auth_reply(&build_frame(CMD_AUTH, &[0x03])),
            Err(Error::AuthFailed(3))
        ));
        assert!(parse_auth_reply(&build_frame(CMD_STATUS, &[0x00])).is_err());
    }
}
