//! Protocol command codes.
//!
//! A CMD frame carries one command byte followed by at most 15 argument
//! bytes. Codes not listed here are reserved.

use crate::codec::{hton32, ntoh32};

/// Slave announces itself: `{version, nonce:4}`.
pub const SIGNAL: u8 = 0;

/// Master assigns an address: `{nonce:4, addr}`.
pub const FIND: u8 = 1;

/// Master asks for the slave's identity.
pub const GET_UID: u8 = 2;

/// Liveness probe.
pub const PING: u8 = 3;

/// Unsolicited slave notification.
pub const ALERT: u8 = 4;

/// Positive answer, optionally carrying reply bytes.
pub const ACK: u8 = 6;

/// Negative answer.
pub const NACK: u8 = 15;

/// Marks a reply wait armed by an application request rather than a command.
pub const EXTERNAL_REQUEST: u8 = 20;

/// Handshake version carried in SIGNAL.
pub const HSK_VER: u8 = 0x01;

/// Command byte plus arguments.
pub const CMD_MAX_LEN: usize = 16;

pub const CMD_MAX_ARGS: usize = CMD_MAX_LEN - 1;

pub const NONCE_LEN: usize = 4;

/// Known command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Signal,
    Find,
    GetUid,
    Ping,
    Alert,
    Ack,
    Nack,
}

impl Command {
    pub fn from_byte(code: u8) -> Option<Self> {
        match code {
            SIGNAL => Some(Self::Signal),
            FIND => Some(Self::Find),
            GET_UID => Some(Self::GetUid),
            PING => Some(Self::Ping),
            ALERT => Some(Self::Alert),
            ACK => Some(Self::Ack),
            NACK => Some(Self::Nack),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Signal => SIGNAL,
            Self::Find => FIND,
            Self::GetUid => GET_UID,
            Self::Ping => PING,
            Self::Alert => ALERT,
            Self::Ack => ACK,
            Self::Nack => NACK,
        }
    }
}

/// Returns a human-readable name for a command code.
pub fn command_name(code: u8) -> &'static str {
    match code {
        SIGNAL => "SIGNAL",
        FIND => "FIND",
        GET_UID => "GET_UID",
        PING => "PING",
        ALERT => "ALERT",
        ACK => "ACK",
        NACK => "NACK",
        EXTERNAL_REQUEST => "EXTERNAL",
        _ => "RESERVED",
    }
}

/// SIGNAL arguments for `nonce`.
pub fn signal_args(nonce: u32) -> [u8; 1 + NONCE_LEN] {
    let mut args = [0u8; 1 + NONCE_LEN];
    args[0] = HSK_VER;
    args[1..].copy_from_slice(&hton32(nonce).to_ne_bytes());
    args
}

/// FIND arguments echoing `nonce` and assigning `addr`.
pub fn find_args(nonce: &[u8; NONCE_LEN], addr: u8) -> [u8; NONCE_LEN + 1] {
    let mut args = [0u8; NONCE_LEN + 1];
    args[..NONCE_LEN].copy_from_slice(nonce);
    args[NONCE_LEN] = addr;
    args
}

/// Split FIND arguments into the echoed nonce and the assigned address.
pub fn parse_find(args: &[u8]) -> Option<(u32, u8)> {
    if args.len() < NONCE_LEN + 1 {
        return None;
    }
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&args[..NONCE_LEN]);
    Some((ntoh32(u32::from_ne_bytes(nonce)), args[NONCE_LEN]))
}
