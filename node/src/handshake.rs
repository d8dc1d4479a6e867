//! Handshake records read from the transport feed.
//!
//! One record per line: `<peer-address> <peer-epoch-seconds>`. Blank lines
//! and `#` comments are skipped.

use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRecord {
    pub peer: IpAddr,
    /// Time advertised by the peer, in epoch seconds.
    pub peer_time: i64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HandshakeParseError {
    #[error("expected `<peer-address> <peer-epoch-seconds>`, got {0:?}")]
    Shape(String),

    #[error("invalid peer address {0:?}")]
    Address(String),

    #[error("invalid peer time {0:?}")]
    Time(String),
}

/// Parse one feed line. Returns `Ok(None)` for lines that carry no record.
pub fn parse_line(line: &str) -> Result<Option<HandshakeRecord>, HandshakeParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let (Some(address), Some(time), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(HandshakeParseError::Shape(line.to_string()));
    };

    let peer =
        IpAddr::from_str(address).map_err(|_| HandshakeParseError::Address(address.to_string()))?;
    let peer_time = time
        .parse::<i64>()
        .map_err(|_| HandshakeParseError::Time(time.to_string()))?;

    Ok(Some(HandshakeRecord { peer, peer_time }))
}
