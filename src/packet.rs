use crate::error::RconError;
use std::fmt;

/// The different types of packets that can travel over an RCON session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    // SERVERDATA_RESPONSE_VALUE
    ServerResponse,
    // SERVERDATA_EXECCOMMAND
    ExecCommand,
    // SERVERDATA_AUTH
    Authentication,
}

impl PacketType {
    /// The wire value for this packet type.
    pub fn value(self) -> i32 {
        match self {
            PacketType::ServerResponse => 0,
            PacketType::ExecCommand => 2,
            PacketType::Authentication => 3,
        }
    }

    pub fn to_le_bytes(self) -> [u8; 4] {
        self.value().to_le_bytes()
    }
}

impl TryFrom<i32> for PacketType {
    type Error = RconError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::ServerResponse),
            2 => Ok(PacketType::ExecCommand),
            3 => Ok(PacketType::Authentication),
            other => Err(RconError::UnknownPacketType(other)),
        }
    }
}

/// One unit of RCON data: an id, a type, and a text body.
///
/// The id is carried on the wire but correlation is positional: the server
/// answers commands in the order it received them, and the client matches
/// responses to requests first-in-first-out rather than by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: i32,
    kind: PacketType,
    content: String,
}

impl Packet {
    pub fn new(id: i32, kind: PacketType, content: impl Into<String>) -> Self {
        Packet {
            id,
            kind,
            content: content.into(),
        }
    }

    /// An [`PacketType::ExecCommand`] packet carrying the given command text.
    pub fn command(message: impl Into<String>) -> Self {
        Packet::new(0, PacketType::ExecCommand, message)
    }

    /// The login packet. Credential text always travels UTF-8 encoded,
    /// whatever body encoder the client is configured with.
    pub(crate) fn authentication(password: &str) -> Self {
        Packet::new(0, PacketType::Authentication, password)
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn kind(&self) -> PacketType {
        self.kind
    }

    pub fn content(&self) -> &str {
        self.content.as_ref()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:?}({}) - \"{}\"",
            self.id,
            self.kind,
            self.kind.value(),
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_type_round_trips_through_wire_values() {
        for kind in [
            PacketType::ServerResponse,
            PacketType::ExecCommand,
            PacketType::Authentication,
        ] {
            assert_eq!(PacketType::try_from(kind.value()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_type_value_is_rejected() {
        let err = PacketType::try_from(7).unwrap_err();
        assert!(matches!(err, RconError::UnknownPacketType(7)));
    }

    #[test]
    fn command_builds_an_exec_packet() {
        let packet = Packet::command("showplayers");
        assert_eq!(packet.id(), 0);
        assert_eq!(packet.kind(), PacketType::ExecCommand);
        assert_eq!(packet.content(), "showplayers");
    }

    #[test]
    fn display_is_human_readable() {
        let packet = Packet::new(12, PacketType::ExecCommand, "info");
        assert_eq!(packet.to_string(), "12 - ExecCommand(2) - \"info\"");
    }
}
