//! Command-string builders and the high-level send surface.
//!
//! The builders are pure formatting helpers with no state of their own; the
//! [`RconSender`] trait layers them over anything that can push a packet to
//! the server, so the same convenience calls work on a raw
//! [`RconClient`](crate::client::RconClient) and on a
//! [`PersistentClient`](crate::persistent::PersistentClient).

use crate::error::RconError;
use crate::packet::Packet;

/// Broadcast to all players. Spaces are replaced with underscores because
/// the server drops everything after the first space otherwise.
pub fn broadcast(message: &str) -> String {
    format!("broadcast {}", message.replace(' ', "_"))
}

/// Request the server name and version string.
pub fn info() -> String {
    "info".to_owned()
}

/// Request the list of online players.
pub fn show_players() -> String {
    "showplayers".to_owned()
}

/// Kick a player by game UID.
pub fn kick_player(uid: &str) -> String {
    format!("kickplayer {uid}")
}

/// Ban a player by game UID.
pub fn ban_player(uid: &str) -> String {
    format!("banplayer {uid}")
}

/// Ask the server to save the world.
pub fn save() -> String {
    "save".to_owned()
}

/// Gracefully shut the server down after `seconds`, showing `message` to
/// the online players. Underscores in the message are rendered as spaces.
pub fn shutdown(seconds: u32, message: &str) -> String {
    format!("shutdown {} {}", seconds, message.replace('_', " "))
        .trim()
        .to_owned()
}

/// Stop the server immediately, no grace period.
pub fn do_exit() -> String {
    "doexit".to_owned()
}

/// Anything that can push a packet to the server and hand back the
/// correlated response.
#[allow(async_fn_in_trait)]
pub trait RconSender {
    /// Send a packet and await its response.
    async fn send(&self, packet: Packet) -> Result<Packet, RconError>;

    /// Send a raw command string.
    async fn command(&self, message: &str) -> Result<Packet, RconError> {
        self.send(Packet::command(message)).await
    }

    async fn broadcast(&self, message: &str) -> Result<Packet, RconError> {
        self.command(&broadcast(message)).await
    }

    async fn info(&self) -> Result<Packet, RconError> {
        self.command(&info()).await
    }

    async fn show_players(&self) -> Result<Packet, RconError> {
        self.command(&show_players()).await
    }

    async fn kick_player(&self, uid: &str) -> Result<Packet, RconError> {
        self.command(&kick_player(uid)).await
    }

    async fn ban_player(&self, uid: &str) -> Result<Packet, RconError> {
        self.command(&ban_player(uid)).await
    }

    async fn save(&self) -> Result<Packet, RconError> {
        self.command(&save()).await
    }

    async fn shutdown(&self, seconds: u32, message: &str) -> Result<Packet, RconError> {
        self.command(&shutdown(seconds, message)).await
    }

    async fn do_exit(&self) -> Result<Packet, RconError> {
        self.command(&do_exit()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_replaces_spaces_with_underscores() {
        assert_eq!(
            broadcast("server restarting soon"),
            "broadcast server_restarting_soon"
        );
    }

    #[test]
    fn kick_and_ban_carry_the_uid() {
        assert_eq!(kick_player("76561198000000000"), "kickplayer 76561198000000000");
        assert_eq!(ban_player("42"), "banplayer 42");
    }

    #[test]
    fn shutdown_renders_underscores_as_spaces() {
        assert_eq!(shutdown(30, "back_in_five"), "shutdown 30 back in five");
    }

    #[test]
    fn shutdown_with_no_message_is_trimmed() {
        assert_eq!(shutdown(10, ""), "shutdown 10");
    }

    #[test]
    fn fixed_commands() {
        assert_eq!(info(), "info");
        assert_eq!(show_players(), "showplayers");
        assert_eq!(save(), "save");
        assert_eq!(do_exit(), "doexit");
    }
}
