//! User and session models for the identity layer.

use serde::{Deserialize, Serialize};

/// Read permission bit.
pub const MODE_READ: u8 = 0b100;
/// Write permission bit. Required for uploads, edits and deletions.
pub const MODE_WRITE: u8 = 0b010;
/// Full access, the default for provisioned accounts.
pub const MODE_READ_WRITE: u8 = MODE_READ | MODE_WRITE;

/// The signed-in user as seen by services and handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Account email, doubling as the display name.
    pub email: String,
    /// Unix-style permission bits (read 4, write 2).
    pub mode: u8,
}

impl UserInfo {
    pub fn can_read(&self) -> bool {
        self.mode & MODE_READ != 0
    }

    pub fn can_write(&self) -> bool {
        self.mode & MODE_WRITE != 0
    }
}

/// JWT payload for issued session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account email.
    pub sub: String,
    /// Permission bits carried into [`UserInfo::mode`].
    pub mode: u8,
    /// Expiry as a Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user(&self) -> UserInfo {
        UserInfo {
            email: self.sub.clone(),
            mode: self.mode,
        }
    }
}

/// An authenticated request context, inserted into request extensions by
/// the session guard.
#[derive(Debug, Clone)]
pub struct Session {
    /// The bearer token the request carried.
    pub token: String,
    /// The resolved user.
    pub user: UserInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_gate_writes() {
        let viewer = UserInfo {
            email: "viewer@local".into(),
            mode: MODE_READ,
        };
        assert!(viewer.can_read());
        assert!(!viewer.can_write());

        let editor = UserInfo {
            email: "editor@local".into(),
            mode: MODE_READ_WRITE,
        };
        assert!(editor.can_read());
        assert!(editor.can_write());
    }
}
