use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Credentials of the player, consumed by launch placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub player_name: String,
    /// Undashed uuid.
    pub uuid: String,
    pub access_token: String,
    /// Legacy `token:<accessToken>:<uuid>` form for `${auth_session}`.
    pub session: String,
    pub user_type: String,
    /// JSON object string for `${user_properties}`.
    pub user_properties: String,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::offline(DEFAULT_PLAYER_NAME)
    }
}

impl AuthSession {
    /// Session for offline play. The uuid is derived from the name so the
    /// same player keeps the same identity across launches.
    pub fn offline(player_name: &str) -> Self {
        let name = match player_name.trim() {
            "" => DEFAULT_PLAYER_NAME,
            trimmed => trimmed,
        };
        let uuid = offline_uuid(name).simple().to_string();
        let access_token = Uuid::new_v4().simple().to_string();
        Self {
            player_name: name.to_string(),
            session: format!("token:{}:{}", access_token, uuid),
            uuid,
            access_token,
            user_type: "legacy".into(),
            user_properties: "{}".into(),
        }
    }

    /// Fill blank fields so every placeholder has a value.
    pub fn sanitized(mut self) -> Self {
        if self.player_name.trim().is_empty() {
            self.player_name = DEFAULT_PLAYER_NAME.into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = offline_uuid(&self.player_name).simple().to_string();
        }
        if self.access_token.trim().is_empty() {
            self.access_token = Uuid::new_v4().simple().to_string();
        }
        if self.session.trim().is_empty() {
            self.session = format!("token:{}:{}", self.access_token, self.uuid);
        }
        if self.user_type.trim().is_empty() {
            self.user_type = "legacy".into();
        }
        if self.user_properties.trim().is_empty() {
            self.user_properties = "{}".into();
        }
        self
    }

    /// Replace secrets in `text` before it is logged.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (secret, mask) in [
            (&self.session, "<session>"),
            (&self.access_token, "<access token>"),
            (&self.uuid, "<uuid>"),
        ] {
            if !secret.is_empty() {
                out = out.replace(secret.as_str(), mask);
            }
        }
        out
    }
}

/// Name-based (version 3) uuid of `OfflinePlayer:<name>`.
pub fn offline_uuid(player_name: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", player_name).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}
