//! Runtime configuration
//!
//! Read from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use envconfig::Envconfig;

use crate::error::AppError;
use crate::registry::RoomSettings;

#[derive(Debug, Envconfig)]
pub struct Config {
    /// Listen address
    #[envconfig(from = "SIGNAL_RELAY_ADDR", default = "127.0.0.1:3333")]
    pub bind_addr: SocketAddr,

    /// Seconds an empty room waits before closing
    #[envconfig(from = "ROOM_EXPIRY_SECS", default = "300")]
    pub room_expiry_secs: u64,

    #[envconfig(from = "ROOM_ID_LENGTH", default = "8")]
    pub room_id_length: usize,

    #[envconfig(from = "CLIENT_ID_LENGTH", default = "8")]
    pub client_id_length: usize,
}

impl Config {
    /// Settings for the room registry
    ///
    /// Fails when an id length is zero, since every generated id would collide.
    pub fn room_settings(&self) -> Result<RoomSettings, AppError> {
        if self.room_id_length == 0 {
            return Err(AppError::InvalidConfig(
                "ROOM_ID_LENGTH must be at least 1".to_string(),
            ));
        }
        if self.client_id_length == 0 {
            return Err(AppError::InvalidConfig(
                "CLIENT_ID_LENGTH must be at least 1".to_string(),
            ));
        }

        Ok(RoomSettings {
            expiry: Duration::from_secs(self.room_expiry_secs),
            room_id_length: self.room_id_length,
            client_id_length: self.client_id_length,
        })
    }
}
