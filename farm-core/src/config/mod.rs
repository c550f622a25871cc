//! Listener settings shared by every farmdeck binary. Service-specific
//! settings (database, jwt, smtp, ...) live with the service that owns them.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::AppError;
use config::{Config as Loader, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Layered load: an optional `farmdeck` file, then `APP__`-prefixed
    /// environment variables on top.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let loaded = Loader::builder()
            .add_source(File::with_name("farmdeck").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(loaded.try_deserialize()?)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_defaults_to_any_host_on_8080() {
        let config: Config = serde_json::from_str("{}").expect("empty config");
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn explicit_host_and_port_are_honored() {
        let config: Config =
            serde_json::from_str(r#"{ "host": "127.0.0.1", "port": 9090 }"#).expect("config");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
    }
}
