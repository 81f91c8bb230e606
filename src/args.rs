use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

/// MiniDrive storage server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9000")]
    pub port: u16,

    /// Storage root holding users.json, public/ and private/
    #[arg(long)]
    pub root: PathBuf,
}

/// MiniDrive interactive client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server endpoint as [user@]host:port; without a user the session is public
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub username: String,
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (username, address) = match input.rsplit_once('@') {
            Some((username, address)) => (username, address),
            None => ("", input),
        };
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| format!("missing port in {input:?}, expected [user@]host:port"))?;
        if host.is_empty() {
            return Err(format!("missing host in {input:?}"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {port:?}: {e}"))?;

        Ok(Self {
            username: username.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_with_user() {
        let endpoint: Endpoint = "alice@localhost:9000".parse().unwrap();
        assert_eq!(endpoint.username, "alice");
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 9000);
    }

    #[test]
    fn test_endpoint_without_user() {
        let endpoint: Endpoint = "10.0.0.5:7000".parse().unwrap();
        assert_eq!(endpoint.username, "");
        assert_eq!(endpoint.host, "10.0.0.5");
    }

    #[test]
    fn test_endpoint_errors() {
        assert!("localhost".parse::<Endpoint>().is_err());
        assert!(":9000".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
        assert!("host:".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_server_args() {
        let args = ServerArgs::parse_from(["minidrive-server", "--root", "/srv/drive"]);
        assert_eq!(args.port, 9000);
        assert_eq!(args.root, PathBuf::from("/srv/drive"));
    }
}
