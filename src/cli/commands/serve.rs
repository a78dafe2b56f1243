//! Web server command.

use console::style;

use crate::config::Settings;

const DEFAULT_PORT: u16 = 8000;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;

    println!(
        "{} Scratch root: {}",
        style("→").cyan(),
        settings.scratch_dir.display()
    );
    println!(
        "{} Analyzer: {}",
        style("→").cyan(),
        style(&settings.analyzer.command).bold()
    );
    println!(
        "{} Starting demoproc server at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "8000" -> 0.0.0.0:8000
/// - Just a host: "127.0.0.1" -> 127.0.0.1:8000
/// - Host and port: "127.0.0.1:9000" -> 127.0.0.1:9000
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("empty bind address");
    }

    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("0.0.0.0".to_string(), port));
    }

    // Try parsing as host:port
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            return Ok((host.to_string(), port));
        }
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), DEFAULT_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_only() {
        assert_eq!(
            parse_bind_address("9000").unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
    }

    #[test]
    fn test_host_only() {
        assert_eq!(
            parse_bind_address("127.0.0.1").unwrap(),
            ("127.0.0.1".to_string(), 8000)
        );
    }

    #[test]
    fn test_host_and_port() {
        assert_eq!(
            parse_bind_address("localhost:3000").unwrap(),
            ("localhost".to_string(), 3000)
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert!(parse_bind_address("  ").is_err());
    }
}
