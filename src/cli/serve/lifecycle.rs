//! Listener setup.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Result, anyhow};
use loadr::log;
use tiny_http::Server;

/// Ports tried after the configured one is taken.
const PORT_ATTEMPTS: u16 = 10;

/// Bind `interface:port`, walking up to the next free port.
///
/// Returns the server and the address it actually listens on (port 0 binds an
/// ephemeral port).
pub fn bind_with_retry(interface: IpAddr, port: u16) -> Result<(Server, SocketAddr)> {
    let last = port.saturating_add(PORT_ATTEMPTS - 1);
    let mut failure = String::new();

    for candidate in port..=last {
        let requested = SocketAddr::new(interface, candidate);
        let server = match Server::http(requested) {
            Ok(server) => server,
            Err(e) => {
                failure = e.to_string();
                continue;
            }
        };
        if candidate != port {
            log!("serve"; "port {} busy, listening on {}", port, candidate);
        }
        let bound = server.server_addr().to_ip().unwrap_or(requested);
        return Ok((server, bound));
    }

    Err(anyhow!("no free port in {port}-{last} on {interface}: {failure}"))
}
