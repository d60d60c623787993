// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides functions for parsing Urls from strings.

use url::Url;

use crate::types::status_code::StatusCode;

pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// Creates a `Url` from the input string, supplying a default port if necessary.
fn opc_url_from_str(s: &str) -> Result<Url, ()> {
    Url::parse(s)
        .map(|mut url| {
            if url.port().is_none() {
                // If no port is supplied, then treat it as the default port 4840
                let _ = url.set_port(Some(crate::core::constants::DEFAULT_OPC_UA_SERVER_PORT));
            }
            url
        })
        .map_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", s, err);
        })
}

/// Replace the hostname in the supplied url and return a new url
pub fn url_with_replaced_hostname(url: &str, hostname: &str) -> Result<String, ()> {
    let mut url = opc_url_from_str(url)?;
    url.set_host(Some(hostname)).map_err(|err| {
        error!("Cannot set hostname \"{}\", error = {:?}", hostname, err);
    })?;
    Ok(url.into())
}

/// Test if the two urls match except for the hostname. Can be used by a server whose endpoint doesn't
/// exactly match the incoming connection, e.g. 127.0.0.1 vs localhost.
pub fn url_matches_except_host(url1: &str, url2: &str) -> bool {
    match (opc_url_from_str(url1), opc_url_from_str(url2)) {
        (Ok(mut url1), Ok(mut url2)) => {
            // Both hostnames are set to xxxx so the comparison should come out as the same url
            // if they actually match one another.
            url1.set_host(Some("xxxx")).is_ok()
                && url2.set_host(Some("xxxx")).is_ok()
                && url1 == url2
        }
        _ => false,
    }
}

/// Takes an endpoint url and strips off the path and args to leave just the protocol, host & port.
pub fn server_url_from_endpoint_url(endpoint_url: &str) -> Result<String, ()> {
    opc_url_from_str(endpoint_url).map(|mut url| {
        url.set_query(None);
        if let Some(port) = url.port() {
            // If the port is the default, strip it so the url string omits it.
            if port == crate::core::constants::DEFAULT_OPC_UA_SERVER_PORT {
                let _ = url.set_port(None);
            }
        }
        url.into()
    })
}

pub fn is_opc_ua_binary_url(url: &str) -> bool {
    opc_url_from_str(url)
        .map(|url| url.scheme() == OPC_TCP_SCHEME)
        .unwrap_or(false)
}

pub fn hostname_from_url(url: &str) -> Result<String, ()> {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .ok_or(())
}

pub fn hostname_port_from_url(url: &str, default_port: u16) -> Result<(String, u16), StatusCode> {
    // Validate and split out the endpoint we have
    let url = Url::parse(url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    if url.scheme() != OPC_TCP_SCHEME {
        return Err(StatusCode::BadTcpEndpointUrlInvalid);
    }
    let host = url.host_str().ok_or(StatusCode::BadTcpEndpointUrlInvalid)?;
    let port = url.port().unwrap_or(default_port);
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme() {
        assert!(is_opc_ua_binary_url("opc.tcp://foo/xyz"));
        assert!(is_opc_ua_binary_url(
            "opc.tcp://[FEDC:BA98:7654:3210:FEDC:BA98:7654:3210]:80/xyz"
        ));
        assert!(!is_opc_ua_binary_url("http://foo/xyz"));
    }

    #[test]
    fn url_matches_test() {
        assert!(url_matches_except_host(
            "opc.tcp://localhost:4842/vblfactory",
            "opc.tcp://127.0.0.1:4842/vblfactory"
        ));
        assert!(!url_matches_except_host(
            "opc.tcp://localhost:4842/vblfactory",
            "opc.tcp://127.0.0.1:4842/abc"
        ));
        assert!(!url_matches_except_host(
            "opc.tcp://localhost:4842/vblfactory",
            "opc.tcp://localhost:4843/vblfactory"
        ));
    }

    #[test]
    fn server_url_from_endpoint_url_test() {
        assert_eq!(
            "opc.tcp://localhost/",
            server_url_from_endpoint_url("opc.tcp://localhost").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost/",
            server_url_from_endpoint_url("opc.tcp://localhost:4840").unwrap()
        );
        assert_eq!(
            "opc.tcp://localhost:4842/vblfactory",
            server_url_from_endpoint_url("opc.tcp://localhost:4842/vblfactory?1").unwrap()
        );
    }

    #[test]
    fn url_with_replaced_hostname_test() {
        assert_eq!(
            url_with_replaced_hostname("opc.tcp://foo:123/x", "bar").unwrap(),
            "opc.tcp://bar:123/x"
        );
        assert_eq!(
            url_with_replaced_hostname("opc.tcp://localhost:123/x", "127.0.0.1").unwrap(),
            "opc.tcp://127.0.0.1:123/x"
        );
    }

    #[test]
    fn hostname_port_test() {
        assert_eq!(
            hostname_port_from_url("opc.tcp://factory-gw:4900/vblfactory", 4842).unwrap(),
            ("factory-gw".to_string(), 4900)
        );
        assert_eq!(
            hostname_port_from_url("opc.tcp://factory-gw/vblfactory", 4842).unwrap(),
            ("factory-gw".to_string(), 4842)
        );
        assert_eq!(
            hostname_port_from_url("http://factory-gw/vblfactory", 4842).unwrap_err(),
            StatusCode::BadTcpEndpointUrlInvalid
        );
        assert_eq!(hostname_from_url("opc.tcp://factory-gw:4900/").unwrap(), "factory-gw");
    }
}
