// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Security policies known to the server. Only `None` is implemented; the others are recognised
//! so configuration and channel requests naming them can be rejected with a clear error.

use std::fmt;
use std::str::FromStr;

use crate::types::constants;

const BASIC128RSA15_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15";
const BASIC256_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256";
const BASIC256SHA256_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256";
const AES128SHA256RSAOAEP_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep";
const AES256SHA256RSAPSS_URI: &str =
    "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityPolicy {
    Unknown,
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    Aes128Sha256RsaOaep,
    Aes256Sha256RsaPss,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();

    /// Accepts the short name or the full uri. Anything else is `Unknown`, never an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "None" | constants::SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            "Basic128Rsa15" | BASIC128RSA15_URI => SecurityPolicy::Basic128Rsa15,
            "Basic256" | BASIC256_URI => SecurityPolicy::Basic256,
            "Basic256Sha256" | BASIC256SHA256_URI => SecurityPolicy::Basic256Sha256,
            "Aes128-Sha256-RsaOaep" | AES128SHA256RSAOAEP_URI => {
                SecurityPolicy::Aes128Sha256RsaOaep
            }
            "Aes256-Sha256-RsaPss" | AES256SHA256RSAPSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => {
                error!("Specified security policy \"{}\" is not recognized", s);
                SecurityPolicy::Unknown
            }
        })
    }
}

impl SecurityPolicy {
    pub fn from_uri(uri: &str) -> SecurityPolicy {
        match uri {
            constants::SECURITY_POLICY_NONE_URI => SecurityPolicy::None,
            BASIC128RSA15_URI => SecurityPolicy::Basic128Rsa15,
            BASIC256_URI => SecurityPolicy::Basic256,
            BASIC256SHA256_URI => SecurityPolicy::Basic256Sha256,
            AES128SHA256RSAOAEP_URI => SecurityPolicy::Aes128Sha256RsaOaep,
            AES256SHA256RSAPSS_URI => SecurityPolicy::Aes256Sha256RsaPss,
            _ => SecurityPolicy::Unknown,
        }
    }

    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => constants::SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Basic128Rsa15 => BASIC128RSA15_URI,
            SecurityPolicy::Basic256 => BASIC256_URI,
            SecurityPolicy::Basic256Sha256 => BASIC256SHA256_URI,
            SecurityPolicy::Aes128Sha256RsaOaep => AES128SHA256RSAOAEP_URI,
            SecurityPolicy::Aes256Sha256RsaPss => AES256SHA256RSAPSS_URI,
            SecurityPolicy::Unknown => "",
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "None",
            SecurityPolicy::Basic128Rsa15 => "Basic128Rsa15",
            SecurityPolicy::Basic256 => "Basic256",
            SecurityPolicy::Basic256Sha256 => "Basic256Sha256",
            SecurityPolicy::Aes128Sha256RsaOaep => "Aes128-Sha256-RsaOaep",
            SecurityPolicy::Aes256Sha256RsaPss => "Aes256-Sha256-RsaPss",
            SecurityPolicy::Unknown => "Unknown",
        }
    }

    /// Whether the server can actually secure a channel with this policy
    pub fn is_supported(&self) -> bool {
        matches!(self, SecurityPolicy::None)
    }
}

#[test]
fn security_policy_names_and_uris() {
    assert_eq!(
        SecurityPolicy::from_str("None").unwrap(),
        SecurityPolicy::None
    );
    assert_eq!(
        SecurityPolicy::from_uri(constants::SECURITY_POLICY_NONE_URI),
        SecurityPolicy::None
    );
    assert_eq!(
        SecurityPolicy::from_str(BASIC256SHA256_URI).unwrap(),
        SecurityPolicy::Basic256Sha256
    );
    assert_eq!(
        SecurityPolicy::from_str("Rot13").unwrap(),
        SecurityPolicy::Unknown
    );
    assert!(SecurityPolicy::None.is_supported());
    assert!(!SecurityPolicy::Basic256Sha256.is_supported());
    assert_eq!(
        SecurityPolicy::from_uri(SecurityPolicy::Basic256.to_uri()),
        SecurityPolicy::Basic256
    );
}
