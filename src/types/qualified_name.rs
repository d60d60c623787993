// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `QualifiedName`.

use std::fmt;

use crate::types::string::UAString;

ua_struct! {
    /// A name qualified by a namespace index, used for browse names.
    #[derive(Eq, Hash, Serialize, Deserialize)]
    pub struct QualifiedName {
        /// The namespace index
        pub namespace_index: u16,
        /// The name.
        pub name: UAString,
    }
}

impl<'a> From<&'a str> for QualifiedName {
    fn from(value: &'a str) -> Self {
        Self::new(0, value)
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        Self::new(0, value)
    }
}

impl Default for QualifiedName {
    fn default() -> Self {
        QualifiedName::null()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index > 0 {
            write!(f, "{}:{}", self.namespace_index, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl QualifiedName {
    pub fn new<T>(namespace_index: u16, name: T) -> QualifiedName
    where
        T: Into<UAString>,
    {
        QualifiedName {
            namespace_index,
            name: name.into(),
        }
    }

    pub fn null() -> QualifiedName {
        QualifiedName {
            namespace_index: 0,
            name: UAString::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_null()
    }
}
