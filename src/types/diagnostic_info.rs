// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DiagnosticInfo`.

use std::io::{Read, Write};

use crate::types::{encoding::*, status_code::StatusCode, string::UAString};

bitflags! {
    pub struct DiagnosticInfoMask: u8 {
        const HAS_SYMBOLIC_ID = 0x01;
        const HAS_NAMESPACE = 0x02;
        const HAS_LOCALIZED_TEXT = 0x04;
        const HAS_LOCALE = 0x08;
        const HAS_ADDITIONAL_INFO = 0x10;
        const HAS_INNER_STATUS_CODE = 0x20;
        const HAS_INNER_DIAGNOSTIC_INFO = 0x40;
    }
}

/// Diagnostic information. The server never produces any but clients may send it and it appears
/// in the response structures, so it must round trip.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub locale: Option<i32>,
    pub localized_text: Option<i32>,
    pub additional_info: Option<UAString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl BinaryEncoder<DiagnosticInfo> for DiagnosticInfo {
    fn byte_len(&self) -> usize {
        let ints = [
            self.symbolic_id,
            self.namespace_uri,
            self.locale,
            self.localized_text,
        ];
        1 + ints.iter().filter(|v| v.is_some()).count() * 4
            + self.additional_info.as_ref().map_or(0, |v| v.byte_len())
            + self.inner_status_code.map_or(0, |_| 4)
            + self
                .inner_diagnostic_info
                .as_ref()
                .map_or(0, |v| v.byte_len())
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.encoding_mask().bits())?;
        // Field order on the wire differs from the order of the mask bits
        for value in [
            self.symbolic_id,
            self.namespace_uri,
            self.locale,
            self.localized_text,
        ]
        .iter()
        .flatten()
        {
            size += write_i32(stream, *value)?;
        }
        if let Some(ref additional_info) = self.additional_info {
            size += additional_info.encode(stream)?;
        }
        if let Some(ref inner_status_code) = self.inner_status_code {
            size += inner_status_code.encode(stream)?;
        }
        if let Some(ref inner_diagnostic_info) = self.inner_diagnostic_info {
            size += inner_diagnostic_info.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = DiagnosticInfoMask::from_bits_truncate(read_u8(stream)?);
        let read_if = |stream: &mut S, flag: DiagnosticInfoMask| -> EncodingResult<Option<i32>> {
            if encoding_mask.contains(flag) {
                Ok(Some(read_i32(stream)?))
            } else {
                Ok(None)
            }
        };
        let symbolic_id = read_if(stream, DiagnosticInfoMask::HAS_SYMBOLIC_ID)?;
        let namespace_uri = read_if(stream, DiagnosticInfoMask::HAS_NAMESPACE)?;
        let locale = read_if(stream, DiagnosticInfoMask::HAS_LOCALE)?;
        let localized_text = read_if(stream, DiagnosticInfoMask::HAS_LOCALIZED_TEXT)?;
        let additional_info = if encoding_mask.contains(DiagnosticInfoMask::HAS_ADDITIONAL_INFO) {
            Some(UAString::decode(stream, decoding_options)?)
        } else {
            None
        };
        let inner_status_code = if encoding_mask.contains(DiagnosticInfoMask::HAS_INNER_STATUS_CODE)
        {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let inner_diagnostic_info =
            if encoding_mask.contains(DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO) {
                let _depth_lock = decoding_options.depth_lock()?;
                Some(Box::new(DiagnosticInfo::decode(stream, decoding_options)?))
            } else {
                None
            };
        Ok(DiagnosticInfo {
            symbolic_id,
            namespace_uri,
            locale,
            localized_text,
            additional_info,
            inner_status_code,
            inner_diagnostic_info,
        })
    }
}

impl DiagnosticInfo {
    pub fn null() -> DiagnosticInfo {
        DiagnosticInfo::default()
    }

    pub fn encoding_mask(&self) -> DiagnosticInfoMask {
        let mut encoding_mask = DiagnosticInfoMask::empty();
        encoding_mask.set(DiagnosticInfoMask::HAS_SYMBOLIC_ID, self.symbolic_id.is_some());
        encoding_mask.set(DiagnosticInfoMask::HAS_NAMESPACE, self.namespace_uri.is_some());
        encoding_mask.set(DiagnosticInfoMask::HAS_LOCALE, self.locale.is_some());
        encoding_mask.set(
            DiagnosticInfoMask::HAS_LOCALIZED_TEXT,
            self.localized_text.is_some(),
        );
        encoding_mask.set(
            DiagnosticInfoMask::HAS_ADDITIONAL_INFO,
            self.additional_info.is_some(),
        );
        encoding_mask.set(
            DiagnosticInfoMask::HAS_INNER_STATUS_CODE,
            self.inner_status_code.is_some(),
        );
        encoding_mask.set(
            DiagnosticInfoMask::HAS_INNER_DIAGNOSTIC_INFO,
            self.inner_diagnostic_info.is_some(),
        );
        encoding_mask
    }
}
