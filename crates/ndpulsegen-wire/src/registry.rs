//! Inbound message registry: id byte to frame length, category and decoder.
//!
//! The table is a `static` built at compile time and never mutated.

use crate::codec::expect_len;
use crate::error::CodecResult;
use crate::ids;
use crate::message::{
    decode_devicestate, decode_devicestate_extras, decode_echo, decode_error, decode_notification,
    decode_powerlinestate, decode_print, Message, MessageCategory,
};

/// Decoder over a payload of exactly `length - 1` bytes.
pub type Decoder = fn(&[u8]) -> CodecResult<Message>;

/// Framing and decoding rules for one inbound message id.
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    /// Id byte.
    pub id: u8,
    /// Total frame length, id byte included.
    pub length: usize,
    /// Category the decoded message is dispatched under.
    pub category: MessageCategory,
    /// Payload decoder.
    pub decode: Decoder,
}

impl MessageSpec {
    /// Payload bytes that follow the id byte.
    pub fn payload_len(&self) -> usize {
        self.length - 1
    }

    /// Decode a payload, checking its length first.
    pub fn decode_payload(&self, payload: &[u8]) -> CodecResult<Message> {
        expect_len(self.category.name(), payload, self.payload_len())?;
        (self.decode)(payload)
    }
}

/// Longest inbound frame, id byte included.
pub const MAX_FRAME_LEN: usize = 21;

const SPECS: [MessageSpec; 7] = [
    MessageSpec {
        id: ids::ECHO,
        length: 11,
        category: MessageCategory::Echo,
        decode: decode_echo,
    },
    MessageSpec {
        id: ids::DEVICESTATE,
        length: 21,
        category: MessageCategory::DeviceState,
        decode: decode_devicestate,
    },
    MessageSpec {
        id: ids::NOTIFICATION,
        length: 12,
        category: MessageCategory::Notification,
        decode: decode_notification,
    },
    MessageSpec {
        id: ids::PRINT,
        length: 9,
        category: MessageCategory::Print,
        decode: decode_print,
    },
    MessageSpec {
        id: ids::ERROR,
        length: 9,
        category: MessageCategory::Error,
        decode: decode_error,
    },
    MessageSpec {
        id: ids::POWERLINESTATE,
        length: 10,
        category: MessageCategory::PowerlineState,
        decode: decode_powerlinestate,
    },
    MessageSpec {
        id: ids::DEVICESTATE_EXTRAS,
        length: 9,
        category: MessageCategory::DeviceStateExtras,
        decode: decode_devicestate_extras,
    },
];

/// Every inbound message, in id order.
pub static REGISTRY: [MessageSpec; 7] = SPECS;

const UNREGISTERED: u8 = u8::MAX;

/// Position in `REGISTRY` of each id byte.
static INDEX: [u8; 256] = build_index();

const fn build_index() -> [u8; 256] {
    let mut index = [UNREGISTERED; 256];
    let mut i = 0;
    while i < SPECS.len() {
        index[SPECS[i].id as usize] = i as u8;
        i += 1;
    }
    index
}

/// Look up the framing rules for an inbound id byte.
pub fn lookup(id: u8) -> Option<&'static MessageSpec> {
    match INDEX[id as usize] {
        UNREGISTERED => None,
        i => Some(&REGISTRY[i as usize]),
    }
}

pub(crate) fn lookup_category(category: MessageCategory) -> &'static MessageSpec {
    // Category ids are always registered.
    let position = INDEX[category.id() as usize] as usize;
    &REGISTRY[position]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_is_registered_once() {
        for category in MessageCategory::ALL {
            let spec = lookup(category.id()).unwrap();
            assert_eq!(spec.category, category);
            assert_eq!(lookup_category(category).id, category.id());
        }
        assert_eq!(REGISTRY.len(), MessageCategory::ALL.len());
    }

    #[test]
    fn unknown_ids_are_absent() {
        assert!(lookup(0).is_none());
        assert!(lookup(ids::CMD_ECHO).is_none());
        assert!(lookup(u8::MAX).is_none());
    }

    #[test]
    fn max_frame_len_covers_registry() {
        let longest = REGISTRY.iter().map(|spec| spec.length).max().unwrap();
        assert_eq!(longest, MAX_FRAME_LEN);
        assert!(REGISTRY.iter().all(|spec| spec.length >= 2));
    }

    #[test]
    fn decode_payload_checks_length() {
        let spec = lookup(ids::PRINT).unwrap();
        assert!(spec.decode_payload(&[0; 7]).is_err());
        assert!(spec.decode_payload(&[0; 8]).is_ok());
    }
}
