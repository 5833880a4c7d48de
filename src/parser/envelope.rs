//! Envelope extraction from a raw RFC 5322 message.

use chrono::DateTime;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders};

use crate::model::address::Address;
use crate::source::Envelope;

/// Default type of a part without `Content-Type` (RFC 2045 §5.2).
const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Build the envelope of a raw message.
///
/// Returns `None` only when `mail-parser` cannot make sense of the bytes at all.
pub fn parse_envelope(raw_message: &[u8]) -> Option<Envelope> {
    let message = MessageParser::default().parse(raw_message)?;
    Some(envelope_of(&message))
}

/// Envelope fields of an already parsed message.
pub fn envelope_of(message: &Message<'_>) -> Envelope {
    let date = message
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or(DateTime::UNIX_EPOCH);

    Envelope {
        message_id: message.message_id().unwrap_or_default().to_string(),
        subject: message.subject().unwrap_or_default().to_string(),
        from: message.from().map(addresses).unwrap_or_default(),
        date,
        mime_type: Some(declared_type(message.root_part())),
    }
}

/// Declared `type/subtype` of a part, lowercased.
pub fn declared_type(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
        .to_lowercase()
}

/// Flatten a header address (list or groups) into address records.
///
/// Entries without an address spec are dropped.
fn addresses(address: &mail_parser::Address<'_>) -> Vec<Address> {
    let addrs: Vec<&mail_parser::Addr<'_>> = match address {
        mail_parser::Address::List(list) => list.iter().collect(),
        mail_parser::Address::Group(groups) => {
            groups.iter().flat_map(|g| g.addresses.iter()).collect()
        }
    };

    addrs
        .into_iter()
        .filter_map(|a| {
            let spec = a.address.as_deref()?;
            Some(Address::new(a.name.as_deref().unwrap_or_default(), spec))
        })
        .collect()
}
