/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 14/10/26
******************************************************************************/

//! Text codec for the producer and subscriber protocols.
//!
//! Producer lines look like `sequence|type[|from][|to]`:
//!
//! | Line | Meaning |
//! |---|---|
//! | `F\|from\|to` | follow |
//! | `U\|from\|to` | unfollow |
//! | `B` | broadcast |
//! | `P\|from\|to` | private message |
//! | `S\|from` | status update |
//!
//! Subscribers send a single line holding their numeric user id.

use super::{Event, EventKind, UserId};
use crate::error::CodecError;
use bytes::{BufMut, Bytes, BytesMut};

/// Delimiter written after every payload sent to a subscriber.
pub const LINE_DELIMITER: &[u8] = b"\r\n";

const FIELD_SEPARATOR: char = '|';
const MAX_FIELDS: usize = 4;

/// Decodes one producer line (without its terminator) into an [`Event`].
///
/// The line is kept verbatim as the event payload.
///
/// # Errors
///
/// Returns [`CodecError::MalformedEvent`] when the field count is outside
/// what the declared type allows, a numeric field does not parse, or the
/// type code is unknown.
///
/// # Examples
///
/// ```
/// use follower_relay::event::decode_event;
/// use follower_relay::{EventKind, UserId};
///
/// let event = decode_event("42|F|1|2").unwrap();
/// assert_eq!(event.sequence(), 42);
/// assert_eq!(*event.kind(), EventKind::Follow { from: UserId(1), to: UserId(2) });
/// assert!(decode_event("abc|X|1|2").is_err());
/// ```
pub fn decode_event(line: &str) -> Result<Event, CodecError> {
    let malformed = |reason| CodecError::malformed_event(line, reason);

    let mut fields = [""; MAX_FIELDS];
    let mut count = 0;
    for field in line.split(FIELD_SEPARATOR) {
        if count == MAX_FIELDS {
            return Err(malformed("too many fields"));
        }
        fields[count] = field;
        count += 1;
    }
    let fields = &fields[..count];
    if fields.len() < 2 {
        return Err(malformed("missing event type"));
    }

    let sequence = parse_number(fields[0]).ok_or_else(|| malformed("sequence is not a number"))?;
    let user = |field: &str| {
        parse_number(field)
            .map(UserId)
            .ok_or_else(|| malformed("user id is not a number"))
    };

    let kind = match (fields[1], &fields[2..]) {
        ("F", &[from, to]) => EventKind::Follow {
            from: user(from)?,
            to: user(to)?,
        },
        ("U", &[from, to]) => EventKind::Unfollow {
            from: user(from)?,
            to: user(to)?,
        },
        ("B", &[]) => EventKind::Broadcast,
        ("P", &[from, to]) => EventKind::PrivateMessage {
            from: user(from)?,
            to: user(to)?,
        },
        ("S", &[from]) => EventKind::StatusUpdate { from: user(from)? },
        ("F" | "U" | "B" | "P" | "S", _) => {
            return Err(malformed("wrong field count for event type"));
        }
        _ => return Err(malformed("unknown event type")),
    };

    Ok(Event::with_payload(sequence, kind, line))
}

/// Decodes a subscriber registration line into its [`UserId`].
///
/// Surrounding ASCII whitespace is ignored.
///
/// # Errors
///
/// Returns [`CodecError::MalformedRegistration`] when the line is not a
/// single non-negative integer.
pub fn decode_registration(line: &str) -> Result<UserId, CodecError> {
    parse_number(line.trim_ascii())
        .map(UserId)
        .ok_or_else(|| CodecError::MalformedRegistration {
            line: line.to_owned(),
        })
}

/// Encodes an event as the frame written to subscribers: its payload
/// followed by [`LINE_DELIMITER`].
#[must_use]
pub fn encode(event: &Event) -> Bytes {
    let payload = event.payload().as_bytes();
    let mut frame = BytesMut::with_capacity(payload.len() + LINE_DELIMITER.len());
    frame.put_slice(payload);
    frame.put_slice(LINE_DELIMITER);
    frame.freeze()
}

/// Parses a plain run of ASCII digits.
///
/// Signs are rejected so that `+5` and `5` never name different ids.
fn parse_number(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
