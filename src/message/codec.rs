use std::collections::VecDeque;
use std::num::NonZeroU32;

use crate::body::MAX_BODY_LENGTH;
use crate::error::ErrorKind;
use crate::names::{is_bus_name, is_error_name, is_interface_name, is_member_name};
use crate::proto::{Endianness, Field, Flags, MessageType};
use crate::utils::padding_to;
use crate::value::UnixFd;
use crate::{Body, BodyBuf, Error, Message, MessageKind, Result, Signature, Value};

use super::{FIXED_HEADER_LENGTH, MAX_MESSAGE_LENGTH, PROTOCOL_VERSION};

/// The signature of the header field array.
const HEADER_FIELDS: &Signature = unsafe { Signature::new_unchecked(b"a(yv)") };

/// Validate the header names of an outgoing message.
///
/// Raised synchronously at the sending API, before any wire traffic.
pub(crate) fn validate(message: &Message) -> Result<()> {
    match &message.kind {
        MessageKind::MethodCall { member, .. } => {
            if !is_member_name(member) {
                return Err(Error::new(ErrorKind::InvalidMemberName));
            }
        }
        MessageKind::Error { error_name, .. } => {
            if !is_error_name(error_name) {
                return Err(Error::new(ErrorKind::InvalidErrorName));
            }
        }
        MessageKind::Signal {
            interface, member, ..
        } => {
            if !is_interface_name(interface) {
                return Err(Error::new(ErrorKind::InvalidInterfaceName));
            }

            if !is_member_name(member) {
                return Err(Error::new(ErrorKind::InvalidMemberName));
            }
        }
        MessageKind::MethodReturn { .. } => {}
    }

    if let Some(interface) = &message.interface {
        if !is_interface_name(interface) {
            return Err(Error::new(ErrorKind::InvalidInterfaceName));
        }
    }

    if let Some(destination) = &message.destination {
        if !is_bus_name(destination) {
            return Err(Error::new(ErrorKind::InvalidBusName));
        }
    }

    Ok(())
}

fn field(fields: &mut Vec<Value>, field: Field, value: Value) {
    fields.push(Value::Struct(vec![
        Value::Byte(field.0),
        Value::variant(value),
    ]));
}

/// Encode a message into a frame and the descriptors to send with it.
pub(crate) fn encode(
    message: &Message,
    serial: NonZeroU32,
    endianness: Endianness,
) -> Result<(Vec<u8>, Vec<UnixFd>)> {
    validate(message)?;

    // Encode the body first; it determines the SIGNATURE and UNIX_FDS
    // headers and the body length in the fixed header. Bodies start on an
    // 8-byte boundary, so encoding against position zero is equivalent.
    let mut body = BodyBuf::with_endianness(endianness);
    body.store_all(&message.body)?;

    if body.len() > MAX_BODY_LENGTH as usize {
        return Err(Error::new(ErrorKind::BodyTooLong(body.len() as u32)));
    }

    let (body_bytes, fds) = body.into_parts();

    let mut fields = Vec::new();

    match &message.kind {
        MessageKind::MethodCall { path, member } => {
            field(&mut fields, Field::PATH, Value::Path(path.clone()));
            field(&mut fields, Field::MEMBER, Value::Str(member.clone()));
        }
        MessageKind::MethodReturn { reply_serial } => {
            field(&mut fields, Field::REPLY_SERIAL, Value::U32(reply_serial.get()));
        }
        MessageKind::Error {
            error_name,
            reply_serial,
        } => {
            field(&mut fields, Field::ERROR_NAME, Value::Str(error_name.clone()));
            field(&mut fields, Field::REPLY_SERIAL, Value::U32(reply_serial.get()));
        }
        MessageKind::Signal {
            path,
            interface,
            member,
        } => {
            field(&mut fields, Field::PATH, Value::Path(path.clone()));
            field(&mut fields, Field::INTERFACE, Value::Str(interface.clone()));
            field(&mut fields, Field::MEMBER, Value::Str(member.clone()));
        }
    }

    // Signals carry their interface in the kind; anything set through
    // `with_interface` on other kinds goes out here.
    if let (Some(interface), false) = (
        &message.interface,
        matches!(&message.kind, MessageKind::Signal { .. }),
    ) {
        field(&mut fields, Field::INTERFACE, Value::Str(interface.clone()));
    }

    if let Some(destination) = &message.destination {
        field(
            &mut fields,
            Field::DESTINATION,
            Value::Str(destination.clone()),
        );
    }

    if let Some(sender) = &message.sender {
        field(&mut fields, Field::SENDER, Value::Str(sender.clone()));
    }

    if !message.signature.is_empty() {
        field(
            &mut fields,
            Field::SIGNATURE,
            Value::Sig(message.signature.clone()),
        );
    }

    if !fds.is_empty() {
        field(&mut fields, Field::UNIX_FDS, Value::U32(fds.len() as u32));
    }

    let mut frame = BodyBuf::with_endianness(endianness);
    frame.extend_from_slice(&[
        endianness.0,
        message.message_type().0,
        message.flags.0,
        PROTOCOL_VERSION,
    ]);
    frame.store_u32(body_bytes.len() as u32);
    frame.store_u32(serial.get());
    frame.store(&Value::Array(crate::SignatureBuf::new("(yv)")?, fields))?;
    frame.align(8);

    let (mut frame, _) = frame.into_parts();

    if frame.len() + body_bytes.len() > MAX_MESSAGE_LENGTH {
        return Err(Error::new(ErrorKind::MessageTooLong(
            frame.len() + body_bytes.len(),
        )));
    }

    frame.extend_from_slice(&body_bytes);
    Ok((frame, fds))
}

#[derive(Default)]
struct Fields {
    path: Option<crate::ObjectPathBuf>,
    interface: Option<String>,
    member: Option<String>,
    error_name: Option<String>,
    reply_serial: Option<u32>,
    destination: Option<String>,
    sender: Option<String>,
    signature: Option<crate::SignatureBuf>,
    unix_fds: u32,
}

fn invalid(field: Field) -> Error {
    Error::new(ErrorKind::InvalidHeader(field))
}

fn missing(field: Field) -> Error {
    Error::new(ErrorKind::MissingHeader(field))
}

/// Decode and validate a complete frame received off the wire.
///
/// `fds` holds the descriptors received out-of-band and not yet claimed;
/// the frame consumes as many of them, in order, as its `UNIX_FDS` header
/// declares.
pub(crate) fn decode(frame: &[u8], fds: &mut VecDeque<UnixFd>) -> Result<Message> {
    if frame.len() > MAX_MESSAGE_LENGTH {
        return Err(Error::new(ErrorKind::MessageTooLong(frame.len())));
    }

    if frame.len() < FIXED_HEADER_LENGTH {
        return Err(Error::new(ErrorKind::BufferUnderflow));
    }

    let endianness = match frame[0] {
        b'l' => Endianness::LITTLE,
        b'B' => Endianness::BIG,
        _ => return Err(Error::new(ErrorKind::InvalidProtocol)),
    };

    let message_type = MessageType::new(frame[1]);
    let flags = Flags(frame[2] & 0x7);

    if frame[3] != PROTOCOL_VERSION {
        return Err(Error::new(ErrorKind::InvalidProtocol));
    }

    let mut reader = Body::new(frame, endianness, &[]);
    let _ = reader.read_u32()?;
    let body_length = reader.read_u32()?;
    let serial = reader.read_u32()?;

    if body_length > MAX_BODY_LENGTH {
        return Err(Error::new(ErrorKind::BodyTooLong(body_length)));
    }

    let Some(serial) = NonZeroU32::new(serial) else {
        return Err(Error::new(ErrorKind::ZeroSerial));
    };

    let header = reader.load_partial(HEADER_FIELDS)?;
    let header_end = frame.len() - reader.len();
    let body_start = header_end + padding_to(header_end, 8);
    let body_end = body_start + body_length as usize;

    if body_end != frame.len() {
        return Err(Error::new(ErrorKind::BufferUnderflow));
    }

    if frame[header_end..body_start].iter().any(|&b| b != 0) {
        return Err(Error::new(ErrorKind::NonZeroPadding));
    }

    let mut fields = Fields::default();

    // The header array is `a(yv)`; the outer shape is guaranteed by the
    // reader, the per-field value types are checked here.
    let Some(Value::Array(_, entries)) = header.into_iter().next() else {
        return Err(Error::new(ErrorKind::InvalidProtocol));
    };

    for entry in entries {
        let Value::Struct(entry) = entry else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        let mut entry = entry.into_iter();

        let (Some(Value::Byte(code)), Some(Value::Variant(value))) =
            (entry.next(), entry.next())
        else {
            return Err(Error::new(ErrorKind::InvalidProtocol));
        };

        let code = Field::new(code);

        match (code, *value) {
            (Field::PATH, Value::Path(path)) => fields.path = Some(path),
            (Field::INTERFACE, Value::Str(name)) if is_interface_name(&name) => {
                fields.interface = Some(name);
            }
            (Field::MEMBER, Value::Str(name)) if is_member_name(&name) => {
                fields.member = Some(name);
            }
            (Field::ERROR_NAME, Value::Str(name)) if is_error_name(&name) => {
                fields.error_name = Some(name);
            }
            (Field::REPLY_SERIAL, Value::U32(value)) => fields.reply_serial = Some(value),
            (Field::DESTINATION, Value::Str(name)) => fields.destination = Some(name),
            (Field::SENDER, Value::Str(name)) => fields.sender = Some(name),
            (Field::SIGNATURE, Value::Sig(signature)) => fields.signature = Some(signature),
            (Field::UNIX_FDS, Value::U32(count)) => fields.unix_fds = count,
            (
                code @ (Field::PATH
                | Field::INTERFACE
                | Field::MEMBER
                | Field::ERROR_NAME
                | Field::REPLY_SERIAL
                | Field::DESTINATION
                | Field::SENDER
                | Field::SIGNATURE
                | Field::UNIX_FDS),
                _,
            ) => return Err(invalid(code)),
            // Unknown header fields must be ignored.
            _ => {}
        }
    }

    if fds.len() < fields.unix_fds as usize {
        return Err(Error::new(ErrorKind::FdCountMismatch));
    }

    let fds = fds
        .drain(..fields.unix_fds as usize)
        .collect::<Vec<UnixFd>>();

    let reply_serial = match fields.reply_serial {
        Some(value) => Some(
            NonZeroU32::new(value).ok_or_else(|| invalid(Field::REPLY_SERIAL))?,
        ),
        None => None,
    };

    let kind = match message_type {
        MessageType::METHOD_CALL => MessageKind::MethodCall {
            path: fields.path.take().ok_or_else(|| missing(Field::PATH))?,
            member: fields.member.take().ok_or_else(|| missing(Field::MEMBER))?,
        },
        MessageType::METHOD_RETURN => MessageKind::MethodReturn {
            reply_serial: reply_serial.ok_or_else(|| missing(Field::REPLY_SERIAL))?,
        },
        MessageType::ERROR => MessageKind::Error {
            error_name: fields
                .error_name
                .take()
                .ok_or_else(|| missing(Field::ERROR_NAME))?,
            reply_serial: reply_serial.ok_or_else(|| missing(Field::REPLY_SERIAL))?,
        },
        MessageType::SIGNAL => MessageKind::Signal {
            path: fields.path.take().ok_or_else(|| missing(Field::PATH))?,
            interface: fields
                .interface
                .take()
                .ok_or_else(|| missing(Field::INTERFACE))?,
            member: fields.member.take().ok_or_else(|| missing(Field::MEMBER))?,
        },
        _ => return Err(Error::new(ErrorKind::InvalidProtocol)),
    };

    let signature = match fields.signature {
        Some(signature) => signature,
        None if body_length == 0 => crate::SignatureBuf::empty(),
        None => return Err(missing(Field::SIGNATURE)),
    };

    let body = Body::new(&frame[body_start..body_end], endianness, &fds).load(&signature)?;

    Ok(Message {
        kind,
        serial: Some(serial),
        flags,
        interface: fields.interface,
        destination: fields.destination,
        sender: fields.sender,
        signature,
        body,
    })
}

/// Peek the total length of the frame whose fixed header starts `bytes`.
///
/// Returns `None` until 16 bytes are available.
pub(crate) fn frame_length(bytes: &[u8]) -> Result<Option<usize>> {
    if bytes.len() < FIXED_HEADER_LENGTH {
        return Ok(None);
    }

    let endianness = match bytes[0] {
        b'l' => Endianness::LITTLE,
        b'B' => Endianness::BIG,
        _ => return Err(Error::new(ErrorKind::InvalidProtocol)),
    };

    let mut reader = Body::new(&bytes[..FIXED_HEADER_LENGTH], endianness, &[]);
    let _ = reader.read_u32()?;
    let body_length = reader.read_u32()? as usize;
    let _serial = reader.read_u32()?;
    let fields_length = reader.read_u32()? as usize;

    let headers = FIXED_HEADER_LENGTH + fields_length;
    let total = headers + padding_to(headers, 8) + body_length;

    if total > MAX_MESSAGE_LENGTH {
        return Err(Error::new(ErrorKind::MessageTooLong(total)));
    }

    Ok(Some(total))
}
