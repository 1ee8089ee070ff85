//! NetFlow v9 (RFC 3954): a packet header followed by FlowSets, where
//! Data FlowSets can only be decoded against a Template FlowSet received
//! earlier from the same exporter and observation domain.

use std::net::IpAddr;

use super::fields;
use super::template::{Field, Template, TemplateCache};
use crate::{Buffer, Error, Value};

pub const VERSION: u16 = 0x0009;

const TEMPLATE_SET: u16 = 0;
const OPTIONS_TEMPLATE_SET: u16 = 1;
const FIRST_DATA_SET: u16 = 256;

#[derive(Debug, PartialEq)]
pub struct Header {
    pub version: u16,
    pub count: u16,
    pub sys_uptime: u32,
    pub unix_secs: u32,
    pub sequence_number: u32,
    pub source_id: u32,
}

pub(crate) fn decode_header(buf: &mut Buffer) -> Result<Header, Error> {
    Ok(Header {
        version: buf.read_u16()?,
        count: buf.read_u16()?,
        sys_uptime: buf.read_u32()?,
        unix_secs: buf.read_u32()?,
        sequence_number: buf.read_u32()?,
        source_id: buf.read_u32()?,
    })
}

/// Decode one v9 datagram, reading and writing `cache` as FlowSets
/// arrive. Emits one event per data record whose template is known.
///
/// The header `count` field is ambiguous in the wild (records for some
/// exporters, FlowSets for others), so it is treated as advisory and the
/// buffer is the authoritative terminator.
pub fn decode(
    buf: &mut Buffer,
    exporter: IpAddr,
    cache: &mut TemplateCache,
) -> Result<Vec<Value>, Error> {
    let header = decode_header(buf)?;
    debug!(
        message = "netflow v9 header",
        count = header.count,
        sequence = header.sequence_number,
        source_id = header.source_id
    );

    let mut events = Vec::new();
    while buf.remaining() >= 4 {
        let set_id = buf.read_u16()?;
        let length = buf.read_u16()? as usize;
        if length < 4 {
            return Err(Error::Malformed("flow set shorter than its own header"));
        }

        let body = length - 4;
        if body > buf.remaining() {
            return Err(Error::Truncated);
        }
        let end = buf.position() + body;

        match set_id {
            TEMPLATE_SET => decode_template_set(buf, end, exporter, header.source_id, cache)?,
            OPTIONS_TEMPLATE_SET => {
                decode_options_template_set(buf, end, exporter, header.source_id, cache)?
            }
            id if id >= FIRST_DATA_SET => {
                match decode_data_set(buf, end, id, exporter, header.source_id, cache) {
                    Ok(mut decoded) => events.append(&mut decoded),
                    Err(Error::UnknownTemplate(template)) => {
                        debug!(
                            message = "template not yet received, skipping flow set",
                            %exporter,
                            source_id = header.source_id,
                            template
                        );
                    }
                    Err(err) => return Err(err),
                }
            }
            id => {
                // 2..=255 are reserved set ids
                debug!(message = "reserved flow set id, skipping", id);
            }
        }

        // whatever a set decoder left unread is padding
        buf.seek(end)?;
    }

    Ok(events)
}

fn read_specifiers(buf: &mut Buffer, count: usize) -> Result<Vec<Field>, Error> {
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        let id = buf.read_u16()?;
        let length = buf.read_u16()?;
        fields.push(Field { id, length });
    }

    Ok(fields)
}

fn decode_template_set(
    buf: &mut Buffer,
    end: usize,
    exporter: IpAddr,
    source_id: u32,
    cache: &mut TemplateCache,
) -> Result<(), Error> {
    while end - buf.position() >= 4 {
        let template_id = buf.read_u16()?;
        let field_count = buf.read_u16()? as usize;
        if template_id < FIRST_DATA_SET {
            return Err(Error::Malformed("template id in reserved flow set range"));
        }
        if field_count == 0 {
            return Err(Error::Malformed("template with no fields"));
        }

        let fields = read_specifiers(buf, field_count)?;
        if buf.position() > end {
            return Err(Error::Malformed("template record overruns its flow set"));
        }

        debug!(
            message = "installing template",
            %exporter,
            source_id,
            template = template_id,
            fields = field_count
        );
        cache.put(exporter, source_id, template_id, Template::Data { fields });
    }

    Ok(())
}

/// Options Template FlowSet, RFC 3954 section 6.1. Unlike IPFIX, the v9
/// scope and option lengths are byte counts, not specifier counts.
fn decode_options_template_set(
    buf: &mut Buffer,
    end: usize,
    exporter: IpAddr,
    source_id: u32,
    cache: &mut TemplateCache,
) -> Result<(), Error> {
    while end - buf.position() >= 6 {
        let template_id = buf.read_u16()?;
        let scope_length = buf.read_u16()? as usize;
        let option_length = buf.read_u16()? as usize;
        if template_id < FIRST_DATA_SET {
            return Err(Error::Malformed("options template id in reserved range"));
        }
        if scope_length % 4 != 0 || option_length % 4 != 0 {
            return Err(Error::Malformed("options template length not on a specifier boundary"));
        }
        if scope_length + option_length == 0 {
            return Err(Error::Malformed("options template with no fields"));
        }

        let scopes = read_specifiers(buf, scope_length / 4)?;
        let options = read_specifiers(buf, option_length / 4)?;
        if buf.position() > end {
            return Err(Error::Malformed("options template overruns its flow set"));
        }

        debug!(
            message = "installing options template",
            %exporter,
            source_id,
            template = template_id
        );
        cache.put(
            exporter,
            source_id,
            template_id,
            Template::Options { scopes, options },
        );
    }

    Ok(())
}

fn decode_data_set(
    buf: &mut Buffer,
    end: usize,
    set_id: u16,
    exporter: IpAddr,
    source_id: u32,
    cache: &mut TemplateCache,
) -> Result<Vec<Value>, Error> {
    let template = cache
        .get(exporter, source_id, set_id)
        .ok_or(Error::UnknownTemplate(set_id))?;

    let record_length = template.data_length();
    if record_length == 0 {
        return Err(Error::Malformed("template with zero-length records"));
    }

    let mut events = Vec::new();
    match template.as_ref() {
        Template::Data { fields } => {
            while end - buf.position() >= record_length {
                let mut event = Value::object();
                event.insert("type", "netflow");
                event.insert("version", 9u16);

                for field in fields {
                    let data = buf.read_slice(field.length as usize)?;
                    if let Some(spec) = fields::lookup(field.id) {
                        event.insert(spec.name, fields::decode(spec.kind, data));
                    }
                }

                events.push(event);
            }
        }
        Template::Options { .. } => {
            // options data carries exporter meta-fields (sampling rate and
            // the like); consumed so the cursor stays in frame, emission is
            // the host's call
            debug!(message = "options data flow set consumed", template = set_id);
        }
    }

    Ok(events)
}
