//! NetFlow v5: fixed 24-byte header followed by `count` 48-byte records.
//! http://netflow.caligare.com/netflow_v5.htm

use std::net::Ipv4Addr;

use crate::{Buffer, Error, Value};

pub const VERSION: u16 = 0x0005;

const RECORD_LEN: usize = 48;

#[derive(Debug, PartialEq)]
pub struct Header {
    pub version: u16,
    pub count: u16,
    pub sys_uptime: u32,
    pub unix_secs: u32,
    pub unix_nsecs: u32,
    pub flow_sequence: u32,
    pub engine_type: u8,
    pub engine_id: u8,
    pub sampling_interval: u16,
}

pub(crate) fn decode_header(buf: &mut Buffer) -> Result<Header, Error> {
    Ok(Header {
        version: buf.read_u16()?,
        count: buf.read_u16()?,
        sys_uptime: buf.read_u32()?,
        unix_secs: buf.read_u32()?,
        unix_nsecs: buf.read_u32()?,
        flow_sequence: buf.read_u32()?,
        engine_type: buf.read_u8()?,
        engine_id: buf.read_u8()?,
        sampling_interval: buf.read_u16()?,
    })
}

/// Decode a whole v5 datagram into one event per flow record.
///
/// All-or-nothing: a truncated record discards the datagram, including
/// records that already parsed.
pub fn decode(buf: &mut Buffer) -> Result<Vec<Value>, Error> {
    let header = decode_header(buf)?;
    debug!(
        message = "netflow v5 header",
        count = header.count,
        sequence = header.flow_sequence
    );

    if buf.remaining() < header.count as usize * RECORD_LEN {
        return Err(Error::Truncated);
    }

    let mut events = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        events.push(decode_record(buf)?);
    }

    Ok(events)
}

fn read_ipv4(buf: &mut Buffer) -> Result<Ipv4Addr, Error> {
    let b = buf.read_slice(4)?;
    Ok(Ipv4Addr::new(b[0], b[1], b[2], b[3]))
}

fn decode_record(buf: &mut Buffer) -> Result<Value, Error> {
    let mut event = Value::object();
    event.insert("type", "netflow");
    event.insert("version", 5u16);

    event.insert("src_ip", read_ipv4(buf)?);
    event.insert("dst_ip", read_ipv4(buf)?);
    event.insert("next_hop", read_ipv4(buf)?);
    event.insert("input_interface_value", buf.read_u16()?);
    event.insert("output_interface_value", buf.read_u16()?);
    event.insert("packets", buf.read_u32()?);
    event.insert("bytes", buf.read_u32()?);
    event.insert("first_switched", buf.read_u32()?);
    event.insert("last_switched", buf.read_u32()?);
    event.insert("src_port", buf.read_u16()?);
    event.insert("dst_port", buf.read_u16()?);
    buf.skip(1)?; // pad
    event.insert("tcp_flags", buf.read_u8()?);
    event.insert("ip_protocol", buf.read_u8()?);
    event.insert("tos", buf.read_u8()?);
    event.insert("src_as", buf.read_u16()?);
    event.insert("dst_as", buf.read_u16()?);
    event.insert("src_mask", buf.read_u8()?);
    event.insert("dst_mask", buf.read_u8()?);
    buf.skip(2)?; // pad

    Ok(event)
}
