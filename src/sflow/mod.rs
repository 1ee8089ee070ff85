//! sFlow v5 datagram decoding.
//! http://www.sflow.org/developers/diagrams/sFlowV5Datagram.pdf

mod counter;
mod flow;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{Buffer, Error, Value};

pub const VERSION: u32 = 5;

pub const SAMPLE_FLOW: u32 = 1;
pub const SAMPLE_COUNTER: u32 = 2;
pub const SAMPLE_EXPANDED_FLOW: u32 = 3;
pub const SAMPLE_EXPANDED_COUNTER: u32 = 4;

#[derive(Debug, PartialEq)]
pub struct Datagram {
    pub version: u32,
    pub ip_version: u32,
    pub agent: IpAddr,
    pub sub_agent_id: u32,
    pub sequence: u32,
    pub uptime: u32,
    pub samples: u32,
}

/// Agent and next-hop addresses are prefixed by an address-type word:
/// 1 for a 4-byte IPv4 address, 2 for a 16-byte IPv6 address.
pub(crate) fn read_address(buf: &mut Buffer, ip_version: u32) -> Result<IpAddr, Error> {
    match ip_version {
        1 => {
            let b = buf.read_slice(4)?;
            Ok(IpAddr::V4(Ipv4Addr::new(b[0], b[1], b[2], b[3])))
        }
        2 => {
            let b = buf.read_slice(16)?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(b);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => Err(Error::Malformed("unknown address type")),
    }
}

pub(crate) fn decode_datagram(buf: &mut Buffer) -> Result<Datagram, Error> {
    let version = buf.read_u32()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let ip_version = buf.read_u32()?;
    let agent = read_address(buf, ip_version)?;

    Ok(Datagram {
        version,
        ip_version,
        agent,
        sub_agent_id: buf.read_u32()?,
        sequence: buf.read_u32()?,
        uptime: buf.read_u32()?,
        samples: buf.read_u32()?,
    })
}

impl Datagram {
    fn trans_info(&self, event: &mut Value) {
        event.insert("type", "sflow");
        event.insert("version", self.version);
        event.insert("ip_version", self.ip_version);
        event.insert("agent", self.agent);
        event.insert("sub_agent", self.sub_agent_id);
        event.insert("sequence", self.sequence);
        event.insert("uptime", self.uptime);
    }
}

/// Decode one sFlow datagram into one event per sample whose tag is in
/// `sample_types`. Samples outside the allow-list are skipped by their
/// declared length.
pub fn decode(buf: &mut Buffer, sample_types: &[u32]) -> Result<Vec<Value>, Error> {
    let datagram = decode_datagram(buf)?;
    debug!(
        message = "sflow datagram",
        agent = %datagram.agent,
        sequence = datagram.sequence,
        samples = datagram.samples
    );

    let mut events = Vec::new();
    for _ in 0..datagram.samples {
        let tag = buf.read_u32()?;
        let length = buf.read_u32()? as usize;
        if length > buf.remaining() {
            return Err(Error::Truncated);
        }

        if !sample_types.contains(&tag) {
            buf.skip(length)?;
            continue;
        }

        let end = buf.position() + length;
        let decoded = match tag {
            SAMPLE_FLOW => flow::decode_flow_sample(buf, end).map(Some),
            SAMPLE_EXPANDED_FLOW => flow::decode_expanded_flow_sample(buf, end).map(Some),
            SAMPLE_COUNTER | SAMPLE_EXPANDED_COUNTER => {
                counter::decode_counter_sample(buf, tag, end).map(Some)
            }
            tag => Err(Error::UnknownTag(tag)),
        };

        let sample = match decoded {
            Ok(sample) => sample,
            Err(Error::UnknownTag(tag)) => {
                debug!(message = "unsupported sample tag, skipping", tag);
                None
            }
            Err(err) => return Err(err),
        };

        if buf.position() > end {
            return Err(Error::Malformed("sample overran its declared length"));
        }
        buf.seek(end)?;

        if let Some(mut event) = sample {
            datagram.trans_info(&mut event);
            events.push(event);
        }
    }

    Ok(events)
}
