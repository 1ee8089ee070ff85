//! Flow samples and the tagged records nested inside them.
//! http://www.sflow.org/developers/diagrams/sFlowV5Sample.pdf

use super::read_address;
use crate::packet::{self, L3, L4};
use crate::{Buffer, Error, Value};

pub const RECORD_RAW_PACKET: u32 = 1;
pub const RECORD_ETHERNET: u32 = 2;
pub const RECORD_IPV4: u32 = 3;
pub const RECORD_IPV6: u32 = 4;
pub const RECORD_EXT_SWITCH: u32 = 1001;
pub const RECORD_EXT_ROUTER: u32 = 1002;
pub const RECORD_EXT_GATEWAY: u32 = 1003;
pub const RECORD_EXT_USER: u32 = 1004;
pub const RECORD_EXT_URL: u32 = 1005;
pub const RECORD_EXT_MPLS: u32 = 1006;
pub const RECORD_EXT_NAT: u32 = 1007;
pub const RECORD_EXT_MPLS_TUNNEL: u32 = 1008;
pub const RECORD_EXT_MPLS_VC: u32 = 1009;
pub const RECORD_EXT_MPLS_FEC: u32 = 1010;
pub const RECORD_EXT_MPLS_LVP_FEC: u32 = 1011;
pub const RECORD_EXT_VLAN_TUNNEL: u32 = 1012;

/// Flow sample header (tag 1). The source id packs the type into the top
/// byte and the index into the low bits.
struct SampleHeader {
    sequence: u32,
    source_id_type: u32,
    source_id_index: u32,
    rate: u32,
    pool: u32,
    drops: u32,
    input: u32,
    output: u32,
    records: u32,
}

impl SampleHeader {
    fn decode(buf: &mut Buffer) -> Result<Self, Error> {
        let sequence = buf.read_u32()?;
        let source_id = buf.read_u32()?;

        Ok(SampleHeader {
            sequence,
            source_id_type: source_id >> 24,
            source_id_index: source_id & 0x0fff,
            rate: buf.read_u32()?,
            pool: buf.read_u32()?,
            drops: buf.read_u32()?,
            input: buf.read_u32()?,
            output: buf.read_u32()?,
            records: buf.read_u32()?,
        })
    }

    fn trans_info(&self, event: &mut Value) {
        let mut group = Value::object();
        group.insert("format", super::SAMPLE_FLOW);
        group.insert("sequence", self.sequence);
        group.insert("type", self.source_id_type);
        group.insert("index", self.source_id_index);
        group.insert("rate", self.rate);
        group.insert("pool", self.pool);
        group.insert("drops", self.drops);
        group.insert("input_interface_value", self.input);
        group.insert("output_interface_value", self.output);
        event.insert("sample", group);
    }
}

/// Expanded flow sample header (tag 3): the packed fields of the compact
/// header are spelled out as (class, index) and (format, value) pairs.
struct ExpandedSampleHeader {
    sequence: u32,
    ds_class: u32,
    ds_index: u32,
    rate: u32,
    pool: u32,
    drops: u32,
    input_format: u32,
    input_value: u32,
    output_format: u32,
    output_value: u32,
    records: u32,
}

impl ExpandedSampleHeader {
    fn decode(buf: &mut Buffer) -> Result<Self, Error> {
        Ok(ExpandedSampleHeader {
            sequence: buf.read_u32()?,
            ds_class: buf.read_u32()?,
            ds_index: buf.read_u32()?,
            rate: buf.read_u32()?,
            pool: buf.read_u32()?,
            drops: buf.read_u32()?,
            input_format: buf.read_u32()?,
            input_value: buf.read_u32()?,
            output_format: buf.read_u32()?,
            output_value: buf.read_u32()?,
            records: buf.read_u32()?,
        })
    }

    fn trans_info(&self, event: &mut Value) {
        let mut group = Value::object();
        group.insert("format", super::SAMPLE_EXPANDED_FLOW);
        group.insert("sequence", self.sequence);
        group.insert("type", self.ds_class);
        group.insert("index", self.ds_index);
        group.insert("rate", self.rate);
        group.insert("pool", self.pool);
        group.insert("drops", self.drops);
        group.insert("input_interface_format", self.input_format);
        group.insert("input_interface_value", self.input_value);
        group.insert("output_interface_format", self.output_format);
        group.insert("output_interface_value", self.output_value);
        event.insert("sample", group);
    }
}

pub(super) fn decode_flow_sample(buf: &mut Buffer, end: usize) -> Result<Value, Error> {
    let header = SampleHeader::decode(buf)?;

    let mut event = Value::object();
    header.trans_info(&mut event);
    decode_records(buf, &mut event, header.records, end)?;

    Ok(event)
}

pub(super) fn decode_expanded_flow_sample(buf: &mut Buffer, end: usize) -> Result<Value, Error> {
    let header = ExpandedSampleHeader::decode(buf)?;

    let mut event = Value::object();
    header.trans_info(&mut event);
    decode_records(buf, &mut event, header.records, end)?;

    Ok(event)
}

fn decode_records(
    buf: &mut Buffer,
    event: &mut Value,
    count: u32,
    sample_end: usize,
) -> Result<(), Error> {
    for _ in 0..count {
        if buf.position() + 8 > sample_end {
            return Err(Error::Malformed("record count overruns its sample"));
        }

        let tag = buf.read_u32()?;
        let length = buf.read_u32()? as usize;
        if length > buf.remaining() {
            return Err(Error::Truncated);
        }
        let end = buf.position() + length;

        match decode_record(buf, event, tag, end) {
            Ok(()) => {}
            Err(Error::UnknownTag(tag)) => {
                debug!(message = "unknown flow record tag, skipping", tag);
            }
            Err(err) => return Err(err),
        }

        if buf.position() > end {
            return Err(Error::Malformed("record overran its declared length"));
        }
        buf.seek(end)?;
    }

    Ok(())
}

fn decode_record(buf: &mut Buffer, event: &mut Value, tag: u32, end: usize) -> Result<(), Error> {
    match tag {
        RECORD_RAW_PACKET => decode_raw_packet(buf, event, end),
        RECORD_ETHERNET => decode_ethernet(buf, event, end),
        RECORD_IPV4 => decode_ipv4(buf, event),
        RECORD_IPV6 => decode_ipv6(buf, event),
        RECORD_EXT_SWITCH => decode_ext_switch(buf, event),
        RECORD_EXT_ROUTER => decode_ext_router(buf, event),
        RECORD_EXT_GATEWAY => decode_ext_gateway(buf, event),
        RECORD_EXT_USER => decode_ext_user(buf, event),
        RECORD_EXT_URL => decode_ext_url(buf, event),
        RECORD_EXT_MPLS => decode_ext_mpls(buf, event),
        RECORD_EXT_NAT => decode_ext_nat(buf, event),
        RECORD_EXT_MPLS_TUNNEL => decode_ext_mpls_tunnel(buf, event),
        RECORD_EXT_MPLS_VC => decode_ext_mpls_vc(buf, event),
        RECORD_EXT_MPLS_FEC => decode_ext_mpls_fec(buf, event),
        RECORD_EXT_MPLS_LVP_FEC => decode_ext_mpls_lvp_fec(buf, event),
        RECORD_EXT_VLAN_TUNNEL => decode_ext_vlan_tunnel(buf, event),
        tag => Err(Error::UnknownTag(tag)),
    }
}

/// Raw packet record: a fixed preamble plus the leading bytes of the
/// sampled frame, which are dissected down to L4 where they suffice.
fn decode_raw_packet(buf: &mut Buffer, event: &mut Value, end: usize) -> Result<(), Error> {
    if end < buf.position() + 16 {
        return Err(Error::Malformed("raw packet record too short"));
    }

    let mut group = Value::object();
    group.insert("header_protocol", buf.read_u32()?);
    group.insert("frame_length", buf.read_u32()?);
    group.insert("stripped", buf.read_u32()?);
    let header_length = buf.read_u32()? as usize;
    group.insert("header_size", header_length as u32);

    let data = buf.read_slice(end - buf.position())?;
    let sampled = &data[..header_length.min(data.len())];

    if let Some(frame) = packet::decode(sampled) {
        group.insert("vlan_id", frame.vlan);
        group.insert("ethernet_type", frame.ethertype);

        let protocol = match frame.l3 {
            L3::Ipv4(ref header) => {
                group.insert("ip_version", header.version);
                group.insert("tos", header.tos);
                group.insert("ttl", header.ttl);
                group.insert("ip_protocol", header.protocol);
                group.insert("src_ip", header.src);
                group.insert("dst_ip", header.dst);
                Some(header.protocol)
            }
            L3::Ipv6(ref header) => {
                group.insert("ip_version", header.version);
                group.insert("ip_protocol", header.next_header);
                group.insert("src_ip", header.src);
                group.insert("dst_ip", header.dst);
                Some(header.next_header)
            }
            L3::Unknown => None,
        };

        if protocol.is_some() {
            match frame.l4 {
                L4::Tcp(ref header) => {
                    group.insert("src_port", header.src_port);
                    group.insert("dst_port", header.dst_port);
                    group.insert("tcp_flags", header.flags);
                }
                L4::Udp(ref header) => {
                    group.insert("src_port", header.src_port);
                    group.insert("dst_port", header.dst_port);
                }
                L4::Icmp(ref header) => {
                    group.insert("icmp_type", header.typ);
                    group.insert("icmp_code", header.code);
                }
                L4::Unknown => {}
            }
        }
    }

    event.insert("raw", group);
    Ok(())
}

fn decode_ethernet(buf: &mut Buffer, event: &mut Value, end: usize) -> Result<(), Error> {
    if end < buf.position() + 4 {
        return Err(Error::Malformed("ethernet record too short"));
    }

    let frame_length = buf.read_u32()?;
    let header = buf.read_slice(end - buf.position())?;
    if header.len() < 14 {
        return Err(Error::Malformed("ethernet header too short"));
    }

    let mut group = Value::object();
    group.insert("frame_length", frame_length);
    group.insert("src_mac", mac(&header[0..6]));
    group.insert("dst_mac", mac(&header[6..12]));
    event.insert("ethernet", group);
    Ok(())
}

fn mac(b: &[u8]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}

fn decode_ipv4(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("length", buf.read_u32()?);
    group.insert("ip_protocol", buf.read_u32()?);

    let src = buf.read_slice(4)?;
    group.insert(
        "src_ip",
        std::net::Ipv4Addr::new(src[0], src[1], src[2], src[3]),
    );
    let dst = buf.read_slice(4)?;
    group.insert(
        "dst_ip",
        std::net::Ipv4Addr::new(dst[0], dst[1], dst[2], dst[3]),
    );

    group.insert("src_port", buf.read_u32()?);
    group.insert("dst_port", buf.read_u32()?);
    group.insert("tcp_flags", buf.read_u32()?);
    group.insert("tos", buf.read_u32()?);
    event.insert("ipv4", group);
    Ok(())
}

fn decode_ipv6(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("length", buf.read_u32()?);
    group.insert("ip_protocol", buf.read_u32()?);

    for key in ["src_ip", "dst_ip"] {
        let b = buf.read_slice(16)?;
        let mut octets = [0u8; 16];
        octets.copy_from_slice(b);
        group.insert(key, std::net::Ipv6Addr::from(octets));
    }

    group.insert("src_port", buf.read_u32()?);
    group.insert("dst_port", buf.read_u32()?);
    group.insert("tcp_flags", buf.read_u32()?);
    group.insert("priority", buf.read_u32()?);
    event.insert("ipv6", group);
    Ok(())
}

fn decode_ext_switch(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("src_vlan", buf.read_u32()?);
    group.insert("src_priority", buf.read_u32()?);
    group.insert("dst_vlan", buf.read_u32()?);
    group.insert("dst_priority", buf.read_u32()?);
    event.insert("switch", group);
    Ok(())
}

fn decode_ext_router(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let ip_version = buf.read_u32()?;
    group.insert("ip_version", ip_version);
    group.insert("next_hop", read_address(buf, ip_version)?);
    group.insert("src_mask_len", buf.read_u32()?);
    group.insert("dst_mask_len", buf.read_u32()?);
    event.insert("router", group);
    Ok(())
}

fn decode_ext_gateway(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let ip_version = buf.read_u32()?;
    group.insert("ip_version", ip_version);
    group.insert("next_hop", read_address(buf, ip_version)?);
    group.insert("as_router_no", buf.read_u32()?);
    group.insert("as_source_no", buf.read_u32()?);
    group.insert("as_source_peer", buf.read_u32()?);

    let paths = buf.read_u32()?;
    for _ in 0..paths {
        // path segment: type, then a counted AS list
        buf.read_u32()?;
        let hops = buf.read_u32()?;
        for _ in 0..hops {
            buf.read_u32()?;
        }
    }

    let communities = buf.read_u32()?;
    for _ in 0..communities {
        buf.read_u32()?;
    }

    group.insert("local_pref", buf.read_u32()?);
    event.insert("gateway", group);
    Ok(())
}

fn decode_ext_user(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("src_charset", buf.read_u32()?);
    let len = buf.read_u32()? as usize;
    group.insert("src_user", buf.read_slice(len)?);
    group.insert("dst_charset", buf.read_u32()?);
    let len = buf.read_u32()? as usize;
    group.insert("dst_user", buf.read_slice(len)?);
    event.insert("user", group);
    Ok(())
}

fn decode_ext_url(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("direction", buf.read_u32()?);
    let len = buf.read_u32()? as usize;
    group.insert("url", buf.read_slice(len)?);
    let len = buf.read_u32()? as usize;
    group.insert("host", buf.read_slice(len)?);
    event.insert("url", group);
    Ok(())
}

fn read_u32_array(buf: &mut Buffer, count: u32) -> Result<Vec<Value>, Error> {
    let mut values = Vec::new();
    for _ in 0..count {
        values.push(Value::from(buf.read_u32()?));
    }

    Ok(values)
}

fn decode_ext_mpls(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let ip_version = buf.read_u32()?;
    group.insert("ip_version", ip_version);
    group.insert("next_hop", read_address(buf, ip_version)?);

    let in_labels = buf.read_u32()?;
    group.insert("in_label_stack", read_u32_array(buf, in_labels)?);
    let out_labels = buf.read_u32()?;
    group.insert("out_label_stack", read_u32_array(buf, out_labels)?);
    event.insert("mpls", group);
    Ok(())
}

fn decode_ext_nat(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let src_version = buf.read_u32()?;
    group.insert("src_version", src_version);
    group.insert("src_ip", read_address(buf, src_version)?);
    let dst_version = buf.read_u32()?;
    group.insert("dst_version", dst_version);
    group.insert("dst_ip", read_address(buf, dst_version)?);
    event.insert("nat", group);
    Ok(())
}

fn decode_ext_mpls_tunnel(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let len = buf.read_u32()? as usize;
    group.insert("tunnel_name", buf.read_slice(len)?);
    group.insert("tunnel_id", buf.read_u32()?);
    group.insert("tunnel_cos", buf.read_u32()?);
    event.insert("mpls_tunnel", group);
    Ok(())
}

fn decode_ext_mpls_vc(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let len = buf.read_u32()? as usize;
    group.insert("vc_name", buf.read_slice(len)?);
    group.insert("vll_vc_id", buf.read_u32()?);
    group.insert("vc_cos", buf.read_u32()?);
    event.insert("mpls_vc", group);
    Ok(())
}

fn decode_ext_mpls_fec(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let len = buf.read_u32()? as usize;
    group.insert("mpls_ftn_desc", buf.read_slice(len)?);
    group.insert("mpls_ftn_mask", buf.read_u32()?);
    event.insert("mpls_fec", group);
    Ok(())
}

fn decode_ext_mpls_lvp_fec(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("prefix_length", buf.read_u32()?);
    event.insert("mpls_lvp_fec", group);
    Ok(())
}

fn decode_ext_vlan_tunnel(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    let layers = buf.read_u32()?;
    group.insert("layer", read_u32_array(buf, layers)?);
    event.insert("vlan_tunnel", group);
    Ok(())
}
