//! Information-Element registry for NetFlow v9 data records.
//!
//! Maps an IE id to the event field name and the rule used to decode its
//! bytes. Ids missing from the table are dropped from the event; a new
//! exporter field never breaks decoding.

use std::collections::HashMap;

use crate::Value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kind {
    U8,
    U16,
    U32,
    U64,
    /// Length-polymorphic unsigned integer.
    Digital,
    /// 4 bytes -> IPv4, 16 bytes -> IPv6.
    Ip,
    /// 6 bytes, rendered as colon-joined lower-case hex.
    Mac,
    /// 4 bytes, milliseconds of sys-uptime. Kept relative to device boot,
    /// never reinterpreted as absolute UNIX time.
    Time,
}

pub struct FieldSpec {
    pub name: &'static str,
    pub kind: Kind,
}

// https://www.cisco.com/en/US/technologies/tk648/tk362/technologies_white_paper09186a00800a3db9.html
const FIELDS: &[(u16, &str, Kind)] = &[
    (1, "frame_length", Kind::U64),
    (2, "packets", Kind::U64),
    (3, "flows", Kind::U32),
    (4, "ip_protocol", Kind::U8),
    (5, "tos", Kind::U8),
    (6, "tcp_flags", Kind::U8),
    (7, "src_port", Kind::U16),
    (8, "src_ip", Kind::Ip),
    (9, "src_mask", Kind::U8),
    (10, "input_interface_value", Kind::U32),
    (11, "dst_port", Kind::U16),
    (12, "dst_ip", Kind::Ip),
    (13, "dst_mask", Kind::U8),
    (14, "output_interface_value", Kind::U32),
    (15, "next_hop", Kind::Ip),
    (16, "src_as", Kind::U16),
    (17, "dst_as", Kind::U16),
    (18, "bgp_next_hop", Kind::Ip),
    (19, "multicast_packets", Kind::U32),
    (20, "multicast_bytes", Kind::U32),
    (21, "last_switched", Kind::Time),
    (22, "first_switched", Kind::Time),
    (23, "out_bytes", Kind::U64),
    (24, "out_packets", Kind::U64),
    (27, "src_ip", Kind::Ip),
    (28, "dst_ip", Kind::Ip),
    (29, "src_mask", Kind::U8),
    (30, "dst_mask", Kind::U8),
    (31, "ipv6_flow_label", Kind::U32),
    (32, "icmp_type", Kind::U16),
    (33, "igmp_type", Kind::U8),
    (34, "sampling_interval", Kind::U32),
    (35, "sampling_algorithm", Kind::U8),
    (36, "flow_active_timeout", Kind::U16),
    (37, "flow_inactive_timeout", Kind::U16),
    (38, "engine_type", Kind::U8),
    (39, "engine_id", Kind::U8),
    (40, "total_bytes_exported", Kind::U32),
    (41, "total_packets_exported", Kind::U32),
    (42, "total_flows_exported", Kind::U32),
    (46, "mpls_top_label_type", Kind::U8),
    (47, "mpls_top_label_ip", Kind::Ip),
    (48, "sampler_id", Kind::U8),
    (49, "sampler_mode", Kind::U8),
    (50, "sampler_random_interval", Kind::U32),
    (55, "dst_tos", Kind::U8),
    (56, "src_mac", Kind::Mac),
    (57, "dst_mac", Kind::Mac),
    (58, "src_vlan", Kind::U16),
    (59, "dst_vlan", Kind::U16),
    (60, "ip_version", Kind::U8),
    (61, "direction", Kind::U8),
    (62, "next_hop", Kind::Ip),
    (63, "bgp_next_hop", Kind::Ip),
    (64, "ipv6_option_headers", Kind::U32),
    (70, "mpls_label_1", Kind::Digital),
    (71, "mpls_label_2", Kind::Digital),
    (72, "mpls_label_3", Kind::Digital),
    (73, "mpls_label_4", Kind::Digital),
    (74, "mpls_label_5", Kind::Digital),
    (75, "mpls_label_6", Kind::Digital),
    (76, "mpls_label_7", Kind::Digital),
    (77, "mpls_label_8", Kind::Digital),
    (78, "mpls_label_9", Kind::Digital),
    (79, "mpls_label_10", Kind::Digital),
];

lazy_static! {
    static ref REGISTRY: HashMap<u16, FieldSpec> = {
        let mut map = HashMap::with_capacity(FIELDS.len());
        for &(id, name, kind) in FIELDS {
            map.insert(id, FieldSpec { name, kind });
        }
        map
    };
}

pub fn lookup(id: u16) -> Option<&'static FieldSpec> {
    REGISTRY.get(&id)
}

/// Decode field bytes according to the registry kind.
pub fn decode(kind: Kind, data: &[u8]) -> Value {
    match kind {
        // the canonical widths are exactly the widths the generic rule
        // accepts, so a declared-width mismatch degrades on its own
        Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64 | Kind::Time | Kind::Digital => digital(data),
        Kind::Ip => match data.len() {
            4 => std::net::Ipv4Addr::new(data[0], data[1], data[2], data[3]).into(),
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(data);
                std::net::Ipv6Addr::from(octets).into()
            }
            _ => data.into(),
        },
        Kind::Mac => {
            if data.len() == 6 {
                format!(
                    "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                    data[0], data[1], data[2], data[3], data[4], data[5]
                )
                .into()
            } else {
                data.into()
            }
        }
    }
}

fn digital(data: &[u8]) -> Value {
    match data.len() {
        1 => (data[0] as u64).into(),
        2 => (u16::from_be_bytes([data[0], data[1]]) as u64).into(),
        3 => {
            let v = (data[0] as u64) << 16 | (data[1] as u64) << 8 | data[2] as u64;
            v.into()
        }
        4 => (u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as u64).into(),
        8 => u64::from_be_bytes([
            data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
        ])
        .into(),
        _ => data.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths() {
        assert_eq!(decode(Kind::U16, &[0xc0, 0x03]), Value::Integer(0xc003));
        assert_eq!(decode(Kind::U64, &[0, 0, 0, 0, 0, 0, 1, 0x6d]), Value::Integer(0x016d));
        // a u64 field exported with 4 bytes falls back to the generic rule
        assert_eq!(decode(Kind::U64, &[0, 0, 1, 0x6d]), Value::Integer(0x016d));
        // 24-bit values are zero-padded high-order
        assert_eq!(decode(Kind::Digital, &[0x01, 0x00, 0x00]), Value::Integer(0x010000));
        // widths with no natural integer stay raw
        assert_eq!(decode(Kind::Digital, &[1, 2, 3, 4, 5]), Value::from(&[1u8, 2, 3, 4, 5][..]));
    }

    #[test]
    fn addresses() {
        let v4 = decode(Kind::Ip, &[10, 2, 84, 142]);
        assert_eq!(v4.as_str(), Some("10.2.84.142"));

        let mut bytes = [0u8; 16];
        bytes[15] = 1;
        assert_eq!(decode(Kind::Ip, &bytes).as_str(), Some("::1"));

        let mac = decode(Kind::Mac, &[0x3c, 0x8c, 0x40, 0xbc, 0x32, 0x3f]);
        assert_eq!(mac.as_str(), Some("3c:8c:40:bc:32:3f"));
    }

    #[test]
    fn registry_names() {
        assert_eq!(lookup(8).unwrap().name, "src_ip");
        assert_eq!(lookup(22).unwrap().name, "first_switched");
        assert_eq!(lookup(22).unwrap().kind, Kind::Time);
        assert!(lookup(65000).is_none());
    }
}
