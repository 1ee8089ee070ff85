//! Counter samples: periodic interface and device counter snapshots.

use crate::{Buffer, Error, Value};

pub const COUNTER_GENERIC_IF: u32 = 1;
pub const COUNTER_ETHERNET: u32 = 2;
pub const COUNTER_TOKEN_RING: u32 = 3;
pub const COUNTER_BASEVG_100: u32 = 4;
pub const COUNTER_VLAN: u32 = 5;
pub const COUNTER_PROCESSOR: u32 = 1001;

pub(super) fn decode_counter_sample(
    buf: &mut Buffer,
    tag: u32,
    end: usize,
) -> Result<Value, Error> {
    let sequence = buf.read_u32()?;

    // the compact form packs (type, index) into one word, the expanded
    // form spells them out
    let (source_id_type, source_id_index) = if tag == super::SAMPLE_COUNTER {
        let word = buf.read_u32()?;
        (word >> 24, word & 0x0fff)
    } else {
        (buf.read_u32()?, buf.read_u32()?)
    };

    let records = buf.read_u32()?;

    let mut event = Value::object();
    let mut group = Value::object();
    group.insert("format", tag);
    group.insert("sequence", sequence);
    group.insert("type", source_id_type);
    group.insert("index", source_id_index);
    event.insert("sample", group);

    for _ in 0..records {
        if buf.position() + 8 > end {
            return Err(Error::Malformed("record count overruns its sample"));
        }

        let tag = buf.read_u32()?;
        let length = buf.read_u32()? as usize;
        if length > buf.remaining() {
            return Err(Error::Truncated);
        }
        let record_end = buf.position() + length;

        match decode_counter_record(buf, &mut event, tag) {
            Ok(()) => {}
            Err(Error::UnknownTag(tag)) => {
                debug!(message = "unknown counter record tag, skipping", tag);
            }
            Err(err) => return Err(err),
        }

        if buf.position() > record_end {
            return Err(Error::Malformed("record overran its declared length"));
        }
        buf.seek(record_end)?;
    }

    Ok(event)
}

fn decode_counter_record(buf: &mut Buffer, event: &mut Value, tag: u32) -> Result<(), Error> {
    match tag {
        COUNTER_GENERIC_IF => decode_generic_if(buf, event),
        COUNTER_ETHERNET => decode_ethernet(buf, event),
        COUNTER_TOKEN_RING => decode_token_ring(buf, event),
        COUNTER_BASEVG_100 => decode_basevg(buf, event),
        COUNTER_VLAN => decode_vlan(buf, event),
        COUNTER_PROCESSOR => decode_processor(buf, event),
        tag => Err(Error::UnknownTag(tag)),
    }
}

/// Generic interface counters, RFC 2233.
fn decode_generic_if(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("if_index", buf.read_u32()?);
    group.insert("if_type", buf.read_u32()?);
    group.insert("if_speed", buf.read_u64()?);
    group.insert("if_direction", buf.read_u32()?);
    group.insert("if_status", buf.read_u32()?);
    group.insert("in_octets", buf.read_u64()?);
    group.insert("in_ucast_pkts", buf.read_u32()?);
    group.insert("in_multicast_pkts", buf.read_u32()?);
    group.insert("in_broadcast_pkts", buf.read_u32()?);
    group.insert("in_discards", buf.read_u32()?);
    group.insert("in_errors", buf.read_u32()?);
    group.insert("in_unknown_protos", buf.read_u32()?);
    group.insert("out_octets", buf.read_u64()?);
    group.insert("out_ucast_pkts", buf.read_u32()?);
    group.insert("out_multicast_pkts", buf.read_u32()?);
    group.insert("out_broadcast_pkts", buf.read_u32()?);
    group.insert("out_discards", buf.read_u32()?);
    group.insert("out_errors", buf.read_u32()?);
    group.insert("promiscuous_mode", buf.read_u32()?);
    event.insert("if_counters", group);
    Ok(())
}

/// Ethernet interface counters, RFC 2358.
fn decode_ethernet(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let names = [
        "alignment_errors",
        "fcs_errors",
        "single_collision_frames",
        "multiple_collision_frames",
        "sqe_test_errors",
        "deferred_transmissions",
        "late_collisions",
        "excessive_collisions",
        "internal_mac_transmit_errors",
        "carrier_sense_errors",
        "frame_too_longs",
        "internal_mac_receive_errors",
        "symbol_errors",
    ];

    let mut group = Value::object();
    for name in names {
        group.insert(name, buf.read_u32()?);
    }
    event.insert("ethernet_counters", group);
    Ok(())
}

/// Token ring counters, RFC 1748.
fn decode_token_ring(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let names = [
        "line_errors",
        "ac_errors",
        "abort_trans_errors",
        "internal_errors",
        "lost_frame_errors",
        "receive_congestions",
        "frame_copied_errors",
        "token_errors",
        "soft_errors",
        "hard_errors",
        "signal_loss",
        "transmit_beacons",
        "recoverys",
        "lobe_wires",
        "burst_errors",
        "removes",
        "singles",
        "freq_errors",
    ];

    let mut group = Value::object();
    for name in names {
        group.insert(name, buf.read_u32()?);
    }
    event.insert("token_ring_counters", group);
    Ok(())
}

/// 100 BaseVG interface counters, RFC 2020.
fn decode_basevg(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("in_high_priority_frames", buf.read_u32()?);
    group.insert("in_high_priority_octets", buf.read_u64()?);
    group.insert("in_norm_priority_frames", buf.read_u32()?);
    group.insert("in_norm_priority_octets", buf.read_u64()?);
    group.insert("in_ipm_errors", buf.read_u32()?);
    group.insert("in_oversize_frame_errors", buf.read_u32()?);
    group.insert("in_data_errors", buf.read_u32()?);
    group.insert("in_null_addressed_frames", buf.read_u32()?);
    group.insert("out_high_priority_frames", buf.read_u32()?);
    group.insert("out_high_priority_octets", buf.read_u64()?);
    group.insert("transition_into_trainings", buf.read_u32()?);
    group.insert("hc_in_high_priority_octets", buf.read_u64()?);
    group.insert("hc_in_norm_priority_octets", buf.read_u64()?);
    group.insert("hc_out_high_priority_octets", buf.read_u64()?);
    event.insert("basevg_counters", group);
    Ok(())
}

fn decode_vlan(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("vlan_id", buf.read_u32()?);
    group.insert("octets", buf.read_u64()?);
    group.insert("ucast_pkts", buf.read_u32()?);
    group.insert("multicast_pkts", buf.read_u32()?);
    group.insert("broadcast_pkts", buf.read_u32()?);
    group.insert("discards", buf.read_u32()?);
    event.insert("vlan_counters", group);
    Ok(())
}

fn decode_processor(buf: &mut Buffer, event: &mut Value) -> Result<(), Error> {
    let mut group = Value::object();
    group.insert("cpu_5s", buf.read_u32()?);
    group.insert("cpu_1m", buf.read_u32()?);
    group.insert("cpu_5m", buf.read_u32()?);
    group.insert("total_memory", buf.read_u64()?);
    group.insert("free_memory", buf.read_u64()?);
    event.insert("processor", group);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sflow::{SAMPLE_COUNTER, SAMPLE_EXPANDED_COUNTER};

    fn generic_if_record() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&COUNTER_GENERIC_IF.to_be_bytes());
        data.extend_from_slice(&88u32.to_be_bytes());
        data.extend_from_slice(&5u32.to_be_bytes()); // if_index
        data.extend_from_slice(&6u32.to_be_bytes()); // if_type
        data.extend_from_slice(&1_000_000_000u64.to_be_bytes()); // if_speed
        data.extend_from_slice(&1u32.to_be_bytes()); // direction
        data.extend_from_slice(&3u32.to_be_bytes()); // status
        data.extend_from_slice(&0x0123_4567_89ab_cdefu64.to_be_bytes()); // in octets
        data.extend_from_slice(&[0u8; 24]); // in pkts/discards/errors/protos
        data.extend_from_slice(&42u64.to_be_bytes()); // out octets
        data.extend_from_slice(&[0u8; 24]); // out pkts/discards/errors + promisc
        data
    }

    #[test]
    fn compact_counter_sample() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_be_bytes()); // sequence
        data.extend_from_slice(&0x0200_0005u32.to_be_bytes()); // packed source id
        data.extend_from_slice(&1u32.to_be_bytes()); // one record
        data.extend(generic_if_record());

        let mut buf = Buffer::new(&data);
        let event = decode_counter_sample(&mut buf, SAMPLE_COUNTER, data.len()).unwrap();

        let sample = event.get("sample").unwrap();
        assert_eq!(sample.get("sequence"), Some(&Value::Integer(7)));
        assert_eq!(sample.get("type"), Some(&Value::Integer(2)));
        assert_eq!(sample.get("index"), Some(&Value::Integer(5)));

        let counters = event.get("if_counters").unwrap();
        assert_eq!(counters.get("if_index"), Some(&Value::Integer(5)));
        assert_eq!(counters.get("if_speed"), Some(&Value::Integer(1_000_000_000)));
        assert_eq!(
            counters.get("in_octets"),
            Some(&Value::Integer(0x0123_4567_89ab_cdef))
        );
        assert_eq!(counters.get("out_octets"), Some(&Value::Integer(42)));
        assert!(buf.is_empty());
    }

    #[test]
    fn expanded_counter_sample_source_id() {
        let mut data = Vec::new();
        data.extend_from_slice(&7u32.to_be_bytes());
        data.extend_from_slice(&2u32.to_be_bytes()); // source id type
        data.extend_from_slice(&0x2000u32.to_be_bytes()); // source id index
        data.extend_from_slice(&0u32.to_be_bytes()); // no records

        let mut buf = Buffer::new(&data);
        let event =
            decode_counter_sample(&mut buf, SAMPLE_EXPANDED_COUNTER, data.len())
                .unwrap();

        let sample = event.get("sample").unwrap();
        // the expanded form carries the full 32-bit index
        assert_eq!(sample.get("index"), Some(&Value::Integer(0x2000)));
    }

    #[test]
    fn unknown_counter_record_skipped() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(&2u32.to_be_bytes()); // two records

        data.extend_from_slice(&777u32.to_be_bytes()); // unknown tag
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&[0xaa; 4]);

        data.extend_from_slice(&COUNTER_PROCESSOR.to_be_bytes());
        data.extend_from_slice(&28u32.to_be_bytes());
        data.extend_from_slice(&10u32.to_be_bytes());
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend_from_slice(&30u32.to_be_bytes());
        data.extend_from_slice(&(8u64 << 30).to_be_bytes());
        data.extend_from_slice(&(2u64 << 30).to_be_bytes());

        let mut buf = Buffer::new(&data);
        let event = decode_counter_sample(&mut buf, SAMPLE_COUNTER, data.len()).unwrap();

        let processor = event.get("processor").unwrap();
        assert_eq!(processor.get("cpu_5s"), Some(&Value::Integer(10)));
        assert_eq!(processor.get("free_memory"), Some(&Value::Integer(2 << 30)));
        assert!(buf.is_empty());
    }
}
