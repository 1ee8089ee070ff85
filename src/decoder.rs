use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::netflow::template::TemplateCache;
use crate::netflow::{v5, v9};
use crate::{sflow, Buffer, Config, Error, Value};

const VERSION_IPFIX: u16 = 0x000a;

/// The protocol dispatcher. Cheap to clone and safe to share across a
/// worker pool; the template cache is the only state behind the lock.
#[derive(Clone)]
pub struct Decoder {
    config: Arc<Config>,
    templates: Arc<RwLock<TemplateCache>>,
}

impl Decoder {
    pub fn new(config: Config) -> Self {
        Decoder {
            config: Arc::new(config),
            templates: Arc::new(RwLock::new(TemplateCache::default())),
        }
    }

    /// Decode one UDP payload into its events.
    ///
    /// `peer` is the source address of the datagram and keys the v9
    /// template cache; `timestamp` is the reception time. Fatal errors
    /// discard the whole datagram; no partial event sequence escapes.
    pub fn decode(
        &self,
        data: &[u8],
        peer: IpAddr,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Value>, Error> {
        let mut buf = Buffer::new(data);

        // the version peek must leave the cursor untouched for the
        // protocol decoders
        let mut events = if buf.peek_u32() == Ok(sflow::VERSION) {
            if !self.config.sflow {
                return Err(Error::UnsupportedVersion(sflow::VERSION));
            }

            sflow::decode(&mut buf, &self.config.sample_types)?
        } else {
            match buf.peek_u16()? {
                v5::VERSION if self.config.decodes_version(v5::VERSION) => v5::decode(&mut buf)?,
                v9::VERSION if self.config.decodes_version(v9::VERSION) => {
                    let mut templates = self.templates.write();
                    v9::decode(&mut buf, peer, &mut templates)?
                }
                VERSION_IPFIX if self.config.decodes_version(VERSION_IPFIX) => {
                    // recognized, deliberately undecoded: the message
                    // layout diverges from v9 (16-byte header, template
                    // withdrawals, variable-length fields)
                    debug!(message = "skipping ipfix datagram", %peer);
                    Vec::new()
                }
                version => return Err(Error::UnsupportedVersion(version as u32)),
            }
        };

        for event in events.iter_mut() {
            // sflow events carry the in-band agent address already
            if !event.contains("agent") {
                event.insert("agent", peer);
            }
            event.insert("timestamp", timestamp);
        }

        Ok(events)
    }

    /// Drop all templates learned from one exporter. Exposed for host
    /// eviction policies; never called internally.
    pub fn purge(&self, exporter: IpAddr) {
        self.templates.write().purge(exporter);
    }

    /// Number of cached templates, across all exporters.
    pub fn cached_templates(&self) -> usize {
        self.templates.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn peer() -> IpAddr {
        "10.6.0.254".parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(0x5b1e_2851, 0).unwrap()
    }

    #[test]
    fn rejects_unknown_versions() {
        let decoder = Decoder::new(Config::default());

        assert_eq!(
            decoder.decode(&[0x00, 0x08, 0x00, 0x00], peer(), now()),
            Err(Error::UnsupportedVersion(8))
        );
    }

    #[test]
    fn version_allow_list_is_honored() {
        let config = Config {
            versions: vec![9],
            ..Default::default()
        };
        let decoder = Decoder::new(config);

        // a well-formed v5 header with no records
        let mut data = vec![0x00, 0x05, 0x00, 0x00];
        data.extend_from_slice(&[0u8; 20]);

        assert_eq!(
            decoder.decode(&data, peer(), now()),
            Err(Error::UnsupportedVersion(5))
        );
    }

    #[test]
    fn ipfix_is_recognized_but_not_decoded() {
        let config = Config {
            versions: vec![5, 9, 10],
            ..Default::default()
        };
        let decoder = Decoder::new(config);

        let data = [0x00, 0x0a, 0x00, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decoder.decode(&data, peer(), now()), Ok(Vec::new()));
    }

    #[test]
    fn short_datagram_is_truncated() {
        let decoder = Decoder::new(Config::default());
        assert_eq!(
            decoder.decode(&[0x00], peer(), now()),
            Err(Error::Truncated)
        );
    }

    #[test]
    fn purge_clears_exporter_templates() {
        let decoder = Decoder::new(Config::default());

        // v9 datagram holding one template
        let mut data = vec![0x00, 0x09, 0x00, 0x01];
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x0c]); // template set
        data.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0x00, 0x08, 0x00, 0x04]);

        decoder.decode(&data, peer(), now()).unwrap();
        assert_eq!(decoder.cached_templates(), 1);

        decoder.purge("192.0.2.1".parse().unwrap());
        assert_eq!(decoder.cached_templates(), 1);

        decoder.purge(peer());
        assert_eq!(decoder.cached_templates(), 0);
    }
}
