use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// One (ie-id, length) field specifier of a template record.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub id: u16,
    pub length: u16,
}

#[derive(Debug, PartialEq)]
pub enum Template {
    Data {
        fields: Vec<Field>,
    },
    Options {
        scopes: Vec<Field>,
        options: Vec<Field>,
    },
}

impl Template {
    /// Bytes one data record decoded against this template consumes.
    pub fn data_length(&self) -> usize {
        match self {
            Template::Data { fields } => fields.iter().map(|f| f.length as usize).sum(),
            Template::Options { scopes, options } => scopes
                .iter()
                .chain(options.iter())
                .map(|f| f.length as usize)
                .sum(),
        }
    }
}

/// Templates are scoped to the exporter address plus the observation
/// domain (source-id); a single device may export several domains whose
/// template ids collide.
type Key = (IpAddr, u32, u16);

#[derive(Default)]
pub struct TemplateCache {
    inner: HashMap<Key, Arc<Template>>,
}

impl TemplateCache {
    pub fn get(&self, exporter: IpAddr, source_id: u32, template_id: u16) -> Option<Arc<Template>> {
        self.inner
            .get(&(exporter, source_id, template_id))
            .cloned()
    }

    /// Install or replace a template. Returns the definition it replaced.
    pub fn put(
        &mut self,
        exporter: IpAddr,
        source_id: u32,
        template_id: u16,
        template: Template,
    ) -> Option<Arc<Template>> {
        self.inner
            .insert((exporter, source_id, template_id), Arc::new(template))
    }

    /// Drop every template learned from one exporter. Never called by the
    /// decoder itself; hosts drive eviction.
    pub fn purge(&mut self, exporter: IpAddr) {
        self.inner.retain(|(addr, _, _), _| *addr != exporter);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
