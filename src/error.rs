#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("datagram truncated")]
    Truncated,

    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("no template for flow set {0}")]
    UnknownTemplate(u16),

    #[error("unknown tag {0}")]
    UnknownTag(u32),

    #[error("malformed datagram: {0}")]
    Malformed(&'static str),
}
