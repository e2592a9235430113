use topology_core::NodeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("node {id} has a non-finite or negative size")]
    Degenerate { id: NodeId },
    #[error("layout produced a non-finite position for {id}")]
    NonFinite { id: NodeId },
    #[error("packing width is not usable: {width}")]
    PackingWidth { width: f64 },
    #[error("unknown layout type: {0} (expected force|grid|tree)")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
