//! DOM error types

use thiserror::Error;

use crate::document::NodeId;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomError {
    #[error("Node not found: {0:?}")]
    NotFound(NodeId),

    #[error("Node has no parent: {0:?}")]
    NoParent(NodeId),

    #[error("Cannot insert {child:?} into its own subtree at {parent:?}")]
    Cycle { parent: NodeId, child: NodeId },
}
