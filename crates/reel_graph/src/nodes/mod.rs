// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node kinds.

pub mod clip;
pub mod math;
pub mod media;
pub mod solid;
pub mod track;
pub mod transition;
pub mod viewer;

pub use clip::ClipNode;
pub use math::{MathNode, MathOperation};
pub use media::MediaInputNode;
pub use solid::SolidNode;
pub use track::TrackNode;
pub use transition::CrossDissolveNode;
pub use viewer::ViewerNode;

use crate::node::NodeRegistry;

/// Create a registry with every built-in node kind
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register::<MediaInputNode>();
    registry.register::<ClipNode>();
    registry.register::<TrackNode>();
    registry.register::<SolidNode>();
    registry.register::<MathNode>();
    registry.register::<CrossDissolveNode>();
    registry.register::<ViewerNode>();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeCategory;

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        assert_eq!(registry.types().count(), 7);
        assert!(registry.get(clip::CLIP_ID).is_some());
        assert_eq!(registry.types_in_category(NodeCategory::Output).count(), 1);

        for node_type in registry.types() {
            let node = registry.create_node(node_type.id).unwrap();
            assert_eq!(node.type_id(), node_type.id);
        }
    }
}
