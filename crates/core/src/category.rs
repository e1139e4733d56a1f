//! Output categories and entity kinds
//!
//! A `Category` names the destination an entity is written to. An
//! `EntityKind` is the closed set of entity kinds a front end can produce;
//! it replaces type-name string comparison chains with one table lookup
//! followed by exhaustive matches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination category of an exported entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Topology data (meshes, hair, volumes)
    Geometry,
    /// Scene nodes and instancers
    Nodes,
    /// Materials, BRDFs and textures
    Materials,
    /// Light sources
    Lights,
    /// Global settings, cameras, environment
    Settings,
    /// Render channels and image filters
    RenderChannels,
}

impl Category {
    /// Every category, in file emission order
    pub const ALL: [Category; 6] = [
        Category::Settings,
        Category::RenderChannels,
        Category::Lights,
        Category::Materials,
        Category::Geometry,
        Category::Nodes,
    ];

    /// Stable lowercase name, used for destination file suffixes
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Geometry => "geometry",
            Category::Nodes => "nodes",
            Category::Materials => "materials",
            Category::Lights => "lights",
            Category::Settings => "settings",
            Category::RenderChannels => "render_channels",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an exportable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Mesh, hair or volume data
    Geometry,
    /// Scene node or instancer
    Node,
    /// Material or BRDF
    Material,
    /// Texture or UVW generator
    Texture,
    /// Light source
    Light,
    /// Camera or render view
    Camera,
    /// Global settings
    Settings,
    /// Render channel or image filter
    RenderChannel,
}

/// Type-id prefixes recognised by `EntityKind::from_type_id`, checked in order.
const TYPE_PREFIXES: &[(&str, EntityKind)] = &[
    ("Geom", EntityKind::Geometry),
    ("Mesh", EntityKind::Geometry),
    ("Node", EntityKind::Node),
    ("Instancer", EntityKind::Node),
    ("Mtl", EntityKind::Material),
    ("BRDF", EntityKind::Material),
    ("Brdf", EntityKind::Material),
    ("Tex", EntityKind::Texture),
    ("UVW", EntityKind::Texture),
    ("Light", EntityKind::Light),
    ("Camera", EntityKind::Camera),
    ("RenderView", EntityKind::Camera),
    ("Settings", EntityKind::Settings),
    ("RenderChannel", EntityKind::RenderChannel),
    ("Filter", EntityKind::RenderChannel),
];

impl EntityKind {
    /// Classify an entity type string by name pattern.
    ///
    /// Prefixes are tried first, then the `...Light` / `...Settings`
    /// suffixes. Returns `None` for unrecognised type strings.
    pub fn from_type_id(type_id: &str) -> Option<Self> {
        TYPE_PREFIXES
            .iter()
            .find(|(prefix, _)| type_id.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .or_else(|| {
                if type_id.ends_with("Light") {
                    Some(EntityKind::Light)
                } else if type_id.ends_with("Settings") {
                    Some(EntityKind::Settings)
                } else {
                    None
                }
            })
    }

    /// Destination category entities of this kind are written to
    pub fn category(&self) -> Category {
        match self {
            EntityKind::Geometry => Category::Geometry,
            EntityKind::Node => Category::Nodes,
            EntityKind::Material | EntityKind::Texture => Category::Materials,
            EntityKind::Light => Category::Lights,
            EntityKind::Camera | EntityKind::Settings => Category::Settings,
            EntityKind::RenderChannel => Category::RenderChannels,
        }
    }

    /// Whether entities of this kind carry per-frame instancer arrays
    pub fn is_instancer(type_id: &str) -> bool {
        type_id.starts_with("Instancer")
    }
}
