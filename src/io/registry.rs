//! Codec lookup by file content or extension.

use std::path::Path;

use tracing::debug;

use super::codec::{FormatCodec, SharedCodec, shared};
use crate::c3d::C3dCodec;

type Factory = fn() -> SharedCodec;

fn c3d_factory() -> SharedCodec {
    shared(C3dCodec::new())
}

/// Known formats, tried in order.
#[derive(Clone)]
pub struct CodecRegistry {
    factories: Vec<(&'static str, Factory)>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|(name, _)| name))
            .finish()
    }
}

impl CodecRegistry {
    /// Registry holding every built-in codec.
    pub fn new() -> Self {
        Self {
            factories: vec![("C3D", c3d_factory as Factory)],
        }
    }

    /// Add a codec factory, tried after the existing ones.
    pub fn register(&mut self, name: &'static str, factory: Factory) {
        self.factories.push((name, factory));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(name, _)| *name).collect()
    }

    /// First codec recognizing the content.
    pub fn detect(&self, data: &[u8]) -> Option<SharedCodec> {
        self.factories.iter().find_map(|(name, factory)| {
            let codec = factory();
            let ok = codec.read().can_read(data);
            if ok {
                debug!(codec = *name, "detected by content");
            }
            ok.then_some(codec)
        })
    }

    /// First codec declaring the extension of `path`.
    pub fn for_path(&self, path: &Path) -> Option<SharedCodec> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.factories.iter().find_map(|(name, factory)| {
            let codec = factory();
            let ok = codec.read().extensions().contains(&ext.as_str());
            if ok {
                debug!(codec = *name, ext = %ext, "selected by extension");
            }
            ok.then_some(codec)
        })
    }
}

/// Content check usable without a registry.
pub fn is_c3d(data: &[u8]) -> bool {
    C3dCodec::new().can_read(data)
}
