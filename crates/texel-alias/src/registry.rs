//! View registry: format aliases over one backing store
//!
//! A view never owns or copies texels. It is a small record pairing a device
//! view handle with the decode rule its format implies, borrowed from the store
//! so that it cannot outlive it.

use crate::dataset::{BackingStore, TexelStore};
use crate::device::{AliasKind, GraphicsDevice, ResourceKind};
use crate::error::HarnessError;
use crate::format::{DecodeRule, DecodeSemantic, TexelFormat};

/// Requested view, before any device resource exists
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
    /// Unique name of the view in the report
    pub name: String,
    /// Format the storage is viewed as
    pub format: TexelFormat,
    /// Tolerance override; the semantic's default applies when `None`
    pub tolerance: Option<f32>,
}

impl ViewSpec {
    /// Creates a view spec with the default tolerance
    pub fn new(name: impl Into<String>, format: TexelFormat) -> Self {
        Self {
            name: name.into(),
            format,
            tolerance: None,
        }
    }

    /// Overrides the comparison tolerance
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// UNORM, SNORM and sRGB views over RGBA8 storage, in that order
    pub fn defaults() -> Vec<Self> {
        [TexelFormat::Rgba8Unorm, TexelFormat::Rgba8Snorm, TexelFormat::Rgba8UnormSrgb]
            .into_iter()
            .map(|format| Self::new(format.name(), format))
            .collect()
    }
}

/// A named format alias over a backing store
#[derive(Debug)]
pub struct ViewDescriptor<'s, V> {
    name: String,
    format: TexelFormat,
    rule: DecodeRule,
    alias: AliasKind,
    handle: V,
    store: &'s TexelStore,
}

impl<'s, V> ViewDescriptor<'s, V> {
    /// Name of the view
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Format the storage is viewed as
    pub fn format(&self) -> TexelFormat {
        self.format
    }

    /// Decode semantic of the view
    pub fn semantic(&self) -> DecodeSemantic {
        self.rule.semantic
    }

    /// Decode rule used to compute expected values
    pub fn rule(&self) -> &DecodeRule {
        &self.rule
    }

    /// Whether the device reinterprets the store or decodes a copy of it
    pub fn alias(&self) -> AliasKind {
        self.alias
    }

    /// Device handle of the view
    pub fn handle(&self) -> &V {
        &self.handle
    }

    /// Host bytes of the store this view aliases
    pub fn store(&self) -> &'s TexelStore {
        self.store
    }

    /// Expected decoded value of texel `index`
    pub fn expected(&self, index: usize) -> Option<f32> {
        self.store.raw_byte(index).map(|raw| self.rule.expected(raw))
    }
}

/// The set of views under test, in processing order
#[derive(Debug)]
pub struct ViewRegistry<'s, V> {
    views: Vec<ViewDescriptor<'s, V>>,
}

impl<'s, V> ViewRegistry<'s, V> {
    /// Creates one device view per spec over the backing store
    ///
    /// Every spec yields a view or the whole build fails; no view is skipped.
    ///
    /// # Errors
    /// * `HarnessError::InvalidView` if a format has no normalized decode or a name repeats
    /// * `HarnessError::ResourceCreation` if the device rejects an alias
    pub fn build<D>(device: &D, store: &'s BackingStore<D::Texture>, specs: &[ViewSpec]) -> Result<Self, HarnessError>
    where
        D: GraphicsDevice<View = V>,
    {
        let mut views: Vec<ViewDescriptor<'s, V>> = Vec::with_capacity(specs.len());

        for spec in specs {
            let invalid = |reason| HarnessError::InvalidView {
                name: spec.name.clone(),
                format: spec.format,
                reason,
            };

            if views.iter().any(|view| view.name == spec.name) {
                return Err(invalid("view names must be unique"));
            }
            let rule = DecodeRule::for_format(spec.format).ok_or_else(|| invalid("format has no normalized decode"))?;
            let rule = match spec.tolerance {
                Some(tolerance) => rule.with_tolerance(tolerance),
                None => rule,
            };

            let handle = device
                .create_view_alias(store.texture(), spec.format)
                .map_err(|source| HarnessError::ResourceCreation {
                    resource: ResourceKind::View,
                    source,
                })?;

            let alias = device.alias_kind(&handle);
            match alias {
                AliasKind::Reinterpreted => {
                    tracing::debug!(view = %spec.name, format = %spec.format, semantic = %rule.semantic, tolerance = rule.tolerance, "view created");
                }
                AliasKind::Materialized => {
                    tracing::warn!(view = %spec.name, format = %spec.format, storage = %store.format(), "view decodes a device-side copy; format reinterpretation is not exercised");
                }
            }

            views.push(ViewDescriptor {
                name: spec.name.clone(),
                format: spec.format,
                rule,
                alias,
                handle,
                store: store.host(),
            });
        }

        Ok(Self { views })
    }

    /// Iterates over the views in processing order
    pub fn iter(&self) -> impl Iterator<Item = &ViewDescriptor<'s, V>> {
        self.views.iter()
    }

    /// Looks up a view by name
    pub fn get(&self, name: &str) -> Option<&ViewDescriptor<'s, V>> {
        self.views.iter().find(|view| view.name == name)
    }

    /// Number of views
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if no views were requested
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ResultValidator;

    fn descriptor(store: &TexelStore, alias: AliasKind) -> ViewDescriptor<'_, ()> {
        ViewDescriptor {
            name: "snorm".to_string(),
            format: TexelFormat::Rgba8Snorm,
            rule: DecodeRule::new(DecodeSemantic::Snorm),
            alias,
            handle: (),
            store,
        }
    }

    #[test]
    fn test_compare_counts_mismatches_and_keeps_alias_kind() {
        let store = TexelStore::generate(4);
        let view = descriptor(&store, AliasKind::Materialized);
        let mut actual: Vec<f32> = (0..store.texel_count()).filter_map(|index| view.expected(index)).collect();
        actual[3] = 0.5;
        actual[200] = 0.5;

        let mut validator = ResultValidator::new();
        assert_eq!(validator.compare(&view, &actual), 2);
        assert_eq!(validator.compare(&descriptor(&store, AliasKind::Reinterpreted), &actual), 2);

        let report = validator.finalize();
        assert_eq!(report.views[0].alias, AliasKind::Materialized);
        assert_eq!(report.views[1].alias, AliasKind::Reinterpreted);
        assert_eq!(report.summary.mismatches, 4);
    }
}
