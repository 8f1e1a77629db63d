//! # World Layers
//!
//! A layer is a named height band with a weighted set of materials. The
//! cell generator picks the layer whose target height is nearest to the
//! cell's final height, then rolls a material per pixel from the layer's
//! weights.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};
use crate::material::MaterialCatalog;

/// Weighted material entry of a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerMaterial {
    /// Material name (must exist in the material catalog).
    pub material: String,
    /// Relative weight.
    pub weight: f32,
}

/// A named height band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldLayer {
    /// Unique layer name.
    pub name: String,
    /// Height this layer represents, in [0, 1].
    pub target_height: f32,
    /// Weighted materials, rolled in order.
    pub materials: Vec<LayerMaterial>,
}

/// Layer with material names resolved to catalog indices.
#[derive(Clone, Debug)]
struct ResolvedLayer {
    /// `(material_index, cumulative_weight)` in declaration order.
    cumulative: Vec<(u8, f64)>,
    total_weight: f64,
}

/// Lookup table of world layers.
#[derive(Clone, Debug)]
pub struct LayerCatalog {
    layers: Vec<WorldLayer>,
    resolved: Vec<ResolvedLayer>,
}

#[derive(Deserialize)]
struct LayerFile {
    layers: Vec<WorldLayer>,
}

impl LayerCatalog {
    /// Builds a catalog, resolving material names against `materials`.
    ///
    /// # Errors
    ///
    /// Fails for an empty layer list, unknown materials, or a layer without
    /// positive total weight.
    pub fn new(layers: Vec<WorldLayer>, materials: &MaterialCatalog) -> WorldResult<Self> {
        if layers.is_empty() {
            return Err(WorldError::NoLayers);
        }

        let mut resolved = Vec::with_capacity(layers.len());
        for layer in &layers {
            let mut cumulative = Vec::with_capacity(layer.materials.len());
            let mut total_weight = 0.0;
            for entry in &layer.materials {
                let index = materials.index_of(&entry.material).ok_or_else(|| {
                    WorldError::UnknownMaterial {
                        material: entry.material.clone(),
                        referenced_by: format!("layer {}", layer.name),
                    }
                })?;
                if entry.weight > 0.0 {
                    total_weight += f64::from(entry.weight);
                    cumulative.push((index, total_weight));
                }
            }
            if cumulative.is_empty() {
                return Err(WorldError::EmptyLayer(layer.name.clone()));
            }
            resolved.push(ResolvedLayer { cumulative, total_weight });
        }

        Ok(Self { layers, resolved })
    }

    /// Built-in layers resolved against `materials`.
    ///
    /// # Errors
    ///
    /// Fails if `materials` lacks one of the built-in layer materials.
    pub fn builtin(materials: &MaterialCatalog) -> WorldResult<Self> {
        Self::new(builtin_layers(), materials)
    }

    /// Parses a `[[layers]]` TOML document.
    ///
    /// # Errors
    ///
    /// Returns parse errors and every error of [`Self::new`].
    pub fn from_toml_str(text: &str, materials: &MaterialCatalog) -> WorldResult<Self> {
        let file: LayerFile = toml::from_str(text)?;
        Self::new(file.layers, materials)
    }

    /// Loads layers from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns IO errors and every error of [`Self::from_toml_str`].
    pub fn from_toml_file(path: &Path, materials: &MaterialCatalog) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| WorldError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, materials)
    }

    /// Number of layers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false; a catalog holds at least one layer.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Gets a layer by index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WorldLayer> {
        self.layers.get(index)
    }

    /// Looks up a layer index by name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// Index of the layer whose target height is nearest to `height`.
    ///
    /// Ties resolve to the lower index.
    #[must_use]
    pub fn nearest(&self, height: f64) -> usize {
        let mut best = 0;
        let mut best_distance = f64::MAX;
        for (i, layer) in self.layers.iter().enumerate() {
            let distance = (f64::from(layer.target_height) - height).abs();
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        best
    }

    /// Rolls a material of a layer from `roll` in [0, 1].
    ///
    /// Returns the first material whose cumulative weight exceeds
    /// `roll * total_weight`.
    #[must_use]
    pub fn roll_material(&self, layer_index: usize, roll: f64) -> u8 {
        let layer = &self.resolved[layer_index.min(self.resolved.len() - 1)];
        let target = roll * layer.total_weight;
        layer
            .cumulative
            .iter()
            .find(|(_, cumulative)| *cumulative > target)
            .or_else(|| layer.cumulative.last())
            .map_or(0, |(index, _)| *index)
    }
}

fn layer(name: &str, target_height: f32, materials: &[(&str, f32)]) -> WorldLayer {
    WorldLayer {
        name: name.to_string(),
        target_height,
        materials: materials
            .iter()
            .map(|(material, weight)| LayerMaterial { material: (*material).to_string(), weight: *weight })
            .collect(),
    }
}

/// The built-in layers, lowest first.
#[must_use]
pub fn builtin_layers() -> Vec<WorldLayer> {
    vec![
        layer("abyssal_sediment", 0.08, &[("silt", 3.0), ("sand", 1.0), ("clay", 1.0)]),
        layer("alluvium", 0.28, &[("sand", 4.0), ("silt", 2.0), ("gravel", 1.0)]),
        layer("topsoil", 0.45, &[("topsoil", 3.0), ("grass", 3.0), ("dirt", 2.0)]),
        layer("substrate", 0.60, &[("dirt", 3.0), ("gravel", 2.0), ("clay", 2.0)]),
        layer("colluvium", 0.75, &[("gravel", 3.0), ("stone", 3.0), ("clay", 1.0)]),
        layer("summit", 0.92, &[("stone", 3.0), ("granite", 2.0), ("snow", 2.0), ("basalt", 1.0)]),
    ]
}
