//! # Materials and Packed Pixels
//!
//! Every world pixel is one byte:
//!
//! ```text
//!  7 6 5 4 3 2 | 1 0
//!  material idx | color variant
//! ```
//!
//! Six bits of material index cap the catalog at 64 entries and two bits of
//! color variant cap each palette at 4 colors. Decoding a byte whose index
//! or variant does not exist in the catalog is a corruption bug and is
//! reported as `WorldError::CorruptPixel`, never clamped.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};

/// Maximum number of materials addressable by a packed pixel.
pub const MAX_MATERIALS: usize = 64;

/// Maximum number of color variants per material.
pub const MAX_COLOR_VARIANTS: usize = 4;

/// Durability used for non-solid materials during erosion.
pub const NON_SOLID_DURABILITY: f32 = 0.5;

/// Tag marking materials that soak up moisture.
pub const TAG_ABSORBENT: &str = "absorbent";

/// Tag marking loose, diggable materials.
pub const TAG_SOFT: &str = "soft";

/// RGBA color.
pub type Rgba = [u8; 4];

/// One packed material/color byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct PackedPixel(pub u8);

impl PackedPixel {
    /// Packs a material index (0-63) and color variant (0-3).
    #[inline]
    #[must_use]
    pub const fn encode(material_index: u8, color_variant: u8) -> Self {
        Self(((material_index & 0x3F) << 2) | (color_variant & 0x03))
    }

    /// Returns the material index.
    #[inline]
    #[must_use]
    pub const fn material_index(self) -> u8 {
        self.0 >> 2
    }

    /// Returns the color variant.
    #[inline]
    #[must_use]
    pub const fn color_variant(self) -> u8 {
        self.0 & 0x03
    }

    /// Splits the byte into `(material_index, color_variant)`.
    #[inline]
    #[must_use]
    pub const fn decode(self) -> (u8, u8) {
        (self.material_index(), self.color_variant())
    }

    /// Replaces the material while keeping the color variant.
    #[inline]
    #[must_use]
    pub const fn with_material(self, material_index: u8) -> Self {
        Self::encode(material_index, self.color_variant())
    }
}

/// Views a raw pixel byte slice as packed pixels.
#[inline]
#[must_use]
pub fn as_packed(bytes: &[u8]) -> &[PackedPixel] {
    bytemuck::cast_slice(bytes)
}

/// Physical state of a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Terrain that holds its shape (rock, soil, sand).
    Solid,
    /// Flowing material.
    Liquid,
    /// Airborne material.
    Gas,
}

/// Physical properties consumed by simulation and erosion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialPhysics {
    /// Whether the falling-sand simulation moves this material.
    pub simulate: bool,
    /// Resistance to erosion and digging, 0 (none) to 1 (indestructible).
    pub durability: f32,
    /// Surface friction.
    pub friction: f32,
    /// Relative density.
    pub density: f32,
    /// Flow resistance for liquids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viscosity: Option<f32>,
}

/// A named substance with a palette and physical properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Unique name.
    pub name: String,
    /// Physical state.
    pub kind: MaterialKind,
    /// Color palette (1 to 4 entries).
    pub colors: Vec<Rgba>,
    /// Physical properties.
    pub physics: MaterialPhysics,
    /// Free-form tags such as "absorbent" or "soft".
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Material this one turns into when soaked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wet_variant: Option<String>,
}

impl Material {
    /// Returns true if the material carries the tag.
    #[inline]
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Durability used by erosion.
    ///
    /// Non-solid materials fall back to `NON_SOLID_DURABILITY`.
    #[inline]
    #[must_use]
    pub fn erosion_durability(&self) -> f32 {
        match self.kind {
            MaterialKind::Solid => self.physics.durability,
            MaterialKind::Liquid | MaterialKind::Gas => NON_SOLID_DURABILITY,
        }
    }

    /// Number of color variants.
    #[inline]
    #[must_use]
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }
}

/// Flat material lookup table indexed by packed pixel material bits.
#[derive(Clone, Debug)]
pub struct MaterialCatalog {
    materials: Vec<Material>,
    by_name: HashMap<String, u8>,
    wet: Vec<Option<u8>>,
    hardest: u8,
}

#[derive(Deserialize)]
struct CatalogFile {
    materials: Vec<Material>,
}

impl MaterialCatalog {
    /// Builds a catalog after validating it.
    ///
    /// # Errors
    ///
    /// Fails for more than 64 materials, palettes outside 1..=4 colors,
    /// duplicate names, unknown wet variants, or wet variants with a smaller
    /// palette than their dry material.
    pub fn new(materials: Vec<Material>) -> WorldResult<Self> {
        validate(&materials)?;
        Ok(Self::index(materials))
    }

    /// Parses a `[[materials]]` TOML document.
    ///
    /// # Errors
    ///
    /// Returns parse errors and every validation error of [`Self::new`].
    pub fn from_toml_str(text: &str) -> WorldResult<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::new(file.materials)
    }

    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns IO errors and every error of [`Self::from_toml_str`].
    pub fn from_toml_file(path: &Path) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| WorldError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The built-in terrain catalog.
    #[must_use]
    pub fn builtin() -> Self {
        Self::index(builtin_materials())
    }

    fn index(materials: Vec<Material>) -> Self {
        let by_name: HashMap<String, u8> = materials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i as u8))
            .collect();

        let wet = materials
            .iter()
            .map(|m| m.wet_variant.as_ref().and_then(|w| by_name.get(w).copied()))
            .collect();

        let hardest = materials
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind == MaterialKind::Solid)
            .max_by(|(_, a), (_, b)| a.physics.durability.total_cmp(&b.physics.durability))
            .map_or(0, |(i, _)| i as u8);

        Self { materials, by_name, wet, hardest }
    }

    /// Number of materials.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true if the catalog is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Gets a material by index.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    /// Looks up a material index by name.
    #[inline]
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// Looks up a material by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Material> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Iterates `(index, material)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Material)> {
        self.materials.iter().enumerate().map(|(i, m)| (i as u8, m))
    }

    /// Wet counterpart of a material, if registered.
    #[inline]
    #[must_use]
    pub fn wet_variant_of(&self, index: u8) -> Option<u8> {
        self.wet.get(index as usize).copied().flatten()
    }

    /// Index of the most durable solid material (bedrock in the built-in set).
    #[inline]
    #[must_use]
    pub const fn hardest(&self) -> u8 {
        self.hardest
    }

    /// Decodes a packed pixel against this catalog.
    ///
    /// # Errors
    ///
    /// Returns `WorldError::CorruptPixel` for an unknown material index or a
    /// color variant outside the material's palette.
    pub fn decode(&self, pixel: PackedPixel) -> WorldResult<&Material> {
        let (index, variant) = pixel.decode();
        let material = self.get(index).ok_or(WorldError::CorruptPixel {
            byte: pixel.0,
            reason: "material index outside catalog",
        })?;
        if variant as usize >= material.color_count() {
            return Err(WorldError::CorruptPixel {
                byte: pixel.0,
                reason: "color variant outside material palette",
            });
        }
        Ok(material)
    }

    /// Resolves the display color of a packed pixel.
    ///
    /// # Errors
    ///
    /// Same as [`Self::decode`].
    pub fn color_of(&self, pixel: PackedPixel) -> WorldResult<Rgba> {
        let material = self.decode(pixel)?;
        Ok(material.colors[pixel.color_variant() as usize])
    }
}

fn validate(materials: &[Material]) -> WorldResult<()> {
    if materials.len() > MAX_MATERIALS {
        return Err(WorldError::TooManyMaterials(materials.len()));
    }

    let mut names = HashMap::with_capacity(materials.len());
    for material in materials {
        let count = material.colors.len();
        if count == 0 || count > MAX_COLOR_VARIANTS {
            return Err(WorldError::InvalidPalette { name: material.name.clone(), count });
        }
        if names.insert(material.name.as_str(), material).is_some() {
            return Err(WorldError::DuplicateMaterial(material.name.clone()));
        }
    }

    for material in materials {
        let Some(wet_name) = &material.wet_variant else {
            continue;
        };
        let wet = names.get(wet_name.as_str()).ok_or_else(|| WorldError::UnknownMaterial {
            material: wet_name.clone(),
            referenced_by: material.name.clone(),
        })?;
        if wet.colors.len() < material.colors.len() {
            return Err(WorldError::WetVariantPalette {
                material: material.name.clone(),
                wet: wet_name.clone(),
            });
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn solid(
    name: &str,
    durability: f32,
    friction: f32,
    density: f32,
    simulate: bool,
    colors: [Rgba; 4],
    tags: &[&str],
    wet_variant: Option<&str>,
) -> Material {
    Material {
        name: name.to_string(),
        kind: MaterialKind::Solid,
        colors: colors.to_vec(),
        physics: MaterialPhysics { simulate, durability, friction, density, viscosity: None },
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
        wet_variant: wet_variant.map(str::to_string),
    }
}

/// The built-in terrain materials, in catalog order.
#[must_use]
pub fn builtin_materials() -> Vec<Material> {
    let water = Material {
        name: "water".to_string(),
        kind: MaterialKind::Liquid,
        colors: vec![[38, 92, 160, 220], [34, 84, 150, 220], [44, 104, 172, 220], [30, 76, 138, 220]],
        physics: MaterialPhysics {
            simulate: true,
            durability: 0.0,
            friction: 0.05,
            density: 1.0,
            viscosity: Some(0.2),
        },
        tags: ["liquid"].iter().map(|t| (*t).to_string()).collect(),
        wet_variant: None,
    };

    vec![
        water,
        solid("silt", 0.10, 0.4, 1.4, true,
            [[150, 138, 112, 255], [142, 130, 104, 255], [158, 146, 120, 255], [136, 124, 100, 255]],
            &["absorbent", "soft"], Some("mud")),
        solid("sand", 0.20, 0.5, 1.5, true,
            [[219, 196, 140, 255], [210, 186, 128, 255], [228, 206, 152, 255], [201, 178, 120, 255]],
            &["absorbent", "soft"], Some("sand_wet")),
        solid("sand_wet", 0.25, 0.6, 1.7, true,
            [[176, 152, 104, 255], [168, 144, 96, 255], [184, 160, 112, 255], [160, 136, 90, 255]],
            &["soft", "wet"], None),
        solid("mud", 0.12, 0.8, 1.6, true,
            [[96, 72, 50, 255], [88, 66, 46, 255], [104, 80, 56, 255], [80, 60, 42, 255]],
            &["soft", "wet"], None),
        solid("gravel", 0.35, 0.7, 1.8, true,
            [[128, 124, 118, 255], [118, 114, 108, 255], [138, 134, 128, 255], [110, 106, 100, 255]],
            &[], None),
        solid("dirt", 0.25, 0.6, 1.3, false,
            [[124, 90, 60, 255], [116, 84, 56, 255], [132, 96, 64, 255], [108, 78, 52, 255]],
            &["absorbent", "soft"], Some("mud")),
        solid("topsoil", 0.22, 0.6, 1.2, false,
            [[98, 74, 48, 255], [90, 68, 44, 255], [106, 80, 52, 255], [84, 62, 40, 255]],
            &["absorbent", "soft", "organic"], Some("mud")),
        solid("grass", 0.28, 0.7, 1.1, false,
            [[86, 140, 62, 255], [78, 130, 56, 255], [94, 150, 68, 255], [72, 122, 52, 255]],
            &["organic", "soft"], None),
        solid("clay", 0.45, 0.7, 1.9, false,
            [[170, 104, 76, 255], [160, 96, 70, 255], [180, 112, 82, 255], [150, 90, 66, 255]],
            &[], None),
        solid("stone", 0.65, 0.8, 2.4, false,
            [[120, 120, 124, 255], [110, 110, 114, 255], [130, 130, 134, 255], [102, 102, 106, 255]],
            &[], None),
        solid("granite", 0.80, 0.8, 2.7, false,
            [[150, 132, 130, 255], [140, 122, 120, 255], [160, 142, 140, 255], [132, 114, 112, 255]],
            &[], None),
        solid("basalt", 0.88, 0.8, 2.9, false,
            [[60, 60, 66, 255], [54, 54, 60, 255], [66, 66, 72, 255], [48, 48, 54, 255]],
            &[], None),
        solid("snow", 0.05, 0.2, 0.4, true,
            [[240, 244, 250, 255], [232, 236, 244, 255], [248, 250, 255, 255], [224, 230, 240, 255]],
            &["soft", "cold"], None),
        solid("bedrock", 1.0, 0.9, 3.2, false,
            [[40, 36, 38, 255], [34, 30, 32, 255], [46, 42, 44, 255], [28, 26, 28, 255]],
            &["indestructible"], None),
    ]
}
