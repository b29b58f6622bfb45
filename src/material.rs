//! Catalog of building materials and their electrical properties.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Building material with the electrical properties relevant to RF attenuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Material {
    /// Lowercase identifier, e.g. `"concrete"`.
    pub id: String,
    /// Relative permittivity (εr).
    pub permittivity: f64,
    /// Conductivity (σ) in S/m.
    pub conductivity: f64,
    /// Reference thickness in meters.
    pub thickness: f64,
}

impl Material {
    pub fn new(id: &str, permittivity: f64, conductivity: f64, thickness: f64) -> Self {
        Self {
            id: id.to_lowercase(),
            permittivity,
            conductivity,
            thickness,
        }
    }
}

/// Read-only table of materials, indexed by id.
///
/// Built once per run and shared behind an `Arc` by every component that
/// needs it. Cells of a layout refer to materials by their catalog index.
#[derive(Debug, Clone)]
pub struct MaterialCatalog {
    materials: Vec<Material>,
    index: HashMap<String, usize>,
}

impl MaterialCatalog {
    /// Catalog containing the five standard materials.
    pub fn standard() -> Self {
        let mut catalog = Self {
            materials: Vec::new(),
            index: HashMap::new(),
        };
        for material in [
            Material::new("concrete", 4.5, 0.014, 0.2),
            Material::new("glass", 6.0, 0.004, 0.006),
            Material::new("wood", 2.1, 0.002, 0.04),
            Material::new("drywall", 2.0, 0.001, 0.016),
            Material::new("metal", 1.0, 1e7, 0.002),
        ] {
            catalog.insert(material);
        }
        catalog
    }

    /// Standard catalog extended with custom materials.
    ///
    /// A custom material may not shadow a registered id.
    pub fn with_custom<I>(custom: I) -> Result<Self>
    where
        I: IntoIterator<Item = Material>,
    {
        let mut catalog = Self::standard();
        for material in custom {
            let material = Material {
                id: material.id.to_lowercase(),
                ..material
            };
            validate(&material)?;
            if catalog.index.contains_key(&material.id) {
                return Err(Error::invalid_config(format!(
                    "material {:?} is already registered",
                    material.id
                )));
            }
            catalog.insert(material);
        }
        Ok(catalog)
    }

    fn insert(&mut self, material: Material) {
        self.index.insert(material.id.clone(), self.materials.len());
        self.materials.push(material);
    }

    /// Look up a material by id (case-insensitive).
    pub fn lookup(&self, id: &str) -> Result<&Material> {
        self.index_of(id).map(|idx| &self.materials[idx])
    }

    /// Catalog index of a material id.
    pub fn index_of(&self, id: &str) -> Result<usize> {
        self.index
            .get(&id.to_lowercase())
            .copied()
            .ok_or_else(|| Error::UnknownMaterial { id: id.to_string() })
    }

    /// Material at a catalog index, as stored in layout cells.
    pub fn get(&self, idx: usize) -> Option<&Material> {
        self.materials.get(idx)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }
}

fn validate(material: &Material) -> Result<()> {
    if material.id.is_empty() {
        return Err(Error::invalid_config("material id must not be empty"));
    }
    if !(material.permittivity >= 1.0 && material.permittivity.is_finite()) {
        return Err(Error::invalid_config(format!(
            "material {:?} must have permittivity >= 1, but has {}",
            material.id, material.permittivity
        )));
    }
    if !(material.conductivity >= 0.0 && material.conductivity.is_finite()) {
        return Err(Error::invalid_config(format!(
            "material {:?} must have non-negative conductivity, but has {}",
            material.id, material.conductivity
        )));
    }
    if !(material.thickness > 0.0 && material.thickness.is_finite()) {
        return Err(Error::invalid_config(format!(
            "material {:?} must have positive thickness, but has {}",
            material.id, material.thickness
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_constants() {
        let catalog = MaterialCatalog::standard();
        assert_eq!(catalog.len(), 5);

        let concrete = catalog.lookup("concrete").unwrap();
        assert_eq!(concrete.permittivity, 4.5);
        assert_eq!(concrete.conductivity, 0.014);
        assert_eq!(concrete.thickness, 0.2);

        let metal = catalog.lookup("Metal").unwrap();
        assert_eq!(metal.conductivity, 1e7);
    }

    #[test]
    fn unknown_material() {
        let catalog = MaterialCatalog::standard();
        assert_eq!(
            catalog.lookup("granite"),
            Err(Error::UnknownMaterial {
                id: "granite".to_string()
            })
        );
    }

    #[test]
    fn custom_materials() {
        let brick = Material::new("brick", 4.0, 0.02, 0.1);
        let catalog = MaterialCatalog::with_custom([brick.clone()]).unwrap();
        assert_eq!(catalog.lookup("brick").unwrap(), &brick);
        assert_eq!(catalog.index_of("brick").unwrap(), 5);

        let shadow = Material::new("glass", 5.0, 0.0, 0.01);
        assert!(matches!(
            MaterialCatalog::with_custom([shadow]),
            Err(Error::InvalidConfiguration { .. })
        ));

        let bad = Material::new("foam", 0.5, 0.0, 0.01);
        assert!(MaterialCatalog::with_custom([bad]).is_err());
    }
}
