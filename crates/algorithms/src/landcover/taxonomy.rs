//! Land-cover class taxonomy
//!
//! Maps raw class codes to a display name and a coarser class group. The
//! group is the key transitions are aggregated on; every group has a color.

use serde::{Deserialize, Serialize};
use soilcarbon_colormap::{CategoricalPalette, Rgb};
use soilcarbon_core::{Error, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCoverClass {
    pub code: i32,
    pub name: String,
    pub group: String,
    pub color: Rgb,
    /// Drawn transparent on maps
    #[serde(default)]
    pub transparent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub name: String,
    pub color: Rgb,
}

/// Serialized form of a taxonomy: the group table, then the classes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyDefinition {
    pub groups: Vec<ClassGroup>,
    pub classes: Vec<LandCoverClass>,
}

/// Immutable code → (name, group, color) lookup.
#[derive(Debug, Clone)]
pub struct ClassTaxonomy {
    classes: BTreeMap<i32, LandCoverClass>,
    /// Groups in display order
    groups: Vec<ClassGroup>,
}

impl ClassTaxonomy {
    /// Build from a definition. Every class must reference a listed group,
    /// and codes and group names must be unique.
    pub fn from_definition(definition: TaxonomyDefinition) -> Result<Self> {
        let mut groups: Vec<ClassGroup> = Vec::with_capacity(definition.groups.len());
        for group in definition.groups {
            if groups.iter().any(|g| g.name == group.name) {
                return Err(Error::InvalidParameter {
                    name: "group",
                    value: group.name,
                    reason: "duplicate class group".into(),
                });
            }
            groups.push(group);
        }

        let mut classes = BTreeMap::new();
        for class in definition.classes {
            if !groups.iter().any(|g| g.name == class.group) {
                return Err(Error::UnknownClassGroup(class.group));
            }
            let code = class.code;
            if classes.insert(code, class).is_some() {
                return Err(Error::InvalidParameter {
                    name: "code",
                    value: code.to_string(),
                    reason: "duplicate class code".into(),
                });
            }
        }
        Ok(Self { classes, groups })
    }

    /// The ESA CCI land-cover legend grouped into IPCC-style classes
    pub fn esa_cci() -> Self {
        let groups = ESA_CCI_GROUPS
            .iter()
            .map(|&(name, color)| ClassGroup {
                name: name.to_string(),
                color: Rgb::from_u32(color),
            })
            .collect();
        let classes = ESA_CCI_CLASSES
            .iter()
            .map(|&(code, name, group, color)| {
                (
                    code,
                    LandCoverClass {
                        code,
                        name: name.to_string(),
                        group: group.to_string(),
                        color: Rgb::from_u32(color),
                        transparent: ESA_CCI_TRANSPARENT.contains(&code),
                    },
                )
            })
            .collect();
        Self { classes, groups }
    }

    pub fn class(&self, code: i32) -> Option<&LandCoverClass> {
        self.classes.get(&code)
    }

    /// Group name of a class code
    pub fn group_of(&self, code: i32) -> Result<&str> {
        self.classes
            .get(&code)
            .map(|c| c.group.as_str())
            .ok_or(Error::UnknownClassCode(code))
    }

    pub fn group_color(&self, group: &str) -> Result<Rgb> {
        self.groups
            .iter()
            .find(|g| g.name == group)
            .map(|g| g.color)
            .ok_or_else(|| Error::UnknownClassGroup(group.to_string()))
    }

    /// Position of a group in display order
    pub fn group_rank(&self, group: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == group)
    }

    pub fn groups(&self) -> &[ClassGroup] {
        &self.groups
    }

    pub fn classes(&self) -> impl Iterator<Item = &LandCoverClass> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class colors for map rendering
    pub fn palette(&self) -> CategoricalPalette {
        let mut palette =
            CategoricalPalette::new(self.classes.iter().map(|(&k, c)| (k, c.color)).collect());
        for class in self.classes.values().filter(|c| c.transparent) {
            palette = palette.with_transparent(class.code);
        }
        palette
    }

    pub fn to_definition(&self) -> TaxonomyDefinition {
        TaxonomyDefinition {
            groups: self.groups.clone(),
            classes: self.classes.values().cloned().collect(),
        }
    }
}

impl Default for ClassTaxonomy {
    fn default() -> Self {
        Self::esa_cci()
    }
}

const ESA_CCI_GROUPS: &[(&str, u32)] = &[
    ("No Data", 0xffffff),
    ("Cropland", 0xffff64),
    ("Tree cover", 0x003c00),
    ("Shrubland", 0x966400),
    ("Grassland", 0xffb432),
    ("Lichens and mosses", 0xffdcd2),
    ("Sparse vegetation", 0xffebaf),
    ("Flooded areas", 0x009678),
    ("Urban areas", 0xc31400),
    ("Bare areas", 0xfff5d7),
    ("Water bodies", 0x0046c8),
    ("Snow and ice", 0xffffff),
];

// Water is left transparent so the basemap shows through
const ESA_CCI_TRANSPARENT: &[i32] = &[0, 210];

const ESA_CCI_CLASSES: &[(i32, &str, &str, u32)] = &[
    (0, "No Data", "No Data", 0xffffff),
    (10, "Cropland, rainfed", "Cropland", 0xffff64),
    (11, "Cropland, rainfed, herbaceous cover", "Cropland", 0xffff64),
    (12, "Cropland, rainfed, tree, or shrub cover", "Cropland", 0xffff00),
    (20, "Cropland, irrigated or post-flooding", "Cropland", 0xaaf0f0),
    (
        30,
        "Mosaic cropland (>50%) / natural vegetation (tree, shrub, herbaceous cover) (<50%)",
        "Cropland",
        0xdcf064,
    ),
    (
        40,
        "Mosaic natural vegetation (tree, shrub, herbaceous cover) (>50%) / cropland (<50%)",
        "Cropland",
        0xc8c864,
    ),
    (50, "Tree cover, broadleaved, evergreen, closed to open (>15%)", "Tree cover", 0x006400),
    (60, "Tree cover, broadleaved, deciduous, closed to open (>15%)", "Tree cover", 0x00a000),
    (61, "Tree cover, broadleaved, deciduous, closed (>40%)", "Tree cover", 0x00a000),
    (62, "Tree cover, broadleaved, deciduous, open (15-40%)", "Tree cover", 0xaac800),
    (70, "Tree cover, needleleaved, evergreen, closed to open (>15%)", "Tree cover", 0x003c00),
    (71, "Tree cover, needleleaved, evergreen, closed (>40%)", "Tree cover", 0x003c00),
    (72, "Tree cover, needleleaved, evergreen, open (15-40%)", "Tree cover", 0x005000),
    (80, "Tree cover, needleleaved, deciduous, closed to open (>15%)", "Tree cover", 0x285000),
    (81, "Tree cover, needleleaved, deciduous, closed (>40%)", "Tree cover", 0x285000),
    (82, "Tree cover, needleleaved, deciduous, open (15-40%)", "Tree cover", 0x286400),
    (90, "Tree cover, mixed leaf type (broadleaved and needleleaved)", "Tree cover", 0x788200),
    (100, "Mosaic tree and shrub (>50%) / herbaceous cover (<50%)", "Shrubland", 0x8ca000),
    (110, "Mosaic herbaceous cover (>50%) / tree and shrub (<50%)", "Shrubland", 0xbe9600),
    (120, "Shrubland", "Shrubland", 0x966400),
    (121, "Evergreen shrubland", "Shrubland", 0x966400),
    (122, "Deciduous shrubland", "Shrubland", 0x966400),
    (130, "Grassland", "Grassland", 0xffb432),
    (140, "Lichens and mosses", "Lichens and mosses", 0xffdcd2),
    (
        150,
        "Sparse vegetation (tree, shrub, herbaceous cover) (<15%)",
        "Sparse vegetation",
        0xffebaf,
    ),
    (151, "Sparse tree (<15%)", "Sparse vegetation", 0xffc864),
    (152, "Sparse shrub (<15%)", "Sparse vegetation", 0xffd278),
    (153, "Sparse herbaceous cover (<15%)", "Sparse vegetation", 0xffebaf),
    (160, "Tree cover, flooded, fresh, or brackish water", "Flooded areas", 0x00785a),
    (170, "Tree cover, flooded, saline water", "Flooded areas", 0x009678),
    (
        180,
        "Shrub or herbaceous cover, flooded, fresh/saline/brackish water",
        "Flooded areas",
        0x00dc82,
    ),
    (190, "Urban areas", "Urban areas", 0xc31400),
    (200, "Bare areas", "Bare areas", 0xfff5d7),
    (201, "Consolidated bare areas", "Bare areas", 0xdcdcdc),
    (202, "Unconsolidated bare areas", "Bare areas", 0xfff5d7),
    (210, "Water bodies", "Water bodies", 0x0046c8),
    (220, "Permanent snow and ice", "Snow and ice", 0xffffff),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esa_cci_groups() {
        let t = ClassTaxonomy::esa_cci();
        assert_eq!(t.group_of(10).unwrap(), "Cropland");
        assert_eq!(t.group_of(62).unwrap(), "Tree cover");
        assert_eq!(t.group_of(151).unwrap(), "Sparse vegetation");
        assert_eq!(t.group_of(0).unwrap(), "No Data");
        assert_eq!(t.class(201).unwrap().name, "Consolidated bare areas");
        assert_eq!(t.group_color("Urban areas").unwrap(), Rgb::from_u32(0xc31400));
        assert_eq!(t.len(), 38);
    }

    #[test]
    fn test_unknown_code_and_group() {
        let t = ClassTaxonomy::esa_cci();
        assert!(matches!(t.group_of(999), Err(Error::UnknownClassCode(999))));
        assert!(matches!(t.group_color("Tundra"), Err(Error::UnknownClassGroup(_))));
    }

    #[test]
    fn test_every_class_group_has_a_color() {
        let t = ClassTaxonomy::esa_cci();
        for class in t.classes() {
            assert!(t.group_color(&class.group).is_ok(), "{}", class.group);
        }
    }

    #[test]
    fn test_definition_from_json() {
        let json = r##"{
            "groups": [
                {"name": "Forest", "color": "#003c00"},
                {"name": "Farm", "color": "#ffff64"}
            ],
            "classes": [
                {"code": 1, "name": "Closed forest", "group": "Forest", "color": "#003c00"},
                {
                    "code": 2, "name": "Field", "group": "Farm",
                    "color": "#ffff64", "transparent": true
                }
            ]
        }"##;
        let def: TaxonomyDefinition = serde_json::from_str(json).unwrap();
        let t = ClassTaxonomy::from_definition(def).unwrap();
        assert_eq!(t.group_of(2).unwrap(), "Farm");
        assert_eq!(t.group_rank("Farm"), Some(1));
        assert!(t.palette().transparent.contains(&2));
    }

    #[test]
    fn test_definition_from_toml() {
        let text = r##"
            [[groups]]
            name = "Forest"
            color = "#003c00"

            [[classes]]
            code = 50
            name = "Evergreen forest"
            group = "Forest"
            color = "#006400"
        "##;
        let def: TaxonomyDefinition = toml::from_str(text).unwrap();
        let t = ClassTaxonomy::from_definition(def).unwrap();
        assert_eq!(t.group_of(50).unwrap(), "Forest");
    }

    #[test]
    fn test_definition_rejects_dangling_group() {
        let def = TaxonomyDefinition {
            groups: vec![],
            classes: vec![LandCoverClass {
                code: 1,
                name: "Field".into(),
                group: "Farm".into(),
                color: Rgb::WHITE,
                transparent: false,
            }],
        };
        assert!(matches!(
            ClassTaxonomy::from_definition(def),
            Err(Error::UnknownClassGroup(_))
        ));
    }

    #[test]
    fn test_roundtrip_through_definition() {
        let t = ClassTaxonomy::esa_cci();
        let back = ClassTaxonomy::from_definition(t.to_definition()).unwrap();
        assert_eq!(back.len(), t.len());
        assert_eq!(back.groups(), t.groups());
    }
}
