//! Device category codec.
//!
//! A device's category is not stored on the tracking platform as a field we
//! trust. It is encoded as the first digit of the device `uniqueId`:
//!
//! | category    | prefix |
//! |-------------|--------|
//! | `person`    | `1`    |
//! | `ambulance` | `2`    |
//! | `pickup`    | `3`    |
//! | `mobile`    | `4`    |

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix used when encoding a label outside the category table.
pub const FALLBACK_PREFIX: &str = "4";

/// Upper bound (inclusive) of the random part of a generated `uniqueId`.
const MAX_RANDOM_SUFFIX: u32 = 999_999_999;

/// Coarse device classification shown on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ambulance,
    Pickup,
    Person,
    Mobile,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ambulance,
        Category::Pickup,
        Category::Person,
        Category::Mobile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ambulance => "ambulance",
            Category::Pickup => "pickup",
            Category::Person => "person",
            Category::Mobile => "mobile",
        }
    }

    /// Identifier prefix digit for this category.
    pub fn prefix(&self) -> &'static str {
        match self {
            Category::Ambulance => "2",
            Category::Pickup => "3",
            Category::Person => "1",
            Category::Mobile => "4",
        }
    }

    /// Parses an exact lowercase category label.
    pub fn from_label(label: &str) -> Option<Category> {
        match label {
            "ambulance" => Some(Category::Ambulance),
            "pickup" => Some(Category::Pickup),
            "person" => Some(Category::Person),
            "mobile" => Some(Category::Mobile),
            _ => None,
        }
    }

    /// Decodes the category from the first character of a `uniqueId`.
    ///
    /// Empty or unmapped identifiers decode to [`Category::Mobile`].
    pub fn from_unique_id(unique_id: &str) -> Category {
        match unique_id.chars().next() {
            Some('2') => Category::Ambulance,
            Some('3') => Category::Pickup,
            Some('1') => Category::Person,
            Some('4') => Category::Mobile,
            _ => Category::Mobile,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes a category label into its identifier prefix digit.
pub fn encode(label: &str) -> &'static str {
    Category::from_label(label)
        .map(|c| c.prefix())
        .unwrap_or(FALLBACK_PREFIX)
}

/// Decodes a `uniqueId` into its category.
pub fn decode(unique_id: &str) -> Category {
    Category::from_unique_id(unique_id)
}

/// Generates a new `uniqueId`: the category prefix followed by nine random digits.
pub fn generate_unique_id<R: Rng>(label: &str, rng: &mut R) -> String {
    let suffix: u32 = rng.gen_range(0..=MAX_RANDOM_SUFFIX);
    format!("{}{:09}", encode(label), suffix)
}
