use serde::{Deserialize, Serialize};

/// How quickly the provider publishes a pollutant after sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityClass {
    /// Published in near real time as well as in the offline stream.
    NearRealTime,
    /// Only published in the offline stream, days after sensing.
    DelayedOnly,
}

impl AvailabilityClass {
    pub fn label(&self) -> &'static str {
        match self {
            AvailabilityClass::NearRealTime => "near-real-time-eligible",
            AvailabilityClass::DelayedOnly => "delayed-only",
        }
    }
}

/// Processing level of a product file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingLevel {
    /// Raw per-granule swath product.
    L2,
    /// Regridded, quality-filtered product derived from one granule.
    L3,
}

impl ProcessingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingLevel::L2 => "L2",
            ProcessingLevel::L3 => "L3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "L2" => Some(ProcessingLevel::L2),
            "L3" => Some(ProcessingLevel::L3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pollutant {
    Hcho,
    No2,
    So2,
    Ch4,
    Co,
}

impl Pollutant {
    pub const ALL: [Pollutant; 5] = [
        Pollutant::Hcho,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::Ch4,
        Pollutant::Co,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Pollutant::Hcho => "HCHO",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::Ch4 => "CH4",
            Pollutant::Co => "CO",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.tag() == tag)
    }

    /// Name of the gridded variable holding the column value.
    pub fn field(&self) -> &'static str {
        match self {
            Pollutant::Hcho => "tropospheric_HCHO_column_number_density",
            Pollutant::No2 => "tropospheric_NO2_column_number_density",
            Pollutant::So2 => "SO2_column_number_density",
            Pollutant::Ch4 => "CH4_column_volume_mixing_ratio_dry_air",
            Pollutant::Co => "CO_column_number_density",
        }
    }

    /// Quality descriptor filtered on during L2 to L3 conversion.
    pub fn validity_field(&self) -> String {
        format!("{}_validity", self.field())
    }

    pub fn description(&self) -> &'static str {
        match self {
            Pollutant::Hcho => "Tropospheric HCHO column number density",
            Pollutant::No2 => "Tropospheric vertical column of NO2",
            Pollutant::So2 => "SO2 vertical column density",
            Pollutant::Ch4 => "Column averaged dry air mixing ratio of methane",
            Pollutant::Co => "Vertically integrated CO column density",
        }
    }

    /// Display range used to clamp rendered values.
    pub fn value_range(&self) -> (f32, f32) {
        match self {
            Pollutant::Hcho => (0.0, 0.0007),
            Pollutant::No2 => (0.0, 0.0002),
            Pollutant::So2 => (0.0, 0.003),
            Pollutant::Ch4 => (1400.0, 2000.0),
            Pollutant::Co => (0.0, 0.05),
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Pollutant::Ch4 => "ppbv",
            _ => "mol/m²",
        }
    }

    pub fn availability(&self) -> AvailabilityClass {
        match self {
            Pollutant::Ch4 => AvailabilityClass::DelayedOnly,
            _ => AvailabilityClass::NearRealTime,
        }
    }

    /// Ten character product type, e.g. `L2__NO2___`.
    pub fn product_type(&self, level: ProcessingLevel) -> String {
        format!("{}__{:_<6}", level.as_str(), self.tag())
    }

    /// Inverse of [`Pollutant::product_type`].
    pub fn from_product_type(product_type: &str) -> Option<(Self, ProcessingLevel)> {
        if product_type.len() != 10 {
            return None;
        }
        let level = ProcessingLevel::from_code(product_type.get(0..2)?)?;
        if product_type.get(2..4)? != "__" {
            return None;
        }
        let tag = product_type.get(4..)?.trim_end_matches('_');
        Self::from_tag(tag).map(|p| (p, level))
    }
}

impl std::fmt::Display for Pollutant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}
