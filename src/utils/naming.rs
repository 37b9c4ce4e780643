//! Filename codecs shared by every producer and consumer of on-disk artifacts.
//!
//! Product names carry their acquisition date at a fixed character offset and
//! the retention sweeps depend on it, so names are only ever built and read
//! through the types in this module.

use chrono::NaiveDate;
use std::fmt;

use crate::error::{ProcessingError, Result};
use crate::models::{Pollutant, ProcessingLevel};

/// Character offset of the `YYYYMMDD` acquisition date in a product filename.
pub const ACQUISITION_DATE_OFFSET: usize = 20;
pub const ACQUISITION_DATE_LEN: usize = 8;

const ACQUISITION_DATE_FORMAT: &str = "%Y%m%d";
const OUTPUT_DATE_FORMAT: &str = "%Y_%m_%d";

fn parse_digits_date(candidate: &str, format: &str, name: &str) -> Result<NaiveDate> {
    let date_error = || ProcessingError::FilenameDate {
        name: name.to_string(),
    };
    if !candidate
        .chars()
        .all(|c| c.is_ascii_digit() || c == '_')
    {
        return Err(date_error());
    }
    NaiveDate::parse_from_str(candidate, format).map_err(|_| date_error())
}

/// Read the acquisition date at its fixed offset without decoding the rest.
pub fn acquisition_date(name: &str) -> Result<NaiveDate> {
    let candidate = name
        .get(ACQUISITION_DATE_OFFSET..ACQUISITION_DATE_OFFSET + ACQUISITION_DATE_LEN)
        .ok_or_else(|| ProcessingError::FilenameDate {
            name: name.to_string(),
        })?;
    if candidate.contains('_') {
        return Err(ProcessingError::FilenameDate {
            name: name.to_string(),
        });
    }
    parse_digits_date(candidate, ACQUISITION_DATE_FORMAT, name)
}

/// Decoded Sentinel-5P product filename, e.g.
/// `S5P_OFFL_L2__CH4____20230501T051233_20230501T065403_28833_03_020500_20230502T211231.nc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilename {
    pub mission: String,
    pub stream: String,
    pub level: ProcessingLevel,
    pub pollutant: Pollutant,
    pub acquisition_date: NaiveDate,
    /// Everything after the acquisition date, kept verbatim.
    pub remainder: String,
}

impl ProductFilename {
    pub fn parse(name: &str) -> Result<Self> {
        let malformed =
            || ProcessingError::InvalidFormat(format!("Not a product filename: '{}'", name));

        let separators_ok = [3usize, 8, 19]
            .iter()
            .all(|&i| name.get(i..i + 1) == Some("_"));
        if !separators_ok {
            return Err(malformed());
        }

        let mission = name.get(0..3).ok_or_else(malformed)?;
        let stream = name.get(4..8).ok_or_else(malformed)?;
        if !stream.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(malformed());
        }
        let product_type = name.get(9..19).ok_or_else(malformed)?;
        let (pollutant, level) = Pollutant::from_product_type(product_type).ok_or_else(malformed)?;
        let acquisition_date = acquisition_date(name)?;
        let remainder = name
            .get(ACQUISITION_DATE_OFFSET + ACQUISITION_DATE_LEN..)
            .unwrap_or_default();

        Ok(Self {
            mission: mission.to_string(),
            stream: stream.to_string(),
            level,
            pollutant,
            acquisition_date,
            remainder: remainder.to_string(),
        })
    }

    /// Same product at another processing level, date offset unchanged.
    pub fn with_level(&self, level: ProcessingLevel) -> Self {
        Self {
            level,
            ..self.clone()
        }
    }
}

impl fmt::Display for ProductFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}{}",
            self.mission,
            self.stream,
            self.pollutant.product_type(self.level),
            self.acquisition_date.format(ACQUISITION_DATE_FORMAT),
            self.remainder
        )
    }
}

/// Name of the directory holding one run's renders.
pub fn run_directory_name(date: NaiveDate) -> String {
    date.format(OUTPUT_DATE_FORMAT).to_string()
}

pub fn parse_run_directory(name: &str) -> Result<NaiveDate> {
    if name.len() != 10 {
        return Err(ProcessingError::FilenameDate {
            name: name.to_string(),
        });
    }
    parse_digits_date(name, OUTPUT_DATE_FORMAT, name)
}

pub fn animation_file_name(pollutant: Pollutant) -> String {
    format!("{}.gif", pollutant.tag())
}

/// `<TAG>_<YYYY_MM_DD>-<YYYY_MM_DD>.<ext>` naming of per-run artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedName {
    pub pollutant: Pollutant,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl RenderedName {
    pub fn new(pollutant: Pollutant, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            pollutant,
            start,
            end,
        }
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "{}_{}-{}.{}",
            self.pollutant.tag(),
            self.start.format(OUTPUT_DATE_FORMAT),
            self.end.format(OUTPUT_DATE_FORMAT),
            extension
        )
    }

    pub fn parse(file_name: &str) -> Result<Self> {
        let malformed =
            || ProcessingError::InvalidFormat(format!("Not a rendered artifact: '{}'", file_name));

        let (stem, _extension) = file_name.rsplit_once('.').ok_or_else(malformed)?;
        let (tag, dates) = stem.split_once('_').ok_or_else(malformed)?;
        let pollutant = Pollutant::from_tag(tag).ok_or_else(malformed)?;
        let (start, end) = dates.split_once('-').ok_or_else(malformed)?;

        Ok(Self {
            pollutant,
            start: parse_run_directory(start)?,
            end: parse_run_directory(end)?,
        })
    }
}
