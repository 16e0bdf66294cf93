use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value} ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Tunables for one comparison run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Regions whose foreground area is at or below this are dropped.
    pub min_area: u32,
    /// JPEG quality for the four output images (1-100).
    pub jpeg_quality: u8,
    /// Stroke width of the bounding boxes on the annotated images.
    pub box_thickness: u32,
    /// Upper bound on comparisons running at once in bulk mode.
    pub bulk_workers: usize,
}

pub const DEFAULT_MIN_AREA: u32 = 40;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
pub const DEFAULT_BOX_THICKNESS: u32 = 2;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            box_thickness: DEFAULT_BOX_THICKNESS,
            bulk_workers: default_workers(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Missing variables
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let min_area = optional_parse(&lookup, "DESIGNDIFF_MIN_AREA")?.unwrap_or(defaults.min_area);

        let jpeg_quality: u8 =
            optional_parse(&lookup, "DESIGNDIFF_JPEG_QUALITY")?.unwrap_or(defaults.jpeg_quality);
        if !(1..=100).contains(&jpeg_quality) {
            return Err(invalid(
                "DESIGNDIFF_JPEG_QUALITY",
                &jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }

        let box_thickness: u32 =
            optional_parse(&lookup, "DESIGNDIFF_BOX_THICKNESS")?.unwrap_or(defaults.box_thickness);
        if box_thickness == 0 {
            return Err(invalid("DESIGNDIFF_BOX_THICKNESS", "0", "must be at least 1"));
        }

        let bulk_workers: usize =
            optional_parse(&lookup, "DESIGNDIFF_BULK_WORKERS")?.unwrap_or(defaults.bulk_workers);
        if bulk_workers == 0 {
            return Err(invalid("DESIGNDIFF_BULK_WORKERS", "0", "must be at least 1"));
        }

        Ok(EngineConfig {
            min_area,
            jpeg_quality,
            box_thickness,
            bulk_workers,
        })
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn optional_parse<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, &raw, &e.to_string())),
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.into(),
        value: value.into(),
        reason: reason.into(),
    }
}
