//! Trajectory ingestion and region labelling.
//!
//! Provider fixes arrive as loosely-typed [`RawFix`] records. [`Trajectory`]
//! validates them, drops the malformed ones, and re-sorts by timestamp, so
//! every downstream computation sees a strictly time-ordered sequence.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::regions::RegionIndex;
use crate::time::{self, AnalysisWindow};
use crate::{Fix, GpsPoint};

/// Timestamp as delivered by a track provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    /// Unix seconds
    Unix(i64),
    /// Unix seconds with a fractional part (truncated)
    Fractional(f64),
    /// `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339
    Text(String),
}

impl TimeValue {
    fn to_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeValue::Unix(secs) => time::from_unix_seconds(*secs),
            TimeValue::Fractional(secs) if secs.is_finite() => {
                time::from_unix_seconds(secs.trunc() as i64)
            }
            TimeValue::Fractional(_) => None,
            TimeValue::Text(text) => time::parse_timestamp(text),
        }
    }
}

/// An unvalidated fix as delivered by a track provider.
///
/// Field names accept both the long form and the provider's short keys
/// (`t`, `lat`, `lon`, `spd`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    #[serde(default, alias = "t", alias = "time")]
    pub timestamp: Option<TimeValue>,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng")]
    pub longitude: Option<f64>,
    /// Missing speed is read as 0 (stationary).
    #[serde(default, alias = "spd")]
    pub speed: Option<f64>,
}

impl RawFix {
    /// Validate into a [`Fix`] for `entity_id`.
    pub fn validate(&self, entity_id: &str) -> Result<Fix> {
        let malformed = |reason: &str| TrackError::MalformedFix {
            entity_id: entity_id.to_string(),
            reason: reason.to_string(),
        };

        let timestamp = self
            .timestamp
            .as_ref()
            .ok_or_else(|| malformed("missing timestamp"))?
            .to_instant()
            .ok_or_else(|| malformed("unparseable timestamp"))?;

        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(malformed("missing coordinates")),
        };
        if !GpsPoint::new(latitude, longitude).is_valid() {
            return Err(malformed("non-finite or out-of-range coordinates"));
        }

        let speed = self.speed.unwrap_or(0.0);
        if !speed.is_finite() {
            return Err(malformed("non-finite speed"));
        }

        Ok(Fix {
            entity_id: entity_id.to_string(),
            timestamp,
            latitude,
            longitude,
            speed,
        })
    }
}

/// A validated, strictly time-ordered sequence of fixes for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    entity_id: String,
    fixes: Vec<Fix>,
}

impl Trajectory {
    /// Build a trajectory from validated fixes.
    ///
    /// Fixes with invalid coordinates are dropped, the rest are stably sorted
    /// by timestamp, and any fix repeating an earlier timestamp is removed
    /// (the first one wins).
    pub fn new(entity_id: impl Into<String>, mut fixes: Vec<Fix>) -> Self {
        let entity_id = entity_id.into();
        let total = fixes.len();

        fixes.retain(|f| f.point().is_valid() && f.speed.is_finite());
        let valid = fixes.len();

        fixes.sort_by_key(|f| f.timestamp);
        fixes.dedup_by_key(|f| f.timestamp);

        if fixes.len() != total {
            debug!(
                "[Trajectory] {}: kept {} of {} fixes ({} invalid, {} duplicate timestamps)",
                entity_id,
                fixes.len(),
                total,
                total - valid,
                valid - fixes.len()
            );
        }

        Self { entity_id, fixes }
    }

    /// Validate provider fixes, dropping malformed ones.
    pub fn from_raw(entity_id: impl Into<String>, raw: &[RawFix]) -> Self {
        let entity_id = entity_id.into();
        let mut fixes = Vec::with_capacity(raw.len());

        for fix in raw {
            match fix.validate(&entity_id) {
                Ok(f) => fixes.push(f),
                Err(e) => debug!("[Trajectory] dropping fix: {}", e),
            }
        }

        Self::new(entity_id, fixes)
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Fixes in strictly increasing timestamp order.
    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn first(&self) -> Option<&Fix> {
        self.fixes.first()
    }

    pub fn last(&self) -> Option<&Fix> {
        self.fixes.last()
    }

    /// The fixes falling inside `window`.
    pub fn within(&self, window: &AnalysisWindow) -> Trajectory {
        Trajectory {
            entity_id: self.entity_id.clone(),
            fixes: self
                .fixes
                .iter()
                .filter(|f| window.contains(f.timestamp))
                .cloned()
                .collect(),
        }
    }

    /// Positions only, for distance calculations.
    pub fn points(&self) -> Vec<GpsPoint> {
        self.fixes.iter().map(Fix::point).collect()
    }

    /// Label every fix with the region containing it.
    pub fn label<'a>(&'a self, index: &'a RegionIndex) -> Vec<LabeledFix<'a>> {
        label_fixes(index, &self.fixes)
    }
}

/// A fix together with the name of the region containing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledFix<'a> {
    pub fix: &'a Fix,
    /// `None` when the fix is outside every region.
    pub region: Option<&'a str>,
}

/// Label each fix in order using the region index.
pub fn label_fixes<'a>(index: &'a RegionIndex, fixes: &'a [Fix]) -> Vec<LabeledFix<'a>> {
    fixes
        .iter()
        .map(|fix| LabeledFix {
            fix,
            region: index.label(&fix.point()),
        })
        .collect()
}
