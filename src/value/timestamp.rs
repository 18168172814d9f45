//! Timestamps with an optional named timezone
//!
//! A timestamp is a wall-clock reading plus, optionally, the IANA zone it was
//! taken in. Many storage engines keep only the wall clock, so "naive" is a
//! first-class state rather than an error.
//!
//! Text form (used for serialized fields and text columns):
//! - naive: `2024-03-01T10:15:00.250`
//! - zoned: `2024-03-01T10:15:00.250[America/Los_Angeles]`

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Parses an IANA timezone identifier such as `UTC` or `Europe/Paris`.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok()
}

/// A wall-clock timestamp, optionally bound to a timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    local: NaiveDateTime,
    zone: Option<Tz>,
}

impl Timestamp {
    /// Creates a timestamp without timezone information.
    pub fn naive(local: NaiveDateTime) -> Self {
        Self { local, zone: None }
    }

    /// Creates a timestamp whose wall clock is read in `zone`.
    pub fn zoned(local: NaiveDateTime, zone: Tz) -> Self {
        Self {
            local,
            zone: Some(zone),
        }
    }

    /// Creates a zoned timestamp from a chrono datetime.
    pub fn from_datetime(datetime: DateTime<Tz>) -> Self {
        Self::zoned(datetime.naive_local(), datetime.timezone())
    }

    /// Current time in the given zone.
    pub fn now_in(zone: Tz) -> Self {
        Self::from_datetime(Utc::now().with_timezone(&zone))
    }

    /// Current UTC wall clock without timezone information.
    pub fn now_naive() -> Self {
        Self::naive(Utc::now().naive_utc())
    }

    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn zone(&self) -> Option<Tz> {
        self.zone
    }

    pub fn is_naive(&self) -> bool {
        self.zone.is_none()
    }

    /// Returns the same wall clock bound to `zone`.
    pub fn with_zone(self, zone: Tz) -> Self {
        Self::zoned(self.local, zone)
    }

    /// Returns the wall clock with the zone dropped.
    pub fn without_zone(self) -> Self {
        Self::naive(self.local)
    }

    /// Resolves to a chrono datetime when the timestamp is zoned and the
    /// wall clock is unambiguous in that zone.
    pub fn to_datetime(&self) -> Option<DateTime<Tz>> {
        let zone = self.zone?;
        zone.from_local_datetime(&self.local).single()
    }

    /// Wall clock only, as stored by engines without offset support.
    pub fn wall_clock_text(&self) -> String {
        self.local.format(WALL_CLOCK_FORMAT).to_string()
    }

    /// Lossless text form including the zone name.
    pub fn to_text(&self) -> String {
        match self.zone {
            Some(zone) => format!("{}[{}]", self.wall_clock_text(), zone.name()),
            None => self.wall_clock_text(),
        }
    }

    /// Parses the text form produced by [`Timestamp::to_text`].
    pub fn from_text(text: &str) -> Result<Self, String> {
        let (clock, zone) = match text.strip_suffix(']') {
            Some(rest) => {
                let (clock, zone_name) = rest
                    .split_once('[')
                    .ok_or_else(|| format!("malformed timestamp '{}'", text))?;
                let zone = parse_timezone(zone_name)
                    .ok_or_else(|| format!("unknown timezone '{}'", zone_name))?;
                (clock, Some(zone))
            }
            None => (text, None),
        };

        let local = NaiveDateTime::parse_from_str(clock, WALL_CLOCK_FORMAT)
            .map_err(|e| format!("malformed timestamp '{}': {}", text, e))?;

        Ok(Self { local, zone })
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local
            .cmp(&other.local)
            .then_with(|| self.zone.map(|z| z.name()).cmp(&other.zone.map(|z| z.name())))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<DateTime<Tz>> for Timestamp {
    fn from(datetime: DateTime<Tz>) -> Self {
        Self::from_datetime(datetime)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(local: NaiveDateTime) -> Self {
        Self::naive(local)
    }
}
