use std::fmt;

use serde::{Deserialize, Serialize};

/// A duration broken into display components.
///
/// Built with truncating division, so sub-second precision from the
/// predictor is dropped rather than rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hms {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Hms {
    pub fn from_seconds(total: f64) -> Self {
        let total = total.max(0.0) as u64;
        Self {
            hours: (total / 3600) as u32,
            minutes: ((total % 3600) / 60) as u32,
            seconds: (total % 60) as u32,
        }
    }
}

impl fmt::Display for Hms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

/// Parse a human-entered time string into total seconds.
///
/// Two `:`-separated parts are minutes:seconds, three are
/// hours:minutes:seconds; anything else is rejected. Returns `None` rather
/// than an error so callers validating several fields can keep scanning.
/// Out-of-range components (e.g. 75 seconds) are accepted as-is since the
/// upstream text may be loosely formatted, but a total that does not fit
/// in `u32` is rejected.
pub fn parse_hms(text: &str) -> Option<u32> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [m, s] => (0u32, parse_part(m)?, parse_part(s)?),
        [h, m, s] => (parse_part(h)?, parse_part(m)?, parse_part(s)?),
        _ => return None,
    };
    h.checked_mul(3600)?
        .checked_add(m.checked_mul(60)?)?
        .checked_add(s)
}

fn parse_part(part: &str) -> Option<u32> {
    part.trim().parse::<u32>().ok()
}
