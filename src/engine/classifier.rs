use crate::config::severity_thresholds;
use crate::types::{Change, SeverityBucket};

/// Slack for f64 noise in a computed ratio: `110.0 / 100.0 - 1.0` is
/// `0.10000000000000009` and must still count as exactly 10%.
const FLOAT_TOLERANCE: f64 = 1e-12;

/// Glyph rendered after each bucket's percent figure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketGlyphs {
    pub big_drop: String,
    pub small_drop: String,
    pub neutral: String,
    pub small_rise: String,
    pub big_rise: String,
}

impl Default for BucketGlyphs {
    fn default() -> Self {
        Self {
            big_drop: SeverityBucket::BigDrop.glyph().to_string(),
            small_drop: SeverityBucket::SmallDrop.glyph().to_string(),
            neutral: SeverityBucket::Neutral.glyph().to_string(),
            small_rise: SeverityBucket::SmallRise.glyph().to_string(),
            big_rise: SeverityBucket::BigRise.glyph().to_string(),
        }
    }
}

impl BucketGlyphs {
    /// Glyphs in bucket order, from big drop to big rise.
    pub fn from_ordered(glyphs: [String; 5]) -> Self {
        let [big_drop, small_drop, neutral, small_rise, big_rise] = glyphs;
        Self {
            big_drop,
            small_drop,
            neutral,
            small_rise,
            big_rise,
        }
    }

    pub fn get(&self, bucket: SeverityBucket) -> &str {
        match bucket {
            SeverityBucket::BigDrop => &self.big_drop,
            SeverityBucket::SmallDrop => &self.small_drop,
            SeverityBucket::Neutral => &self.neutral,
            SeverityBucket::SmallRise => &self.small_rise,
            SeverityBucket::BigRise => &self.big_rise,
        }
    }
}

/// Bucket thresholds as fractions, plus the glyph shown for each bucket.
/// The small-move bounds are inclusive, the big-move bounds exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityScale {
    pub big_drop_below: f64,
    pub small_drop_from: f64,
    pub small_rise_from: f64,
    pub big_rise_above: f64,
    pub glyphs: BucketGlyphs,
}

impl Default for SeverityScale {
    fn default() -> Self {
        Self {
            big_drop_below: severity_thresholds::BIG_DROP_BELOW,
            small_drop_from: severity_thresholds::SMALL_DROP_FROM,
            small_rise_from: severity_thresholds::SMALL_RISE_FROM,
            big_rise_above: severity_thresholds::BIG_RISE_ABOVE,
            glyphs: BucketGlyphs::default(),
        }
    }
}

/// Either a real bucket or the distinguished no-data state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Bucket(SeverityBucket),
    NoData,
}

impl Classification {
    pub fn bucket(self) -> Option<SeverityBucket> {
        match self {
            Classification::Bucket(b) => Some(b),
            Classification::NoData => None,
        }
    }
}

impl SeverityScale {
    /// Thresholds mirrored around zero: +/-`small` inclusive, +/-`big` exclusive.
    pub fn symmetric(small: f64, big: f64) -> Self {
        Self {
            big_drop_below: -big,
            small_drop_from: -small,
            small_rise_from: small,
            big_rise_above: big,
            glyphs: BucketGlyphs::default(),
        }
    }

    pub fn with_glyphs(mut self, glyphs: BucketGlyphs) -> Self {
        self.glyphs = glyphs;
        self
    }

    pub fn glyph(&self, bucket: SeverityBucket) -> &str {
        self.glyphs.get(bucket)
    }

    /// Classify a change given as a fraction. `None` only for NaN.
    ///
    /// Thresholds are compared against the raw value, widened by `FLOAT_TOLERANCE`
    /// so float noise never pushes a value on a bound across it.
    pub fn classify(&self, change: f64) -> Option<SeverityBucket> {
        if change.is_nan() {
            return None;
        }
        let v = change;
        let bucket = if v < self.big_drop_below - FLOAT_TOLERANCE {
            SeverityBucket::BigDrop
        } else if v <= self.small_drop_from + FLOAT_TOLERANCE {
            SeverityBucket::SmallDrop
        } else if v < self.small_rise_from - FLOAT_TOLERANCE {
            SeverityBucket::Neutral
        } else if v <= self.big_rise_above + FLOAT_TOLERANCE {
            SeverityBucket::SmallRise
        } else {
            SeverityBucket::BigRise
        };
        Some(bucket)
    }

    /// Absent changes map to `NoData`, never to `Neutral`.
    pub fn classify_change(&self, change: &Change) -> Classification {
        match change.value().and_then(|v| self.classify(v)) {
            Some(bucket) => Classification::Bucket(bucket),
            None => Classification::NoData,
        }
    }
}

/// Rounds a fraction to the nearest tenth of a percent, the precision changes are printed at.
pub fn quantize(change: f64) -> f64 {
    if change.is_finite() {
        (change * 1000.0).round() / 1000.0
    } else {
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MissingReason;

    #[test]
    fn representative_values_land_in_each_bucket() {
        let scale = SeverityScale::default();
        let cases = [
            (-0.25, SeverityBucket::BigDrop),
            (-0.05, SeverityBucket::SmallDrop),
            (0.002, SeverityBucket::Neutral),
            (0.05, SeverityBucket::SmallRise),
            (0.25, SeverityBucket::BigRise),
        ];
        for (v, expected) in cases {
            assert_eq!(scale.classify(v), Some(expected), "v={v}");
            // Classifying again is stable.
            assert_eq!(scale.classify(v), scale.classify(v));
        }
    }

    #[test]
    fn boundaries_are_inclusive_for_small_moves() {
        let scale = SeverityScale::default();
        assert_eq!(scale.classify(-0.10), Some(SeverityBucket::SmallDrop));
        assert_eq!(scale.classify(-0.01), Some(SeverityBucket::SmallDrop));
        assert_eq!(scale.classify(0.01), Some(SeverityBucket::SmallRise));
        assert_eq!(scale.classify(0.10), Some(SeverityBucket::SmallRise));
        assert_eq!(scale.classify(-0.101), Some(SeverityBucket::BigDrop));
        assert_eq!(scale.classify(0.101), Some(SeverityBucket::BigRise));
        assert_eq!(scale.classify(-0.009), Some(SeverityBucket::Neutral));
        assert_eq!(scale.classify(0.009), Some(SeverityBucket::Neutral));
    }

    #[test]
    fn values_just_past_a_threshold_are_not_rounded_back() {
        let scale = SeverityScale::default();
        assert_eq!(scale.classify(0.0096), Some(SeverityBucket::Neutral));
        assert_eq!(scale.classify(-0.0096), Some(SeverityBucket::Neutral));
        assert_eq!(scale.classify(0.1004), Some(SeverityBucket::BigRise));
        assert_eq!(scale.classify(-0.1004), Some(SeverityBucket::BigDrop));
        assert_eq!(scale.classify(0.0099999), Some(SeverityBucket::Neutral));
        assert_eq!(scale.classify(0.1000001), Some(SeverityBucket::BigRise));
    }

    #[test]
    fn computed_one_percent_moves_are_small() {
        let scale = SeverityScale::default();
        assert_eq!(scale.classify(101.0 / 100.0 - 1.0), Some(SeverityBucket::SmallRise));
        assert_eq!(scale.classify(99.0 / 100.0 - 1.0), Some(SeverityBucket::SmallDrop));
        assert_eq!(scale.classify(90.0 / 100.0 - 1.0), Some(SeverityBucket::SmallDrop));
    }

    #[test]
    fn glyphs_default_to_bucket_glyphs_and_can_be_replaced() {
        let scale = SeverityScale::default();
        assert_eq!(scale.glyph(SeverityBucket::BigRise), "🚀");
        assert_eq!(scale.glyph(SeverityBucket::Neutral), "");

        let custom = BucketGlyphs::from_ordered(["--", "-", "=", "+", "++"].map(String::from));
        let scale = SeverityScale::default().with_glyphs(custom);
        assert_eq!(scale.glyph(SeverityBucket::BigDrop), "--");
        assert_eq!(scale.glyph(SeverityBucket::Neutral), "=");
        assert_eq!(scale.glyph(SeverityBucket::BigRise), "++");
    }

    #[test]
    fn computed_ten_percent_is_a_small_rise() {
        let scale = SeverityScale::default();
        let v = 110.0 / 100.0 - 1.0;
        assert!(v > 0.10);
        assert_eq!(scale.classify(v), Some(SeverityBucket::SmallRise));
    }

    #[test]
    fn fifteen_percent_drop_is_big() {
        let scale = SeverityScale::default();
        let v = 85.0 / 100.0 - 1.0;
        assert_eq!(scale.classify(v), Some(SeverityBucket::BigDrop));
        assert_eq!(SeverityBucket::BigDrop.glyph(), "📉");
    }

    #[test]
    fn absent_is_no_data_not_neutral() {
        let scale = SeverityScale::default();
        let missing = Change::Missing(MissingReason::InsufficientHistory { available_rows: 3 });
        assert_eq!(scale.classify_change(&missing), Classification::NoData);
        assert_eq!(
            scale.classify_change(&Change::Value(0.0)),
            Classification::Bucket(SeverityBucket::Neutral)
        );
        assert_eq!(scale.classify(f64::NAN), None);
    }

    #[test]
    fn symmetric_scale_overrides_defaults() {
        let scale = SeverityScale::symmetric(0.02, 0.05);
        assert_eq!(scale.classify(0.015), Some(SeverityBucket::Neutral));
        assert_eq!(scale.classify(0.05), Some(SeverityBucket::SmallRise));
        assert_eq!(scale.classify(-0.06), Some(SeverityBucket::BigDrop));
        assert_eq!(SeverityScale::symmetric(0.01, 0.10), SeverityScale::default());
    }
}
