//! METAR weather-code classification.
//!
//! Maps raw present-weather strings (e.g. `"-TSRA"`) to a [`WeatherCategory`]
//! and an estimated precipitation amount, plus a cloud-cover fallback that
//! scans the raw report for sky-condition tokens. All rules are fixed-priority
//! substring tests; every fallback to `Clear`/`0.0` is a documented default,
//! not an inferred guess.

use crate::model::WeatherCategory;

const SNOW_CODES: [&str; 5] = ["SN", "SG", "IC", "PL", "GS"];
const RAIN_CODES: [&str; 5] = ["RA", "DZ", "GR", "SH", "UP"];
const OBSCURATION_CODES: [&str; 12] = [
    "FG", "BR", "HZ", "DU", "SA", "FU", "VA", "PO", "SQ", "FC", "SS", "DS",
];

fn contains_any(code: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| code.contains(n))
}

/// Classify a raw METAR present-weather code.
///
/// First match wins, in fixed priority order: thunderstorm, snow family,
/// rain family, obscuration family. Empty or unrecognized codes default to
/// `Clear`.
pub fn classify_metar_text(code: &str) -> WeatherCategory {
    if code.is_empty() {
        return WeatherCategory::Clear;
    }

    let code = code.to_uppercase();

    if code.contains("TS") {
        return WeatherCategory::Thunderstorm;
    }
    if contains_any(&code, &SNOW_CODES) {
        return WeatherCategory::Snow;
    }
    if contains_any(&code, &RAIN_CODES) {
        return WeatherCategory::Rain;
    }
    if contains_any(&code, &OBSCURATION_CODES) {
        return WeatherCategory::FogMist;
    }

    WeatherCategory::Clear
}

/// Estimate precipitation in millimeters from a METAR present-weather code.
///
/// A fixed lookup keyed by condition family and intensity flag: `-` marks
/// light, `+` heavy, neither means moderate. Thunderstorm dominates showers,
/// showers dominate plain rain, and so on down the table. Obscurations and
/// unmatched codes yield 0.
pub fn estimate_precipitation_mm(code: &str) -> f64 {
    if code.is_empty() {
        return 0.0;
    }

    let code = code.to_uppercase();

    let is_light = code.contains('-');
    let is_heavy = code.contains('+');
    let pick = |light: f64, moderate: f64, heavy: f64| {
        if is_light {
            light
        } else if is_heavy {
            heavy
        } else {
            moderate
        }
    };

    if code.contains("TS") {
        return pick(5.0, 10.0, 15.0);
    }
    if code.contains("SH") {
        return pick(1.0, 3.0, 8.0);
    }
    if code.contains("RA") || code.contains("DZ") {
        return pick(0.5, 2.0, 4.0);
    }
    if contains_any(&code, &SNOW_CODES) {
        // Water equivalent, not snow depth.
        return pick(0.2, 0.8, 2.0);
    }
    if code.contains("GR") {
        return pick(1.0, 4.0, 10.0);
    }

    0.0
}

/// Derive cloud cover from the raw METAR report's sky-condition tokens.
///
/// Many reports mark sky condition separately from the present-weather code,
/// so this runs as a fallback when classification yields `Clear`. An `OVC`
/// token, or a `BKN` token with a numeric altitude below 80 (hundreds of
/// feet), forces `Clouds`; other `BKN` tokens and any `FEW`/`SCT` token force
/// `PartialClouds`.
pub fn classify_cloud_cover(raw_report: &str) -> WeatherCategory {
    let mut category = WeatherCategory::Clear;

    for token in raw_report.split(' ') {
        if token.contains("OVC") || token.contains("BKN") {
            match bkn_altitude(token) {
                Some(altitude) if altitude < 80 => return WeatherCategory::Clouds,
                Some(_) => category = WeatherCategory::PartialClouds,
                None => return WeatherCategory::Clouds,
            }
        }
        if token.contains("FEW") || token.contains("SCT") {
            category = WeatherCategory::PartialClouds;
        }
    }

    category
}

/// Altitude of a `BKN<digits>` token, or `None` if the token has any other
/// shape (including bare `OVC`/`BKN` groups).
fn bkn_altitude(token: &str) -> Option<u32> {
    let rest = token.strip_prefix("BKN")?;
    if rest.is_empty() {
        return None;
    }
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunderstorm_beats_rain() {
        // "TSRA" contains both TS and RA; priority order must pick thunder.
        assert_eq!(classify_metar_text("TSRA"), WeatherCategory::Thunderstorm);
        assert_eq!(classify_metar_text("+TSRA"), WeatherCategory::Thunderstorm);
    }

    #[test]
    fn snow_beats_rain() {
        // SHSN contains both SH (rain family) and SN (snow family).
        assert_eq!(classify_metar_text("SHSN"), WeatherCategory::Snow);
    }

    #[test]
    fn classification_families() {
        assert_eq!(classify_metar_text("RA"), WeatherCategory::Rain);
        assert_eq!(classify_metar_text("-DZ"), WeatherCategory::Rain);
        assert_eq!(classify_metar_text("SG"), WeatherCategory::Snow);
        assert_eq!(classify_metar_text("BR"), WeatherCategory::FogMist);
        assert_eq!(classify_metar_text("FZFG"), WeatherCategory::FogMist);
        assert_eq!(classify_metar_text(""), WeatherCategory::Clear);
        assert_eq!(classify_metar_text("XX"), WeatherCategory::Clear);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify_metar_text("tsra"), WeatherCategory::Thunderstorm);
        assert_eq!(classify_metar_text("sn"), WeatherCategory::Snow);
    }

    #[test]
    fn precipitation_estimates() {
        assert_eq!(estimate_precipitation_mm("-RA"), 0.5);
        assert_eq!(estimate_precipitation_mm("RA"), 2.0);
        assert_eq!(estimate_precipitation_mm("+RA"), 4.0);

        // Thunderstorm family dominates the rain suffix.
        assert_eq!(estimate_precipitation_mm("+TSRA"), 15.0);
        assert_eq!(estimate_precipitation_mm("-TSRA"), 5.0);
        assert_eq!(estimate_precipitation_mm("TS"), 10.0);

        assert_eq!(estimate_precipitation_mm("SHRA"), 3.0);
        assert_eq!(estimate_precipitation_mm("-SN"), 0.2);
        assert_eq!(estimate_precipitation_mm("GR"), 4.0);
        assert_eq!(estimate_precipitation_mm("FG"), 0.0);
        assert_eq!(estimate_precipitation_mm(""), 0.0);
        assert_eq!(estimate_precipitation_mm("XX"), 0.0);
    }

    #[test]
    fn cloud_cover_overcast_forces_clouds() {
        let raw = "LQSA 011200Z 27008KT 9999 OVC040 18/12 Q1018";
        assert_eq!(classify_cloud_cover(raw), WeatherCategory::Clouds);
    }

    #[test]
    fn cloud_cover_broken_altitude_threshold() {
        // BKN below 8000 ft counts as full cloud cover.
        assert_eq!(
            classify_cloud_cover("LQSA 011200Z BKN079 18/12"),
            WeatherCategory::Clouds
        );
        // At or above the threshold it is only partial.
        assert_eq!(
            classify_cloud_cover("LQSA 011200Z BKN080 18/12"),
            WeatherCategory::PartialClouds
        );
    }

    #[test]
    fn cloud_cover_bare_broken_group_forces_clouds() {
        // BKN with no numeric altitude cannot be checked against the
        // threshold, so it is treated as full cover.
        assert_eq!(classify_cloud_cover("BKN 18/12"), WeatherCategory::Clouds);
    }

    #[test]
    fn cloud_cover_few_and_scattered() {
        assert_eq!(
            classify_cloud_cover("LQSA 011200Z FEW020 18/12"),
            WeatherCategory::PartialClouds
        );
        assert_eq!(
            classify_cloud_cover("LQSA 011200Z SCT035 18/12"),
            WeatherCategory::PartialClouds
        );
    }

    #[test]
    fn cloud_cover_clear_when_no_sky_tokens() {
        assert_eq!(
            classify_cloud_cover("LQSA 011200Z 27008KT CAVOK 18/12"),
            WeatherCategory::Clear
        );
        assert_eq!(classify_cloud_cover(""), WeatherCategory::Clear);
    }
}
