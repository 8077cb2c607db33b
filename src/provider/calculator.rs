use anyhow::{Result, anyhow};
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use salah::prelude::*;

use crate::models::PrayerName;
use crate::provider::{ProviderError, TimeProvider};

/// Offline astronomical provider: computes the day's times from coordinates
/// and a calculation policy, no network involved.
pub struct SalahProvider {
    pub lat: f64,
    pub lng: f64,
    pub method_str: String,
    pub madhab_str: String,
    pub tz_offset_minutes: i32,
}

impl SalahProvider {
    pub fn from_config(cfg: &crate::config::settings::SalahConfig) -> Result<Self> {
        Self::new(
            cfg.latitude,
            cfg.longitude,
            &cfg.calc_method,
            &cfg.madhab,
            cfg.timezone_offset,
        )
    }

    pub fn new(
        lat: f64,
        lng: f64,
        method: &str,
        madhab: &str,
        tz_offset_minutes: i32,
    ) -> Result<Self> {
        // Validate method + madhab early
        parse_method(method)?;
        parse_madhab(madhab)?;
        Ok(Self {
            lat,
            lng,
            method_str: method.to_string(),
            madhab_str: madhab.to_string(),
            tz_offset_minutes,
        })
    }

}

impl TimeProvider for SalahProvider {
    fn times_for(&self, date: NaiveDate) -> Result<Vec<(PrayerName, NaiveTime)>, ProviderError> {
        log::debug!(
            "computing times for {} at ({}, {})",
            date,
            self.lat,
            self.lng
        );

        let coords = Coordinates::new(self.lat, self.lng);
        let method = parse_method(&self.method_str)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let madhab = parse_madhab(&self.madhab_str)
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| ProviderError::Unavailable(format!("prayer calculation failed: {}", e)))?;

        let offset = FixedOffset::east_opt(self.tz_offset_minutes * 60).ok_or_else(|| {
            ProviderError::Malformed(format!("invalid timezone offset: {}", self.tz_offset_minutes))
        })?;

        let to_local = |utc: chrono::DateTime<chrono::Utc>| -> NaiveTime {
            utc.with_timezone(&offset).time()
        };

        Ok(vec![
            (PrayerName::Fajr, to_local(times.time(Prayer::Fajr))),
            (PrayerName::Sunrise, to_local(times.time(Prayer::Sunrise))),
            (PrayerName::Dhuhr, to_local(times.time(Prayer::Dhuhr))),
            (PrayerName::Asr, to_local(times.time(Prayer::Asr))),
            (PrayerName::Maghrib, to_local(times.time(Prayer::Maghrib))),
            (PrayerName::Isha, to_local(times.time(Prayer::Isha))),
        ])
    }
}

fn parse_method(s: &str) -> Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(anyhow!("Unknown calculation method: '{}'", s)),
    }
}

fn parse_madhab(s: &str) -> Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(anyhow!("Unknown madhab: '{}'", s)),
    }
}

pub const CALC_METHODS: &[&str] = &[
    "MuslimWorldLeague",
    "Egyptian",
    "Karachi",
    "UmmAlQura",
    "Dubai",
    "MoonsightingCommittee",
    "NorthAmerica",
    "Kuwait",
    "Qatar",
    "Singapore",
    "Tehran",
    "Turkey",
    "Other",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_method_up_front() {
        assert!(SalahProvider::new(33.69, 73.06, "MoonPhase", "Hanafi", 300).is_err());
        assert!(SalahProvider::new(33.69, 73.06, "Karachi", "Zahiri", 300).is_err());
        assert!(SalahProvider::new(33.69, 73.06, "Karachi", "Hanafi", 300).is_ok());
    }

    #[test]
    fn malformed_policy_token_is_classified() {
        let provider = SalahProvider {
            lat: 33.69,
            lng: 73.06,
            method_str: "MoonPhase".to_string(),
            madhab_str: "Hanafi".to_string(),
            tz_offset_minutes: 300,
        };
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        assert!(matches!(
            provider.times_for(date),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn returns_all_six_points_in_order() {
        let provider = SalahProvider::new(33.6938, 73.0651, "Karachi", "Hanafi", 300).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        let times = provider.times_for(date).unwrap();

        let names: Vec<PrayerName> = times.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, PrayerName::all());
        // Chronological within the day.
        assert!(times.windows(2).all(|w| w[0].1 < w[1].1));
    }
}
