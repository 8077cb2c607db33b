pub mod prayer;

pub use prayer::{PrayerDay, PrayerName, PrayerStatus, TimePoint};
