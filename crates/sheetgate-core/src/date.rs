//! Serial date conversion
//!
//! Spreadsheets store dates as day counts with the time of day in the fraction.
//! Two epochs exist; the 1900 system also counts the non-existent 1900-02-29.

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MS_PER_DAY: i64 = 86_400_000;

/// Last serial representable in either system (9999-12-31 in the 1900 system)
const MAX_SERIAL: f64 = 2_958_466.0;

/// Epoch used to interpret serial date numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateSystem {
    /// Serial 1 is 1900-01-01 (the common default)
    #[default]
    V1900,
    /// Serial 0 is 1904-01-01 (`workbookPr date1904="1"`)
    V1904,
}

impl DateSystem {
    /// Convert a serial number to a date and time, rounded to the millisecond
    ///
    /// Returns `None` for negative or out-of-range serials and for the phantom
    /// 1900-02-29 (serial 60).
    pub fn serial_to_datetime(self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL {
            return None;
        }

        let total_ms = (serial * MS_PER_DAY as f64).round() as i64;
        let mut days = total_ms.div_euclid(MS_PER_DAY);
        let ms = total_ms.rem_euclid(MS_PER_DAY);

        let epoch = match self {
            DateSystem::V1900 => {
                if days == 60 {
                    return None;
                }
                if days > 60 {
                    days -= 1;
                }
                NaiveDate::from_ymd_opt(1899, 12, 31)?
            }
            DateSystem::V1904 => NaiveDate::from_ymd_opt(1904, 1, 1)?,
        };

        epoch
            .and_hms_opt(0, 0, 0)?
            .checked_add_signed(Duration::days(days))?
            .checked_add_signed(Duration::milliseconds(ms))
    }

    /// Convert a date and time to a serial number
    pub fn datetime_to_serial(self, value: NaiveDateTime) -> Option<f64> {
        let (epoch, skip_phantom) = match self {
            DateSystem::V1900 => (NaiveDate::from_ymd_opt(1899, 12, 31)?, true),
            DateSystem::V1904 => (NaiveDate::from_ymd_opt(1904, 1, 1)?, false),
        };

        let elapsed = value.signed_duration_since(epoch.and_hms_opt(0, 0, 0)?);
        let mut days = elapsed.num_days();
        if days < 0 {
            return None;
        }
        if skip_phantom && days >= 60 {
            days += 1;
        }

        let ms = elapsed.num_milliseconds() - elapsed.num_days() * MS_PER_DAY;
        Some(days as f64 + ms as f64 / MS_PER_DAY as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_1900_system_known_serials() {
        let sys = DateSystem::V1900;
        assert_eq!(sys.serial_to_datetime(1.0), Some(date(1900, 1, 1)));
        assert_eq!(sys.serial_to_datetime(59.0), Some(date(1900, 2, 28)));
        assert_eq!(sys.serial_to_datetime(60.0), None);
        assert_eq!(sys.serial_to_datetime(61.0), Some(date(1900, 3, 1)));
        assert_eq!(sys.serial_to_datetime(45292.0), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_time_fraction() {
        let value = DateSystem::V1900.serial_to_datetime(45292.75).unwrap();
        assert_eq!(value.to_string(), "2024-01-01 18:00:00");
    }

    #[test]
    fn test_1904_system() {
        let sys = DateSystem::V1904;
        assert_eq!(sys.serial_to_datetime(0.0), Some(date(1904, 1, 1)));
        assert_eq!(sys.serial_to_datetime(43830.0), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_serial_roundtrip() {
        for sys in [DateSystem::V1900, DateSystem::V1904] {
            let value = date(2023, 7, 14);
            let serial = sys.datetime_to_serial(value).unwrap();
            assert_eq!(sys.serial_to_datetime(serial), Some(value));
        }
        assert_eq!(DateSystem::V1900.datetime_to_serial(date(1900, 3, 1)), Some(61.0));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(DateSystem::V1900.serial_to_datetime(-1.0), None);
        assert_eq!(DateSystem::V1900.serial_to_datetime(f64::NAN), None);
        assert_eq!(DateSystem::V1900.serial_to_datetime(3_000_000.0), None);
    }
}
