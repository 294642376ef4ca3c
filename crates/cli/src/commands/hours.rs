//! Opening-hours evaluation.

use chrono::Utc;
use matzip_core::hours::{BusinessHours, kst_minute_of_day, parse_time_to_minutes};

use super::{CommandError, write_line};

/// Stored hours of one restaurant.
#[derive(Debug, Default)]
pub struct HoursArgs {
    pub open: Option<String>,
    pub close: Option<String>,
    pub break_start: Option<String>,
    pub break_end: Option<String>,
}

impl HoursArgs {
    fn business_hours(&self) -> BusinessHours<'_> {
        BusinessHours::from_options(
            self.open.as_ref(),
            self.close.as_ref(),
            self.break_start.as_ref(),
            self.break_end.as_ref(),
        )
    }
}

/// `open` or `closed` at the KST time `at`.
fn evaluate(args: &HoursArgs, at: Option<&str>) -> Result<&'static str, CommandError> {
    let minute = match at {
        Some(raw) => parse_time_to_minutes(raw)
            .filter(|m| *m < 24 * 60)
            .ok_or_else(|| CommandError::Invalid(format!("time '{raw}'")))?,
        None => kst_minute_of_day(Utc::now()),
    };
    Ok(if args.business_hours().is_open_at(minute) {
        "open"
    } else {
        "closed"
    })
}

/// Print `open` or `closed`.
///
/// # Errors
///
/// Returns `CommandError::Invalid` if `at` is not a time of day.
pub fn check(args: &HoursArgs, at: Option<&str>) -> Result<(), CommandError> {
    write_line(evaluate(args, at)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hours(open: &str, close: &str) -> HoursArgs {
        HoursArgs {
            open: Some(open.to_string()),
            close: Some(close.to_string()),
            ..HoursArgs::default()
        }
    }

    #[test]
    fn test_overnight_hours() {
        let args = hours("22:00:00", "02:00:00");
        assert_eq!(evaluate(&args, Some("23:30")).unwrap(), "open");
        assert_eq!(evaluate(&args, Some("03:00")).unwrap(), "closed");
    }

    #[test]
    fn test_break_window() {
        let args = HoursArgs {
            break_start: Some("12:00:00".to_string()),
            break_end: Some("13:00:00".to_string()),
            ..hours("09:00:00", "21:00:00")
        };
        assert_eq!(evaluate(&args, Some("12:30")).unwrap(), "closed");
        assert_eq!(evaluate(&args, Some("11:00")).unwrap(), "open");
    }

    #[test]
    fn test_missing_hours_are_closed() {
        assert_eq!(
            evaluate(&HoursArgs::default(), Some("12:00")).unwrap(),
            "closed"
        );
    }

    #[test]
    fn test_rejects_out_of_day_time() {
        assert!(evaluate(&hours("09:00", "18:00"), Some("25:00")).is_err());
        assert!(evaluate(&hours("09:00", "18:00"), Some("")).is_err());
    }
}
