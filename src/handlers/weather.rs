//! Weather replies

use std::time::Duration;

use crate::error::with_timeout;
use crate::integrations::{WeatherProvider, WeatherReport};

/// Which report was asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlook {
    Current,
    Tomorrow,
}

/// UV index as a spoken risk level (WHO scale)
#[must_use]
pub fn uv_level(uv: f64) -> &'static str {
    if uv < 3.0 {
        "thấp"
    } else if uv < 6.0 {
        "trung bình"
    } else if uv < 8.0 {
        "cao"
    } else if uv < 11.0 {
        "rất cao"
    } else {
        "cực kỳ cao"
    }
}

#[allow(clippy::cast_possible_truncation)]
fn rounded(value: f64) -> i64 {
    value.round() as i64
}

/// The spoken weather sentence
#[must_use]
pub fn weather_sentence(report: &WeatherReport, outlook: Outlook) -> String {
    let opening = match outlook {
        Outlook::Current => format!("Thời tiết hiện tại ở {}: {}.", report.location, report.condition),
        Outlook::Tomorrow => format!("Dự báo ngày mai ở {}: {}.", report.location, report.condition),
    };
    format!(
        "{opening} Nhiệt độ {} độ C, cảm giác như {} độ C. Chỉ số UV ở mức {}. Độ ẩm {} phần trăm.",
        rounded(report.temp_c),
        rounded(report.feels_like_c),
        uv_level(report.uv),
        rounded(report.humidity)
    )
}

/// Fetch a report and phrase it; `None` when the service failed
pub async fn respond(
    provider: &dyn WeatherProvider,
    location: &str,
    outlook: Outlook,
    budget: Duration,
) -> Option<String> {
    let report = match outlook {
        Outlook::Current => with_timeout("weather", budget, provider.current(location)).await,
        Outlook::Tomorrow => with_timeout("weather", budget, provider.forecast(location)).await,
    };

    match report {
        Ok(report) => Some(weather_sentence(&report, outlook)),
        Err(e) => {
            tracing::warn!(location = %location, error = %e, "weather lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> WeatherReport {
        WeatherReport {
            location: "Hanoi".to_string(),
            condition: "Có mây".to_string(),
            temp_c: 31.6,
            feels_like_c: 36.2,
            uv: 7.0,
            humidity: 74.0,
        }
    }

    #[test]
    fn uv_thresholds() {
        assert_eq!(uv_level(0.0), "thấp");
        assert_eq!(uv_level(2.9), "thấp");
        assert_eq!(uv_level(3.0), "trung bình");
        assert_eq!(uv_level(6.0), "cao");
        assert_eq!(uv_level(8.0), "rất cao");
        assert_eq!(uv_level(11.0), "cực kỳ cao");
    }

    #[test]
    fn current_sentence_rounds_values() {
        assert_eq!(
            weather_sentence(&report(), Outlook::Current),
            "Thời tiết hiện tại ở Hanoi: Có mây. Nhiệt độ 32 độ C, cảm giác như 36 độ C. \
             Chỉ số UV ở mức cao. Độ ẩm 74 phần trăm."
        );
    }

    #[test]
    fn forecast_sentence_says_tomorrow() {
        assert!(weather_sentence(&report(), Outlook::Tomorrow).starts_with("Dự báo ngày mai ở Hanoi"));
    }
}
