//! Time, date and lunar date sentences

use chrono::{Datelike, NaiveDate, Timelike, Weekday};

use crate::integrations::LunarDate;

/// Spoken when the lunar conversion fails
pub const LUNAR_UNAVAILABLE: &str = "Xin lỗi, mình chưa xem được lịch âm lúc này.";

/// `"Bây giờ là {H} giờ {M} phút."`
#[must_use]
pub fn time_sentence(time: &impl Timelike) -> String {
    format!("Bây giờ là {} giờ {} phút.", time.hour(), time.minute())
}

const fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "thứ hai",
        Weekday::Tue => "thứ ba",
        Weekday::Wed => "thứ tư",
        Weekday::Thu => "thứ năm",
        Weekday::Fri => "thứ sáu",
        Weekday::Sat => "thứ bảy",
        Weekday::Sun => "chủ nhật",
    }
}

/// `"Hôm nay là thứ ba, ngày 17 tháng 10 năm 2026."`
#[must_use]
pub fn date_sentence(date: NaiveDate) -> String {
    format!(
        "Hôm nay là {}, ngày {} tháng {} năm {}.",
        weekday_name(date.weekday()),
        date.day(),
        date.month(),
        date.year()
    )
}

const STEMS: [&str; 10] = [
    "Canh", "Tân", "Nhâm", "Quý", "Giáp", "Ất", "Bính", "Đinh", "Mậu", "Kỷ",
];

const BRANCHES: [&str; 12] = [
    "Thân", "Dậu", "Tuất", "Hợi", "Tý", "Sửu", "Dần", "Mão", "Thìn", "Tỵ", "Ngọ", "Mùi",
];

/// Sexagenary name of a lunar year (2024 is Giáp Thìn)
#[must_use]
pub fn year_name(year: i32) -> String {
    #[allow(clippy::cast_sign_loss)]
    let (stem, branch) = (year.rem_euclid(10) as usize, year.rem_euclid(12) as usize);
    format!("{} {}", STEMS[stem], BRANCHES[branch])
}

/// `"Hôm nay là ngày 5 tháng 9 năm Bính Ngọ âm lịch."`
#[must_use]
pub fn lunar_sentence(lunar: &LunarDate) -> String {
    let leap = if lunar.leap { " nhuận" } else { "" };
    format!(
        "Hôm nay là ngày {} tháng {}{leap} năm {} âm lịch.",
        lunar.day,
        lunar.month,
        year_name(lunar.year)
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    #[test]
    fn time_is_spoken_in_hours_and_minutes() {
        let time = NaiveTime::from_hms_opt(9, 5, 42).unwrap();
        assert_eq!(time_sentence(&time), "Bây giờ là 9 giờ 5 phút.");
    }

    #[test]
    fn date_includes_weekday() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(date_sentence(date), "Hôm nay là thứ bảy, ngày 17 tháng 10 năm 2026.");
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(date_sentence(sunday).starts_with("Hôm nay là chủ nhật"));
    }

    #[test]
    fn sexagenary_years() {
        assert_eq!(year_name(2024), "Giáp Thìn");
        assert_eq!(year_name(2025), "Ất Tỵ");
        assert_eq!(year_name(2026), "Bính Ngọ");
    }

    #[test]
    fn lunar_sentence_marks_leap_month() {
        let lunar = LunarDate {
            day: 3,
            month: 6,
            year: 2025,
            leap: true,
        };
        assert_eq!(lunar_sentence(&lunar), "Hôm nay là ngày 3 tháng 6 nhuận năm Ất Tỵ âm lịch.");
    }
}
