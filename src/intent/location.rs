//! Spoken place names to weather-query names

use super::normalize::fold;

/// Folded spoken name to the name the weather service resolves
const CITIES: &[(&str, &str)] = &[
    ("ha noi", "Hanoi"),
    ("thu do", "Hanoi"),
    ("ho chi minh", "Ho Chi Minh City"),
    ("thanh pho ho chi minh", "Ho Chi Minh City"),
    ("tp ho chi minh", "Ho Chi Minh City"),
    ("sai gon", "Ho Chi Minh City"),
    ("da nang", "Da Nang"),
    ("hai phong", "Hai Phong"),
    ("can tho", "Can Tho"),
    ("hue", "Hue"),
    ("thua thien hue", "Hue"),
    ("nha trang", "Nha Trang"),
    ("da lat", "Da Lat"),
    ("vung tau", "Vung Tau"),
    ("quy nhon", "Quy Nhon"),
    ("ha long", "Ha Long"),
    ("vinh", "Vinh"),
    ("buon ma thuot", "Buon Ma Thuot"),
    ("bien hoa", "Bien Hoa"),
    ("sa pa", "Sa Pa"),
    ("sapa", "Sa Pa"),
];

/// Canonical name for a spoken location, if it names a known city
///
/// The city may be followed or preceded by other words ("đà nẵng có mưa
/// không"); the longest table name found on word boundaries wins.
#[must_use]
pub fn canonical_location(spoken: &str) -> Option<&'static str> {
    let words = fold(spoken)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let padded = format!(" {words} ");
    CITIES
        .iter()
        .filter(|(name, _)| padded.contains(&format!(" {name} ")))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, canonical)| *canonical)
}

/// Canonical name for a spoken location, falling back to `home`
///
/// Unknown places resolve to `home` rather than being sent as typed.
#[must_use]
pub fn resolve_location(spoken: &str, home: &str) -> String {
    if let Some(found) = canonical_location(spoken) {
        return found.to_string();
    }
    if !spoken.trim().is_empty() {
        tracing::debug!(location = %spoken, fallback = %home, "unknown location, using home");
    }
    canonical_location(home).map_or_else(|| home.to_string(), str::to_string)
}
