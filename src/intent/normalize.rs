//! Text normalization for transcripts, song names and location keys

/// Base letter for every accented Vietnamese vowel, grouped by base
const FOLD_TABLE: &[(char, &str)] = &[
    ('a', "àáảãạăằắẳẵặâầấẩẫậ"),
    ('e', "èéẻẽẹêềếểễệ"),
    ('i', "ìíỉĩị"),
    ('o', "òóỏõọôồốổỗộơờớởỡợ"),
    ('u', "ùúủũụưừứửữự"),
    ('y', "ỳýỷỹỵ"),
    ('d', "đ"),
];

fn fold_char(c: char) -> Option<char> {
    // combining diacritical marks left over from decomposed input
    if ('\u{0300}'..='\u{036F}').contains(&c) {
        return None;
    }
    Some(
        FOLD_TABLE
            .iter()
            .find(|(_, accented)| accented.contains(c))
            .map_or(c, |(base, _)| *base),
    )
}

/// Lowercase and strip Vietnamese diacritics
#[must_use]
pub fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).filter_map(fold_char).collect()
}

/// Normalize raw STT output for classification
///
/// Lowercases, collapses whitespace and trims trailing sentence punctuation.
#[must_use]
pub fn normalize_transcript(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| matches!(c, '.' | '?' | '!' | ',' | ';' | ':' | '…') || c.is_whitespace())
        .trim()
        .to_string()
}

/// Map a song name to its file name in the music directory
///
/// `"Trên Cung Đường Này"` becomes `"tren_cung_duong_nay.wav"`. Applying it to
/// its own output returns the same name.
#[must_use]
pub fn song_file_name(name: &str) -> String {
    let stem = name.trim();
    let stem = stem
        .strip_suffix(".wav")
        .or_else(|| stem.strip_suffix(".WAV"))
        .unwrap_or(stem);

    let folded = fold(&stem.replace('_', " "));
    let words: Vec<String> = folded
        .split_whitespace()
        .map(|word| word.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect();

    format!("{}.wav", words.join("_"))
}
