//! Transliteration of characters the tracking platform stores incorrectly.
//!
//! The platform mangles accented Latin letters in device names, so those are
//! replaced with their ASCII base letters before transmission. Characters
//! without a known replacement are passed through unchanged.

/// Returns the ASCII replacement for a character, if one is known.
fn replacement(c: char) -> Option<&'static str> {
    let ascii = match c {
        // Polish
        'ą' => "a",
        'ć' => "c",
        'ę' => "e",
        'ł' => "l",
        'ń' => "n",
        'ó' => "o",
        'ś' => "s",
        'ź' | 'ż' => "z",
        'Ą' => "A",
        'Ć' => "C",
        'Ę' => "E",
        'Ł' => "L",
        'Ń' => "N",
        'Ó' => "O",
        'Ś' => "S",
        'Ź' | 'Ż' => "Z",
        // Other Latin-1 and Latin Extended-A letters seen in names
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'è' | 'é' | 'ê' | 'ë' | 'ě' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ě' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'ò' | 'ô' | 'õ' | 'ö' | 'ø' | 'ő' => "o",
        'Ò' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ő' => "O",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ű' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ů' | 'Ű' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'č' | 'ç' => "c",
        'Č' | 'Ç' => "C",
        'ď' => "d",
        'Ď' => "D",
        'ň' | 'ñ' => "n",
        'Ň' | 'Ñ' => "N",
        'ř' => "r",
        'Ř' => "R",
        'š' => "s",
        'Š' => "S",
        'ť' => "t",
        'Ť' => "T",
        'ž' => "z",
        'Ž' => "Z",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        _ => return None,
    };
    Some(ascii)
}

/// Replaces accented Latin letters with their ASCII equivalents.
pub fn transliterate(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match replacement(c) {
            Some(ascii) => out.push_str(ascii),
            None => out.push(c),
        }
    }
    out
}
