//! Canonical form used for every brand/article comparison.

/// Characters treated as typographic hyphens and dropped.
const HYPHENS: &[char] = &['-', '\u{2010}', '\u{2011}'];

/// Maps an upper-case Cyrillic letter to the Latin letter it is visually identical to.
fn latin_lookalike(c: char) -> Option<char> {
    let latin = match c {
        'А' => 'A',
        'В' => 'B',
        'С' => 'C',
        'Е' => 'E',
        'Н' => 'H',
        'К' => 'K',
        'М' => 'M',
        'О' => 'O',
        'Р' => 'P',
        'Т' => 'T',
        'У' => 'Y',
        'Х' => 'X',
        _ => return None,
    };
    Some(latin)
}

/// Upper-cases, transliterates Cyrillic look-alikes to Latin and strips hyphens.
///
/// Single pass over the input; the result is stable under repeated application.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        for upper in c.to_uppercase() {
            if HYPHENS.contains(&upper) {
                continue;
            }
            out.push(latin_lookalike(upper).unwrap_or(upper));
        }
    }
    out
}
