//! Text clean-up shared by both extraction strategies.

/// Decode a PDF string operand: UTF-16BE when it carries a byte-order mark, otherwise
/// single-byte text read as Windows-1254 so Turkish letters survive.
pub fn decode_pdf_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|pair| match pair {
                [high, low] => u16::from_be_bytes([*high, *low]),
                [high] => u16::from_be_bytes([*high, 0]),
                _ => 0,
            })
            .collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|byte| windows_1254(*byte)).collect()
}

fn windows_1254(byte: u8) -> char {
    match byte {
        0xD0 => 'Ğ',
        0xDD => 'İ',
        0xDE => 'Ş',
        0xF0 => 'ğ',
        0xFD => 'ı',
        0xFE => 'ş',
        other => char::from(other),
    }
}

/// Uppercase with Turkish casing rules for dotted and dotless i.
pub fn turkish_uppercase(value: &str) -> String {
    let mut upper = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            'i' => upper.push('İ'),
            'ı' => upper.push('I'),
            other => upper.extend(other.to_uppercase()),
        }
    }
    upper
}

/// Lowercase with Turkish casing rules, used for header matching.
pub fn turkish_lowercase(value: &str) -> String {
    let mut lower = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            'İ' => lower.push('i'),
            'I' => lower.push('ı'),
            other => lower.extend(other.to_lowercase()),
        }
    }
    lower
}

/// Final form of an extracted name: circumflex letters folded, whitespace collapsed,
/// uppercased. Names shorter than three characters come back empty.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|ch| match ch {
            'î' | 'Î' => 'İ',
            'û' | 'Û' => 'Ü',
            other => other,
        })
        .collect();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    let upper = turkish_uppercase(&collapsed);
    if upper.chars().count() < 3 {
        String::new()
    } else {
        upper
    }
}
