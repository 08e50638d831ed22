/// GPT-2 byte-level encoding: maps each byte 0x00..0xFF to a unique Unicode
/// character so that BPE merges operate on displayable strings.
///
/// Printable ASCII + Latin-1 supplement map to themselves; control characters
/// and the few gaps (0x00-0x20, 0x7F-0xA0, 0xAD) map to U+0100..U+0143.
pub fn byte_to_char_table() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut n: u32 = 0;
    for b in 0u16..256 {
        let ch = match b as u8 {
            0x21..=0x7E | 0xA1..=0xAC | 0xAE..=0xFF => b as u32,
            _ => {
                let c = 0x100 + n;
                n += 1;
                c
            }
        };
        // 0x100 + n stays below U+0144, always a valid scalar.
        table[b as usize] = char::from_u32(ch).unwrap_or(char::REPLACEMENT_CHARACTER);
    }
    table
}

/// Encode raw bytes into the byte-level alphabet. Every byte has an entry,
/// so the output always has exactly one `char` per input byte.
pub fn encode_bytes(input: &[u8], table: &[char; 256]) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    for &b in input {
        out.push(table[b as usize]);
    }
    out
}

/// Expand raw bytes into one scalar per byte (Latin-1 interpretation).
///
/// Bytes 0x00-0x7F stay single-unit; 0x80-0xFF become the two-unit UTF-8
/// forms of U+0080..U+00FF. Iterating the result by `char` yields one element
/// per original byte.
pub fn latin1_expand(input: &[u8]) -> String {
    input.iter().map(|&b| b as char).collect()
}

/// Decode the scalar value of the first character in `units`.
///
/// Accepts the full legacy UTF-8 family (1 to 6 units, up to 0x7FFF_FFFF).
/// Leads 0xFE/0xFF, a stray continuation lead, or a truncated sequence all
/// decode to 0.
pub fn decode_scalar(units: &[u8]) -> u32 {
    let Some(&lead) = units.first() else {
        return 0;
    };
    let (len, initial) = match lead {
        0x00..=0x7F => return lead as u32,
        0xC0..=0xDF => (2, (lead - 0xC0) as u32),
        0xE0..=0xEF => (3, (lead - 0xE0) as u32),
        0xF0..=0xF7 => (4, (lead - 0xF0) as u32),
        0xF8..=0xFB => (5, (lead - 0xF8) as u32),
        0xFC..=0xFD => (6, (lead - 0xFC) as u32),
        _ => return 0,
    };
    if units.len() < len {
        return 0;
    }
    units[1..len].iter().fold(initial, |acc, &u| {
        (acc << 6) | (u.wrapping_sub(0x80) as u32 & 0x3F)
    })
}

/// Decode the scalar of a single `char` through its UTF-8 units.
pub fn decode_char(ch: char) -> u32 {
    let mut buf = [0u8; 4];
    decode_scalar(ch.encode_utf8(&mut buf).as_bytes())
}
