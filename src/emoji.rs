//! Emoji replacement for file and folder names
//!
//! Some sync clients and filesystems choke on emoji in paths. Each emoji, including a
//! multi-codepoint sequence (ZWJ family, skin tone, flag), becomes one replacement string.

/// Default replacement for an emoji
pub const DEFAULT_REPLACEMENT: &str = "_";

const ZERO_WIDTH_JOINER: char = '\u{200D}';

/// Inclusive code point ranges treated as emoji
///
/// Covers the emoji assigned up to Unicode 16.0 (Emoji 16.0). Emoji added in later versions
/// outside these blocks need a new range here.
const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x231A, 0x231B),
    (0x2328, 0x2328),
    (0x23CF, 0x23CF),
    (0x23E9, 0x23F3),
    (0x23F8, 0x23FA),
    (0x24C2, 0x24C2),
    (0x25AA, 0x25AB),
    (0x25B6, 0x25B6),
    (0x25C0, 0x25C0),
    (0x25FB, 0x25FE),
    (0x2600, 0x27BF),
    (0x2934, 0x2935),
    (0x2B05, 0x2B07),
    (0x2B1B, 0x2B1C),
    (0x2B50, 0x2B50),
    (0x2B55, 0x2B55),
    (0x3030, 0x3030),
    (0x303D, 0x303D),
    (0x3297, 0x3297),
    (0x3299, 0x3299),
    (0x1F000, 0x1FAFF),
];

fn is_emoji(c: char) -> bool {
    let c = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&c))
}

/// Code points that only modify the emoji before them
fn is_modifier(c: char) -> bool {
    matches!(c,
        '\u{FE0E}' | '\u{FE0F}'          // variation selectors
        | '\u{20E3}'                     // keycap
        | '\u{1F3FB}'..='\u{1F3FF}'      // skin tones
        | '\u{E0020}'..='\u{E007F}'      // tags
    )
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

/// Replace every emoji in `input` with `replacement`
pub fn replace_emoji(input: &str, replacement: &str) -> String {
    let mut output = String::with_capacity(input.len());
    // the previous output came from an emoji that a modifier or joiner may extend
    let mut in_emoji = false;
    let mut joined = false;
    let mut open_flag = false;

    for c in input.chars() {
        if c == ZERO_WIDTH_JOINER {
            joined = in_emoji;
            continue;
        }
        if is_modifier(c) {
            continue;
        }
        if is_regional_indicator(c) {
            if open_flag {
                // second half of a flag
                open_flag = false;
                continue;
            }
            open_flag = true;
            output.push_str(replacement);
            in_emoji = true;
            joined = false;
            continue;
        }
        open_flag = false;

        if is_emoji(c) {
            if !(joined && in_emoji) {
                output.push_str(replacement);
            }
            in_emoji = true;
            joined = false;
        } else {
            output.push(c);
            in_emoji = false;
            joined = false;
        }
    }

    output
}
