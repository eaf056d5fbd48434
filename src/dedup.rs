//! Repair for scraped text that accidentally contains two concatenated
//! copies of the same passage (a known artifact of the upstream scrape).
//!
//! Three heuristics run in priority order; the first hit wins. The bounds
//! (150-char minimum, ±50 half-split window, 200-position start cap, step 30)
//! are parity constants for already-archived content and must not change.

/// Minimum passage size below which no deduplication is attempted.
pub const MIN_CHUNK: usize = 150;

/// Question openers that mark the start of a question body. A phrase seen at
/// two positions far enough apart is treated as proof of a duplicated copy.
/// Enumeration order decides which phrase wins.
const MARKERS: &[&str] = &[
    "You have the following",
    "HOTSPOT -",
    "DRAG DROP -",
    "SIMULATION -",
    "You need to",
    "What should you",
    "Hot Area:",
];

pub fn dedup(text: &str) -> String {
    dedup_min(text, MIN_CHUNK)
}

pub fn dedup_min(text: &str, min_chunk: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < min_chunk {
        return text.to_string();
    }

    if let Some(cut) = marker_cut(text, min_chunk) {
        return text[..cut].to_string();
    }
    if let Some(half) = half_split(&chars, min_chunk) {
        return half;
    }
    if let Some(cut) = sliding_repeat(&chars, min_chunk) {
        return chars[..cut].iter().collect();
    }

    text.to_string()
}

/// Truncate at the second occurrence of the first marker phrase that appears
/// at least twice with a full question body between the occurrences.
/// Returns a byte offset into `text` (always a char boundary: it comes from
/// a substring match).
fn marker_cut(text: &str, min_chunk: usize) -> Option<usize> {
    for marker in MARKERS {
        let positions: Vec<usize> = text.match_indices(marker).map(|(i, _)| i).collect();
        if positions.len() < 2 {
            continue;
        }
        let span = text[positions[0]..positions[1]].chars().count();
        if span >= min_chunk {
            return Some(positions[1]);
        }
    }
    None
}

/// Exact duplication check: the two halves around the midpoint (±50 chars)
/// compare equal after trimming.
fn half_split(chars: &[char], min_chunk: usize) -> Option<String> {
    let mid = chars.len() / 2;
    for delta in -50i64..50 {
        let split = mid as i64 + delta;
        if split <= 0 || split >= chars.len() as i64 {
            continue;
        }
        let split = split as usize;
        let left: String = chars[..split].iter().collect();
        let right: String = chars[split..].iter().collect();
        let (left, right) = (left.trim(), right.trim());
        if left.chars().count() >= min_chunk
            && right.chars().count() >= min_chunk
            && left == right
        {
            return Some(left.to_string());
        }
    }
    None
}

/// Look for a leading chunk that reappears later in the text. Chunk sizes
/// shrink from 40% of the text down to `min_chunk` in steps of 30; start
/// positions are capped at 200. Returns the char index of the repeat.
fn sliding_repeat(chars: &[char], min_chunk: usize) -> Option<usize> {
    let n = chars.len();
    let mut size = (n as f64 * 0.4) as usize;
    while size >= min_chunk {
        let max_start = usize::min(200, n.saturating_sub(size));
        for start in 0..max_start {
            let window = &chars[start..start + size];
            let mut pos = start + min_chunk;
            while pos + size <= n {
                if &chars[pos..pos + size] == window {
                    return Some(pos);
                }
                pos += 1;
            }
        }
        size = size.saturating_sub(30);
    }
    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(seed: &str, len: usize) -> String {
        // Deterministic filler with no internal repetition at chunk scale.
        let mut s = String::new();
        let mut i = 0usize;
        while s.len() < len {
            s.push_str(&format!("{} {} ", seed, i));
            i += 1;
        }
        s
    }

    #[test]
    fn short_text_unchanged() {
        let t = "You need to configure the virtual network.";
        assert_eq!(dedup(t), t);
    }

    #[test]
    fn unique_text_unchanged() {
        let t = passage("alpha", 600);
        assert_eq!(dedup(&t), t);
    }

    #[test]
    fn marker_method_truncates_at_second_occurrence() {
        let body = format!("You need to {}", passage("beta", 200));
        let t = format!("{}{}", body, body);
        let second = t.match_indices("You need to").nth(1).unwrap().0;
        assert_eq!(dedup(&t), t[..second]);
    }

    #[test]
    fn marker_ignored_when_occurrences_too_close() {
        let t = format!(
            "You need to do X. You need to do Y. {}",
            passage("gamma", 300)
        );
        assert_eq!(dedup(&t), t);
    }

    #[test]
    fn half_split_exact_duplicate() {
        let s = passage("delta", 300);
        let t = format!("{}{}", s, s);
        assert_eq!(dedup(&t), s.trim());
    }

    #[test]
    fn sliding_window_catches_offset_duplicate() {
        // A duplicated body behind a small unique prefix: the half-split
        // misses it, the sliding window should not.
        let body = passage("epsilon", 400);
        let t = format!("intro. {b}{b}", b = body);
        let out = dedup(&t);
        assert!(out.len() < t.len());
        assert!(out.starts_with("intro. "));
    }

    #[test]
    fn idempotent() {
        let s = passage("zeta", 300);
        let cases = vec![
            format!("{}{}", s, s),
            format!("You need to {p}{p}", p = passage("eta", 250)),
            passage("theta", 500),
            "tiny".to_string(),
        ];
        for t in cases {
            let once = dedup(&t);
            assert_eq!(dedup(&once), once);
        }
    }
}
