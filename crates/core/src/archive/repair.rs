//! Subtitle content repair.

/// Normalize line endings to `\n`, drop a leading BOM and renumber cue
/// indices (lines made only of digits) to 1..N in order of appearance.
///
/// Applying it twice gives the same output as applying it once.
pub fn repair_subtitle(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.strip_prefix('\u{FEFF}').unwrap_or(&normalized);

    let mut cue = 0usize;
    let lines: Vec<String> = body
        .split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                cue += 1;
                cue.to_string()
            } else {
                line.to_string()
            }
        })
        .collect();

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings_and_bom() {
        let input = "\u{FEFF}1\r\n00:00:01,000 --> 00:00:02,000\r\nSalut\rLume\r\n";
        assert_eq!(
            repair_subtitle(input),
            "1\n00:00:01,000 --> 00:00:02,000\nSalut\nLume\n"
        );
    }

    #[test]
    fn test_renumbers_concatenated_cues() {
        let input = "1\nA\n\n2\nB\n\n1\nC\n\n 7 \nD\n";
        assert_eq!(repair_subtitle(input), "1\nA\n\n2\nB\n\n3\nC\n\n4\nD\n");
    }

    #[test]
    fn test_idempotent() {
        let input = "\u{FEFF}5\r\nx\r\n\r\n5\r\ny\r\n";
        let once = repair_subtitle(input);
        assert_eq!(repair_subtitle(&once), once);
    }

    #[test]
    fn test_leaves_text_lines_alone() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nIn 1984 it rained.\n";
        assert_eq!(repair_subtitle(input), input);
    }
}
