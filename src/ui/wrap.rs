//! Width-aware word wrapping for the transcript areas.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Greedily wraps one logical line to the given display width, preserving
/// leading indentation on continuation rows. Oversized words hard-break.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if line.width() <= width {
        return vec![line.to_string()];
    }

    let indent: String = line.chars().take_while(|c| *c == ' ').collect();
    let indent = if indent.width() >= width {
        String::new()
    } else {
        indent
    };

    let mut rows: Vec<String> = Vec::new();
    let mut current = indent.clone();
    for word in line.split_whitespace() {
        let sep = usize::from(current.len() > indent.len());
        if current.width() + sep + word.width() <= width {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if current.len() > indent.len() {
            rows.push(std::mem::replace(&mut current, indent.clone()));
        }
        if indent.width() + word.width() <= width {
            current.push_str(word);
        } else {
            // Hard-break a word wider than the viewport.
            for c in word.chars() {
                if current.width() + c.width().unwrap_or(0) > width {
                    rows.push(std::mem::replace(&mut current, indent.clone()));
                }
                current.push(c);
            }
        }
    }
    if rows.is_empty() || current.len() > indent.len() {
        rows.push(current);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_passes_through() {
        assert_eq!(wrap_line("hello", 10), vec!["hello"]);
        assert_eq!(wrap_line("", 10), vec![""]);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(
            wrap_line("one two three four", 9),
            vec!["one two", "three", "four"]
        );
    }

    #[test]
    fn continuation_rows_keep_indent() {
        let rows = wrap_line("    indented words wrap here", 12);
        assert!(rows.len() > 1);
        for row in &rows {
            assert!(row.starts_with("    "), "row lost indent: {row:?}");
        }
    }

    #[test]
    fn oversized_word_hard_breaks() {
        let rows = wrap_line("abcdefghij", 4);
        assert_eq!(rows, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wide_characters_count_at_display_width() {
        // Each CJK char is two columns wide.
        let rows = wrap_line("你好 世界", 4);
        assert_eq!(rows, vec!["你好", "世界"]);
    }
}
