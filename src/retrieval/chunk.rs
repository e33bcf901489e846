use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = pick_separator(text, separators);
        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if rest.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_with(piece, rest));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |window: &VecDeque<&str>, total: usize| {
                total + len + if window.is_empty() { 0 } else { sep_len }
            };

            if joined_len(&window, total) > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &join(&window, separator));
                while total > self.chunk_overlap
                    || (total > 0 && joined_len(&window, total) > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_trimmed(&mut chunks, &join(&window, separator));
        }
        chunks
    }
}

fn pick_separator<'s>(text: &str, separators: &'s [&'s str]) -> (&'s str, &'s [&'s str]) {
    for (idx, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (*separator, &separators[idx + 1..]);
        }
    }
    ("", &[])
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::TextSplitter;

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{i:03}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(200, 20);
        assert_eq!(splitter.split("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn empty_and_blank_text_produce_no_chunks() {
        let splitter = TextSplitter::new(200, 20);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split(" \n\n \n").is_empty());
    }

    #[test]
    fn chunks_never_exceed_chunk_size() {
        let splitter = TextSplitter::new(50, 10);
        let text = format!("{}\n\n{}\n{}", numbered_words(30), numbered_words(7), "x".repeat(120));
        let chunks = splitter.split(&text);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let splitter = TextSplitter::new(40, 16);
        let chunks = splitter.split(&numbered_words(20));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().expect("word");
            let last_word_of_prev = pair[0].split(' ').next_back().expect("word");
            assert!(pair[0].contains(first_word_of_next), "no overlap in {pair:?}");
            assert!(pair[1].contains(last_word_of_prev), "no overlap in {pair:?}");
        }
    }

    #[test]
    fn every_word_survives_splitting_in_order() {
        let splitter = TextSplitter::new(30, 5);
        let text = numbered_words(25);
        let chunks = splitter.split(&text);
        let mut seen: Vec<&str> = Vec::new();
        for word in chunks.iter().flat_map(|chunk| chunk.split(' ')) {
            if !seen.contains(&word) {
                seen.push(word);
            }
        }
        let expected: Vec<&str> = text.split(' ').collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let splitter = TextSplitter::new(5, 1);
        let chunks = splitter.split("┌──────────┐│héllo wörld│");
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 5);
        }
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let splitter = TextSplitter::new(10, 50);
        assert_eq!(splitter, TextSplitter::new(10, 9));
        assert_eq!(TextSplitter::new(0, 0), TextSplitter::new(1, 0));
    }
}
