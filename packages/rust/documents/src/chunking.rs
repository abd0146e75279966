//! Paragraph grouping and word-bounded splitting.

/// Whitespace-delimited word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Group sizes for `n` paragraphs with at most `per_chunk` per group.
///
/// Groups are as even as possible, and a trailing single paragraph is
/// avoided whenever `n >= 2`: 4 → [2, 2], 7 → [3, 2, 2].
pub fn group_sizes(n: usize, per_chunk: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let per_chunk = per_chunk.max(2);
    let mut groups = n.div_ceil(per_chunk);
    if n >= 2 && n / groups < 2 {
        groups = n / 2;
    }
    let base = n / groups;
    let extra = n % groups;
    (0..groups).map(|i| base + usize::from(i < extra)).collect()
}

/// Split `text` after sentence-ending punctuation followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn split_words(text: &str, budget: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(budget.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

/// Break one paragraph into pieces of at most `budget` words: whole if it
/// fits, else by sentence, else by word.
fn paragraph_pieces(paragraph: &str, budget: usize) -> Vec<String> {
    if word_count(paragraph) <= budget {
        return vec![paragraph.to_string()];
    }
    split_sentences(paragraph)
        .into_iter()
        .flat_map(|sentence| {
            if word_count(&sentence) <= budget {
                vec![sentence]
            } else {
                split_words(&sentence, budget)
            }
        })
        .collect()
}

/// Split a block of paragraphs into sub-blocks of at most `budget` words
/// each, preferring paragraph boundaries, then sentences, then words.
pub fn split_block(paragraphs: &[String], budget: usize) -> Vec<Vec<String>> {
    let budget = budget.max(1);
    let total: usize = paragraphs.iter().map(|p| word_count(p)).sum();
    if total <= budget {
        return vec![paragraphs.to_vec()];
    }

    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;
    for piece in paragraphs.iter().flat_map(|p| paragraph_pieces(p, budget)) {
        let words = word_count(&piece);
        if current_words + words > budget && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current_words += words;
        current.push(piece);
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}
