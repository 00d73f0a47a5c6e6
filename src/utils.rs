use std::iter::Peekable;
use std::ops::Range;
use std::str::Chars;

#[derive(Debug)]
pub struct WhitespaceTokenizer<'a> {
    current_idx: usize,
    char_iterator: Peekable<Chars<'a>>,
}

/// Creates a tokenizer that splits on whitespace and is robust to multiple and types of whitespaces
pub fn whitespace_tokenizer(string: &str) -> WhitespaceTokenizer {
    WhitespaceTokenizer {
        char_iterator: string.chars().peekable(),
        current_idx: 0,
    }
}

/// Iterator that outputs the next token along with its range in the input string
impl<'a> Iterator for WhitespaceTokenizer<'a> {
    type Item = (Range<usize>, String);

    fn next(&mut self) -> Option<(Range<usize>, String)> {
        // Absorb any number of whitespaces from where we are
        loop {
            match self.char_iterator.peek() {
                None => return None,
                Some(c) if !c.is_whitespace() => break,
                Some(_) => {}
            }
            self.char_iterator.next();
            self.current_idx += 1;
        }
        // Start a new token
        let start_token_idx = self.current_idx;
        let mut new_token: Vec<char> = vec![];
        // Absorb any number of non-whitespaces and put them in current token
        loop {
            match self.char_iterator.peek() {
                None => break,
                Some(c) if !c.is_whitespace() => new_token.push(*c),
                Some(_) => break,
            }
            self.char_iterator.next();
            self.current_idx += 1;
        }
        let end_token_idx = self.current_idx;
        Some((
            start_token_idx..end_token_idx,
            new_token.into_iter().collect(),
        ))
    }
}
