/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::sync::Arc;

/// Element of a `like` pattern: a literal char or the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternElem {
    /// A character to match literally
    Char(char),
    /// The `*` wildcard, matching any sequence of characters (including the
    /// empty one)
    Wildcard,
}

/// A `like` pattern. Cloning is O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    elems: Arc<Vec<PatternElem>>,
}

impl Pattern {
    /// Iterate over the pattern elements
    pub fn iter(&self) -> impl Iterator<Item = &PatternElem> {
        self.elems.iter()
    }

    /// Whether the given string matches this pattern.
    pub fn wildcard_match(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let pattern: &[PatternElem] = &self.elems;
        // two-pointer match with backtracking to the last wildcard
        let mut t = 0;
        let mut p = 0;
        let mut star: Option<(usize, usize)> = None;
        while t < text.len() {
            match pattern.get(p) {
                Some(PatternElem::Char(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                Some(PatternElem::Wildcard) => {
                    star = Some((p, t));
                    p += 1;
                }
                _ => match star {
                    Some((sp, st)) => {
                        p = sp + 1;
                        t = st + 1;
                        star = Some((sp, st + 1));
                    }
                    None => return false,
                },
            }
        }
        pattern[p..].iter().all(|e| *e == PatternElem::Wildcard)
    }
}

impl From<Vec<PatternElem>> for Pattern {
    fn from(elems: Vec<PatternElem>) -> Self {
        Self {
            elems: Arc::new(elems),
        }
    }
}

/// Build a pattern from plain text, where `*` is the wildcard. There is no
/// way to spell a literal `*` through this conversion; construct from
/// `Vec<PatternElem>` for that.
impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        text.chars()
            .map(|c| {
                if c == '*' {
                    PatternElem::Wildcard
                } else {
                    PatternElem::Char(c)
                }
            })
            .collect::<Vec<_>>()
            .into()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for elem in self.iter() {
            match elem {
                PatternElem::Char('*') => write!(f, "\\*")?,
                PatternElem::Char(c) => write!(f, "{}", c.escape_debug())?,
                PatternElem::Wildcard => write!(f, "*")?,
            }
        }
        Ok(())
    }
}
