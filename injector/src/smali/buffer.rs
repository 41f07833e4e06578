use std::{fmt, ops::Range};

/// Ordered, mutable lines of one disassembled class.
///
/// Lines are stored without terminators. Each line remembers its own terminator, so
/// [`LineBuffer::to_text`] reproduces the source byte-for-byte when nothing was
/// changed, mixed line endings included.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
    endings: Vec<LineEnding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file without a final newline
    Missing,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Missing => "",
        }
    }
}

impl LineBuffer {
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut endings = Vec::new();

        for chunk in text.split_inclusive('\n') {
            let (line, ending) = if let Some(line) = chunk.strip_suffix("\r\n") {
                (line, LineEnding::CrLf)
            } else if let Some(line) = chunk.strip_suffix('\n') {
                (line, LineEnding::Lf)
            } else {
                (chunk, LineEnding::Missing)
            };
            lines.push(line.to_owned());
            endings.push(ending);
        }

        Self { lines, endings }
    }

    // Terminator for lines inserted at `index`: the nearest terminated line above,
    // else the line below
    fn ending_near(&self, index: usize) -> LineEnding {
        let above = &self.endings[..index.min(self.endings.len())];
        above
            .iter()
            .rev()
            .chain(self.endings.get(index))
            .copied()
            .find(|ending| *ending != LineEnding::Missing)
            .unwrap_or(LineEnding::Lf)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Iterate over `(index, line)` pairs starting at `from`.
    pub fn iter_from(&self, from: usize) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .skip(from)
            .map(|(idx, line)| (idx, line.as_str()))
    }

    /// Insert `new_lines` so that the first of them ends up at `index`.
    ///
    /// Returns the range now occupied by the inserted lines. Every line previously at
    /// `index` or later moves down by the number of inserted lines.
    ///
    /// # Panics
    ///
    /// Panics if `index > self.len()`.
    pub fn splice<I, S>(&mut self, index: usize, new_lines: I) -> Range<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inserted: Vec<String> = new_lines.into_iter().map(Into::into).collect();
        let count = inserted.len();
        let ending = self.ending_near(index);
        let mut endings = vec![ending; count];

        // Appending after an unterminated last line moves the missing newline down
        if count > 0 && index == self.lines.len() {
            if let Some(last) = self.endings.last_mut() {
                if *last == LineEnding::Missing {
                    *last = ending;
                    endings[count - 1] = LineEnding::Missing;
                }
            }
        }

        self.lines.splice(index..index, inserted);
        self.endings.splice(index..index, endings);
        index..index + count
    }

    /// Replace the line at `index`, returning the previous content.
    pub fn replace(&mut self, index: usize, line: impl Into<String>) -> Option<String> {
        let slot = self.lines.get_mut(index)?;
        Some(std::mem::replace(slot, line.into()))
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for (line, ending) in self.lines.iter().zip(&self.endings) {
            text.push_str(line);
            text.push_str(ending.as_str());
        }
        text
    }
}

impl fmt::Display for LineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl<S: Into<String>> FromIterator<S> for LineBuffer {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let lines: Vec<String> = iter.into_iter().map(Into::into).collect();
        let endings = vec![LineEnding::Lf; lines.len()];
        Self { lines, endings }
    }
}
