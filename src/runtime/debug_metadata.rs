use std::fmt;

/// Source location attached to a container by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebugMetadata {
    pub start_line: u32,
    pub end_line: u32,
    pub start_character: u32,
    pub end_character: u32,
    pub file_name: Option<String>,
    pub source_name: Option<String>,
}

impl DebugMetadata {
    pub fn new(file_name: Option<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
            file_name,
            ..Self::default()
        }
    }

    /// Widens this range to cover `other`. Ranges from different files do
    /// not merge.
    pub fn merge(&self, other: &DebugMetadata) -> DebugMetadata {
        if self.file_name != other.file_name || self.source_name != other.source_name {
            return self.clone();
        }

        let (start_line, start_character) = if (other.start_line, other.start_character)
            < (self.start_line, self.start_character)
        {
            (other.start_line, other.start_character)
        } else {
            (self.start_line, self.start_character)
        };
        let (end_line, end_character) =
            if (other.end_line, other.end_character) > (self.end_line, self.end_character) {
                (other.end_line, other.end_character)
            } else {
                (self.end_line, self.end_character)
            };

        DebugMetadata {
            start_line,
            end_line,
            start_character,
            end_character,
            file_name: self.file_name.clone(),
            source_name: self.source_name.clone(),
        }
    }
}

impl fmt::Display for DebugMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file_name {
            write!(f, "'{file}' ")?;
        }
        if self.start_line == self.end_line {
            write!(f, "line {}", self.start_line)
        } else {
            write!(f, "lines {}-{}", self.start_line, self.end_line)
        }
    }
}
