//! Maps an error trace back to a row in the user's behaviour source.
//!
//! Behaviour chunks are named `<behavior>`, so every frame that ran user code
//! shows up in a trace as `<behavior>:<line>:`. Those lines count the wrapper
//! prefix too; subtracting the prefix line count gives the user's row.

use crate::fault::SourceLocation;

/// Chunk name marker for user behaviour code.
pub const BEHAVIOR_CHUNK: &str = "<behavior>";
/// Chunk name marker for engine glue.
pub const ENGINE_CHUNK: &str = "<engine>";

pub trait ErrorLocator {
    fn locate(&self, trace: &str) -> Option<SourceLocation>;
}

/// Finds the first `<marker>:<line>[:<col>]` occurrence in a trace.
#[derive(Debug, Clone)]
pub struct ChunkTraceLocator {
    needle: String,
    prefix_lines: u32,
}

impl ChunkTraceLocator {
    pub fn new(marker: &str, prefix_lines: u32) -> Self {
        Self {
            needle: format!("{marker}:"),
            prefix_lines,
        }
    }

    pub fn for_behaviors() -> Self {
        Self::new(BEHAVIOR_CHUNK, crate::loader::prefix_lines())
    }
}

impl Default for ChunkTraceLocator {
    fn default() -> Self {
        Self::for_behaviors()
    }
}

impl ErrorLocator for ChunkTraceLocator {
    fn locate(&self, trace: &str) -> Option<SourceLocation> {
        let line = trace.lines().find(|line| line.contains(&self.needle))?;
        let at = line.find(&self.needle)? + self.needle.len();
        let mut parts = line[at..].split(':');
        let raw_row = leading_number(parts.next()?)?;
        let col = parts.next().and_then(leading_number);

        let row = raw_row.checked_sub(self.prefix_lines)?;
        if row < 1 {
            return None;
        }
        Some(SourceLocation { row, col })
    }
}

/// Digits at the start of `text`; `None` when there are none.
fn leading_number(text: &str) -> Option<u32> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    text[..end].parse().ok()
}
