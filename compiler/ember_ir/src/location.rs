//! Source locations attached to instructions and terminators.

use std::fmt;
use std::sync::Arc;

/// Where an IR construct came from in the source program.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Location {
    #[default]
    Unknown,
    FileLineCol {
        file: Arc<str>,
        line: u32,
        column: u32,
    },
    /// Several locations merged into one construct.
    Fused(Vec<Location>),
}

impl Location {
    pub fn file_line_col(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Location::FileLineCol {
            file: file.into(),
            line,
            column,
        }
    }

    /// Fuse locations; a single location is returned as-is.
    pub fn fused(locations: impl IntoIterator<Item = Location>) -> Self {
        let mut locs: Vec<Location> = locations
            .into_iter()
            .filter(|l| !matches!(l, Location::Unknown))
            .collect();
        match locs.len() {
            0 => Location::Unknown,
            1 => locs.swap_remove(0),
            _ => Location::Fused(locs),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Location::Unknown)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => f.write_str("unknown"),
            Location::FileLineCol { file, line, column } => write!(f, "{file}:{line}:{column}"),
            Location::Fused(locs) => {
                f.write_str("fused[")?;
                for (i, loc) in locs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{loc}")?;
                }
                f.write_str("]")
            }
        }
    }
}
