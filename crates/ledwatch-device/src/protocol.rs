//! Line protocol understood by the strip controller firmware.
//!
//! | Command        | Line                  |
//! |----------------|-----------------------|
//! | set pixel      | `C,<index>,<r>,<g>,<b>` |
//! | set all        | `A,<r>,<g>,<b>`       |
//! | set brightness | `B,<level>`           |
//! | clear          | `O`                   |
//! | show           | `S`                   |
//!
//! Nothing is ever read back from the controller.

use std::fmt;
use std::str::FromStr;

use ledwatch_core::Color;

/// A single controller command. Fields are already in wire range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetPixel { index: u8, color: Color },
    SetAll(Color),
    SetBrightness(u8),
    Clear,
    /// Apply everything staged so far.
    Show,
}

impl Command {
    /// Encode as a newline-terminated line ready for the wire.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }

    /// Whether this command makes staged state visible.
    pub fn is_show(&self) -> bool {
        matches!(self, Command::Show)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetPixel { index, color } => {
                write!(f, "C,{index},{},{},{}", color.r, color.g, color.b)
            }
            Command::SetAll(color) => write!(f, "A,{},{},{}", color.r, color.g, color.b),
            Command::SetBrightness(level) => write!(f, "B,{level}"),
            Command::Clear => f.write_str("O"),
            Command::Show => f.write_str("S"),
        }
    }
}

/// A line that is not a valid controller command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(pub String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid device command: {:?}", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        let err = || ParseCommandError(line.to_string());
        let mut parts = line.split(',');
        let op = parts.next().ok_or_else(err)?;
        let fields = parts
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;

        match (op, fields.as_slice()) {
            ("C", &[index, r, g, b]) => Ok(Command::SetPixel {
                index,
                color: Color::new(r, g, b),
            }),
            ("A", &[r, g, b]) => Ok(Command::SetAll(Color::new(r, g, b))),
            ("B", &[level]) => Ok(Command::SetBrightness(level)),
            ("O", &[]) => Ok(Command::Clear),
            ("S", &[]) => Ok(Command::Show),
            _ => Err(err()),
        }
    }
}
