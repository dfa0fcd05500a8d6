//! Worker instructions and their text form.
//!
//! Programs travel to workers as newline-separated text:
//!
//! ```text
//! SEND A 1
//! RECV B
//! MERG R B
//! END R
//! ```
//!
//! A worker with nothing to do gets the single line `X`.

use std::fmt;
use std::str::FromStr;

/// Text of a program with no instructions.
pub const EMPTY_PROGRAM: &str = "X";

/// One step of a worker program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum Instruction {
    /// Transmit `module` to worker `target` through the coordinator.
    Send {
        /// Module to transmit.
        module: String,
        /// Destination worker id.
        target: usize,
    },
    /// Wait until `module` has arrived and store it.
    Recv {
        /// Module expected.
        module: String,
    },
    /// Substitute `son` into `parent`.
    #[serde(rename = "MERG")]
    Merge {
        /// Module receiving the substitution.
        parent: String,
        /// Module substituted in.
        son: String,
    },
    /// Deliver `module` as the final result and stop.
    End {
        /// The root module.
        module: String,
    },
}

impl Instruction {
    /// Opcode text.
    pub fn opcode(&self) -> &'static str {
        match self {
            Self::Send { .. } => "SEND",
            Self::Recv { .. } => "RECV",
            Self::Merge { .. } => "MERG",
            Self::End { .. } => "END",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { module, target } => write!(f, "SEND {module} {target}"),
            Self::Recv { module } => write!(f, "RECV {module}"),
            Self::Merge { parent, son } => write!(f, "MERG {parent} {son}"),
            Self::End { module } => write!(f, "END {module}"),
        }
    }
}

/// Failure to parse instruction text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseInstructionError {
    /// The line is empty.
    #[error("empty instruction")]
    Empty,
    /// The opcode is not one of SEND, RECV, MERG, END.
    #[error("unknown opcode {0:?}")]
    UnknownOpcode(String),
    /// Wrong number of operands for the opcode.
    #[error("{opcode} expects {expected} operands, got {actual}")]
    Arity {
        /// Opcode of the line.
        opcode: &'static str,
        /// Required operand count.
        expected: usize,
        /// Operands present.
        actual: usize,
    },
    /// SEND target is not a worker id.
    #[error("invalid SEND target {0:?}")]
    InvalidTarget(String),
}

impl FromStr for Instruction {
    type Err = ParseInstructionError;

    /// # Examples
    ///
    /// ```
    /// use pla_compose::schedule::Instruction;
    ///
    /// let send: Instruction = "SEND M2 1".parse().unwrap();
    /// assert_eq!(send, Instruction::Send { module: "M2".into(), target: 1 });
    /// assert!("JUMP M2".parse::<Instruction>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let opcode = words.next().ok_or(ParseInstructionError::Empty)?;
        let operands: Vec<&str> = words.collect();
        let arity = |opcode: &'static str, expected: usize| {
            if operands.len() == expected {
                Ok(())
            } else {
                Err(ParseInstructionError::Arity {
                    opcode,
                    expected,
                    actual: operands.len(),
                })
            }
        };

        match opcode {
            "SEND" => {
                arity("SEND", 2)?;
                let target = operands[1]
                    .parse()
                    .map_err(|_| ParseInstructionError::InvalidTarget(operands[1].to_string()))?;
                Ok(Self::Send {
                    module: operands[0].to_string(),
                    target,
                })
            }
            "RECV" => {
                arity("RECV", 1)?;
                Ok(Self::Recv {
                    module: operands[0].to_string(),
                })
            }
            "MERG" => {
                arity("MERG", 2)?;
                Ok(Self::Merge {
                    parent: operands[0].to_string(),
                    son: operands[1].to_string(),
                })
            }
            "END" => {
                arity("END", 1)?;
                Ok(Self::End {
                    module: operands[0].to_string(),
                })
            }
            other => Err(ParseInstructionError::UnknownOpcode(other.to_string())),
        }
    }
}

/// An ordered instruction list for one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Creates an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Instructions in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// `true` when the worker has nothing to do.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Wire text: one `\n`-terminated line per instruction, or `X` when
    /// empty.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return EMPTY_PROGRAM.to_string();
        }
        self.instructions
            .iter()
            .map(|instruction| format!("{instruction}\n"))
            .collect()
    }

    /// Parses wire text. Blank lines are skipped; `X` alone is the empty
    /// program.
    ///
    /// # Examples
    ///
    /// ```
    /// use pla_compose::schedule::Program;
    ///
    /// let program = Program::parse("RECV A\nMERG R A\nEND R\n").unwrap();
    /// assert_eq!(program.len(), 3);
    /// assert_eq!(program.to_text(), "RECV A\nMERG R A\nEND R\n");
    /// assert!(Program::parse("X").unwrap().is_empty());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ParseInstructionError> {
        if text.trim() == EMPTY_PROGRAM {
            return Ok(Self::new());
        }
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(|instructions| Self { instructions })
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
