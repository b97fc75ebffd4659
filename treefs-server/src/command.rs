use std::convert::TryFrom;
use std::fs::File;
use std::io::{BufWriter, Write};

use log::warn;
use thiserror::Error;
use treefs::{result_code, Inumber, NodeKind, TreeFs};

/// Result code for failures outside the tree itself: malformed requests,
/// unreadable messages, tree dump I/O errors. Shares its value with
/// `FsError::InvalidName`.
pub const ERROR_OTHER: i32 = -11;

/// One request, as read from a batch file line or a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create { path: String, kind: NodeKind },
    Delete { path: String },
    Lookup { path: String },
    Move { src: String, dest: String },
    /// Dump the tree to a file on the machine running the tree.
    Print { path: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),
    #[error("command \"{verb}\" takes {expected} argument(s), got {got}")]
    WrongArity {
        verb: char,
        expected: usize,
        got: usize,
    },
    #[error("invalid node type \"{0}\", expected \"f\" or \"d\"")]
    InvalidNodeType(String),
}

impl Command {
    /// Parses `c <path> <f|d>`, `d <path>`, `l <path>`, `m <src> <dest>` or
    /// `p <path>`. Blank lines and lines starting with `#` yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
        let mut tokens = line.split_whitespace();
        let verb = match tokens.next() {
            None => return Ok(None),
            Some(verb) if verb.starts_with('#') => return Ok(None),
            Some(verb) => verb,
        };
        let args: Vec<&str> = tokens.collect();

        let mut chars = verb.chars();
        let verb = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Err(ParseError::UnknownCommand(verb.to_string())),
        };
        let expected = match verb {
            'c' | 'm' => 2,
            'd' | 'l' | 'p' => 1,
            _ => return Err(ParseError::UnknownCommand(verb.to_string())),
        };
        if args.len() != expected {
            return Err(ParseError::WrongArity {
                verb,
                expected,
                got: args.len(),
            });
        }

        let path = args[0].to_string();
        let command = match verb {
            'c' => {
                let kind = match args[1] {
                    "f" => NodeKind::File,
                    "d" => NodeKind::Directory,
                    other => return Err(ParseError::InvalidNodeType(other.to_string())),
                };
                Command::Create { path, kind }
            }
            'm' => Command::Move {
                src: path,
                dest: args[1].to_string(),
            },
            'd' => Command::Delete { path },
            'l' => Command::Lookup { path },
            _ => Command::Print { path },
        };
        Ok(Some(command))
    }

    /// Runs the command against `fs` and returns its result code: `0` on
    /// success, the inumber for a successful lookup, a negative code otherwise.
    pub fn apply(&self, fs: &TreeFs) -> i32 {
        match self {
            Command::Create { path, kind } => result_code(&fs.create(path, *kind)),
            Command::Delete { path } => result_code(&fs.delete(path)),
            Command::Move { src, dest } => result_code(&fs.move_node(src, dest)),
            Command::Lookup { path } => match fs.lookup(path) {
                Ok(inumber) => lookup_code(inumber),
                Err(e) => e.code(),
            },
            Command::Print { path } => match dump_tree(fs, path) {
                Ok(()) => treefs::SUCCESS,
                Err(e) => {
                    warn!("failed to dump tree to {}: {}", path, e);
                    ERROR_OTHER
                }
            },
        }
    }

    /// Human readable line describing the command and its outcome.
    pub fn status(&self, code: i32) -> String {
        match self {
            Command::Create {
                path,
                kind: NodeKind::File,
            } => format!("Create file: {}", path),
            Command::Create {
                path,
                kind: NodeKind::Directory,
            } => format!("Create directory: {}", path),
            Command::Delete { path } => format!("Delete: {}", path),
            Command::Move { src, dest } => format!("Move: {} to {}", src, dest),
            Command::Lookup { path } if code >= 0 => format!("Search: {} found", path),
            Command::Lookup { path } => format!("Search: {} not found", path),
            Command::Print { path } => format!("Print: {}", path),
        }
    }
}

/// An inumber as a result code. Inumbers that do not fit are reported as
/// `ERROR_OTHER` rather than wrapping into a negative code.
fn lookup_code(inumber: Inumber) -> i32 {
    i32::try_from(inumber).unwrap_or(ERROR_OTHER)
}

fn dump_tree(fs: &TreeFs, path: &str) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    fs.print_tree(&mut out)?;
    out.flush()
}
