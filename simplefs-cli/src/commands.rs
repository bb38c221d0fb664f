use std::io::Write;

use clap::ArgMatches;
use simplefs::alloc::State;
use simplefs::tree::Kind;
use simplefs::{SFSError, Volume};

/// Blocks per row when rendering the allocation bitmap.
const USAGE_ROW: usize = 32;

#[derive(Debug, PartialEq)]
pub enum Command {
    Create { path: String, content: String },
    Delete { path: String },
    Read { path: String },
    Write { path: String, content: String },
    Reset,
    List { dir: String },
    Tree,
    Usage,
}

impl Command {
    pub fn from_matches(matches: &ArgMatches) -> Option<Command> {
        fn arg(sub: &ArgMatches, name: &str) -> String {
            sub.value_of(name).unwrap_or_default().to_string()
        }

        match matches.subcommand() {
            ("create", Some(sub)) => Some(Command::Create {
                path: arg(sub, "path"),
                content: arg(sub, "content"),
            }),
            ("delete", Some(sub)) => Some(Command::Delete {
                path: arg(sub, "path"),
            }),
            ("read", Some(sub)) => Some(Command::Read {
                path: arg(sub, "path"),
            }),
            ("write", Some(sub)) => Some(Command::Write {
                path: arg(sub, "path"),
                content: arg(sub, "content"),
            }),
            ("reset", _) => Some(Command::Reset),
            ("ls", Some(sub)) => Some(Command::List {
                dir: arg(sub, "dir"),
            }),
            ("ls", None) => Some(Command::List { dir: String::new() }),
            ("tree", _) => Some(Command::Tree),
            ("usage", _) => Some(Command::Usage),
            _ => None,
        }
    }

    /// Whether running the command can change the volume, so it must be saved afterwards.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Create { .. } | Command::Delete { .. } | Command::Write { .. } | Command::Reset
        )
    }
}

/// Runs `cmd` against `vol`, printing results to `out`.
pub fn execute<W: Write>(vol: &mut Volume, cmd: &Command, out: &mut W) -> Result<(), SFSError> {
    match cmd {
        Command::Create { path, content } => {
            vol.create(path, content.as_str())?;
            writeln!(out, "File created.")?;
        }
        Command::Delete { path } => {
            vol.delete(path)?;
            writeln!(out, "File deleted.")?;
        }
        Command::Read { path } => {
            let stat = vol.stat(path)?;
            let view = vol
                .read(path)
                .ok_or_else(|| SFSError::PathNotFound(path.clone()))?;
            writeln!(out, "Address: {}", stat.address)?;
            writeln!(out, "Length: {}", view.length)?;
            writeln!(out, "Content: {}", String::from_utf8_lossy(view.content))?;
        }
        Command::Write { path, content } => {
            vol.write(path, content.as_str())?;
            writeln!(out, "File updated.")?;
        }
        Command::Reset => {
            vol.reset();
            writeln!(out, "File system reset.")?;
        }
        Command::List { dir } => {
            for entry in vol.list(dir)? {
                match entry.kind {
                    Kind::Directory => writeln!(out, "{}/", entry.name)?,
                    Kind::File => writeln!(out, "{}", entry.name)?,
                }
            }
        }
        Command::Tree => write!(out, "{}", vol.tree())?,
        Command::Usage => render_usage(vol, out)?,
    }
    Ok(())
}

fn render_usage<W: Write>(vol: &Volume, out: &mut W) -> std::io::Result<()> {
    let mut row = String::with_capacity(USAGE_ROW);
    for (i, state) in vol.bitmap().iter().enumerate() {
        row.push(match state {
            State::Free => '0',
            State::Used => '1',
        });
        if (i + 1) % USAGE_ROW == 0 {
            writeln!(out, "{}", row)?;
            row.clear();
        }
    }
    if !row.is_empty() {
        writeln!(out, "{}", row)?;
    }
    writeln!(
        out,
        "{} of {} blocks free",
        vol.free_blocks(),
        vol.block_count()
    )
}
