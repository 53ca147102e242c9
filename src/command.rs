//! Line commands understood by the driver.

use std::path::PathBuf;
use std::str::FromStr;

use zsheet_core::{CellRef, OpCode, Session};
use zsheet_engine::engine::format_number;

pub const HELP: &str = "\
Commands:
  set <A1> <text>   Store a number or formula (=SUM, =AVG, =MAX, =MIN, =1+2*3)
  get <A1>          Print a cell's value
  select <A1>       Print a cell's editable text and its stats
  save <path>       Save the grid as .zsff
  load <path>       Load .zsff or CSV
  export <path>     Write the grid as CSV
  sum               Total of every cell
  scale             Multiply every cell by the configured factor
  recalc            Re-evaluate every formula
  stats             Average, total and count over the grid
  recover           Load the last auto-recovery snapshot
  status            Print the status line
  help              Show this help
  quit              Exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { cell: CellRef, text: String },
    Get(CellRef),
    Select(CellRef),
    Save(PathBuf),
    Load(PathBuf),
    Export(PathBuf),
    Op(OpCode),
    Recalc,
    Stats,
    Recover,
    Status,
    Help,
    Quit,
}

/// What running a command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: String,
    pub ok: bool,
    pub quit: bool,
}

impl Outcome {
    fn ok(output: impl Into<String>) -> Self {
        Outcome {
            output: output.into(),
            ok: true,
            quit: false,
        }
    }

    fn from_status(ok: bool, session: &Session) -> Self {
        Outcome {
            output: session.status().to_string(),
            ok,
            quit: false,
        }
    }
}

fn parse_cell(arg: Option<&str>) -> Result<CellRef, String> {
    let arg = arg.ok_or_else(|| "Missing cell reference".to_string())?;
    arg.parse::<CellRef>()
}

fn parse_path(rest: &str, verb: &str) -> Result<PathBuf, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(format!("{verb} requires a file path"));
    }
    Ok(PathBuf::from(rest))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let rest = rest.trim_start();

        match verb.to_ascii_lowercase().as_str() {
            "set" => {
                let (cell, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Ok(Command::Set {
                    cell: parse_cell(Some(cell).filter(|c| !c.is_empty()))?,
                    text: text.trim().to_string(),
                })
            }
            "get" => Ok(Command::Get(parse_cell(rest.split_whitespace().next())?)),
            "select" => Ok(Command::Select(parse_cell(rest.split_whitespace().next())?)),
            "save" | "w" => Ok(Command::Save(parse_path(rest, "save")?)),
            "load" | "e" => Ok(Command::Load(parse_path(rest, "load")?)),
            "export" => Ok(Command::Export(parse_path(rest, "export")?)),
            "sum" => Ok(Command::Op(OpCode::SumAll)),
            "scale" => Ok(Command::Op(OpCode::Scale)),
            "op" => Ok(Command::Op(rest.parse()?)),
            "recalc" => Ok(Command::Recalc),
            "stats" => Ok(Command::Stats),
            "recover" => Ok(Command::Recover),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            "" => Err("Empty command".to_string()),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Run one command against the session.
pub fn execute(session: &mut Session, command: Command) -> Outcome {
    match command {
        Command::Set { cell, text } => {
            session.on_cell_edit(cell.row, cell.col, &text);
            Outcome::from_status(true, session)
        }
        Command::Get(cell) => match session.value(cell.row, cell.col) {
            Some(v) => Outcome::ok(format_number(v)),
            None => Outcome {
                output: format!("{cell} is outside the grid"),
                ok: false,
                quit: false,
            },
        },
        Command::Select(cell) => {
            if session.value(cell.row, cell.col).is_none() {
                return Outcome {
                    output: format!("{cell} is outside the grid"),
                    ok: false,
                    quit: false,
                };
            }
            let text = session.on_cell_select(cell.row, cell.col);
            Outcome::ok(format!("{cell}: {text}\n{}", session.stats()))
        }
        Command::Save(path) => {
            let ok = session.on_save_requested(&path);
            Outcome::from_status(ok, session)
        }
        Command::Load(path) => {
            let ok = session.on_load_requested(&path);
            Outcome::from_status(ok, session)
        }
        Command::Export(path) => {
            let ok = session.export_csv(&path);
            Outcome::from_status(ok, session)
        }
        Command::Op(op) => {
            let ok = session.on_accelerated_op_requested(op);
            Outcome::from_status(ok, session)
        }
        Command::Recalc => {
            let report = session.recalculate();
            Outcome::from_status(report.failed == 0, session)
        }
        Command::Stats => Outcome::ok(session.grid_stats().to_string()),
        Command::Recover => {
            let ok = session.recover();
            Outcome::from_status(ok, session)
        }
        Command::Status => Outcome::ok(session.status()),
        Command::Help => Outcome::ok(HELP),
        Command::Quit => Outcome {
            output: String::new(),
            ok: true,
            quit: true,
        },
    }
}
