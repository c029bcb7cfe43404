//! Interactive session
//!
//! One interpreter for the whole session, so definitions persist. The data
//! stack carries over between lines; a line that fails leaves it as it was.

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use slang_core::{Stack, Value, take_diagnostics};
use slang_runtime::Interpreter;
use std::path::PathBuf;
use tracing::debug;

/// What a line asks the session to do
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    ShowStack,
    ClearStack,
    Help,
    Eval(&'a str),
}

/// `:name` is also symbol syntax, so only the exact command words are
/// treated as commands. Anything else goes to the interpreter.
fn parse_line(line: &str) -> Command<'_> {
    match line {
        ":quit" | ":q" => Command::Quit,
        ":stack" | ":s" => Command::ShowStack,
        ":clear" => Command::ClearStack,
        ":help" | ":h" => Command::Help,
        code => Command::Eval(code),
    }
}

pub struct Session {
    interp: Interpreter,
    values: Vec<Value>,
}

impl Session {
    pub fn new(interp: Interpreter) -> Self {
        Session {
            interp,
            values: Vec::new(),
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.values
    }

    /// Evaluate one line on top of the current stack
    pub fn eval_line(&mut self, code: &str) -> Result<(), String> {
        let stack = Stack::from_values(self.values.clone());
        let result = self.interp.eval_with(code, stack);
        for diagnostic in take_diagnostics() {
            eprintln!("warning: {}", diagnostic);
        }
        match result {
            Ok(stack) => {
                self.values = stack.into_values();
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

fn history_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("slang_history"))
}

fn print_stack(values: &[Value]) {
    if values.is_empty() {
        println!("(empty)");
    } else {
        println!("{}", Stack::from_values(values.to_vec()));
    }
}

fn print_help() {
    println!(
        r#"
Slang REPL Commands:
  :stack, :s    Show the data stack
  :clear        Empty the data stack
  :help, :h     Show this help
  :quit, :q     Exit

Anything else is evaluated on top of the current stack.
Definitions (`:name def`, `:name defun`) persist for the session.
"#
    );
}

pub fn run(interp: Interpreter) -> Result<(), String> {
    let mut rl: Editor<(), DefaultHistory> =
        DefaultEditor::new().map_err(|e| format!("could not initialize readline: {}", e))?;

    let history = history_file();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    println!("Slang REPL. Type :help for commands, :quit to exit.");
    let mut session = Session::new(interp);

    loop {
        match rl.readline("slang> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match parse_line(line) {
                    Command::Quit => break,
                    Command::ShowStack => print_stack(session.stack()),
                    Command::ClearStack => {
                        session.clear();
                        println!("Stack cleared.");
                    }
                    Command::Help => print_help(),
                    Command::Eval(code) => match session.eval_line(code) {
                        Ok(()) => print_stack(session.stack()),
                        Err(e) => eprintln!("error: {}", e),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => println!("^C"),
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(format!("readline: {}", e)),
        }
    }

    if let Some(path) = &history
        && let Err(e) = rl.save_history(path)
    {
        debug!(path = %path.display(), error = %e, "could not save history");
    }
    Ok(())
}
