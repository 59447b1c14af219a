//! The interactive shell for the crossbar broker.
//!
//! The shell reads command lines from a reedline REPL or from a script
//! file, dispatches them to the built-in commands, and launches task
//! entries on their own OS threads via [`spawn_entry`]. Commands and
//! entries self-register through `inventory`; a host program only has to
//! link its entry modules for `exec` to find them.

use anyhow::Result;
use crossbar_core::Node;
use derive_builder::Builder;
use log::{error, info};
use smallvec::SmallVec;
use std::{path::PathBuf, thread};

mod completion;
mod input;

pub mod cmds;
pub mod demos;

use input::{InputReader, Line};

/// The most tokens a command line is split into, fixed at build time.
pub const MAX_TOKENS: usize = 16;

/// A task entry: argv in (the tokens after the entry name), exit code out.
pub type EntryFn = fn(&[String]) -> i32;

/// A runnable entry, registered with `inventory::submit!`.
pub struct EntryDef {
    pub name: &'static str,
    pub run: EntryFn,
}

inventory::collect!(EntryDef);

/// A request a command makes of the shell's input loop.
pub enum InputSwitch {
    Script(PathBuf),
    Console,
}

/// Context handed to built-in commands.
#[derive(Default)]
pub struct CmdCtx {
    pub switch: Option<InputSwitch>,
}

/// A built-in command: runs on the shell thread, argv[0] is the command
/// name.
pub type CommandFn = fn(&mut CmdCtx, &[String]) -> i32;

pub struct CommandDef {
    pub name: &'static str,
    pub run: CommandFn,
}

inventory::collect!(CommandDef);

pub fn entries() -> impl Iterator<Item = &'static EntryDef> {
    inventory::iter::<EntryDef>.into_iter()
}

pub fn commands() -> impl Iterator<Item = &'static CommandDef> {
    inventory::iter::<CommandDef>.into_iter()
}

pub fn find_entry(name: &str) -> Option<&'static EntryDef> {
    entries().find(|e| e.name == name)
}

pub fn find_command(name: &str) -> Option<&'static CommandDef> {
    commands().find(|c| c.name == name)
}

/// Run `entry` as a task: spawn a thread, bind a fresh node named
/// `"<entry>-<id>"` to it, and invoke the entry. The node handle drops
/// when the entry returns; the thread is not joined.
pub fn spawn_entry(entry: &'static EntryDef, args: Vec<String>) -> Result<()> {
    thread::Builder::new().name(entry.name.to_string()).spawn(move || {
        let node = match Node::create(entry.name) {
            Ok(node) => node,
            Err(e) => {
                error!("could not create a node for {}: {e}", entry.name);
                return;
            }
        };
        info!("node {} started", node.name());
        let code = (entry.run)(&args);
        info!("node {} exited with code {code}", node.name());
    })?;
    Ok(())
}

fn tokenize(line: &str) -> SmallVec<[String; 8]> {
    line.split_whitespace().take(MAX_TOKENS).map(String::from).collect()
}

/// Execute one command line. Lines whose first token starts with `#` are
/// comments; unknown commands print an error and the shell continues.
/// Returns the input switch the command asked for, if any.
pub fn dispatch(line: &str) -> Option<InputSwitch> {
    let argv = tokenize(line);
    let first = argv.first()?;
    if first.starts_with('#') {
        return None;
    }
    match find_command(first) {
        None => {
            eprintln!("command '{first}' not found!");
            None
        }
        Some(cmd) => {
            let mut ctx = CmdCtx::default();
            let code = (cmd.run)(&mut ctx, &argv);
            if code < 0 {
                info!("command '{first}' exited with code {code}");
            }
            ctx.switch
        }
    }
}

/// Where the shell reads commands from at startup.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Read lines interactively with history and completion. Ctrl-d exits.
    Repl,
    /// Read lines from the file, then exit, unless the script switches the
    /// input back to the console.
    Script(PathBuf),
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Shell {
    /// the input mode the shell starts in
    #[builder(default = "Mode::Repl")]
    mode: Mode,
}

impl Shell {
    pub fn run(self) -> Result<()> {
        let mut input = match &self.mode {
            Mode::Repl => InputReader::console(),
            Mode::Script(path) => InputReader::script(path)?,
        };
        if matches!(self.mode, Mode::Repl) {
            println!("Welcome to the crossbar shell");
            println!("Press tab to complete a command, ctrl-d to exit");
        }
        loop {
            match input.read_line()? {
                Line::Eof => break Ok(()),
                Line::Interrupted => (),
                Line::Text(line) => match dispatch(&line) {
                    None => (),
                    Some(InputSwitch::Console) => input = InputReader::console(),
                    Some(InputSwitch::Script(path)) => match InputReader::script(&path) {
                        Ok(reader) => input = reader,
                        Err(e) => eprintln!("error: {e:?}"),
                    },
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbar_core::{ObjectKind, registry};
    use std::time::Duration;

    #[test]
    fn tokenizer_splits_and_caps() {
        let argv = tokenize("  stop   worker-* ");
        assert_eq!(argv.to_vec(), vec!["stop".to_string(), "worker-*".to_string()]);
        let long = (0..40).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        assert_eq!(tokenize(&long).len(), MAX_TOKENS);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        assert!(dispatch("").is_none());
        assert!(dispatch("   # a comment").is_none());
        assert!(dispatch("#list -o").is_none());
    }

    #[test]
    fn unknown_commands_are_reported_not_fatal() {
        assert!(dispatch("frobnicate now").is_none());
    }

    #[test]
    fn builtin_commands_are_registered() {
        for name in ["list", "exec", "logger", "stop", "script", "console"] {
            assert!(find_command(name).is_some(), "missing command {name}");
        }
    }

    #[test]
    fn demo_entries_are_registered() {
        for name in
            ["publisher", "subscriber", "server", "client", "sync_setter", "sync_waiter"]
        {
            assert!(find_entry(name).is_some(), "missing entry {name}");
        }
    }

    #[test]
    fn exec_and_stop_lifecycle() {
        let _ = env_logger::try_init();
        let live = || {
            registry::objects()
                .into_iter()
                .any(|(k, n, _)| k == ObjectKind::Node && n.starts_with("sync_waiter-"))
        };
        assert!(dispatch("exec sync_waiter").is_none());
        let mut tries = 0;
        while !live() && tries < 100 {
            std::thread::sleep(Duration::from_millis(20));
            tries += 1;
        }
        assert!(live(), "the node never appeared");
        assert!(dispatch("stop sync_waiter-*").is_none());
        let mut tries = 0;
        while live() && tries < 250 {
            std::thread::sleep(Duration::from_millis(20));
            tries += 1;
        }
        assert!(!live(), "the node never exited");
    }
}
