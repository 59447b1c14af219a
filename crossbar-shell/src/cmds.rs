//! The built-in shell commands.
//!
//! Each command parses its argv with clap and runs on the shell thread.
//! Exit codes follow the entry convention: 0 for success, negative for
//! failure. Failures never terminate the shell.

use crate::{CmdCtx, CommandDef, InputSwitch};
use clap::Parser;
use crossbar_core::{LogLevel, Node, NodeLogger, ObjectKind, registry, set_global_level};
use globset::{Glob, GlobMatcher};
use std::path::PathBuf;

fn parse<T: Parser>(argv: &[String]) -> Result<T, i32> {
    T::try_parse_from(argv).map_err(|e| {
        let code = if e.use_stderr() { -1 } else { 0 };
        let _ = e.print();
        code
    })
}

fn matcher(pattern: &str) -> Result<GlobMatcher, i32> {
    Glob::new(pattern).map(|g| g.compile_matcher()).map_err(|e| {
        eprintln!("bad glob '{pattern}': {e}");
        -1
    })
}

#[derive(Parser)]
#[command(name = "list", about = "list registered entries, commands, and live objects")]
struct ListArgs {
    /// show the registered task entries
    #[arg(short = 'e', long = "entry")]
    entries: bool,
    /// show the registered shell commands
    #[arg(short = 'c', long = "cmd")]
    commands: bool,
    /// show the live named objects
    #[arg(short = 'o', long = "obj")]
    objects: bool,
}

fn list(_ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let args: ListArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if args.entries {
        println!("task entries:");
        for e in crate::entries() {
            println!("  {}", e.name);
        }
    }
    if args.commands {
        println!("shell commands:");
        for c in crate::commands() {
            println!("  {}", c.name);
        }
    }
    if args.objects {
        println!("{:<10} {:<28} {:>5}", "type", "name", "refs");
        for (kind, name, refs) in registry::objects() {
            println!("{:<10} {:<28} {:>5}", kind, name, refs);
        }
    }
    0
}

inventory::submit! { CommandDef { name: "list", run: list } }

#[derive(Parser)]
#[command(name = "exec", about = "run a task entry on a new node")]
struct ExecArgs {
    /// the entry to run
    entry: String,
    /// arguments passed to the entry
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn exec(_ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let args: ExecArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let Some(entry) = crate::find_entry(&args.entry) else {
        eprintln!("entry '{}' not found!", args.entry);
        return -1;
    };
    match crate::spawn_entry(entry, args.args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("could not spawn '{}': {e:?}", args.entry);
            -1
        }
    }
}

inventory::submit! { CommandDef { name: "exec", run: exec } }

#[derive(Parser)]
#[command(name = "logger", about = "set the global or per-node log level")]
struct LoggerArgs {
    /// the nodes to set, as a glob; omit to set the global ceiling
    node: Option<String>,
    /// the log level
    #[arg(short, long)]
    level: LogLevel,
}

fn logger(_ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let args: LoggerArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match &args.node {
        None => {
            set_global_level(args.level);
            0
        }
        Some(pattern) => {
            let m = match matcher(pattern) {
                Ok(m) => m,
                Err(code) => return code,
            };
            registry::visit::<NodeLogger>(ObjectKind::Logger, |name, log| {
                if m.is_match(name.as_str()) {
                    log.set_local_level(args.level)
                }
            });
            0
        }
    }
}

inventory::submit! { CommandDef { name: "logger", run: logger } }

#[derive(Parser)]
#[command(name = "stop", about = "ask the matching nodes to exit")]
struct StopArgs {
    /// the nodes to stop, as a glob
    node: String,
}

fn stop(_ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let args: StopArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let m = match matcher(&args.node) {
        Ok(m) => m,
        Err(code) => return code,
    };
    registry::visit::<Node>(ObjectKind::Node, |name, node| {
        if m.is_match(name.as_str()) {
            node.stop()
        }
    });
    0
}

inventory::submit! { CommandDef { name: "stop", run: stop } }

#[derive(Parser)]
#[command(name = "script", about = "read commands from a file")]
struct ScriptArgs {
    /// the script file to run
    file: PathBuf,
}

fn script(ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let args: ScriptArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if !args.file.exists() {
        eprintln!("{}: no such file or directory", args.file.display());
        return -1;
    }
    ctx.switch = Some(InputSwitch::Script(args.file));
    0
}

inventory::submit! { CommandDef { name: "script", run: script } }

#[derive(Parser)]
#[command(name = "console", about = "read commands from the terminal again")]
struct ConsoleArgs {}

fn console(ctx: &mut CmdCtx, argv: &[String]) -> i32 {
    let _args: ConsoleArgs = match parse(argv) {
        Ok(a) => a,
        Err(code) => return code,
    };
    ctx.switch = Some(InputSwitch::Console);
    0
}

inventory::submit! { CommandDef { name: "console", run: console } }
