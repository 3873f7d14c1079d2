//! Operator console — parses `create`/`run`/`stop`/`delete`/`change` lines and
//! applies them to a [`FastCmd`] context.
//!
//! Syntax: flags are `--key:value`, the action goes between backticks.
//! ```text
//! create --name:sun --type:Repeating --delay:20 --disable:200 `time set day`
//! change sun --delay:40
//! run sun
//! ```

use std::collections::HashMap;

use fastcmd_core::block::{BlockDefinition, BlockKind};
use fastcmd_core::error::{FastCmdError, Result};
use fastcmd_scheduler::{BlockUpdate, FastCmd, NewBlock};

/// What the console should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Reply(Vec<String>),
    Quit,
}

impl Outcome {
    fn line(text: impl Into<String>) -> Self {
        Outcome::Reply(vec![text.into()])
    }
}

/// Tokens of one console line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub words: Vec<String>,
    pub flags: HashMap<String, String>,
    pub action: Option<String>,
}

impl Args {
    pub fn parse(line: &str) -> Result<Self> {
        let mut args = Args::default();
        let mut chars = line.chars();
        let mut token = String::new();

        while let Some(c) = chars.next() {
            match c {
                '`' => {
                    let mut action = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '`' {
                            closed = true;
                            break;
                        }
                        action.push(c);
                    }
                    if !closed {
                        return Err(FastCmdError::InvalidConfiguration(
                            "unterminated `action`".into(),
                        ));
                    }
                    args.push(std::mem::take(&mut token));
                    args.action = Some(action);
                }
                c if c.is_whitespace() => args.push(std::mem::take(&mut token)),
                c => token.push(c),
            }
        }
        args.push(token);
        Ok(args)
    }

    fn push(&mut self, token: String) {
        if token.is_empty() {
            return;
        }
        match token.strip_prefix("--").and_then(|f| f.split_once(':')) {
            Some((key, value)) => {
                self.flags.insert(key.to_lowercase(), value.to_string());
            }
            None => self.words.push(token),
        }
    }

    fn flag(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(String::as_str)
    }

    fn ticks(&self, key: &str) -> Result<Option<u64>> {
        self.flag(key)
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    FastCmdError::InvalidConfiguration(format!(
                        "--{key} must be a whole number of ticks, got '{v}'"
                    ))
                })
            })
            .transpose()
    }

    fn kind(&self) -> Result<Option<BlockKind>> {
        self.flag("type").map(str::parse).transpose()
    }

    /// Target block: `--name:` flag, else the first word after the command.
    fn target(&self) -> Result<&str> {
        self.flag("name")
            .or_else(|| self.words.get(1).map(String::as_str))
            .ok_or_else(|| FastCmdError::InvalidConfiguration("no block name given".into()))
    }
}

/// Execute one console line.
pub fn execute(ctx: &FastCmd, line: &str) -> Result<Outcome> {
    let args = Args::parse(line)?;
    let Some(command) = args.words.first().map(|w| w.to_lowercase()) else {
        return Ok(Outcome::Reply(Vec::new()));
    };

    match command.as_str() {
        "create" => create(ctx, &args),
        "run" => {
            let name = args.target()?;
            if ctx.get(name)?.is_running() {
                return Ok(Outcome::line(format!("'{name}' is already running")));
            }
            ctx.run(name)?;
            Ok(Outcome::line(format!("Started '{name}'")))
        }
        "stop" => {
            let name = args.target()?;
            if ctx.stop(name)? {
                Ok(Outcome::line(format!("Stopped '{name}'")))
            } else {
                Ok(Outcome::line(format!("'{name}' is not running")))
            }
        }
        "delete" => {
            let name = args.target()?;
            ctx.delete(name)?;
            Ok(Outcome::line(format!("Deleted '{name}'")))
        }
        "change" => change(ctx, &args),
        "list" => Ok(Outcome::Reply(list(ctx))),
        "help" => Ok(Outcome::Reply(help())),
        "quit" | "exit" => Ok(Outcome::Quit),
        other => Err(FastCmdError::InvalidConfiguration(format!(
            "unknown command '{other}' (try 'help')"
        ))),
    }
}

fn create(ctx: &FastCmd, args: &Args) -> Result<Outcome> {
    let action = args
        .action
        .clone()
        .ok_or_else(|| FastCmdError::InvalidConfiguration("no `action` given".into()))?;

    let mut request = NewBlock::new(action);
    request.name = args.flag("name").map(str::to_string);
    request.kind = args.kind()?.unwrap_or(BlockKind::Normal);
    request.delay = args.ticks("delay")?;
    request.disable_time = args.ticks("disable")?;
    request.connected = args.flag("connected").map(str::to_string);

    let name = ctx.create(request)?;
    Ok(Outcome::line(format!("Created '{name}'")))
}

fn change(ctx: &FastCmd, args: &Args) -> Result<Outcome> {
    let name = args.target()?;
    let update = BlockUpdate {
        action: args.action.clone(),
        kind: args.kind()?,
        delay: args.ticks("delay")?,
        disable_time: args.ticks("disable")?,
        connected: args.flag("connected").map(str::to_string),
    };
    if update.is_empty() {
        return Ok(Outcome::line(format!("Nothing to change for '{name}'")));
    }
    ctx.update(name, update)?;
    Ok(Outcome::line(format!("Changed '{name}'")))
}

fn list(ctx: &FastCmd) -> Vec<String> {
    let blocks = ctx.list();
    if blocks.is_empty() {
        return vec!["No blocks defined".to_string()];
    }
    blocks.iter().map(describe).collect()
}

fn describe(block: &BlockDefinition) -> String {
    let mut line = format!(
        "{} [{}] delay={} disable={}",
        block.name(),
        block.kind,
        block.delay_ticks,
        block.disable_after_ticks
    );
    if let Some(connected) = &block.connected_name {
        line.push_str(&format!(" → {connected}"));
    }
    if let Some(tick) = block.started_at_tick() {
        line.push_str(&format!(" (running since tick {tick})"));
    }
    line.push_str(&format!(" `{}`", block.action));
    line
}

fn help() -> Vec<String> {
    [
        "create [--name:N] [--type:Normal|Chain|Repeating] [--delay:T] [--disable:T] [--connected:N] `action`",
        "run <name>            start (or restart) a block",
        "stop <name>           cancel a running block",
        "delete <name>         stop and remove a block",
        "change <name> [flags] [`action`]",
        "list                  show all blocks",
        "quit                  stop everything and exit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastcmd_core::config::FastCmdConfig;
    use fastcmd_scheduler::{LogExecutor, Registry};
    use std::sync::Arc;

    fn context() -> FastCmd {
        FastCmd::new(
            FastCmdConfig::default(),
            Arc::new(Registry::new()),
            Arc::new(LogExecutor),
        )
    }

    #[test]
    fn test_parse_flags_and_action() {
        let args =
            Args::parse("create --name:sun --type:Repeating `time set   day` --delay:20").unwrap();
        assert_eq!(args.words, vec!["create"]);
        assert_eq!(args.flag("name"), Some("sun"));
        assert_eq!(args.flag("type"), Some("Repeating"));
        assert_eq!(args.flag("delay"), Some("20"));
        assert_eq!(args.action.as_deref(), Some("time set   day"));
    }

    #[test]
    fn test_parse_rejects_unterminated_action() {
        assert!(Args::parse("create `say hi").is_err());
    }

    #[test]
    fn test_target_prefers_flag() {
        assert_eq!(Args::parse("run --name:a b").unwrap().target().unwrap(), "a");
        assert_eq!(Args::parse("run b").unwrap().target().unwrap(), "b");
        assert!(Args::parse("run").unwrap().target().is_err());
    }

    #[test]
    fn test_bad_numbers() {
        let args = Args::parse("create --delay:soon `x`").unwrap();
        assert!(matches!(
            args.ticks("delay"),
            Err(FastCmdError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_session() {
        let ctx = context();
        let reply = execute(&ctx, "create --name:a --delay:5 `say a`").unwrap();
        assert_eq!(reply, Outcome::line("Created 'a'"));
        execute(&ctx, "create --connected:a --type:chain `say b`").unwrap();
        assert!(ctx.registry().contains("cmdblock1"));

        assert_eq!(execute(&ctx, "run a").unwrap(), Outcome::line("Started 'a'"));
        assert_eq!(
            execute(&ctx, "run a").unwrap(),
            Outcome::line("'a' is already running")
        );
        assert_eq!(execute(&ctx, "stop a").unwrap(), Outcome::line("Stopped 'a'"));
        assert_eq!(
            execute(&ctx, "stop a").unwrap(),
            Outcome::line("'a' is not running")
        );

        execute(&ctx, "change a --delay:9 `say changed`").unwrap();
        assert_eq!(ctx.get("a").unwrap().delay_ticks, 9);
        assert_eq!(ctx.get("a").unwrap().action, "say changed");

        match execute(&ctx, "list").unwrap() {
            Outcome::Reply(lines) => {
                assert_eq!(lines.len(), 2);
                assert!(lines[1].contains("cmdblock1 [Chain]"));
                assert!(lines[1].contains("→ a"));
            }
            Outcome::Quit => panic!("list should not quit"),
        }

        execute(&ctx, "delete a").unwrap();
        assert!(matches!(execute(&ctx, "run a"), Err(FastCmdError::NotFound(_))));
        assert_eq!(execute(&ctx, "quit").unwrap(), Outcome::Quit);
    }

    #[tokio::test]
    async fn test_console_errors() {
        let ctx = context();
        assert!(execute(&ctx, "create --name:a").is_err());
        assert!(execute(&ctx, "create --type:impulse `x`").is_err());
        assert!(execute(&ctx, "launch a").is_err());
        assert_eq!(execute(&ctx, "   ").unwrap(), Outcome::Reply(Vec::new()));
    }
}
