use anyhow::{anyhow, bail, Context, Result};

use fargo::target::Target;
use fargo::RunOptions;

const USAGE: &str = "Usage: fargo [explore] <target> [--count N]

Targets:
  @fname/casts         Recent casts by a user
  @fname/0x<hash>      A cast and its replies
  fid:<n>/casts        Same as @fname, addressing the user by fid

Options:
  -c, --count N        Number of casts to list (default: explore.count)
  -V, --version        Show version and exit
  -h, --help           Show this help message";

fn main() {
    if handle_cli_flags() {
        return;
    }

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("error: {err:#}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = fargo::run(opts) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("fargo {}", fargo::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("fargo: explore Farcaster casts from the terminal.\n\n{USAGE}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RunOptions> {
    let mut args = args.into_iter().peekable();
    if args.peek().map(String::as_str) == Some("explore") {
        args.next();
    }

    let mut target: Option<Target> = None;
    let mut count: Option<usize> = None;
    while let Some(arg) = args.next() {
        if arg == "-c" || arg == "--count" {
            let value = args
                .next()
                .ok_or_else(|| anyhow!("{arg} needs a value"))?;
            count = Some(parse_count(&value)?);
        } else if let Some(value) = arg.strip_prefix("--count=") {
            count = Some(parse_count(value)?);
        } else if arg.starts_with('-') && arg.len() > 1 {
            bail!("unknown option {arg}");
        } else if target.is_some() {
            bail!("unexpected argument {arg}");
        } else {
            target = Some(arg.parse()?);
        }
    }

    let target = target.ok_or_else(|| anyhow!("missing target"))?;
    Ok(RunOptions { target, count })
}

fn parse_count(value: &str) -> Result<usize> {
    let count: usize = value
        .parse()
        .with_context(|| format!("invalid count {value:?}"))?;
    if count == 0 {
        bail!("count must be at least 1");
    }
    Ok(count)
}
