use clap::ArgMatches;
use clap_complete::{generate, Shell};
use classworks::prelude::*;
use classworks::{cli, cw_cfg, cw_dissect, cw_verify};
use std::io;

fn main() -> CwResult<()> {
    let args = cli::classworks().get_matches();

    match &args.subcommand() {
        Some(("cfg", cmd_args)) => cw_cfg::run(cmd_args),
        Some(("dissect", cmd_args)) => cw_dissect::run(cmd_args),
        Some(("verify", cmd_args)) => cw_verify::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(CwError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(CwError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> CwResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| CwError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::classworks();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
