//! Main `ClassWorks` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input class file or jar archive")
}

fn arg_classpath() -> Arg {
    Arg::new("classpath")
        .short('c')
        .long("classpath")
        .action(ArgAction::Set)
        .help("Class path (directories and jars), defaults to $CLASSPATH")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

#[must_use]
pub fn classworks() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(cfg())
        .subcommand(dissect())
        .subcommand(verify())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn cfg() -> Command {
    Command::new("cfg")
        .bin_name("cw-cfg")
        .version(VERSION)
        .author(AUTHORS)
        .about("Generates methods control flow graphs")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Dot output directory"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
}

#[must_use]
pub fn dissect() -> Command {
    Command::new("dissect")
        .bin_name("cw-dissect")
        .version(VERSION)
        .author(AUTHORS)
        .about("Dumps class file tables")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(
            Arg::new("table")
                .short('t')
                .long("table")
                .action(ArgAction::Set)
                .value_parser(["class", "constants", "fields", "methods", "attributes", "code"])
                .required(true),
        )
}

#[must_use]
pub fn verify() -> Command {
    Command::new("verify")
        .bin_name("cw-verify")
        .version(VERSION)
        .author(AUTHORS)
        .about("Verifies class files bytecode")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_classpath())
        .arg(arg_output("Output JSON report file"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(
            Arg::new("level")
                .short('l')
                .long("level")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u8).range(0..=3))
                .default_value("0")
                .help("Analysis report level: 0 silent, 1 methods, 2 blocks, 3 instructions"),
        )
        .arg(
            Arg::new("no-structural")
                .long("no-structural")
                .action(ArgAction::SetTrue)
                .help("Skip class file structural checks"),
        )
        .arg(
            Arg::new("no-dataflow")
                .long("no-dataflow")
                .action(ArgAction::SetTrue)
                .help("Skip bytecode typing"),
        )
}
