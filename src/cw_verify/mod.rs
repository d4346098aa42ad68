use crate::inputs::{self, Input};
use crate::prelude::*;
use clap::ArgMatches;
use nu_ansi_term::Color;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

#[derive(Serialize)]
struct Report<'a> {
    input: &'a str,
    classes: &'a [ClassReport],
    unreadable: Vec<(String, String)>,
}

pub fn run(args: &ArgMatches) -> CwResult<()> {
    init_logger(args);

    let classpath = inputs::classpath(args)?;
    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| CwError::BadArguments("--input needed".to_string()))?;
    let input = Input::open(input_fname, &classpath)?;

    let class_pattern = inputs::filter(args, "filter-class")?;
    let config = Config {
        verbosity: Verbosity::from(*args.get_one::<u8>("level").unwrap_or(&0)),
        structural: !args.get_flag("no-structural"),
        dataflow: !args.get_flag("no-dataflow"),
        method_filter: inputs::filter(args, "filter-method")?,
    };
    log::debug!("{config:?}");

    let mut last_res = Ok(());
    let mut unreadable = Vec::new();
    for (name, err) in input.failures() {
        log::error!("{name}: {err}");
        unreadable.push((name.clone(), err.to_string()));
        last_res = Err(CwError::Verification(format!("{name}: {err}")));
    }

    let classes: Vec<&Arc<ClassFile>> = input.iter_classes(class_pattern.as_ref()).collect();
    let verify = |class: &&Arc<ClassFile>| verify_class(class, &classpath, &config);
    // frames dumps of concurrent classes would interleave
    let results: Vec<_> = if config.verbosity >= Verbosity::Blocks {
        classes.iter().map(verify).collect()
    } else {
        classes.par_iter().map(verify).collect()
    };

    let mut reports = Vec::with_capacity(results.len());
    for res in results {
        match res {
            Ok(report) => reports.push(report),
            Err(err) => {
                log::error!("{err}");
                last_res = Err(err.into());
            }
        }
    }

    let mut nb_success = 0;
    let mut nb_fails = 0;
    let mut nb_rejected = 0;
    for report in &reports {
        if report.is_ok() {
            println!("{}", Color::Green.paint(format!("[+] {}", report.name)));
        } else {
            nb_rejected += 1;
            println!("{}", Color::Red.paint(format!("[-] {}", report.name)));
            if let Some(err) = &report.structure {
                println!("    {err}");
                last_res = Err(CwError::Verification(format!("{}: {err}", report.name)));
            }
        }
        for method in &report.methods {
            if method.is_ok() {
                nb_success += 1;
            } else {
                nb_fails += 1;
                println!("    {method}");
                last_res = Err(CwError::Verification(format!("{}.{method}", report.name)));
            }
        }
    }

    if let Some(output) = args.get_one::<String>("output") {
        let report = Report {
            input: input_fname,
            classes: &reports,
            unreadable,
        };
        let writer = BufWriter::new(File::create(output)?);
        serde_json::to_writer_pretty(writer, &report)?;
        log::info!("report written to {output}");
    }

    log::info!("");
    log::info!(
        "verified methods: {} / {}",
        nb_success,
        nb_success + nb_fails
    );
    log::info!(
        "rejected classes: {} / {}",
        nb_rejected,
        reports.len()
    );

    last_res
}
