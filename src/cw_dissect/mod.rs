use crate::inputs::{self, Input};
use crate::prelude::*;
use clap::ArgMatches;
use cw_classfile::attributes::Attribute;
use regex::Regex;

pub fn run(args: &ArgMatches) -> CwResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| CwError::BadArguments("--input needed".to_string()))?;
    let input = Input::open(input_fname, &ClassPath::default())?;
    for (name, err) in input.failures() {
        log::error!("{name}: {err}");
    }

    let table = args
        .get_one::<String>("table")
        .ok_or_else(|| CwError::BadArguments("--table needed".to_string()))?;
    let class_pattern = inputs::filter(args, "filter-class")?;
    let method_pattern = inputs::filter(args, "filter-method")?;

    for class in input.iter_classes(class_pattern.as_ref()) {
        println!("[*] {}", class.name()?);
        match &**table {
            "class" => dump_class(class)?,
            "constants" => {
                for (i, constant) in class.constant_pool().iter() {
                    println!("Constant[{i:6}] = {constant}");
                }
            }
            "fields" => {
                let pool = class.constant_pool();
                for (i, field) in class.iter_fields().enumerate() {
                    println!(
                        "Field[{:6}] = {} {} {}",
                        i,
                        field.flags(),
                        field.name(pool)?,
                        field.descriptor(pool)?
                    );
                }
            }
            "methods" => {
                let pool = class.constant_pool();
                for (i, method) in class.iter_methods().enumerate() {
                    println!(
                        "Method[{:6}] = {} {}{}",
                        i,
                        method.flags(),
                        method.name(pool)?,
                        method.descriptor(pool)?
                    );
                }
            }
            "attributes" => dump_attributes(class)?,
            "code" => dump_code(class, method_pattern.as_ref())?,
            _ => {
                return Err(CwError::BadArguments(format!(
                    "unknown table '{table}'"
                )))
            }
        }
    }

    Ok(())
}

fn dump_class(class: &ClassFile) -> CwResult<()> {
    println!("version    = {}.{}", class.major_version(), class.minor_version());
    println!("flags      = {}", class.flags());
    println!("this       = {}", class.name()?);
    println!(
        "super      = {}",
        class.super_name()?.as_deref().unwrap_or("(none)")
    );
    for interface in class.interfaces()? {
        println!("interface  = {interface}");
    }
    if let Some(source) = class.source_file()? {
        println!("source     = {source}");
    }
    Ok(())
}

fn print_attributes<'a>(owner: &str, attributes: impl Iterator<Item = &'a Attribute>) {
    for (i, attribute) in attributes.enumerate() {
        println!("{owner}.Attribute[{i:3}] = {attribute}");
    }
}

fn dump_attributes(class: &ClassFile) -> CwResult<()> {
    let pool = class.constant_pool();
    print_attributes("Class", class.iter_attributes());
    for field in class.iter_fields() {
        print_attributes(&field.name(pool)?, field.iter_attributes());
    }
    for method in class.iter_methods() {
        let name = format!("{}{}", method.name(pool)?, method.descriptor(pool)?);
        print_attributes(&name, method.iter_attributes());
        if let Some(code) = method.code() {
            print_attributes(&format!("{name}.Code"), code.iter_attributes());
        }
    }
    Ok(())
}

fn dump_code(class: &ClassFile, method_pattern: Option<&Regex>) -> CwResult<()> {
    let pool = class.constant_pool();
    for method in class.iter_methods() {
        let Some(code) = method.code() else {
            continue;
        };
        let name = method.name(pool)?;
        if !method_pattern.map_or(true, |r| r.is_match(&name)) {
            continue;
        }
        println!(
            "  {}{} (max_stack={}, max_locals={})",
            name,
            method.descriptor(pool)?,
            code.max_stack(),
            code.max_locals()
        );
        match code.instructions() {
            Ok(instrs) => {
                for linstr in &instrs {
                    match code.line_of(linstr.addr()) {
                        Some(line) => println!("    {linstr}    // line {line}"),
                        None => println!("    {linstr}"),
                    }
                }
            }
            Err(err) => log::error!("{name}: {err}"),
        }
        for entry in code.exception_table() {
            let catch = if entry.catch_type == 0 {
                "any".to_string()
            } else {
                pool.class_name(entry.catch_type.into())?
            };
            println!(
                "    catch [{}, {}) -> {}: {}",
                entry.start_pc, entry.end_pc, entry.handler_pc, catch
            );
        }
    }
    Ok(())
}
