use crate::inputs::{self, Input};
use crate::prelude::*;
use clap::ArgMatches;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::Path;

pub fn run(args: &ArgMatches) -> CwResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| CwError::BadArguments("--input needed".to_string()))?;
    let input = Input::open(input_fname, &ClassPath::default())?;
    for (name, err) in input.failures() {
        log::error!("{name}: {err}");
    }

    let class_pattern = inputs::filter(args, "filter-class")?;
    let method_pattern = inputs::filter(args, "filter-method")?;

    let mut last_res = Ok(());
    for class in input.iter_classes(class_pattern.as_ref()) {
        let class_name = class.name()?;
        let pool = class.constant_pool();
        for method in class.iter_methods() {
            let Some(code) = method.code() else {
                continue;
            };
            let method_name = method.name(pool)?;
            if !method_pattern
                .as_ref()
                .map_or(true, |r| r.is_match(&method_name))
            {
                continue;
            }
            let descriptor = method.descriptor(pool)?;

            let cfg = match controlflow::Cfg::build(code, pool) {
                Ok(cfg) => cfg,
                Err(err) => {
                    log::error!("{class_name}.{method_name}{descriptor}: {err}");
                    last_res = Err(err.into());
                    continue;
                }
            };
            log::debug!(
                "{class_name}.{method_name}{descriptor}: {} blocks",
                cfg.nb_blocks()
            );

            if let Some(cfg_dir) = args.get_one::<String>("output") {
                write_cfg_file(cfg_dir, &class_name, &format!("{method_name}{descriptor}"), &cfg)?;
            } else {
                println!("// {class_name}.{method_name}{descriptor}");
                println!("{}", cfg.to_dot());
            }
        }
    }

    last_res
}

/// Keeps names usable as file names: `<init>(I)V` becomes `_init__I_V`.
fn file_name(method: &str) -> String {
    method
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '$' { c } else { '_' })
        .collect()
}

fn write_cfg_file<P: AsRef<Path>>(
    base_dir: P,
    class_name: &str,
    method: &str,
    cfg: &controlflow::Cfg,
) -> CwResult<()> {
    // base_dir/package/path/ClassName
    let mut dir = base_dir.as_ref().to_path_buf();
    dir.push(class_name);
    create_dir_all(&dir)?;

    dir.push(file_name(method));
    dir.set_extension("dot");
    let mut file = File::create(dir)?;
    file.write_all(cfg.to_dot().as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_file_names() {
        assert_eq!("_init__I_V", file_name("<init>(I)V"));
        assert_eq!("run__Ljava_lang_String__V", file_name("run(Ljava/lang/String;)V"));
        assert_eq!("access$000__V", file_name("access$000()V"));
    }
}
