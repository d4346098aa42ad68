use classworks::prelude::CwResult;
use classworks::{cli, cw_dissect};

fn main() -> CwResult<()> {
    let args = cli::dissect().get_matches();
    cw_dissect::run(&args)
}
