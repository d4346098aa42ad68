use classworks::prelude::CwResult;
use classworks::{cli, cw_verify};

fn main() -> CwResult<()> {
    let args = cli::verify().get_matches();
    cw_verify::run(&args)
}
