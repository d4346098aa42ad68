use classworks::prelude::CwResult;
use classworks::{cli, cw_cfg};

fn main() -> CwResult<()> {
    let args = cli::cfg().get_matches();
    cw_cfg::run(&args)
}
