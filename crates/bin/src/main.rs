use std::process::Termination;

use json_render::do_main;

fn main() -> impl Termination {
    do_main()
}
