#![recursion_limit = "1024"] // for error_chain

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate clap;
#[macro_use]
extern crate json;
extern crate atty;
extern crate cgmath;
extern crate petgraph;
extern crate smallvec;
extern crate termcolor;

#[macro_use]
mod errors;
mod logger;
mod util;
mod anim;
mod skeleton;
mod pose;
mod scene;
mod bake;
mod args;
mod convert;
mod duplicate;
mod info;
mod version;
#[cfg(test)]
mod testing;

use std::process::exit;

fn main() {
    let mut app = clap_app!(skelbake =>
        (about: "Reduces generated character rigs to their deform bones")
        (@arg verbose: -v --verbose "Print debugging output")
        (@arg version: -V --version "Print version info")
        (@subcommand convert =>
            (about: "Convert a rig to a plain skeleton and bake its actions")
            (alias: "c")
            (@arg INPUT: +required "Scene file")
            (@arg OUTPUT: -o --output +takes_value +required "Where to write the new scene")
            (@arg rig: --rig +takes_value "Rig to convert (default: the only rig)")
            (@arg mesh: --mesh +takes_value "Mesh to convert (default: the rig's only mesh)")
            (@arg root: --root +takes_value "Bone to use as the root (default: root)")
            (@arg action: -a --action +takes_value +multiple number_of_values(1)
                "Action to bake (default: all of them)")
            (@arg frames: --frames +takes_value +multiple number_of_values(1)
                "Frames to bake for an action, as ACTION=START:END")
            (@arg overwrite: --overwrite +takes_value
                possible_values(&["none", "objects", "actions", "both"])
                "What existing outputs may be replaced (default: both)")
        )
        (@subcommand duplicate =>
            (about: "Make a skeleton that follows a rig")
            (alias: "d")
            (@arg INPUT: +required "Scene file")
            (@arg OUTPUT: -o --output +takes_value +required "Where to write the new scene")
            (@arg rig: --rig +takes_value "Rig to duplicate (default: the only rig)")
            (@arg suffix: --suffix +takes_value "Suffix for the new objects' names (default: _Converted)")
        )
        (@subcommand info =>
            (about: "Print what's in a scene file")
            (alias: "i")
            (@arg INPUT: +required "Scene file")
        )
    );
    let matches = app.clone().get_matches();

    let level = if matches.is_present("verbose") {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    logger::init(level);

    let res = match matches.subcommand() {
        ("convert", Some(m)) => convert::main(m),
        ("duplicate", Some(m)) => duplicate::main(m),
        ("info", Some(m)) => info::main(m),
        _ if matches.is_present("version") => {
            version::print_version_info();
            Ok(())
        }
        _ => {
            let _ = app.print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = res {
        error!("{}", e);
        for e in e.iter().skip(1) {
            error!("caused by: {}", e);
        }
        exit(1);
    }
}
