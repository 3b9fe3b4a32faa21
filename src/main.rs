use std::process::exit;

use clap::Parser;

use fwextract::args::Args;

fn main() {
    let args = Args::parse();

    if args.loud && std::env::var("FWEXTRACT_LOG").is_err() {
        std::env::set_var("FWEXTRACT_LOG", "debug");
    }

    pretty_env_logger::init_custom_env("FWEXTRACT_LOG");

    match fwextract::main(args) {
        Ok(outcome) => {
            match &outcome.kernel {
                Some(path) => println!("fwextract: kernel at {path:?}"),
                None => println!("fwextract: no kernel extracted"),
            }
            match &outcome.rootfs {
                Some(path) => println!("fwextract: rootfs archive at {path:?}"),
                None => println!("fwextract: no root filesystem extracted"),
            }
        }
        Err(e) => {
            eprintln!("fwextract: {e}");
            exit(1);
        }
    }
}
