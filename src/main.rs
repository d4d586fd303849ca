use clap::Parser;
use packet_progress::{analysis, cli};

fn main() {
    let mut argv: Vec<String> = std::env::args().collect();
    // `packet-progress png ...` is the shorthand for PNG output.
    let png_mode = argv.get(1).map(|arg| arg == "png").unwrap_or(false);
    if png_mode {
        argv.remove(1);
    }

    let mut args = cli::Args::parse_from(argv);
    args.apply_png_mode(png_mode);

    match analysis::run(&args) {
        Ok(outputs) => {
            let written: Vec<String> = outputs
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            println!("wrote {}", written.join(", "));
        }
        Err(err) => {
            eprintln!("packet-progress: {err:#}");
            std::process::exit(1);
        }
    }
}
