extern crate clap;
#[macro_use] extern crate log;
extern crate fern;
extern crate chrono;
extern crate term_grid;
extern crate casl2;

use casl2::assembler::{Assembler, Compilation, Options};
use casl2::assembler::diagnostics::Severity;
use casl2::assembler::emitter;

use clap::{Arg, ArgMatches, App};
use term_grid::{Grid, GridOptions, Direction, Filling, Cell};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let args = process_arguments();
    initialize_logging(args.occurrences_of("verbose"));

    let options = Options{
        use_gr8:     args.is_present("gr8"),
        label_scope: args.is_present("scope"),
    };

    debug!("Arguments:\n\tVerbosity: {}\n\tGR8: {}\n\tLabel scope: {}\n\tOutfile: {}\n\tInfile: {}",
        level_filter(args.occurrences_of("verbose")),
        options.use_gr8,
        options.label_scope,
        args.value_of("output").unwrap_or("None"),
        args.value_of("INPUT").unwrap()
    );

    let ifile = args.value_of("INPUT").unwrap();
    let ipath = Path::new(ifile);

    let source = match fs::read_to_string(&ipath) {
        Err(err) => {
            error!("fatal: unable to read input file `{}`: {}", ipath.display(), err);
            std::process::exit(1);
        },
        Ok(source) => source,
    };
    let lines: Vec<&str> = source.lines().collect();

    let compilation = match Assembler::new(options).compile(&lines) {
        Err(err) => {
            error!("fatal: internal assembler error: {}", err);
            std::process::exit(1);
        },
        Ok(compilation) => compilation,
    };

    // Editors count lines and columns from 1.
    for d in compilation.diagnostics.iter() {
        match d.severity() {
            Severity::Error => error!("{}:{}:{}: {} [{}]", ipath.display(), d.line + 1, d.start + 1, d.message(), d.code()),
            Severity::Message => warn!("{}:{}:{}: {} [{}]", ipath.display(), d.line + 1, d.start + 1, d.message(), d.code()),
        }
    }

    let words = match &compilation.words {
        Some(words) => words,
        None => {
            error!("fatal: assembly of `{}` failed", ipath.display());
            std::process::exit(1);
        },
    };

    if args.is_present("print-debug") {
        print_listing(&compilation, &lines);
    }

    let opath = match args.value_of("output") {
        Some(filename) => PathBuf::from(filename),
        None => Path::new(ipath.file_stem().unwrap()).with_extension("com"),
    };

    let mut ofile = match File::create(&opath) {
        Err(err) => {
            error!("fatal: unable to open output file `{}`: {}", opath.display(), err);
            std::process::exit(1);
        },
        Ok(file) => file,
    };

    if let Err(err) = ofile.write_all(&emitter::to_bytes(words)) {
        error!("fatal: unable to write to output file `{}`: {}", opath.display(), err);
        std::process::exit(1);
    }
    info!("wrote {} word(s) to `{}`", words.len(), opath.display());
}

/// Prints each emitting record next to its address, encoding and source.
fn print_listing(compilation: &Compilation, lines: &[&str]) {
    let mut grid = Grid::new(GridOptions {
        filling:     Filling::Spaces(1),
        direction:   Direction::LeftToRight,
    });

    for ins in compilation.instructions.iter() {
        let words = match ins.to_words() {
            Ok(words) => words,
            Err(_) => continue,
        };
        if words.is_empty() {
            continue;
        }

        let source = if ins.continuation { "" } else { lines[ins.line].trim_end() };
        grid.add(Cell::from(format!("0x{:04X}:", ins.address())));
        grid.add(Cell::from(format!("{:>4}", ins.line + 1)));
        grid.add(Cell::from(words.iter().map(|w| format!("{:04X}", w)).collect::<Vec<_>>().join(" ")));
        grid.add(Cell::from(source.to_string()));
    }

    println!("{}", grid.fit_into_columns(4));

    let mut labels: Vec<_> = compilation.labels.iter().collect();
    labels.sort_by_key(|(_, entry)| entry.address);

    let mut grid = Grid::new(GridOptions {
        filling:     Filling::Spaces(1),
        direction:   Direction::LeftToRight,
    });
    for (key, entry) in labels {
        grid.add(Cell::from(format!("0x{:04X}:", entry.address)));
        grid.add(Cell::from(key.name.clone()));
        grid.add(Cell::from(match key.scope {
            Some(scope) => format!("scope {}", scope),
            None => "global".to_string(),
        }));
        grid.add(Cell::from(match entry.definition {
            Some(at) => format!("line {}", at.line + 1),
            None => "generated".to_string(),
        }));
    }

    let mut binds: Vec<_> = compilation.labels.binds().collect();
    binds.sort_by_key(|(name, _)| *name);
    for (name, bind) in binds {
        let address = compilation.labels.get(name, bind.scope);
        grid.add(Cell::from(match address {
            Some(address) => format!("0x{:04X}:", address),
            None => "------:".to_string(),
        }));
        grid.add(Cell::from(format!("{} -> {}", name, bind.target.name)));
        grid.add(Cell::from("global".to_string()));
        grid.add(Cell::from(match bind.definition {
            Some(at) => format!("line {}", at.line + 1),
            None => String::new(),
        }));
    }
    println!("{}", grid.fit_into_columns(4));
}

fn process_arguments() -> ArgMatches<'static> {
    App::new(option_env!("CARGO_PKG_NAME").unwrap())
        .version(option_env!("CARGO_PKG_VERSION").unwrap())
        .author(option_env!("CARGO_PKG_AUTHORS").unwrap())
        .about(option_env!("CARGO_PKG_DESCRIPTION").unwrap())
        .arg(Arg::with_name("INPUT")
            .help("Sets the input file to use")
            .required(true)
            .multiple(false)
            .index(1))
        .arg(Arg::with_name("verbose")
            .short("v")
            .multiple(true)
            .takes_value(false)
            .help("Sets the level of verbosity"))
        .arg(Arg::with_name("output")
            .short("o")
            .takes_value(true)
            .help("write output to an outfile"))
        .arg(Arg::with_name("gr8")
            .long("gr8")
            .takes_value(false)
            .help("allows GR8 (the stack pointer) as a register operand"))
        .arg(Arg::with_name("scope")
            .long("scope")
            .takes_value(false)
            .help("gives each START..END block its own label namespace"))
        .arg(Arg::with_name("print-debug")
            .short("d")
            .alias("show")
            .alias("s")
            .takes_value(false)
            .help("prints the debug information alongside the assembly to STDOUT"))
        .get_matches()
}

fn level_filter(verbosity: u64) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    }
}

fn initialize_logging(verbosity: u64) {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level_filter(verbosity))
        .chain(std::io::stdout())
        .apply().ok();
}
