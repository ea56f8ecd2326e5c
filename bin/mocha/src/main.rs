use mocha::runtime::{ClassArenas, Completion, DirectorySource, Runtime, Settings};
use mocha::Error;

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::process;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("mocha")
        .version(crate_version!())
        .about("Run the `main` method of a class on the mocha runtime")
        .arg(
            Arg::new("classpath")
                .long("classpath")
                .short('c')
                .value_name("DIR")
                .action(ArgAction::Append)
                .help("Directory of application classes (may be repeated)"),
        )
        .arg(
            Arg::new("boot-classpath")
                .long("boot-classpath")
                .value_name("DIR")
                .action(ArgAction::Append)
                .required(true)
                .help("Directory of bootstrap classes, eg. `java/lang/Object.class` (may be repeated)"),
        )
        .arg(
            Arg::new("quantum")
                .long("quantum")
                .value_name("INSTRUCTIONS")
                .value_parser(value_parser!(usize))
                .help("Instructions a thread runs before another thread gets scheduled"),
        )
        .arg(
            Arg::new("max-call-depth")
                .long("max-call-depth")
                .value_name("FRAMES")
                .value_parser(value_parser!(usize))
                .help("Frames on a call stack past which `StackOverflowError` is thrown"),
        )
        .arg(
            Arg::new("max-array-length")
                .long("max-array-length")
                .value_name("ELEMENTS")
                .value_parser(value_parser!(usize))
                .help("Array length past which `OutOfMemoryError` is thrown"),
        )
        .arg(
            Arg::new("CLASS")
                .help("Binary name of the main class (eg. `com/example/Main`)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("ARGS")
                .help("Arguments passed to `main`")
                .num_args(0..)
                .trailing_var_arg(true)
                .index(2),
        )
        .get_matches();

    let mut settings = Settings::default();
    if let Some(quantum) = matches.get_one::<usize>("quantum") {
        settings.quantum = *quantum;
    }
    if let Some(depth) = matches.get_one::<usize>("max-call-depth") {
        settings.max_call_depth = *depth;
    }
    if let Some(length) = matches.get_one::<usize>("max-array-length") {
        settings.max_array_length = *length;
    }

    let boot_roots: Vec<String> = matches
        .get_many::<String>("boot-classpath")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let app_roots: Vec<String> = match matches.get_many::<String>("classpath") {
        Some(roots) => roots.cloned().collect(),
        None => vec![String::from(".")],
    };
    let class_name = matches
        .get_one::<String>("CLASS")
        .cloned()
        .unwrap_or_default()
        .replace('.', "/");
    let args: Vec<String> = matches
        .get_many::<String>("ARGS")
        .into_iter()
        .flatten()
        .cloned()
        .collect();

    log::info!(
        "Running '{}' (boot class path {:?}, class path {:?})",
        class_name,
        boot_roots,
        app_roots
    );
    let arenas = ClassArenas::new();
    let runtime = Runtime::new(
        &arenas,
        settings,
        Box::new(DirectorySource::new(boot_roots)),
        Box::new(DirectorySource::new(app_roots)),
    );

    // The uncaught exception hook has already reported the exception
    match runtime.run_main(&class_name, &args)? {
        Completion::Returned(_) => Ok(()),
        Completion::Threw(_) => process::exit(1),
    }
}
