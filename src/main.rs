use betterproto_build::command::{self, CompileBetterproto, COMMAND_NAME, USER_OPTIONS};
use betterproto_build::{BuildCommand, BuildTool, Compiler, MetadataSource};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info};
use std::error::Error;
use std::process;

fn main() {
    let matches = app().get_matches();

    let level = if matches.is_present("verbose") { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(err) = run(&matches) {
        error!("{}", err);
        process::exit(1);
    }
}

fn app() -> App<'static, 'static> {
    App::new("betterproto-build")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compile protobuf files with betterproto before building a package")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("project-root")
                .long("project-root")
                .takes_value(true)
                .value_name("DIR")
                .default_value(".")
                .global(true)
                .help("Project root; relative paths are resolved against it"),
        )
        .arg(
            Arg::with_name("metadata-file")
                .long("metadata-file")
                .takes_value(true)
                .value_name("FILE")
                .global(true)
                .help("Project metadata file, relative to the project root [default: pyproject.toml]"),
        )
        .arg(
            Arg::with_name("section")
                .long("section")
                .takes_value(true)
                .value_name("TABLE")
                .global(true)
                .help("Dotted metadata table to read [default: tool.setuptools_betterproto]"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .global(true)
                .help("Enable debug logging"),
        )
        .subcommand(
            SubCommand::with_name("compile")
                .about("Run only the compile_betterproto command")
                .args(&compile_args()),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Run every sub-command of the build action")
                .args(&compile_args()),
        )
        .subcommand(
            SubCommand::with_name("show-options")
                .about("Show the options of compile_betterproto and their defaults")
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print the options as JSON"),
                ),
        )
}

fn compile_args() -> Vec<Arg<'static, 'static>> {
    let mut args: Vec<Arg<'static, 'static>> = USER_OPTIONS
        .iter()
        .map(|option| {
            Arg::with_name(option.long)
                .long(option.long)
                .takes_value(true)
                .value_name("VALUE")
                .help(option.help)
        })
        .collect();

    args.push(
        Arg::with_name("protoc")
            .long("protoc")
            .takes_value(true)
            .value_name("PROGRAM")
            .help("protoc executable [default: $PROTOC, then protoc on PATH]"),
    );
    args.push(
        Arg::with_name("protoc-arg")
            .long("protoc-arg")
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .allow_hyphen_values(true)
            .requires("protoc")
            .value_name("ARG")
            .help("Argument placed before the generated ones, e.g. --protoc python3 --protoc-arg=-m --protoc-arg=grpc_tools.protoc"),
    );
    args
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let mut source = MetadataSource::new(matches.value_of("project-root").unwrap_or("."));
    if let Some(file) = matches.value_of("metadata-file") {
        source = source.with_file(file);
    }
    if let Some(section) = matches.value_of("section") {
        source = source.with_section(section);
    }

    match matches.subcommand() {
        ("compile", Some(sub)) => {
            let tool = build_tool(source, sub);
            tool.run_command(COMMAND_NAME)?;
        }
        ("build", Some(sub)) => {
            let tool = build_tool(source, sub);
            let ran = tool.run_build()?;
            info!("Build finished: {}", ran.join(", "));
        }
        ("show-options", Some(sub)) => {
            let mut command = CompileBetterproto::new(source);
            command.initialize_options()?;
            let options = command.describe_options();
            if sub.is_present("json") {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                println!("{}: {}", command.name(), command.description());
                for option in options {
                    println!("  --{:<15} {} [default: {}]", option.option, option.help, option.value);
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// Set up the host build tool with compile_betterproto and the options
/// given on the command line
fn build_tool(source: MetadataSource, matches: &ArgMatches) -> BuildTool {
    let compiler = matches.value_of("protoc").map(|program| {
        matches
            .values_of("protoc-arg")
            .into_iter()
            .flatten()
            .fold(Compiler::new(program), |compiler, arg| compiler.leading_arg(arg))
    });

    let mut tool = BuildTool::new();
    command::install(&mut tool, source, compiler);

    for option in USER_OPTIONS.iter() {
        if let Some(value) = matches.value_of(option.long) {
            tool.set_option(COMMAND_NAME, option.long, value);
        }
    }
    tool
}
