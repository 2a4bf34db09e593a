use clap::{value_parser, Arg, ArgAction, Command};
use mcd_core::tune::DEFAULT_LISTEN;
use mcd_core::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

/// Subcommands that map directly onto a lifecycle action
pub(crate) const LIFECYCLE: [(&str, &str); 7] = [
    ("install", "Install memcached, enable and start it"),
    ("uninstall", "Stop memcached and remove its packages"),
    ("start", "Start the memcached unit"),
    ("stop", "Stop the memcached unit"),
    ("restart", "Restart the memcached unit"),
    ("enable", "Enable the memcached unit at boot"),
    ("disable", "Disable the memcached unit at boot"),
];

pub(crate) fn command() -> Command {
    let mut cli = Command::new("mcd")
        .version(mcd_core::VERSION)
        .about("Manage and tune Memcached on a local or remote host")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the commands instead of running them"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging unless RUST_LOG is set"),
        );

    for (name, about) in LIFECYCLE {
        cli = cli.subcommand(Command::new(name).about(about));
    }

    cli.subcommand(Command::new("status").about("Print whether memcached is running"))
        .subcommand(Command::new("version").about("Print the installed memcached version"))
        .subcommand(Command::new("installed").about("Print whether the package is installed"))
        .subcommand(
            Command::new("tune")
                .about("Set memory, port and listen address, then restart")
                .arg(
                    Arg::new("memory-mb")
                        .long("memory-mb")
                        .default_value("64")
                        .help("Cache size in MB (16-262144)"),
                )
                .arg(
                    Arg::new("port")
                        .long("port")
                        .default_value("11211")
                        .help("TCP port (1-65535)"),
                )
                .arg(
                    Arg::new("listen")
                        .long("listen")
                        .default_value(DEFAULT_LISTEN)
                        .help("Listen address"),
                ),
        )
        .subcommand(Command::new("manifest").about("Print the plugin registrations as JSON"))
}
