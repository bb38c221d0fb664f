mod commands;
mod logging;

use std::io;
use std::process;

use clap::{App, AppSettings, Arg, SubCommand};
use log::debug;
use simplefs::{image, SFSError, DEFAULT_BLOCK_COUNT};

use crate::commands::Command;

fn non_empty(value: String) -> Result<(), String> {
    if value.is_empty() {
        Err("content must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn block_count(value: String) -> Result<(), String> {
    value
        .parse::<usize>()
        .map(|_| ())
        .map_err(|e| format!("invalid block count: {}", e))
}

fn app<'a, 'b>() -> App<'a, 'b> {
    let path = || Arg::with_name("path").required(true).help("File path, e.g. dir1/file1");
    let content = || {
        Arg::with_name("content")
            .required(true)
            .validator(non_empty)
            .help("File content")
    };

    App::new("sfs")
        .about("Drives an in-memory single volume file system stored in an image file")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("image")
                .short("i")
                .long("image")
                .takes_value(true)
                .default_value("filesystem.img")
                .help("Volume image, loaded on start and saved after changes"),
        )
        .arg(
            Arg::with_name("blocks")
                .short("b")
                .long("blocks")
                .takes_value(true)
                .validator(block_count)
                .help("Number of blocks when starting a new volume"),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("Creates a file")
                .arg(path())
                .arg(content()),
        )
        .subcommand(
            SubCommand::with_name("delete")
                .about("Deletes a file")
                .arg(path()),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("Prints a file's address, length and content")
                .arg(path()),
        )
        .subcommand(
            SubCommand::with_name("write")
                .about("Replaces a file's content")
                .arg(path())
                .arg(content()),
        )
        .subcommand(SubCommand::with_name("reset").about("Removes every file and directory"))
        .subcommand(
            SubCommand::with_name("ls")
                .about("Lists a directory")
                .arg(Arg::with_name("dir").default_value("/")),
        )
        .subcommand(SubCommand::with_name("tree").about("Prints the directory tree"))
        .subcommand(SubCommand::with_name("usage").about("Prints the block allocation bitmap"))
}

fn run() -> Result<(), SFSError> {
    let matches = app().get_matches();
    let image_path = matches.value_of("image").unwrap_or("filesystem.img");
    let blocks = matches
        .value_of("blocks")
        .and_then(|b| b.parse().ok())
        .unwrap_or(DEFAULT_BLOCK_COUNT);
    let cmd = match Command::from_matches(&matches) {
        Some(cmd) => cmd,
        None => return Ok(()),
    };

    let mut vol = image::load_or_create(image_path, blocks)?;
    debug!("Running {:?} against {}.", cmd, image_path);

    let stdout = io::stdout();
    let result = commands::execute(&mut vol, &cmd, &mut stdout.lock());
    if cmd.mutates() {
        // Failed operations leave the volume as it was, saving is still harmless.
        image::save(&vol, image_path)?;
    }
    result
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        eprintln!("sfs: {}", e);
        process::exit(1);
    }
}
