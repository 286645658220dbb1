//! Command-line interface for qbrack.
//!
//! Administration from the shell: site parameters, page blocks, comments
//! and media, against the database named by `QBRACK_DB`.

pub mod args;
pub mod commands;
pub mod utils;

use crate::Result;
use std::env;
use std::process;

pub use args::{parse_args, print_usage, Command};

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            process::exit(1);
        }
    };

    execute(command)
}

/// Runs one parsed command
pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Help => {
            print_usage();
            Ok(())
        }
        Command::HashPassword => commands::hash_password_command(),
        command => {
            let cms = utils::open_cms()?;
            match command {
                Command::Init => commands::init(&cms),
                Command::SetTitle { title } => commands::set_title(&cms, &title),
                Command::GetParam { name } => commands::get_param(&cms, &name),
                Command::SetParam { name, value } => commands::set_param(&cms, &name, &value),
                Command::Pages => commands::pages(&cms),
                Command::Blocks { page, locale } => {
                    commands::blocks(&cms, &page, locale.as_deref())
                }
                Command::AddBlock {
                    page,
                    position,
                    file,
                    page_order,
                    locale,
                } => commands::add_block(
                    &cms,
                    &page,
                    position,
                    &file,
                    page_order,
                    locale.as_deref(),
                ),
                Command::DeleteBlock { id } => commands::delete_block(&cms, id),
                Command::Comments => commands::comments(&cms),
                Command::Media => commands::media(&cms),
                Command::ImportMedia { file } => commands::import_media(&cms, &file),
                Command::DeleteMedia { path } => commands::delete_media(&cms, &path),
                Command::Help | Command::HashPassword => Ok(()),
            }
        }
    }
}
