//! Command-line argument parsing for qbrack.

use crate::error::{QbrackError, Result};
use std::path::PathBuf;

/// Command-line interface commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init,
    SetTitle {
        title: String,
    },
    GetParam {
        name: String,
    },
    SetParam {
        name: String,
        value: String,
    },
    Pages,
    Blocks {
        page: String,
        locale: Option<String>,
    },
    AddBlock {
        page: String,
        position: u32,
        file: PathBuf,
        page_order: u32,
        locale: Option<String>,
    },
    DeleteBlock {
        id: i64,
    },
    Comments,
    Media,
    ImportMedia {
        file: PathBuf,
    },
    DeleteMedia {
        path: String,
    },
    HashPassword,
    Help,
}

fn missing(usage: &str) -> QbrackError {
    QbrackError::invalid_input(format!("usage: qbrack {usage}"))
}

fn number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| QbrackError::invalid_input(format!("{what} must be a number, got '{value}'")))
}

/// Parse command line arguments (without the program name) into a Command
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    match command.as_str() {
        "init" => Ok(Command::Init),

        "set-title" => {
            if rest.is_empty() {
                return Err(missing("set-title <title>"));
            }
            Ok(Command::SetTitle {
                title: rest.join(" "),
            })
        }

        "get-param" => {
            let name = rest.first().ok_or_else(|| missing("get-param <name>"))?;
            Ok(Command::GetParam { name: name.clone() })
        }

        "set-param" => {
            if rest.len() < 2 {
                return Err(missing("set-param <name> <value>"));
            }
            Ok(Command::SetParam {
                name: rest[0].clone(),
                value: rest[1..].join(" "),
            })
        }

        "pages" => Ok(Command::Pages),

        "blocks" => {
            let page = rest.first().ok_or_else(|| missing("blocks <page> [locale]"))?;
            Ok(Command::Blocks {
                page: page.clone(),
                locale: rest.get(1).cloned(),
            })
        }

        "add-block" => parse_add_block(rest),

        "delete-block" => {
            let id = rest.first().ok_or_else(|| missing("delete-block <id>"))?;
            Ok(Command::DeleteBlock {
                id: number(id, "block id")?,
            })
        }

        "comments" => Ok(Command::Comments),

        "media" => Ok(Command::Media),

        "import-media" => {
            let file = rest.first().ok_or_else(|| missing("import-media <file>"))?;
            Ok(Command::ImportMedia {
                file: PathBuf::from(file),
            })
        }

        "delete-media" => {
            let path = rest.first().ok_or_else(|| missing("delete-media <path>"))?;
            Ok(Command::DeleteMedia { path: path.clone() })
        }

        "hash-password" => Ok(Command::HashPassword),

        "help" | "--help" | "-h" => Ok(Command::Help),

        other => Err(QbrackError::invalid_input(format!(
            "unknown command '{other}', try 'qbrack help'"
        ))),
    }
}

fn parse_add_block(rest: &[String]) -> Result<Command> {
    const USAGE: &str = "add-block <page> <position> <file> [--order N] [--locale L]";

    let mut positional = Vec::new();
    let mut page_order = 0;
    let mut locale = None;

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--order" => {
                let value = iter.next().ok_or_else(|| missing(USAGE))?;
                page_order = number(value, "page order")?;
            }
            "--locale" => {
                locale = Some(iter.next().ok_or_else(|| missing(USAGE))?.clone());
            }
            _ => positional.push(arg),
        }
    }

    let [page, position, file] = positional.as_slice() else {
        return Err(missing(USAGE));
    };
    Ok(Command::AddBlock {
        page: page.to_string(),
        position: number(position, "position")?,
        file: PathBuf::from(file),
        page_order,
        locale,
    })
}

/// Print usage information
pub fn print_usage() {
    println!("qbrack - block-based CMS administration");
    println!();
    println!("USAGE:");
    println!("    qbrack <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    init                                  Create the database and static root");
    println!("    set-title <title>                     Set the site title");
    println!("    get-param <name>                      Print a site parameter");
    println!("    set-param <name> <value>              Set a site parameter");
    println!("    pages                                 List pages in navigation order");
    println!("    blocks <page> [locale]                List the blocks of a page");
    println!("    add-block <page> <position> <file>    Add a block read from a file");
    println!("              [--order N] [--locale L]");
    println!("    delete-block <id>                     Delete one block");
    println!("    comments                              List visitor comments");
    println!("    media                                 List recent uploads");
    println!("    import-media <file>                   Upload an image from disk");
    println!("    delete-media <path>                   Delete an upload");
    println!("    hash-password                         Hash a password for ADMIN_PASS_HASH");
    println!();
    println!("ENVIRONMENT:");
    println!("    QBRACK_DB, QBRACK_STATIC_ROOT, QBRACK_LOCALE, QBRACK_MAX_UPLOAD_BYTES");
}
