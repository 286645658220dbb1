//! Command implementations for the qbrack CLI.

use crate::{
    auth::hash_password,
    cli::utils::{preview, prompt_for_new_password, read_text_file},
    pages::NewBlock,
    Cms, Result,
};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// Read size when importing media files
const IMPORT_CHUNK_SIZE: usize = 64 * 1024;

/// Execute init command
pub fn init(cms: &Cms) -> Result<()> {
    let footer = cms.params.footer()?;
    info!(
        version = footer.version.as_deref().unwrap_or("-"),
        created = footer.creation_date.as_deref().unwrap_or("-"),
        static_root = %cms.media.static_root().display(),
        "Site initialised"
    );
    if cms.params.title()?.is_none() {
        info!("No site title yet; run 'qbrack set-title <title>' or open /add_page");
    }
    Ok(())
}

/// Execute set-title command
pub fn set_title(cms: &Cms, title: &str) -> Result<()> {
    cms.params.set_title(title)?;
    info!("✅ Site title updated");
    Ok(())
}

/// Execute get-param command
pub fn get_param(cms: &Cms, name: &str) -> Result<()> {
    match cms.params.get_param(name)? {
        Some(value) => println!("{value}"),
        None => warn!(name, "Parameter is not set"),
    }
    Ok(())
}

/// Execute set-param command
pub fn set_param(cms: &Cms, name: &str, value: &str) -> Result<()> {
    cms.params.set_param(name, value)?;
    info!(name, "✅ Parameter updated");
    Ok(())
}

/// Execute pages command
pub fn pages(cms: &Cms) -> Result<()> {
    let pages = cms.pages.pages_list()?;
    if pages.is_empty() {
        info!("No pages yet");
    }
    for page in pages {
        println!("{page}");
    }
    Ok(())
}

/// Execute blocks command
pub fn blocks(cms: &Cms, page: &str, locale: Option<&str>) -> Result<()> {
    let locale = locale.unwrap_or(cms.locale());
    let blocks = cms.pages.blocks_for_page(page, locale)?;
    if blocks.is_empty() {
        info!(page, locale, "Page has no blocks");
    }
    for block in blocks {
        println!(
            "{:>6}  pos {:<4} order {:<4} {}",
            block.id,
            block.position,
            block.page_order,
            preview(&block.content, 60)
        );
    }
    Ok(())
}

/// Execute add-block command
pub fn add_block(
    cms: &Cms,
    page: &str,
    position: u32,
    file: &Path,
    page_order: u32,
    locale: Option<&str>,
) -> Result<()> {
    let content = read_text_file(file)?;
    let id = cms.pages.add_block(&NewBlock {
        page: page.to_string(),
        locale: locale.unwrap_or(cms.locale()).to_string(),
        position,
        page_order,
        content,
    })?;
    info!(id, page, position, "✅ Block added");
    Ok(())
}

/// Execute delete-block command
pub fn delete_block(cms: &Cms, id: i64) -> Result<()> {
    let deleted = cms.pages.delete_block(id)?;
    if deleted.removed {
        info!(id, "✅ Block deleted");
    } else {
        warn!(id, "No block with this id");
    }
    Ok(())
}

/// Execute comments command
pub fn comments(cms: &Cms) -> Result<()> {
    for comment in cms.comments.all()? {
        println!(
            "{}  {} ({})  {}",
            comment.creation_date,
            comment.user,
            comment.ip,
            preview(&comment.comment, 80)
        );
    }
    Ok(())
}

/// Execute media command
pub fn media(cms: &Cms) -> Result<()> {
    for record in cms.media.recent()? {
        println!(
            "{}  {:>9}  {:<10}  {}",
            &record.sha256[..16],
            record.size,
            record.mime,
            record.url()
        );
    }
    Ok(())
}

/// Execute import-media command
pub fn import_media(cms: &Cms, file: &Path) -> Result<()> {
    info!(file = %file.display(), "Importing media");
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Streamed like a web upload so the size limit applies as bytes are read
    let mut source = File::open(file)?;
    let mut upload = cms.media.begin_upload(&name)?;
    let mut buf = vec![0u8; IMPORT_CHUNK_SIZE];
    loop {
        let read = source.read(&mut buf)?;
        if read == 0 {
            break;
        }
        upload.write_chunk(&buf[..read])?;
    }

    let stored = upload.finish()?;
    if stored.deduplicated {
        info!(url = %stored.url(), "✅ Identical file already stored");
    } else {
        info!(url = %stored.url(), "✅ Media stored");
    }
    println!("{}", stored.url());
    Ok(())
}

/// Execute delete-media command
pub fn delete_media(cms: &Cms, path: &str) -> Result<()> {
    let record = cms.media.delete(path)?;
    info!(rel_path = %record.rel_path, "✅ Media deleted");
    Ok(())
}

/// Execute hash-password command
pub fn hash_password_command() -> Result<()> {
    let password = prompt_for_new_password()?;
    let hash = hash_password(&password)?;
    info!("Set ADMIN_PASS_HASH to the value below");
    println!("{hash}");
    Ok(())
}
