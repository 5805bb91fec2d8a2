use anyhow::{Context, Result};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write a deflate-compressed archive at `archive_path` holding `file` as its only entry,
/// stored under its base name. Any existing archive at that path is replaced.
pub fn package_single(file: &Path, archive_path: &Path) -> Result<PathBuf> {
    let entry_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Cannot derive archive entry name from {}", file.display()))?
        .to_string();

    let mut source = fs_err::File::open(file)
        .with_context(|| format!("Failed to open {} for packaging", file.display()))?;

    let archive = fs_err::File::create(archive_path)
        .with_context(|| format!("Failed to create archive {}", archive_path.display()))?;

    let mut writer = ZipWriter::new(BufWriter::new(archive));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    writer
        .start_file(entry_name.as_str(), options)
        .context("Failed to start archive entry")?;
    std::io::copy(&mut source, &mut writer).context("Failed to write archive entry")?;
    writer.finish().context("Failed to finalize archive")?;

    tracing::info!("Packaged {} into {}", entry_name, archive_path.display());
    Ok(archive_path.to_path_buf())
}

/// Names of the entries in an archive
pub fn list_entries(archive_path: &Path) -> Result<Vec<String>> {
    let file = fs_err::File::open(archive_path)?;
    let archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Invalid archive {}", archive_path.display()))?;
    Ok(archive.file_names().map(str::to_string).collect())
}
