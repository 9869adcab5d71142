//! File helpers for the binary installer.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tar::Archive;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncReadExt;
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// The final component of `path`, which must be valid UTF-8.
pub fn try_name(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();

    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Path(format!("{} has no file name", path.display())))
}

pub fn try_parent(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();

    path.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::Path(format!("{} has no parent directory", path.display())))
}

/// Opens `destination` for writing, truncating it. On unix the file is created `0o755`
/// so installed binaries can be run straight away.
pub async fn create_file(destination: impl AsRef<Path>) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    options.mode(0o755);

    Ok(options.open(destination).await?)
}

pub fn create_dir(destination: impl AsRef<Path>) -> Result<()> {
    Ok(std::fs::create_dir_all(destination)?)
}

pub fn create_parent_dir(destination: impl AsRef<Path>) -> Result<()> {
    match destination.as_ref().parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

/// Unpacks every regular file of a zip archive under `destination`.
///
/// Entries whose names would escape `destination` are rejected.
pub async fn extract_zip(archive: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<()> {
    let (archive, destination) = (archive.as_ref(), destination.as_ref());

    #[cfg(feature = "tracing")]
    tracing::debug!("Unpacking {} into {}", archive.display(), destination.display());

    let file = File::open(archive).await?.into_std().await;
    let mut zip = ZipArchive::new(file)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if !entry.is_file() {
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| Error::Path(format!("{} escapes the archive", entry.name())))?;
        let target = destination.join(relative);

        create_parent_dir(&target)?;
        let mut output = create_file(&target).await?.into_std().await;
        std::io::copy(&mut entry, &mut output)?;
    }

    Ok(())
}

/// Unpacks a `.tar.xz` archive under `destination`.
pub async fn extract_tar_xz(
    archive: impl AsRef<Path>,
    destination: impl AsRef<Path>,
) -> Result<()> {
    let (archive, destination) = (archive.as_ref(), destination.as_ref());

    #[cfg(feature = "tracing")]
    tracing::debug!("Unpacking {} into {}", archive.display(), destination.display());

    let file = File::open(archive).await?.into_std().await;
    Archive::new(XzDecoder::new(file)).unpack(destination)?;

    Ok(())
}

#[cfg(unix)]
pub fn set_executable(executable: impl AsRef<Path>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(executable.as_ref())?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(executable, permissions)?;

    Ok(())
}

#[cfg(not(unix))]
pub fn set_executable(_executable: impl AsRef<Path>) -> Result<()> {
    Ok(())
}

/// Computes the lowercase hex SHA-256 digest of the given file.
pub async fn sha256_hex(path: impl AsRef<Path>) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_parent() {
        let path = Path::new("/opt/libs/yt-dlp");

        assert_eq!(try_name(path).unwrap(), "yt-dlp");
        assert_eq!(try_parent(path).unwrap(), PathBuf::from("/opt/libs"));
        assert!(try_name(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn digest_of_a_known_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();

        assert_eq!(
            sha256_hex(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_files_are_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tool");
        create_parent_dir(&path).unwrap();
        drop(create_file(&path).await.unwrap());
        set_executable(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
