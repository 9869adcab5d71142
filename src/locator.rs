//! Finds the muxer and extractor executables on the host.
//!
//! Lookup order: an explicit configured path, the managed copy installed by
//! `vidgrab install`, candidates relative to the working directory, then a search by
//! name over the bundled directories next to the executable followed by `PATH`.
//! Nothing here writes to disk or changes the process environment.

use crate::config::Settings;
use log::debug;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use vidgrab_extractor::utils::find_executable;

#[derive(Debug, Clone)]
pub struct BinaryLocator {
    name: String,
    explicit: Option<PathBuf>,
    managed_dir: Option<PathBuf>,
    bundled_dirs: Vec<PathBuf>,
    working_dir: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl BinaryLocator {
    /// A locator for `name` reading the real environment, with no explicit or managed path.
    pub fn new(name: impl Into<String>) -> Self {
        let bundled_dirs = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .map(|dir| vec![dir.join("bin"), dir.join("libs")])
            .unwrap_or_default();

        Self {
            name: name.into(),
            explicit: None,
            managed_dir: None,
            bundled_dirs,
            working_dir: std::env::current_dir().ok(),
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn ffmpeg(settings: &Settings) -> Self {
        Self::new("ffmpeg")
            .with_explicit(settings.ffmpeg.clone())
            .with_managed_dir(Some(settings.managed_libs_dir()))
    }

    pub fn yt_dlp(settings: &Settings) -> Self {
        Self::new("yt-dlp")
            .with_explicit(settings.yt_dlp.clone())
            .with_managed_dir(Some(settings.managed_libs_dir()))
    }

    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn with_managed_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.managed_dir = dir;
        self
    }

    pub fn with_bundled_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.bundled_dirs = dirs;
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn with_search_path(mut self, path: Option<OsString>) -> Self {
        self.search_path = path;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the first usable executable, or `None` when every step fails.
    pub fn locate(&self) -> Option<PathBuf> {
        let found = self
            .explicit()
            .or_else(|| self.managed())
            .or_else(|| self.working_dir_candidate())
            .or_else(|| self.search());

        match &found {
            Some(path) => debug!("Found {} at {}", self.name, path.display()),
            None => debug!("{} not found", self.name),
        }
        found
    }

    fn explicit(&self) -> Option<PathBuf> {
        self.explicit.clone().filter(|path| path.exists())
    }

    fn managed(&self) -> Option<PathBuf> {
        let path = self.managed_dir.as_ref()?.join(find_executable(&self.name));
        path.exists().then_some(path)
    }

    fn working_dir_candidate(&self) -> Option<PathBuf> {
        let cwd = self.working_dir.as_ref()?;
        let exe = format!("{}.exe", self.name);

        [
            cwd.join(&self.name),
            cwd.join(&exe),
            cwd.join("bin").join(&self.name),
            cwd.join("bin").join(&exe),
        ]
        .into_iter()
        .find(|path| is_executable(path))
    }

    fn search(&self) -> Option<PathBuf> {
        let inherited = self
            .search_path
            .as_ref()
            .map(|path| std::env::split_paths(path).collect::<Vec<_>>())
            .unwrap_or_default();
        let dirs: Vec<PathBuf> = self
            .bundled_dirs
            .iter()
            .cloned()
            .chain(inherited)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect();
        if dirs.is_empty() {
            return None;
        }
        let dirs = std::env::join_paths(dirs).ok()?;

        let cwd = self
            .working_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        which::which_in(&self.name, Some(dirs), cwd).ok()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn write_binary(path: &Path, mode: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    fn isolated(root: &Path) -> BinaryLocator {
        BinaryLocator::new("ffmpeg")
            .with_bundled_dirs(Vec::new())
            .with_working_dir(Some(root.join("cwd")))
            .with_search_path(Some(OsString::new()))
    }

    #[test]
    fn nothing_found_is_none() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(isolated(root.path()).locate(), None);
    }

    #[test]
    fn managed_binary_comes_first() {
        let root = tempfile::tempdir().unwrap();
        let managed = root.path().join("libs").join("ffmpeg");
        write_binary(&managed, 0o755);
        write_binary(&root.path().join("cwd").join("ffmpeg"), 0o755);

        let locator = isolated(root.path()).with_managed_dir(Some(root.path().join("libs")));
        assert_eq!(locator.locate(), Some(managed));
    }

    #[test]
    fn explicit_path_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        let explicit = root.path().join("custom").join("my-ffmpeg");
        write_binary(&explicit, 0o755);
        write_binary(&root.path().join("libs").join("ffmpeg"), 0o755);

        let locator = isolated(root.path())
            .with_managed_dir(Some(root.path().join("libs")))
            .with_explicit(Some(explicit.clone()));
        assert_eq!(locator.locate(), Some(explicit));
    }

    #[test]
    fn missing_explicit_path_falls_through() {
        let root = tempfile::tempdir().unwrap();
        let local = root.path().join("cwd").join("ffmpeg");
        write_binary(&local, 0o755);

        let locator = isolated(root.path()).with_explicit(Some(root.path().join("nope")));
        assert_eq!(locator.locate(), Some(local));
    }

    #[test]
    fn working_dir_candidates_must_be_executable() {
        let root = tempfile::tempdir().unwrap();
        write_binary(&root.path().join("cwd").join("ffmpeg"), 0o644);
        let in_bin = root.path().join("cwd").join("bin").join("ffmpeg");
        write_binary(&in_bin, 0o755);

        assert_eq!(isolated(root.path()).locate(), Some(in_bin));
    }

    #[test]
    fn bundled_dirs_are_searched_before_path() {
        let root = tempfile::tempdir().unwrap();
        let bundled = root.path().join("app").join("bin");
        let system = root.path().join("usr").join("bin");
        write_binary(&bundled.join("ffmpeg"), 0o755);
        write_binary(&system.join("ffmpeg"), 0o755);

        let locator = isolated(root.path())
            .with_bundled_dirs(vec![bundled.clone()])
            .with_search_path(Some(system.clone().into_os_string()));
        assert_eq!(locator.locate(), Some(bundled.join("ffmpeg")));

        let system_only =
            isolated(root.path()).with_search_path(Some(system.clone().into_os_string()));
        assert_eq!(system_only.locate(), Some(system.join("ffmpeg")));
    }
}
