//! Small helpers shared by the rest of the crate.

pub mod file_system;
pub mod platform;

/// Evaluates to `$a` when `$cond` holds, else to `$b`.
#[macro_export]
macro_rules! ternary {
    ($cond:expr, $a:expr, $b:expr) => {
        if $cond { $a } else { $b }
    };
}

/// Returns the executable file name for the current platform, e.g. `yt-dlp.exe` on Windows.
pub fn find_executable(name: impl AsRef<str>) -> String {
    let name = name.as_ref();

    ternary!(
        cfg!(target_os = "windows") && !name.ends_with(".exe"),
        format!("{}.exe", name),
        name.to_string()
    )
}

/// Converts borrowed arguments into owned ones.
pub fn to_owned(args: Vec<&str>) -> Vec<String> {
    args.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_name_follows_the_platform() {
        let name = find_executable("ffmpeg");

        if cfg!(target_os = "windows") {
            assert_eq!(name, "ffmpeg.exe");
        } else {
            assert_eq!(name, "ffmpeg");
        }
        assert_eq!(find_executable("yt-dlp.exe"), "yt-dlp.exe");
    }
}
