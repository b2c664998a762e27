use std::{
  env,
  error,
  fs,
  io,
  path::{Path, PathBuf},
  str,
};

use anyhow::Context;

/// Re-roots an absolute sysfs-style path under `$UMOCKDEV_DIR` when that
/// environment variable is set, mirroring `ppd_utils_get_sysfs_path` so that
/// drivers can be exercised against a mocked device tree in tests.
pub fn sysfs_path(path: impl AsRef<Path>) -> PathBuf {
  let path = path.as_ref();

  match env::var_os("UMOCKDEV_DIR") {
    Some(root) if !root.is_empty() => {
      let mut rerooted = PathBuf::from(root);
      rerooted.extend(path.components().filter(|c| {
        !matches!(c, std::path::Component::RootDir)
      }));
      rerooted
    },

    _ => path.to_path_buf(),
  }
}

pub fn exists(path: impl AsRef<Path>) -> bool {
  sysfs_path(path).exists()
}

pub fn read_dir(path: impl AsRef<Path>) -> anyhow::Result<Option<fs::ReadDir>> {
  let path = sysfs_path(path);

  match fs::read_dir(&path) {
    Ok(entries) => Ok(Some(entries)),

    Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),

    Err(error) => {
      Err(error).context(format!(
        "failed to read directory '{path}'",
        path = path.display()
      ))
    },
  }
}

pub fn read(path: impl AsRef<Path>) -> anyhow::Result<Option<String>> {
  let path = sysfs_path(path);

  match fs::read_to_string(&path) {
    Ok(string) => Ok(Some(string.trim().to_owned())),

    Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),

    Err(error) => {
      Err(error)
        .context(format!("failed to read '{path}'", path = path.display()))
    },
  }
}

pub fn read_n<N: str::FromStr>(
  path: impl AsRef<Path>,
) -> anyhow::Result<Option<N>>
where
  N::Err: error::Error + Send + Sync + 'static,
{
  let path_owned = path.as_ref().to_path_buf();

  match read(path)? {
    Some(content) => {
      Ok(Some(content.trim().parse().with_context(|| {
        format!(
          "failed to parse contents of '{path}' as a number",
          path = path_owned.display(),
        )
      })?))
    },

    None => Ok(None),
  }
}

/// Writes `value` to `path` the way a single sysfs attribute is expected to
/// be written: one `write(2)`, no append, no partial retry loop needed since
/// `std::fs::write` already opens with `O_TRUNC` semantics for regular files.
pub fn write(path: impl AsRef<Path>, value: &str) -> anyhow::Result<()> {
  let path = sysfs_path(path);

  fs::write(&path, value).with_context(|| {
    format!(
      "failed to write '{value}' to '{path}'",
      path = path.display(),
    )
  })
}

/// Writes the same value to every path in `paths`, collecting (not
/// short-circuiting on) the first failure so a driver can report exactly
/// which device out of several rejected the write.
pub fn write_all(
  paths: impl IntoIterator<Item = impl AsRef<Path>>,
  value: &str,
) -> anyhow::Result<()> {
  let mut first_error = None;

  for path in paths {
    if let Err(error) = write(path, value) {
      if first_error.is_none() {
        first_error = Some(error);
      }
    }
  }

  match first_error {
    Some(error) => Err(error),
    None => Ok(()),
  }
}

/// Resolves the persisted-state file path, honoring the same
/// `UMOCKDEV_DIR` re-rooting rule sysfs paths use, but with a fixed
/// test-mode filename so test harnesses know where to look.
pub fn state_file_path(default_path: &Path) -> PathBuf {
  match env::var_os("UMOCKDEV_DIR") {
    Some(root) if !root.is_empty() => {
      PathBuf::from(root).join("ppd_test_conf.ini")
    },

    _ => default_path.to_path_buf(),
  }
}
