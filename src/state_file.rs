//! The persisted `[State]` key/value file: three named
//! fields, `CpuDriver`, `PlatformDriver`, `Profile`. Rewrites preserve
//! every other line verbatim (comments, unrelated sections) since the
//! core only ever reads and writes these three keys.

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::profile::Profile;

const SECTION: &str = "[State]";
const KEY_CPU_DRIVER: &str = "CpuDriver";
const KEY_PLATFORM_DRIVER: &str = "PlatformDriver";
const KEY_PROFILE: &str = "Profile";

#[derive(Debug, Clone, Default)]
pub struct PersistedState {
  pub cpu_driver: Option<String>,
  pub platform_driver: Option<String>,
  pub profile: Option<Profile>,
  /// Whether the `Profile` key was present in the file at all, even if
  /// its value failed to parse. Distinguishes "absent" (leave whatever
  /// `active_profile` already is) from "present but garbage" (erase
  /// it) when applying persisted configuration at start-up.
  pub profile_present: bool,
}

fn parse_key_line(line: &str, key: &str) -> Option<String> {
  let trimmed = line.trim();
  let (name, value) = trimmed.split_once('=')?;
  if name.trim() == key {
    Some(value.trim().to_owned())
  } else {
    None
  }
}

/// Reads the persisted state file. A missing file is not an error —
/// it simply yields an all-`None` state, as on first boot.
pub fn load(path: &Path) -> anyhow::Result<PersistedState> {
  let text = match fs::read_to_string(path) {
    Ok(text) => text,
    Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
      return Ok(PersistedState::default());
    },
    Err(error) => {
      return Err(error)
        .with_context(|| format!("failed to read '{}'", path.display()));
    },
  };

  let mut state = PersistedState::default();
  let mut in_section = false;

  for line in text.lines() {
    let trimmed = line.trim();
    if trimmed.starts_with('[') {
      in_section = trimmed == SECTION;
      continue;
    }
    if !in_section || trimmed.starts_with(['#', ';']) {
      continue;
    }

    if let Some(value) = parse_key_line(line, KEY_CPU_DRIVER) {
      state.cpu_driver = Some(value);
    } else if let Some(value) = parse_key_line(line, KEY_PLATFORM_DRIVER) {
      state.platform_driver = Some(value);
    } else if let Some(value) = parse_key_line(line, KEY_PROFILE) {
      state.profile_present = true;
      state.profile = Profile::from_str(&value);
    }
  }

  Ok(state)
}

/// Rewrites the persisted state file, preserving every line not
/// belonging to one of the three tracked keys. A key whose value is
/// `None` is removed from the file entirely (used when a driver isn't
/// bound, or a profile failed to parse and must be erased).
pub fn save(path: &Path, state: &PersistedState) -> anyhow::Result<()> {
  let existing = fs::read_to_string(path).unwrap_or_default();

  let mut lines: Vec<String> = Vec::new();
  let mut in_section = false;
  let mut section_seen = false;
  let mut seen = [false; 3];

  let desired = [
    (KEY_CPU_DRIVER, state.cpu_driver.clone()),
    (KEY_PLATFORM_DRIVER, state.platform_driver.clone()),
    (KEY_PROFILE, state.profile.map(|p| p.as_str().to_owned())),
  ];

  for line in existing.lines() {
    let trimmed = line.trim();

    if trimmed.starts_with('[') {
      if in_section {
        append_missing_keys(&mut lines, &desired, &mut seen);
      }
      in_section = trimmed == SECTION;
      section_seen |= in_section;
      lines.push(line.to_owned());
      continue;
    }

    if in_section && !trimmed.starts_with(['#', ';']) {
      let mut matched_key = None;
      for (index, (key, _)) in desired.iter().enumerate() {
        if parse_key_line(line, key).is_some() {
          matched_key = Some(index);
          break;
        }
      }

      if let Some(index) = matched_key {
        seen[index] = true;
        if let Some(value) = &desired[index].1 {
          lines.push(format!("{key}={value}", key = desired[index].0));
        }
        continue;
      }
    }

    lines.push(line.to_owned());
  }

  if in_section {
    append_missing_keys(&mut lines, &desired, &mut seen);
  }

  if !section_seen {
    lines.push(SECTION.to_owned());
    append_missing_keys(&mut lines, &desired, &mut [false; 3]);
  }

  let mut contents = lines.join("\n");
  contents.push('\n');

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)
      .with_context(|| format!("failed to create '{}'", parent.display()))?;
  }

  fs::write(path, contents)
    .with_context(|| format!("failed to write '{}'", path.display()))
}

fn append_missing_keys(
  lines: &mut Vec<String>,
  desired: &[(&str, Option<String>); 3],
  seen: &mut [bool; 3],
) {
  for (index, (key, value)) in desired.iter().enumerate() {
    if !seen[index] {
      if let Some(value) = value {
        lines.push(format!("{key}={value}"));
      }
      seen[index] = true;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn tempfile_with(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
  }

  #[test]
  fn missing_file_loads_as_all_none() {
    let state = load(Path::new("/nonexistent/ppd-state.ini")).unwrap();
    assert!(state.cpu_driver.is_none());
    assert!(state.platform_driver.is_none());
    assert!(state.profile.is_none());
  }

  #[test]
  fn round_trips_through_save_and_load() {
    let file = tempfile_with("");
    let state = PersistedState {
      cpu_driver: Some("amd_pstate".into()),
      platform_driver: None,
      profile: Some(Profile::Performance),
      profile_present: true,
    };

    save(file.path(), &state).unwrap();
    let reloaded = load(file.path()).unwrap();

    assert_eq!(reloaded.cpu_driver.as_deref(), Some("amd_pstate"));
    assert_eq!(reloaded.platform_driver, None);
    assert_eq!(reloaded.profile, Some(Profile::Performance));
  }

  #[test]
  fn preserves_comments_and_unrelated_lines() {
    let file = tempfile_with(
      "# a user comment\n[State]\n; another comment\nCpuDriver=amd_pstate\n",
    );

    let state = PersistedState {
      cpu_driver: Some("amd_pstate".into()),
      platform_driver: None,
      profile: Some(Profile::Balanced),
      profile_present: true,
    };
    save(file.path(), &state).unwrap();

    let contents = fs::read_to_string(file.path()).unwrap();
    assert!(contents.contains("# a user comment"));
    assert!(contents.contains("; another comment"));
    assert!(contents.contains("Profile=balanced"));
  }

  #[test]
  fn erasing_a_key_removes_its_line() {
    let file = tempfile_with("[State]\nCpuDriver=intel_pstate\nProfile=performance\n");

    let state = PersistedState {
      cpu_driver: None,
      platform_driver: None,
      profile: Some(Profile::Performance),
      profile_present: true,
    };
    save(file.path(), &state).unwrap();

    let contents = fs::read_to_string(file.path()).unwrap();
    assert!(!contents.contains("CpuDriver"));
    assert!(contents.contains("Profile=performance"));
  }
}
