use thiserror::Error;

/// The typed error kinds the arbitration core distinguishes, per the
/// propagation policy each call site is responsible for following:
/// invalid input and authorization failures go back to the client
/// verbatim, backend failures are logged or surfaced depending on who
/// triggered them, and config read/write failures never propagate past
/// a log line.
#[derive(Error, Debug)]
pub enum CoreError {
  #[error("invalid profile name '{0}'")]
  InvalidArgs(String),

  #[error("cannot switch to unavailable profile '{0}'")]
  Unavailable(String),

  #[error("not authorized")]
  Unauthorized,

  #[error("{kind} '{name}' failed to activate profile: {source}")]
  BackendFailure {
    kind: BackendKind,
    name: String,
    #[source]
    source: anyhow::Error,
  },

  #[error("start-up failed: {0}")]
  StartupFailure(String),

  #[error("failed to read persisted state: {0}")]
  ConfigReadFailure(#[source] anyhow::Error),

  #[error("failed to write persisted state: {0}")]
  ConfigWriteFailure(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
  Driver,
  Action,
}

impl std::fmt::Display for BackendKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Driver => write!(f, "driver"),
      Self::Action => write!(f, "action"),
    }
  }
}

impl CoreError {
  /// Maps a core error onto the D-Bus-facing error the method dispatcher
  /// should return, per spec: invalid input and auth failures are
  /// surfaced as-is, everything else becomes a generic `Failed`.
  pub fn to_fdo(&self) -> zbus::fdo::Error {
    match self {
      Self::InvalidArgs(msg) => zbus::fdo::Error::InvalidArgs(msg.clone()),
      Self::Unavailable(profile) => {
        zbus::fdo::Error::InvalidArgs(format!(
          "cannot switch to unavailable profile '{profile}'"
        ))
      },
      Self::Unauthorized => zbus::fdo::Error::AccessDenied(self.to_string()),
      other => zbus::fdo::Error::Failed(other.to_string()),
    }
  }
}
