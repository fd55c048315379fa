use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four supervised application identities.
///
/// The set is closed: the dependency graph between roles is fixed, so adding
/// a role means extending [`crate::graph`] as well.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Game store client that the VR runtime needs running.
    Launcher,
    /// Headset streaming client. Independent of every other role.
    StreamingClient,
    /// The VR runtime.
    VrRuntime,
    /// The VR application being played.
    TargetApp,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Launcher,
        Role::StreamingClient,
        Role::VrRuntime,
        Role::TargetApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launcher => "launcher",
            Self::StreamingClient => "streaming_client",
            Self::VrRuntime => "vr_runtime",
            Self::TargetApp => "target_app",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "launcher" => Some(Self::Launcher),
            "streaming_client" => Some(Self::StreamingClient),
            "vr_runtime" => Some(Self::VrRuntime),
            "target_app" => Some(Self::TargetApp),
            _ => None,
        }
    }

    /// Human-facing name used in log lines and status output.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Launcher => "Launcher",
            Self::StreamingClient => "Streaming-Client",
            Self::VrRuntime => "VR-Runtime",
            Self::TargetApp => "Target-App",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_and_from_str_agree() {
        for role in Role::ALL {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("steam"), None);
    }

    #[test]
    fn serde_uses_snake_case_keys() {
        let json = serde_json::to_string(&Role::VrRuntime).unwrap();
        assert_eq!(json, "\"vr_runtime\"");
    }

    #[test]
    fn display_uses_hyphenated_names() {
        assert_eq!(Role::TargetApp.to_string(), "Target-App");
        assert_eq!(Role::StreamingClient.to_string(), "Streaming-Client");
    }
}
