//! Build stages and their ordering.
//!
//! Stages are ranked by declaration order. A session only ever moves to a
//! higher-ranked stage, except for [`Stage::Cancelled`], which can be entered
//! from anywhere and is never left.

use serde::{Deserialize, Serialize};

/// One phase of an application build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Session created, nothing has run yet
    #[default]
    None,
    /// Environment and request checks
    #[serde(rename = "precheck")]
    PreCheck,
    /// Planning: request -> app plan with components
    Initialize,
    /// Reserved for a future design stage
    Design,
    /// Per-component code generation
    GenerateCode,
    /// Compile/bundle the generated project
    Build,
    /// Launch the generated project
    Run,
    /// Publish the generated project
    Deploy,
    /// Absorbing failure/cancellation state
    Cancelled,
}

impl Stage {
    /// Every stage that can appear in an active path, in rank order.
    pub const ORDERED: [Stage; 7] = [
        Stage::PreCheck,
        Stage::Initialize,
        Stage::Design,
        Stage::GenerateCode,
        Stage::Build,
        Stage::Run,
        Stage::Deploy,
    ];

    /// The default active path.
    pub const DEFAULT_PATH: [Stage; 3] = [Stage::PreCheck, Stage::Initialize, Stage::GenerateCode];

    /// Position in the forward ordering. `Cancelled` has no rank.
    #[must_use]
    pub const fn rank(self) -> Option<u8> {
        match self {
            Self::None => Some(0),
            Self::PreCheck => Some(1),
            Self::Initialize => Some(2),
            Self::Design => Some(3),
            Self::GenerateCode => Some(4),
            Self::Build => Some(5),
            Self::Run => Some(6),
            Self::Deploy => Some(7),
            Self::Cancelled => None,
        }
    }

    /// Whether moving from `self` to `next` respects monotonic ordering.
    ///
    /// Any non-cancelled stage may move to `Cancelled`; nothing leaves it.
    #[must_use]
    pub fn can_advance_to(self, next: Stage) -> bool {
        match (self.rank(), next.rank()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(from), Some(to)) => to > from,
        }
    }

    /// Stable snake_case identifier (matches the serde form).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PreCheck => "precheck",
            Self::Initialize => "initialize",
            Self::Design => "design",
            Self::GenerateCode => "generate_code",
            Self::Build => "build",
            Self::Run => "run",
            Self::Deploy => "deploy",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::PreCheck => write!(f, "Pre-check"),
            Self::Initialize => write!(f, "Initialize"),
            Self::Design => write!(f, "Design"),
            Self::GenerateCode => write!(f, "Generate Code"),
            Self::Build => write!(f, "Build"),
            Self::Run => write!(f, "Run"),
            Self::Deploy => write!(f, "Deploy"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Check that `path` is a usable active stage list.
///
/// Returns a human-readable reason on failure. Capability checks (which stages
/// a handler can actually run) are the engine's concern, not this function's.
pub fn validate_path(path: &[Stage]) -> Result<(), String> {
    let Some(first) = path.first() else {
        return Err("active stage list is empty".to_string());
    };
    if *first != Stage::PreCheck {
        return Err(format!("active stage list must start with precheck, got {}", first.as_str()));
    }

    let mut previous: Option<u8> = None;
    for stage in path {
        let rank = match (stage, stage.rank()) {
            (Stage::None, _) | (_, None) => {
                return Err(format!("stage '{}' cannot be part of an active path", stage.as_str()));
            }
            (_, Some(rank)) => rank,
        };
        if previous.is_some_and(|p| rank <= p) {
            return Err(format!(
                "active stages must be strictly ordered; '{}' is out of place",
                stage.as_str()
            ));
        }
        previous = Some(rank);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(Stage::None.can_advance_to(Stage::PreCheck));
        assert!(Stage::PreCheck.can_advance_to(Stage::GenerateCode));
        assert!(!Stage::GenerateCode.can_advance_to(Stage::Initialize));
        assert!(!Stage::Initialize.can_advance_to(Stage::Initialize));
    }

    #[test]
    fn test_cancelled_is_absorbing() {
        assert!(Stage::Initialize.can_advance_to(Stage::Cancelled));
        assert!(!Stage::Cancelled.can_advance_to(Stage::Deploy));
        assert!(!Stage::Cancelled.can_advance_to(Stage::Cancelled));
    }

    #[test]
    fn test_validate_default_path() {
        assert!(validate_path(&Stage::DEFAULT_PATH).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_paths() {
        assert!(validate_path(&[]).is_err());
        assert!(validate_path(&[Stage::Initialize, Stage::GenerateCode]).is_err());
        assert!(validate_path(&[Stage::PreCheck, Stage::GenerateCode, Stage::Initialize]).is_err());
        assert!(validate_path(&[Stage::PreCheck, Stage::Cancelled]).is_err());
        assert!(validate_path(&[Stage::PreCheck, Stage::PreCheck]).is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Stage::GenerateCode).unwrap();
        assert_eq!(json, "\"generate_code\"");
        let parsed: Stage = serde_json::from_str("\"precheck\"").unwrap();
        assert_eq!(parsed, Stage::PreCheck);
    }
}
