use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which detection algorithm a worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    #[default]
    Edges,
    Faces,
    FacesAndEyes,
}

impl OperationMode {
    pub const ALL: &[OperationMode] = &[
        OperationMode::Edges,
        OperationMode::Faces,
        OperationMode::FacesAndEyes,
    ];

    /// The next mode in the host's fixed cycle, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn includes_eyes(self) -> bool {
        self == OperationMode::FacesAndEyes
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationMode::Edges => write!(f, "edges"),
            OperationMode::Faces => write!(f, "faces"),
            OperationMode::FacesAndEyes => write!(f, "faces_and_eyes"),
        }
    }
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "edges" | "edge" => Ok(OperationMode::Edges),
            "faces" | "face" => Ok(OperationMode::Faces),
            "faces_and_eyes" | "eyes" => Ok(OperationMode::FacesAndEyes),
            other => Err(format!(
                "unknown mode '{other}' (expected edges, faces or eyes)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_next_cycles_through_all_modes() {
        let mut mode = OperationMode::default();
        let mut seen = vec![mode];
        for _ in 0..3 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                OperationMode::Edges,
                OperationMode::Faces,
                OperationMode::FacesAndEyes,
                OperationMode::Edges,
            ]
        );
    }

    #[rstest]
    #[case("edges", OperationMode::Edges)]
    #[case("Faces", OperationMode::Faces)]
    #[case("eyes", OperationMode::FacesAndEyes)]
    #[case("faces_and_eyes", OperationMode::FacesAndEyes)]
    fn test_from_str(#[case] input: &str, #[case] expected: OperationMode) {
        assert_eq!(input.parse::<OperationMode>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_rejects_unknown() {
        assert!("blur".parse::<OperationMode>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for mode in OperationMode::ALL {
            assert_eq!(mode.to_string().parse::<OperationMode>().unwrap(), *mode);
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&OperationMode::FacesAndEyes).unwrap();
        assert_eq!(json, r#""faces_and_eyes""#);
    }

    #[test]
    fn test_only_faces_and_eyes_includes_eyes() {
        assert!(!OperationMode::Edges.includes_eyes());
        assert!(!OperationMode::Faces.includes_eyes());
        assert!(OperationMode::FacesAndEyes.includes_eyes());
    }
}
