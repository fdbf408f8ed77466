// src/supervisor/exit_code.rs

use std::fmt;

/// Exit codes the simulator documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorExit {
    Ok,
    GenericError,
    DomainError,
    IgnitionsError,
    BcError,
}

impl SimulatorExit {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::GenericError),
            2 => Some(Self::DomainError),
            3 => Some(Self::IgnitionsError),
            4 => Some(Self::BcError),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::GenericError => "GENERIC_ERROR",
            Self::DomainError => "DOMAIN_ERROR",
            Self::IgnitionsError => "IGNITIONS_ERROR",
            Self::BcError => "BC_ERROR",
        }
    }
}

impl fmt::Display for SimulatorExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure text for a non-successful exit. `None` means the process was
/// terminated by a signal.
pub fn describe_exit(code: Option<i32>) -> String {
    match code.map(|c| (c, SimulatorExit::from_code(c))) {
        Some((_, Some(known))) => format!("Error running simulation: {known}"),
        Some((raw, None)) => {
            format!("Error running simulation: UNKNOWN_ERROR (exit code {raw})")
        }
        None => "Error running simulation: UNKNOWN_ERROR (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_use_their_names() {
        assert_eq!(describe_exit(Some(3)), "Error running simulation: IGNITIONS_ERROR");
        assert_eq!(describe_exit(Some(4)), "Error running simulation: BC_ERROR");
        assert_eq!(SimulatorExit::from_code(2), Some(SimulatorExit::DomainError));
    }

    #[test]
    fn unknown_code_keeps_raw_value() {
        let text = describe_exit(Some(42));
        assert!(text.contains("UNKNOWN_ERROR"));
        assert!(text.contains("42"));
        assert!(describe_exit(None).contains("UNKNOWN_ERROR"));
    }
}
