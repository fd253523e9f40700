//! Input validation for chat messages
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. empty or whitespace-only
//! 2. longer than the configured limit (in characters)
//! 3. characters that cannot be part of legitimate text
//! 4. the ordered prompt-injection pattern table

use chatline_common::InputRejection;
use regex::Regex;

/// Default maximum message length, in characters
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 4000;

/// A named prompt-injection marker
pub struct DisallowedPattern {
    pub name: &'static str,
    pub regex: Regex,
}

lazy_static::lazy_static! {
    /// Prompt-injection markers, checked in order
    pub static ref DISALLOWED_PATTERNS: Vec<DisallowedPattern> = vec![
        DisallowedPattern {
            name: "role_override",
            regex: Regex::new(
                r"(?i)\b(ignore|disregard|forget|override)\s+(all\s+)?(of\s+)?(the\s+|your\s+)?(previous|prior|above|earlier|preceding|system)\s+(instructions|prompts?|rules|directives)\b"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "identity_override",
            regex: Regex::new(
                r"(?i)\b(you\s+are\s+now\s+(a|an|the)\b|from\s+now\s+on,?\s+you\s+are\b)"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "fake_system_directive",
            regex: Regex::new(
                r"(?im)(^\s*(system|developer)\s*(prompt|message|override)?\s*:|\b(system|admin|root)\s+(override|command|directive)\b|\bnew\s+instructions\s*:)"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "prompt_extraction",
            regex: Regex::new(
                r"(?i)\b((reveal|show|print|repeat|output|display)\s+(me\s+)?(your|the)\s+(system\s+prompt|initial\s+instructions|hidden\s+instructions|instructions)|what\s+(is|are)\s+your\s+(system\s+prompt|initial\s+instructions|hidden\s+instructions))\b"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "jailbreak",
            regex: Regex::new(
                r"(?i)\b(do\s+anything\s+now|dan\s+mode|developer\s+mode\s+(enabled|activated|on)|jailbreak\s+mode)\b"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "chat_template_marker",
            regex: Regex::new(
                r"(?i)(<\|im_start\|>|<\|im_end\|>|<\|system\|>|<\|endoftext\|>|\[/?INST\]|<</?SYS>>)"
            ).unwrap(),
        },
        DisallowedPattern {
            name: "transcript_turn",
            regex: Regex::new(r"(?i)\n\s*\n\s*(human|assistant)\s*:").unwrap(),
        },
        DisallowedPattern {
            name: "control_sequence",
            // CSI, OSC, DCS, SOS, PM, APC introducers
            regex: Regex::new(r"\x1b[\[\]PX^_]").unwrap(),
        },
    ];
}

/// Outcome of validating one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub accepted: bool,
    pub reason: Option<InputRejection>,
    /// Name of the injection marker that matched, for logs only
    pub matched_pattern: Option<&'static str>,
}

impl ValidationResult {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
            matched_pattern: None,
        }
    }

    pub fn reject(reason: InputRejection) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            matched_pattern: None,
        }
    }

    fn disallowed(pattern: &'static str) -> Self {
        Self {
            matched_pattern: Some(pattern),
            ..Self::reject(InputRejection::DisallowedPattern)
        }
    }

    /// `Err` carrying the rejection reason, if any
    pub fn into_result(self) -> Result<(), InputRejection> {
        match self.reason {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }
}

/// Stateless validator for user-supplied message text.
///
/// Malformed input is a rejection outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputValidator {
    max_input_length: usize,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INPUT_LENGTH)
    }
}

impl InputValidator {
    pub fn new(max_input_length: usize) -> Self {
        Self { max_input_length }
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    /// Validate raw bytes, rejecting anything that is not UTF-8
    pub fn validate_bytes(&self, bytes: &[u8]) -> ValidationResult {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.validate(text),
            Err(_) => ValidationResult::reject(InputRejection::InvalidEncoding),
        }
    }

    /// Validate message text
    pub fn validate(&self, text: &str) -> ValidationResult {
        if text.trim().is_empty() {
            return ValidationResult::reject(InputRejection::Empty);
        }

        if text.chars().count() > self.max_input_length {
            return ValidationResult::reject(InputRejection::TooLong);
        }

        if text.chars().any(is_invalid_char) {
            return ValidationResult::reject(InputRejection::InvalidEncoding);
        }

        DISALLOWED_PATTERNS
            .iter()
            .find(|pattern| pattern.regex.is_match(text))
            .map(|pattern| ValidationResult::disallowed(pattern.name))
            .unwrap_or_else(ValidationResult::accept)
    }
}

/// Replacement characters, noncharacters, and control characters other than
/// tab, newline, carriage return and escape. Escape is left to the pattern table.
fn is_invalid_char(c: char) -> bool {
    if c == char::REPLACEMENT_CHARACTER {
        return true;
    }
    if c.is_control() {
        return !matches!(c, '\t' | '\n' | '\r' | '\x1b');
    }
    let code = c as u32;
    (0xFDD0..=0xFDEF).contains(&code) || (code & 0xFFFE) == 0xFFFE
}
